use uuid::Uuid;

use crate::{
    auth::Session,
    error::{AppError, Result},
    message::{message_repository::MAX_PAGE_SIZE, Message, MessageRepository, ReadMarker},
    viewmodel::scope::ViewScope,
};

/// Raises the sending flag for as long as it lives, so a send that is
/// cancelled mid-flight still lowers it.
struct SendingFlag<'a>(&'a mut bool);

impl<'a> SendingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for SendingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// State behind a single conversation screen: the message list, the
/// composer and the read receipts that follow from displaying messages.
pub struct MessageThreadView {
    conversation_id: Uuid,
    session: Session,
    repository: MessageRepository,
    read_marker: ReadMarker,
    scope: ViewScope,
    messages: Vec<Message>,
    draft: String,
    pending_token: Option<String>,
    sending: bool,
    send_error: Option<String>,
    scroll_to_bottom: bool,
}

impl MessageThreadView {
    pub fn new(
        conversation_id: Uuid,
        session: Session,
        repository: MessageRepository,
        read_marker: ReadMarker,
        scope: ViewScope,
    ) -> Self {
        Self {
            conversation_id,
            session,
            repository,
            read_marker,
            scope,
            messages: Vec::new(),
            draft: String::new(),
            pending_token: None,
            sending: false,
            send_error: None,
            scroll_to_bottom: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Loads the newest page of the thread. Does nothing once unmounted.
    pub async fn load(&mut self) -> Result<()> {
        if !self.scope.is_mounted() {
            return Ok(());
        }

        let result = tokio::select! {
            biased;
            _ = self.scope.unmounted() => None,
            result = self.repository.latest_thread(
                Some(&self.session),
                self.conversation_id,
                MAX_PAGE_SIZE,
            ) => Some(result),
        };

        match result {
            Some(messages) => {
                self.messages = messages?;
                self.scroll_to_bottom = true;
            }
            None => tracing::debug!(
                "Thread {} unmounted while loading; result discarded",
                self.conversation_id
            ),
        }
        Ok(())
    }

    /// Called whenever the list is displayed. Hands the counterpart's unread
    /// messages to the read marker without waiting, and returns their ids.
    pub fn render(&self) -> Vec<Uuid> {
        let unread: Vec<Uuid> = self
            .messages
            .iter()
            .filter(|m| m.is_unread_for(self.session.user_id))
            .map(|m| m.id)
            .collect();

        self.read_marker.enqueue(&unread);
        unread
    }

    /// True once after the list grew, so the UI scrolls to the newest message.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_bottom)
    }

    /// Appends a message pushed over the realtime stream.
    pub fn receive(&mut self, message: Message) {
        if message.conversation_id != self.conversation_id
            || self.messages.iter().any(|m| m.id == message.id)
        {
            return;
        }
        self.messages.push(message);
        self.scroll_to_bottom = true;
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.draft {
            // Edited text is a new message; it must not reuse the old send token.
            self.pending_token = None;
        }
        self.draft = text;
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn can_send(&self) -> bool {
        !self.sending && !self.draft.trim().is_empty()
    }

    pub fn send_error(&self) -> Option<&str> {
        self.send_error.as_deref()
    }

    /// Sends the draft. On failure the draft stays in the composer and a
    /// retry reuses the same idempotency token. After unmount the result is
    /// discarded and the view is left untouched.
    pub async fn send(&mut self) -> Result<Message> {
        if !self.scope.is_mounted() {
            return Err(closed());
        }
        if self.sending {
            return Err(AppError::BadRequest(
                "A message is already being sent".to_string(),
            ));
        }
        if self.draft.trim().is_empty() {
            return Err(AppError::Validation("Message cannot be empty".to_string()));
        }

        let token = self
            .pending_token
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        self.send_error = None;

        let result = {
            let _sending = SendingFlag::raise(&mut self.sending);
            tokio::select! {
                biased;
                _ = self.scope.unmounted() => None,
                result = self.repository.send_message(
                    Some(&self.session),
                    self.conversation_id,
                    &self.draft,
                    Some(&token),
                ) => Some(result),
            }
        };
        let Some(result) = result else {
            tracing::debug!(
                "Thread {} unmounted while sending; result discarded",
                self.conversation_id
            );
            return Err(closed());
        };

        match result {
            Ok(message) => {
                self.draft.clear();
                self.pending_token = None;
                self.receive(message.clone());
                Ok(message)
            }
            Err(e) => {
                self.send_error = Some(if e.is_retryable() {
                    "Message not sent. Check your connection and try again.".to_string()
                } else {
                    e.to_string()
                });
                Err(e)
            }
        }
    }
}

fn closed() -> AppError {
    AppError::BadRequest("Conversation view is closed".to_string())
}
