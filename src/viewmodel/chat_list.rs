use std::cmp::Ordering;

use uuid::Uuid;

use crate::{
    auth::Session,
    conversation::{ConversationDeletion, ConversationPreview, ConversationRepository},
    error::{AppError, Result},
    viewmodel::{scope::ViewScope, toast::Toast},
};

/// Orders conversations for display: those with a last message first, most
/// recent on top; the rest keep their relative order at the end.
pub fn sort_conversations(conversations: &mut [ConversationPreview]) {
    conversations.sort_by(|a, b| match (&a.last_message, &b.last_message) {
        (Some(x), Some(y)) => y.created_at.cmp(&x.created_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Case-insensitive substring match on the counterpart's display name.
pub fn filter_by_name<'a>(
    conversations: &'a [ConversationPreview],
    query: &str,
) -> Vec<&'a ConversationPreview> {
    let query = query.trim().to_lowercase();
    conversations
        .iter()
        .filter(|c| query.is_empty() || c.other_user.display_name.to_lowercase().contains(&query))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteDialog {
    pub open: bool,
    pub pending: Option<Uuid>,
}

pub struct ChatListViewModel {
    repository: ConversationRepository,
    deletion: ConversationDeletion,
    session: Option<Session>,
    scope: ViewScope,
    conversations: Vec<ConversationPreview>,
    loading: bool,
    error: Option<String>,
    search_query: String,
    delete_dialog: DeleteDialog,
    toasts: Vec<Toast>,
}

impl ChatListViewModel {
    pub fn new(
        repository: ConversationRepository,
        deletion: ConversationDeletion,
        session: Option<Session>,
        scope: ViewScope,
    ) -> Self {
        Self {
            repository,
            deletion,
            session,
            scope,
            conversations: Vec::new(),
            loading: false,
            error: None,
            search_query: String::new(),
            delete_dialog: DeleteDialog::default(),
            toasts: Vec::new(),
        }
    }

    pub fn conversations(&self) -> &[ConversationPreview] {
        &self.conversations
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn delete_dialog(&self) -> &DeleteDialog {
        &self.delete_dialog
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    /// Sorted, then filtered by the search query.
    pub fn visible_conversations(&self) -> Vec<ConversationPreview> {
        let mut sorted = self.conversations.clone();
        sort_conversations(&mut sorted);
        filter_by_name(&sorted, &self.search_query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Replaces the list with a fresh fetch. Does nothing once unmounted.
    pub async fn load(&mut self) {
        if !self.scope.is_mounted() {
            return;
        }
        self.loading = true;
        self.error = None;

        let result = tokio::select! {
            biased;
            _ = self.scope.unmounted() => None,
            result = self.repository.fetch_user_conversations(self.session.as_ref()) => Some(result),
        };

        match result {
            Some(result) => self.apply_load_result(result),
            None => {
                self.loading = false;
                tracing::debug!("Chat list unmounted while loading; result discarded");
            }
        }
    }

    fn apply_load_result(&mut self, result: Result<Vec<ConversationPreview>>) {
        self.loading = false;
        match result {
            Ok(conversations) => self.conversations = conversations,
            // No conversations is an empty list, not a failure.
            Err(AppError::NotFound(_)) => self.conversations = Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load conversations: {}", e);
                let message = match e {
                    AppError::Authentication(_) => "Please sign in to see your messages",
                    _ => "Failed to load conversations",
                };
                self.error = Some(message.to_string());
                self.toasts.push(Toast::error("Error", message));
            }
        }
    }

    pub fn request_delete(&mut self, conversation_id: Uuid) {
        self.delete_dialog = DeleteDialog {
            open: true,
            pending: Some(conversation_id),
        };
    }

    pub fn cancel_delete(&mut self) {
        self.delete_dialog = DeleteDialog::default();
    }

    /// Deletes the pending conversation and drops it from the local list.
    /// Returns whether the conversation was deleted.
    pub async fn confirm_delete(&mut self) -> bool {
        let Some(conversation_id) = std::mem::take(&mut self.delete_dialog).pending else {
            return false;
        };

        let result = tokio::select! {
            biased;
            _ = self.scope.unmounted() => None,
            result = self.deletion.delete_conversation(self.session.as_ref(), conversation_id) => Some(result),
        };

        match result {
            Some(Ok(())) => {
                self.conversations.retain(|c| c.id != conversation_id);
                self.toasts
                    .push(Toast::success("Conversation deleted", "The conversation was removed"));
                true
            }
            Some(Err(e)) => {
                tracing::warn!("Failed to delete conversation {}: {}", conversation_id, e);
                let description = match e {
                    AppError::Authorization(_) => "You do not have access to this conversation",
                    _ => "Could not delete the conversation",
                };
                self.toasts.push(Toast::error("Error", description));
                false
            }
            None => false,
        }
    }
}
