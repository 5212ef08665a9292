use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{require_session, Session},
    backend::{ChatBackend, NewMessage},
    error::{AppError, Result},
    message::message_models::Message,
};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct MessageRepository {
    backend: Arc<dyn ChatBackend>,
}

impl MessageRepository {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Persists a message from the caller. Any storage failure comes back as
    /// a retryable [`AppError::Write`].
    pub async fn send_message(
        &self,
        session: Option<&Session>,
        conversation_id: Uuid,
        content: &str,
        client_token: Option<&str>,
    ) -> Result<Message> {
        let session = require_session(session)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".to_string()));
        }

        let is_participant = self
            .backend
            .is_participant(conversation_id, session.user_id)
            .await
            .map_err(|e| AppError::Write(format!("Could not send message: {}", e)))?;
        if !is_participant {
            return Err(AppError::no_access());
        }

        let row = self
            .backend
            .insert_message(NewMessage {
                conversation_id,
                sender_id: session.user_id,
                content,
                client_token,
            })
            .await
            .map_err(|e| AppError::Write(format!("Could not send message: {}", e)))?;

        if row.conversation_id != conversation_id {
            tracing::warn!(
                "Send token from {} resolved to message {} outside conversation {}",
                session.user_id,
                row.id,
                conversation_id
            );
            return Err(AppError::Validation(
                "client_token was already used for another conversation".to_string(),
            ));
        }

        tracing::debug!("Message {} sent to conversation {}", row.id, conversation_id);
        Ok(row.into())
    }

    /// Sets the read flag on the given messages. Safe to repeat; an empty
    /// list returns immediately without reaching the backend.
    pub async fn mark_messages_as_read(
        &self,
        session: Option<&Session>,
        message_ids: &[Uuid],
    ) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let session = require_session(session)?;

        let updated = self
            .backend
            .mark_read(session.user_id, message_ids)
            .await
            .map_err(|e| AppError::Write(format!("Could not mark messages as read: {}", e)))?;

        tracing::debug!(
            "Marked {} of {} messages read for {}",
            updated,
            message_ids.len(),
            session.user_id
        );
        Ok(updated)
    }

    /// Messages from others the caller has not read yet, across all of the
    /// caller's conversations. Advisory only: every failure yields 0.
    pub async fn get_unread_message_count(&self, session: Option<&Session>) -> i64 {
        let Some(session) = session else {
            return 0;
        };

        let conversation_ids = match self.backend.conversation_ids_for_user(session.user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Unread count: conversation lookup failed: {}", e);
                return 0;
            }
        };
        if conversation_ids.is_empty() {
            return 0;
        }

        match self
            .backend
            .count_unread(session.user_id, &conversation_ids)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Unread count query failed: {}", e);
                0
            }
        }
    }

    /// One page of a conversation, oldest message first.
    pub async fn list_thread(
        &self,
        session: Option<&Session>,
        conversation_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let session = require_session(session)?;

        if !self
            .backend
            .is_participant(conversation_id, session.user_id)
            .await?
        {
            return Err(AppError::no_access());
        }

        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        let rows = self
            .backend
            .list_messages(conversation_id, limit as i64, offset)
            .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// The newest `limit` messages of a conversation, in display order
    /// (oldest of them first).
    pub async fn latest_thread(
        &self,
        session: Option<&Session>,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let session = require_session(session)?;

        if !self
            .backend
            .is_participant(conversation_id, session.user_id)
            .await?
        {
            return Err(AppError::no_access());
        }

        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut rows = self
            .backend
            .recent_messages(conversation_id, limit as i64)
            .await?;
        rows.reverse();

        Ok(rows.into_iter().map(Message::from).collect())
    }
}
