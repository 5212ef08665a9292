//! Capability boundary to the relational store.
//!
//! Repositories never issue SQL themselves; they go through [`ChatBackend`],
//! which only offers equality-predicate reads and writes over the
//! `conversations`, `conversation_participants`, `messages`, `profiles` and
//! `push_tokens` tables.

pub mod postgres;
pub mod rows;

#[cfg(test)]
pub mod memory;

use axum::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::DeletionStep;

pub use postgres::PgBackend;
pub use rows::{ConversationRow, MessageRow, NewMessage, ParticipantRow, ProfileRow};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failure of the cascading conversation delete, tagged with the step that failed.
#[derive(Debug)]
pub struct DeletionFailure {
    pub step: DeletionStep,
    pub source: BackendError,
}

impl DeletionFailure {
    pub fn at(step: DeletionStep) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| Self {
            step,
            source: BackendError::Database(e),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ids of every conversation the user has a participant row for.
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>>;

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> BackendResult<bool>;

    async fn participants_of(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<ParticipantRow>>;

    async fn profiles(&self, user_ids: &[Uuid]) -> BackendResult<Vec<ProfileRow>>;

    /// Most recent message of each listed conversation; conversations without
    /// messages are absent from the result.
    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<MessageRow>>;

    async fn find_conversation_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> BackendResult<Option<ConversationRow>>;

    /// Creates the conversation row and both participant rows.
    async fn create_conversation(&self, user_a: Uuid, user_b: Uuid) -> BackendResult<ConversationRow>;

    /// Inserts a message. When `client_token` repeats an earlier send by the
    /// same sender into the same conversation, the earlier row is returned
    /// and nothing is inserted.
    async fn insert_message(&self, message: NewMessage<'_>) -> BackendResult<MessageRow>;

    /// Oldest first.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> BackendResult<Vec<MessageRow>>;

    /// The newest `limit` messages, newest first.
    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> BackendResult<Vec<MessageRow>>;

    /// Sets the read flag on the given messages that `reader_id` received,
    /// in conversations `reader_id` participates in. Returns rows changed.
    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> BackendResult<u64>;

    async fn count_unread(&self, user_id: Uuid, conversation_ids: &[Uuid]) -> BackendResult<i64>;

    /// Deletes messages, then participant rows, then the conversation row,
    /// as one unit.
    async fn delete_conversation_cascade(
        &self,
        conversation_id: Uuid,
    ) -> std::result::Result<(), DeletionFailure>;

    async fn upsert_push_token(&self, user_id: Uuid, token: &str, platform: &str) -> BackendResult<()>;
}
