use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    BackendResult, ChatBackend, ConversationRow, DeletionFailure, MessageRow, NewMessage,
    ParticipantRow, ProfileRow,
};
use crate::error::DeletionStep;

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatBackend for PgBackend {
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT conversation_id FROM conversation_participants WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> BackendResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM conversation_participants
                WHERE conversation_id = $1 AND user_id = $2
             )",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn participants_of(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<ParticipantRow>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT conversation_id, user_id FROM conversation_participants
             WHERE conversation_id = ANY($1)",
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> BackendResult<Vec<ProfileRow>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, username, avatar_url FROM profiles WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT DISTINCT ON (conversation_id) *
             FROM messages
             WHERE conversation_id = ANY($1)
             ORDER BY conversation_id, created_at DESC",
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_conversation_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> BackendResult<Option<ConversationRow>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT c.id, c.created_at
             FROM conversations c
             JOIN conversation_participants a ON a.conversation_id = c.id AND a.user_id = $1
             JOIN conversation_participants b ON b.conversation_id = c.id AND b.user_id = $2
             LIMIT 1",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn create_conversation(&self, user_a: Uuid, user_b: Uuid) -> BackendResult<ConversationRow> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, ConversationRow>(
            "INSERT INTO conversations DEFAULT VALUES RETURNING id, created_at",
        )
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id)
             VALUES ($1, $2), ($1, $3)",
        )
        .bind(conversation.id)
        .bind(user_a)
        .bind(user_b)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(conversation)
    }

    async fn insert_message(&self, message: NewMessage<'_>) -> BackendResult<MessageRow> {
        // Re-sending with the same token touches the existing row so RETURNING yields it.
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (conversation_id, sender_id, content, client_token)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (conversation_id, sender_id, client_token)
                DO UPDATE SET client_token = EXCLUDED.client_token
             RETURNING *",
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.content)
        .bind(message.client_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> BackendResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> BackendResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> BackendResult<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET is_read = true
             WHERE id = ANY($1)
               AND sender_id <> $2
               AND is_read = false
               AND conversation_id IN (
                   SELECT conversation_id FROM conversation_participants WHERE user_id = $2
               )",
        )
        .bind(message_ids)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, user_id: Uuid, conversation_ids: &[Uuid]) -> BackendResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ANY($1) AND sender_id <> $2 AND is_read = false",
        )
        .bind(conversation_ids)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_conversation_cascade(
        &self,
        conversation_id: Uuid,
    ) -> std::result::Result<(), DeletionFailure> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DeletionFailure::at(DeletionStep::Messages))?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(DeletionFailure::at(DeletionStep::Messages))?;

        sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(DeletionFailure::at(DeletionStep::Participants))?;

        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(DeletionFailure::at(DeletionStep::Conversation))?;

        tx.commit()
            .await
            .map_err(DeletionFailure::at(DeletionStep::Conversation))?;

        Ok(())
    }

    async fn upsert_push_token(&self, user_id: Uuid, token: &str, platform: &str) -> BackendResult<()> {
        sqlx::query(
            "INSERT INTO push_tokens (user_id, token, platform)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, token) DO UPDATE SET
                platform = EXCLUDED.platform,
                updated_at = NOW()",
        )
        .bind(user_id)
        .bind(token)
        .bind(platform)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
