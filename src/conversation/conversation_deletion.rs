use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{require_session, Session},
    backend::{ChatBackend, DeletionFailure},
    error::{AppError, DeletionStep, Result},
};

/// Removes a conversation together with its messages and participant rows.
///
/// The participant check runs before anything is touched. The three deletes
/// are applied by the backend as one unit, so a failure leaves no orphaned
/// conversation behind.
#[derive(Clone)]
pub struct ConversationDeletion {
    backend: Arc<dyn ChatBackend>,
}

impl ConversationDeletion {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn delete_conversation(
        &self,
        session: Option<&Session>,
        conversation_id: Uuid,
    ) -> Result<()> {
        let session = require_session(session)?;

        if !self
            .backend
            .is_participant(conversation_id, session.user_id)
            .await
            .map_err(|source| AppError::Deletion {
                step: DeletionStep::CheckAccess,
                source,
            })?
        {
            tracing::warn!(
                "User {} attempted to delete conversation {} without access",
                session.user_id,
                conversation_id
            );
            return Err(AppError::no_access());
        }

        self.backend
            .delete_conversation_cascade(conversation_id)
            .await
            .map_err(|DeletionFailure { step, source }| AppError::Deletion { step, source })?;

        tracing::info!(
            "Conversation {} deleted by {}",
            conversation_id,
            session.user_id
        );
        Ok(())
    }
}
