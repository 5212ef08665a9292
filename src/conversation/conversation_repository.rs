use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{require_session, Session},
    backend::ChatBackend,
    conversation::conversation_models::{
        Conversation, ConversationPreview, LastMessageSummary, OtherUserSummary,
    },
    error::{AppError, Result},
};

const UNKNOWN_USER: &str = "Unknown user";

#[derive(Clone)]
pub struct ConversationRepository {
    backend: Arc<dyn ChatBackend>,
}

impl ConversationRepository {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Previews of every conversation the caller participates in, in backend
    /// order. An empty list is a normal result, not an error.
    pub async fn fetch_user_conversations(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<ConversationPreview>> {
        let session = require_session(session)?;
        let me = session.user_id;

        let conversation_ids = self.backend.conversation_ids_for_user(me).await?;
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let participants = self.backend.participants_of(&conversation_ids).await?;
        let counterparts: HashMap<Uuid, Uuid> = participants
            .into_iter()
            .filter(|p| p.user_id != me)
            .map(|p| (p.conversation_id, p.user_id))
            .collect();

        let other_ids: Vec<Uuid> = counterparts.values().copied().collect();
        let profiles: HashMap<Uuid, OtherUserSummary> = self
            .backend
            .profiles(&other_ids)
            .await?
            .into_iter()
            .map(|row| (row.id, OtherUserSummary::from(row)))
            .collect();

        let mut latest: HashMap<Uuid, LastMessageSummary> = self
            .backend
            .latest_messages(&conversation_ids)
            .await?
            .into_iter()
            .map(|row| {
                (
                    row.conversation_id,
                    LastMessageSummary {
                        is_from_current_user: row.sender_id == me,
                        is_read: row.is_read,
                        created_at: row.created_at,
                        content: row.content,
                    },
                )
            })
            .collect();

        let previews = conversation_ids
            .into_iter()
            .filter_map(|id| {
                let Some(other_id) = counterparts.get(&id).copied() else {
                    tracing::warn!("Conversation {} has no counterpart for user {}", id, me);
                    return None;
                };
                let other_user = profiles.get(&other_id).cloned().unwrap_or_else(|| OtherUserSummary {
                    id: other_id,
                    display_name: UNKNOWN_USER.to_string(),
                    avatar_url: None,
                });
                Some(ConversationPreview {
                    id,
                    other_user,
                    last_message: latest.remove(&id),
                })
            })
            .collect();

        Ok(previews)
    }

    /// Returns the caller's existing conversation with `other_user_id`, or creates it.
    pub async fn start_conversation(
        &self,
        session: Option<&Session>,
        other_user_id: Uuid,
    ) -> Result<Conversation> {
        let session = require_session(session)?;
        let me = session.user_id;

        if other_user_id == me {
            return Err(AppError::Validation(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        if self.backend.profiles(&[other_user_id]).await?.is_empty() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let row = match self.backend.find_conversation_between(me, other_user_id).await? {
            Some(existing) => existing,
            None => {
                let created = self.backend.create_conversation(me, other_user_id).await?;
                tracing::info!("Conversation {} started by {}", created.id, me);
                created
            }
        };

        Ok(row.into_domain([me, other_user_id]))
    }

    /// User ids of everyone in the conversation.
    pub async fn participant_ids(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = self.backend.participants_of(&[conversation_id]).await?;
        Ok(rows.into_iter().map(|p| p.user_id).collect())
    }
}
