//! Storage row shapes, one per table, and their adapters into domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::conversation::conversation_models::{Conversation, OtherUserSummary};
use crate::message::message_models::Message;

#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ConversationRow {
    pub fn into_domain(self, participants: [Uuid; 2]) -> Conversation {
        Conversation {
            id: self.id,
            participants,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ParticipantRow {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<ProfileRow> for OtherUserSummary {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            display_name: row.username,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub client_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            created_at: row.created_at,
            read: row.is_read,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: &'a str,
    pub client_token: Option<&'a str>,
}
