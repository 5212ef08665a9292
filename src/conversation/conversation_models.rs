use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A two-party messaging thread. Participant order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    #[schema(value_type = Vec<Uuid>)]
    pub participants: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// The counterpart of `viewer`, or `None` when `viewer` is not a participant.
    pub fn other_participant(&self, viewer: Uuid) -> Option<Uuid> {
        match self.participants {
            [a, b] if a == viewer => Some(b),
            [a, b] if b == viewer => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OtherUserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LastMessageSummary {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_from_current_user: bool,
    pub is_read: bool,
}

/// Read model for the chat list. Built fresh on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationPreview {
    pub id: Uuid,
    pub other_user: OtherUserSummary,
    pub last_message: Option<LastMessageSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_participant() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Conversation {
            id: Uuid::new_v4(),
            participants: [a, b],
            created_at: Utc::now(),
        };
        assert_eq!(conversation.other_participant(a), Some(b));
        assert_eq!(conversation.other_participant(b), Some(a));
        assert_eq!(conversation.other_participant(Uuid::new_v4()), None);
    }
}
