use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A chat message. Content and sender never change after creation; `read`
/// only ever goes from false to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// Unread and written by someone other than `viewer`.
    pub fn is_unread_for(&self, viewer: Uuid) -> bool {
        !self.read && self.sender_id != viewer
    }
}

/// A newly persisted message together with everyone who should see it live.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub recipients: Vec<Uuid>,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unread_for() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: other,
            content: "hey".to_string(),
            created_at: Utc::now(),
            read: false,
        };
        assert!(message.is_unread_for(me));
        assert!(!message.is_unread_for(other));
        message.read = true;
        assert!(!message.is_unread_for(me));
    }
}
