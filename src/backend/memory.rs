//! In-process backend used by tests. Records every call so tests can assert
//! which operations reached the store, and can be told to fail specific ones.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use axum::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use super::{
    BackendError, BackendResult, ChatBackend, ConversationRow, DeletionFailure, MessageRow,
    NewMessage, ParticipantRow, ProfileRow,
};
use crate::error::DeletionStep;

const MUTATIONS: [&str; 5] = [
    "create_conversation",
    "insert_message",
    "mark_read",
    "delete_conversation_cascade",
    "upsert_push_token",
];

#[derive(Default)]
struct State {
    profiles: Vec<ProfileRow>,
    conversations: Vec<ConversationRow>,
    participants: Vec<ParticipantRow>,
    messages: Vec<MessageRow>,
    push_tokens: Vec<(Uuid, String, String)>,
    calls: Vec<&'static str>,
    mark_read_batches: Vec<Vec<Uuid>>,
    failing: HashSet<&'static str>,
    held: HashSet<&'static str>,
    fail_deletion_at: Option<DeletionStep>,
    tick: i64,
}

impl State {
    fn record(&mut self, op: &'static str) -> BackendResult<()> {
        self.calls.push(op);
        if self.failing.contains(op) {
            return Err(BackendError::Unavailable(format!("{} failed", op)));
        }
        Ok(())
    }

    fn now(&mut self) -> DateTime<Utc> {
        self.tick += 1;
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.tick)
    }

    fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        self.participants
            .iter()
            .any(|p| p.conversation_id == conversation_id && p.user_id == user_id)
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory backend lock poisoned")
    }

    pub fn add_profile(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().profiles.push(ProfileRow {
            id,
            username: username.to_string(),
            avatar_url: None,
        });
        id
    }

    pub fn add_conversation(&self, user_a: Uuid, user_b: Uuid) -> Uuid {
        let mut state = self.lock();
        let id = Uuid::new_v4();
        let created_at = state.now();
        state.conversations.push(ConversationRow { id, created_at });
        state.participants.push(ParticipantRow {
            conversation_id: id,
            user_id: user_a,
        });
        state.participants.push(ParticipantRow {
            conversation_id: id,
            user_id: user_b,
        });
        id
    }

    pub fn add_message(&self, conversation_id: Uuid, sender_id: Uuid, content: &str) -> Uuid {
        let mut state = self.lock();
        let id = Uuid::new_v4();
        let created_at = state.now();
        state.messages.push(MessageRow {
            id,
            conversation_id,
            sender_id,
            content: content.to_string(),
            is_read: false,
            client_token: None,
            created_at,
        });
        id
    }

    pub fn fail(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.lock().failing.remove(op);
    }

    /// Makes `op` wait forever, standing in for a request that never returns.
    pub fn hold(&self, op: &'static str) {
        self.lock().held.insert(op);
    }

    pub fn release(&self, op: &'static str) {
        self.lock().held.remove(op);
    }

    async fn stall_if_held(&self, op: &'static str) {
        let held = self.lock().held.contains(op);
        if held {
            std::future::pending::<()>().await;
        }
    }

    pub fn fail_deletion_at(&self, step: DeletionStep) {
        self.lock().fail_deletion_at = Some(step);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| MUTATIONS.contains(c))
            .count()
    }

    pub fn mark_read_batches(&self) -> Vec<Vec<Uuid>> {
        self.lock().mark_read_batches.clone()
    }

    pub fn message(&self, id: Uuid) -> Option<MessageRow> {
        self.lock().messages.iter().find(|m| m.id == id).cloned()
    }

    /// (conversations, participant rows, messages)
    pub fn row_counts(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (
            state.conversations.len(),
            state.participants.len(),
            state.messages.len(),
        )
    }

    pub fn push_tokens(&self) -> Vec<(Uuid, String, String)> {
        self.lock().push_tokens.clone()
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>> {
        self.stall_if_held("conversation_ids_for_user").await;
        let mut state = self.lock();
        state.record("conversation_ids_for_user")?;
        Ok(state
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.conversation_id)
            .collect())
    }

    async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> BackendResult<bool> {
        let mut state = self.lock();
        state.record("is_participant")?;
        Ok(state.is_participant(conversation_id, user_id))
    }

    async fn participants_of(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<ParticipantRow>> {
        let mut state = self.lock();
        state.record("participants_of")?;
        Ok(state
            .participants
            .iter()
            .filter(|p| conversation_ids.contains(&p.conversation_id))
            .cloned()
            .collect())
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> BackendResult<Vec<ProfileRow>> {
        let mut state = self.lock();
        state.record("profiles")?;
        Ok(state
            .profiles
            .iter()
            .filter(|p| user_ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> BackendResult<Vec<MessageRow>> {
        let mut state = self.lock();
        state.record("latest_messages")?;
        let mut latest: Vec<MessageRow> = Vec::new();
        for message in state
            .messages
            .iter()
            .filter(|m| conversation_ids.contains(&m.conversation_id))
        {
            match latest
                .iter_mut()
                .find(|l| l.conversation_id == message.conversation_id)
            {
                Some(existing) if existing.created_at <= message.created_at => {
                    *existing = message.clone()
                }
                Some(_) => {}
                None => latest.push(message.clone()),
            }
        }
        Ok(latest)
    }

    async fn find_conversation_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> BackendResult<Option<ConversationRow>> {
        let mut state = self.lock();
        state.record("find_conversation_between")?;
        Ok(state
            .conversations
            .iter()
            .find(|c| state.is_participant(c.id, user_a) && state.is_participant(c.id, user_b))
            .cloned())
    }

    async fn create_conversation(&self, user_a: Uuid, user_b: Uuid) -> BackendResult<ConversationRow> {
        let mut state = self.lock();
        state.record("create_conversation")?;
        let row = ConversationRow {
            id: Uuid::new_v4(),
            created_at: state.now(),
        };
        state.conversations.push(row.clone());
        for user_id in [user_a, user_b] {
            state.participants.push(ParticipantRow {
                conversation_id: row.id,
                user_id,
            });
        }
        Ok(row)
    }

    async fn insert_message(&self, message: NewMessage<'_>) -> BackendResult<MessageRow> {
        self.stall_if_held("insert_message").await;
        let mut state = self.lock();
        state.record("insert_message")?;
        if let Some(token) = message.client_token {
            if let Some(existing) = state
                .messages
                .iter()
                .find(|m| {
                    m.conversation_id == message.conversation_id
                        && m.sender_id == message.sender_id
                        && m.client_token.as_deref() == Some(token)
                })
            {
                return Ok(existing.clone());
            }
        }
        let row = MessageRow {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content.to_string(),
            is_read: false,
            client_token: message.client_token.map(str::to_string),
            created_at: state.now(),
        };
        state.messages.push(row.clone());
        Ok(row)
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> BackendResult<Vec<MessageRow>> {
        let mut state = self.lock();
        state.record("list_messages")?;
        let mut rows: Vec<MessageRow> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> BackendResult<Vec<MessageRow>> {
        let mut state = self.lock();
        state.record("recent_messages")?;
        let mut rows: Vec<MessageRow> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> BackendResult<u64> {
        let mut state = self.lock();
        state.record("mark_read")?;
        state.mark_read_batches.push(message_ids.to_vec());
        let readable: Vec<Uuid> = state
            .messages
            .iter()
            .filter(|m| {
                message_ids.contains(&m.id)
                    && m.sender_id != reader_id
                    && !m.is_read
                    && state.is_participant(m.conversation_id, reader_id)
            })
            .map(|m| m.id)
            .collect();
        for message in state.messages.iter_mut() {
            if readable.contains(&message.id) {
                message.is_read = true;
            }
        }
        Ok(readable.len() as u64)
    }

    async fn count_unread(&self, user_id: Uuid, conversation_ids: &[Uuid]) -> BackendResult<i64> {
        let mut state = self.lock();
        state.record("count_unread")?;
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                conversation_ids.contains(&m.conversation_id) && m.sender_id != user_id && !m.is_read
            })
            .count() as i64)
    }

    async fn delete_conversation_cascade(
        &self,
        conversation_id: Uuid,
    ) -> std::result::Result<(), DeletionFailure> {
        let mut state = self.lock();
        if let Err(source) = state.record("delete_conversation_cascade") {
            return Err(DeletionFailure {
                step: DeletionStep::Messages,
                source,
            });
        }
        // Nothing is applied when a step is set to fail, as a rolled back transaction would leave it.
        if let Some(step) = state.fail_deletion_at {
            return Err(DeletionFailure {
                step,
                source: BackendError::Unavailable(format!("{} failed", step)),
            });
        }
        state.messages.retain(|m| m.conversation_id != conversation_id);
        state
            .participants
            .retain(|p| p.conversation_id != conversation_id);
        state.conversations.retain(|c| c.id != conversation_id);
        Ok(())
    }

    async fn upsert_push_token(&self, user_id: Uuid, token: &str, platform: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.record("upsert_push_token")?;
        let position = state
            .push_tokens
            .iter()
            .position(|(user, existing, _)| *user == user_id && existing.as_str() == token);
        match position {
            Some(index) => state.push_tokens[index].2 = platform.to_string(),
            None => state
                .push_tokens
                .push((user_id, token.to_string(), platform.to_string())),
        }
        Ok(())
    }
}
