use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Vocabulary-extracted conversational context. Regions/parameters grow
/// unbounded with the vocabulary; float ids are capped at 20 (oldest first
/// truncated) per the store invariant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub regions: Vec<String>,
    pub parameters: Vec<String>,
    pub float_ids: Vec<String>,
}

pub const MAX_FLOAT_IDS: usize = 20;

impl SessionContext {
    /// Merges newly-extracted terms in, preserving first-seen order and
    /// deduplicating, then enforces the float-id cap.
    pub fn merge(&mut self, regions: &[String], parameters: &[String], float_ids: &[String]) {
        Self::merge_dedup(&mut self.regions, regions);
        Self::merge_dedup(&mut self.parameters, parameters);
        Self::merge_dedup(&mut self.float_ids, float_ids);
        if self.float_ids.len() > MAX_FLOAT_IDS {
            let excess = self.float_ids.len() - MAX_FLOAT_IDS;
            self.float_ids.drain(0..excess);
        }
    }

    fn merge_dedup(existing: &mut Vec<String>, incoming: &[String]) {
        for item in incoming {
            if !existing.contains(item) {
                existing.push(item.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPreferences(pub serde_json::Map<String, Value>);

/// A conversation. The store is the sole owner of the id→Session mapping;
/// a Session exclusively owns its messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: VecDeque<ConversationMessage>,
    pub context: SessionContext,
    pub preferences: SessionPreferences,
}

impl Session {
    pub fn new(id: Uuid, now: DateTime<Utc>, preferences: SessionPreferences) -> Self {
        Self {
            id,
            created_at: now,
            last_activity: now,
            messages: VecDeque::new(),
            context: SessionContext::default(),
            preferences,
        }
    }

    /// Appends a message, dropping the oldest to preserve `len <= max_per_session`.
    pub fn push_message(&mut self, message: ConversationMessage, max_per_session: usize) {
        self.messages.push_back(message);
        while self.messages.len() > max_per_session {
            self.messages.pop_front();
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_activity > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_id_cap_drops_oldest() {
        let mut ctx = SessionContext::default();
        let ids: Vec<String> = (0..25).map(|i| format!("{i:07}")).collect();
        ctx.merge(&[], &[], &ids);
        assert_eq!(ctx.float_ids.len(), MAX_FLOAT_IDS);
        assert_eq!(ctx.float_ids[0], "0000005");
        assert_eq!(ctx.float_ids.last().unwrap(), "0000024");
    }

    #[test]
    fn message_cap_drops_oldest_preserving_order() {
        let mut session = Session::new(Uuid::new_v4(), Utc::now(), SessionPreferences::default());
        for i in 0..5 {
            session.push_message(
                ConversationMessage {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    timestamp: Utc::now(),
                    role: MessageRole::User,
                    content: format!("msg {i}"),
                    metadata: Value::Null,
                },
                3,
            );
        }
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages.front().unwrap().content, "msg 2");
        assert_eq!(session.messages.back().unwrap().content, "msg 4");
    }
}
