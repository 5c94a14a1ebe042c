//! Session Store: a process-local `session_id → Session` map behind a
//! single lock, matching the spec's "single lock, short critical sections"
//! requirement. Context extraction runs on every append against the same
//! closed vocabulary the intent parser uses, so the two never disagree on
//! what counts as a region, parameter, or float id.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{SessionConfig, VocabularyConfig};
use crate::error::{AppError, AppResult};
use crate::models::{ConversationMessage, MessageRole, Session, SessionContext, SessionPreferences};
use crate::utils::ScheduledTask;

pub struct SessionStats {
    pub active_sessions: usize,
    pub total_messages: usize,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    regions: Vec<String>,
    parameters: Vec<String>,
    float_id_regex: Regex,
    timeout: ChronoDuration,
    max_messages_per_session: usize,
    cleanup_interval_secs: u64,
}

impl SessionStore {
    pub fn new(session: &SessionConfig, vocab: &VocabularyConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            regions: vocab.regions.clone(),
            parameters: vocab.parameters.clone(),
            float_id_regex: Regex::new(&vocab.float_id_regex).expect("configured float_id_regex must compile"),
            timeout: ChronoDuration::seconds(session.timeout_secs as i64),
            max_messages_per_session: session.max_messages_per_session,
            cleanup_interval_secs: session.cleanup_interval_secs,
        }
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.cleanup_interval_secs
    }

    pub fn create(&self, preferences: Option<Value>) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let prefs = match preferences {
            Some(Value::Object(map)) => SessionPreferences(map),
            _ => SessionPreferences::default(),
        };
        let session = Session::new(id, now, prefs);
        self.sessions.lock().expect("session store mutex poisoned").insert(id, session);
        id
    }

    /// Returns `None` and evicts the session if it has expired; a
    /// subsequent `get` for the same id then also returns `None`. A
    /// non-expired hit refreshes `last_activity`, since this is an access,
    /// not an expiry check.
    pub fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        let expired = sessions.get(&id).is_some_and(|s| s.is_expired(Utc::now(), self.timeout));
        if expired {
            sessions.remove(&id);
            return None;
        }
        let session = sessions.get_mut(&id)?;
        session.last_activity = Utc::now();
        Some(session.clone())
    }

    pub fn append(&self, id: Uuid, role: MessageRole, content: &str, metadata: Value) -> AppResult<()> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        let session = sessions.get_mut(&id).ok_or_else(|| AppError::session_not_found(id.to_string()))?;
        if session.is_expired(Utc::now(), self.timeout) {
            sessions.remove(&id);
            return Err(AppError::session_not_found(id.to_string()));
        }

        let now = Utc::now();
        let message = ConversationMessage { id: Uuid::new_v4(), session_id: id, timestamp: now, role, content: content.to_string(), metadata };
        session.push_message(message, self.max_messages_per_session);
        session.last_activity = now;

        let (regions, parameters, float_ids) = self.extract_context(content);
        session.context.merge(&regions, &parameters, &float_ids);

        Ok(())
    }

    pub fn history(&self, id: Uuid, limit: Option<usize>) -> AppResult<Vec<ConversationMessage>> {
        let session = self.get(id).ok_or_else(|| AppError::session_not_found(id.to_string()))?;
        let messages: Vec<ConversationMessage> = session.messages.into_iter().collect();
        Ok(match limit {
            Some(n) => messages.into_iter().rev().take(n).rev().collect(),
            None => messages,
        })
    }

    pub fn context(&self, id: Uuid) -> AppResult<SessionContext> {
        self.get(id).map(|s| s.context).ok_or_else(|| AppError::session_not_found(id.to_string()))
    }

    pub fn update_preferences(&self, id: Uuid, updates: serde_json::Map<String, Value>) -> AppResult<()> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        let session = sessions.get_mut(&id).ok_or_else(|| AppError::session_not_found(id.to_string()))?;
        for (k, v) in updates {
            session.preferences.0.insert(k, v);
        }
        Ok(())
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.sessions.lock().expect("session store mutex poisoned").remove(&id).is_some()
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.lock().expect("session store mutex poisoned");
        let total_messages = sessions.values().map(|s| s.messages.len()).sum();
        SessionStats { active_sessions: sessions.len(), total_messages }
    }

    /// Drops every session whose `last_activity` is older than the
    /// configured timeout. Run by the sweeper on `cleanup_interval_secs`.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        let now = Utc::now();
        let timeout = self.timeout;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, timeout));
        before - sessions.len()
    }

    fn extract_context(&self, content: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
        let lower = content.to_lowercase();
        let regions: Vec<String> = self.regions.iter().filter(|r| lower.contains(r.as_str())).cloned().collect();
        let parameters: Vec<String> = self.parameters.iter().filter(|p| lower.contains(p.as_str())).cloned().collect();
        let float_ids: Vec<String> = self.float_id_regex.find_iter(content).map(|m| m.as_str().to_string()).collect();
        (regions, parameters, float_ids)
    }
}

/// Periodic sweeper task, registered with a `ScheduledExecutor` the same way
/// the teacher registers its own background collectors.
pub struct SessionSweeper {
    store: std::sync::Arc<SessionStore>,
}

impl SessionSweeper {
    pub fn new(store: std::sync::Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl ScheduledTask for SessionSweeper {
    fn run(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move {
            let evicted = self.store.sweep_expired();
            if evicted > 0 {
                tracing::info!(evicted, "swept expired sessions");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig::default(), &VocabularyConfig::default())
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = store();
        let id = store.create(None);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn get_on_unknown_id_is_none() {
        let store = store();
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn get_refreshes_last_activity() {
        let store = store();
        let id = store.create(None);
        let first = store.get(id).unwrap().last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.get(id).unwrap().last_activity;
        assert!(second > first);
    }

    #[test]
    fn expired_session_is_evicted_on_get() {
        let mut config = SessionConfig::default();
        config.timeout_secs = 0;
        let store = SessionStore::new(&config, &VocabularyConfig::default());
        let id = store.create(None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.get(id).is_none());
        assert!(store.get(id).is_none());
    }

    #[test]
    fn append_extracts_region_and_float_id_into_context() {
        let store = store();
        let id = store.create(None);
        store.append(id, MessageRole::User, "temperature for float 7902073 in the arabian sea", Value::Null).unwrap();
        let ctx = store.context(id).unwrap();
        assert_eq!(ctx.float_ids, vec!["7902073".to_string()]);
        assert_eq!(ctx.regions, vec!["arabian sea".to_string()]);
    }

    #[test]
    fn append_to_unknown_session_is_session_not_found() {
        let store = store();
        let result = store.append(Uuid::new_v4(), MessageRole::User, "hi", Value::Null);
        assert!(matches!(result, Err(AppError::SessionNotFound { .. })));
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let mut config = SessionConfig::default();
        config.timeout_secs = 0;
        let store = SessionStore::new(&config, &VocabularyConfig::default());
        let _id = store.create(None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.stats().active_sessions, 0);
    }
}
