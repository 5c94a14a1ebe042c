//! Wire-level request/response bodies for the HTTP façade. Kept separate
//! from the core domain model in `query.rs`/`session.rs`: these types exist
//! only to be serialized, never passed into the orchestration core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::SessionContext;

fn default_status_active() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: Option<Uuid>,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub user_preferences: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMetadata {
    pub query_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub response_time: f64,
    pub has_context: bool,
    pub max_cycles: u32,
    pub quality_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
    pub metadata: ChatMetadata,
    pub status: String,
    pub conversation_context: SessionContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StreamFrame {
    Progress { message: String, progress: f64 },
    Completed { response: String, metadata: ChatMetadata },
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionCreateRequest {
    #[serde(default)]
    pub user_preferences: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreateResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_status_active")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub preferences: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<super::ConversationMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesUpdateRequest(pub serde_json::Map<String, Value>);

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatsResponse {
    pub active_sessions: usize,
    pub total_messages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub agents_healthy: Value,
    pub error_rate: f64,
    pub avg_response_time_seconds: f64,
    pub active_sessions: usize,
}
