//! Application error taxonomy
//!
//! A single closed error type crosses the façade boundary. Each variant names
//! its HTTP status and a stable `kind` string; nothing past this type carries a
//! Rust `Debug` stack trace to the client.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String, detail: HashMap<String, String> },

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String, detail: HashMap<String, String> },

    #[error("backend query error: {message}")]
    BackendQueryError { message: String, detail: HashMap<String, String> },

    #[error("LLM capability unavailable: {message}")]
    LlmUnavailable { message: String },

    #[error("agent timeout: {query_echo}")]
    AgentTimeout { query_echo: String },

    #[error("core not ready: {message}")]
    CoreNotReady { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Stable wire identifier for the error kind (never the Display message).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::BackendQueryError { .. } => "BACKEND_QUERY_ERROR",
            Self::LlmUnavailable { .. } => "LLM_UNAVAILABLE",
            Self::AgentTimeout { .. } => "AGENT_TIMEOUT",
            Self::CoreNotReady { .. } => "CORE_NOT_READY",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendQueryError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::LlmUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AgentTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::CoreNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> Value {
        match self {
            Self::InvalidInput { detail, .. }
            | Self::BackendUnavailable { detail, .. }
            | Self::BackendQueryError { detail, .. } => json!(detail),
            _ => json!({}),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into(), detail: HashMap::new() }
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound { session_id: session_id.into() }
    }

    pub fn agent_timeout(query: &str) -> Self {
        let query_echo: String = query.chars().take(200).collect();
        Self::AgentTimeout { query_echo }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn core_not_ready(message: impl Into<String>) -> Self {
        Self::CoreNotReady { message: message.into() }
    }

    pub fn llm_unavailable(message: impl Into<String>) -> Self {
        Self::LlmUnavailable { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        tracing::warn!(kind = self.kind(), status = %status, "request failed: {}", self);
        let body = json!({
            "status": "error",
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "detail": self.detail(),
            }
        });
        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
