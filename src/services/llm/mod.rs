//! The LLM is a single small capability, not a library: one trait, one HTTP
//! implementation, one stub implementation used exclusively by tests.

mod http_client;
mod stub_client;

pub use http_client::HttpLlmClient;
pub use stub_client::StubLlmClient;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("LLM response could not be parsed: {0}")]
    ParseError(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("LLM API error: {0}")]
    ApiError(String),
}

/// The capability the orchestration core depends on. Prompt templates
/// themselves live in `Config`, not here — callers always supply `system`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, messages: &[ChatTurn], temperature: f32) -> Result<String, LlmError>;
}
