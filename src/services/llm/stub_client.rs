use async_trait::async_trait;
use std::sync::Mutex;

use super::{ChatTurn, LlmClient, LlmError};

/// Canned responses keyed by a substring match against the last user turn.
/// The only `LlmClient` the test suite exercises — never makes a network call.
pub struct StubLlmClient {
    responses: Vec<(String, String)>,
    default_response: String,
    fail: Mutex<bool>,
}

impl StubLlmClient {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self { responses: Vec::new(), default_response: default_response.into(), fail: Mutex::new(false) }
    }

    pub fn with_response(mut self, substring: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((substring.into(), response.into()));
        self
    }

    /// Forces the next and all subsequent `complete()` calls to fail with
    /// `LlmError::ApiError`, for exercising fallback paths.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn complete(&self, _system: &str, messages: &[ChatTurn], _temperature: f32) -> Result<String, LlmError> {
        if *self.fail.lock().unwrap() {
            return Err(LlmError::ApiError("stub configured to fail".to_string()));
        }

        let last_user = messages.last().map(|t| t.content.to_lowercase()).unwrap_or_default();
        for (pattern, response) in &self.responses {
            if last_user.contains(&pattern.to_lowercase()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_first_registered_substring() {
        let stub = StubLlmClient::new("default").with_response("sql", "SELECT 1").with_response("cypher", "MATCH (n) RETURN n");
        let result = stub.complete("sys", &[ChatTurn::user("give me sql please")], 0.0).await.unwrap();
        assert_eq!(result, "SELECT 1");
    }

    #[tokio::test]
    async fn falls_back_to_default_response() {
        let stub = StubLlmClient::new("default answer");
        let result = stub.complete("sys", &[ChatTurn::user("anything")], 0.0).await.unwrap();
        assert_eq!(result, "default answer");
    }

    #[tokio::test]
    async fn set_failing_forces_error() {
        let stub = StubLlmClient::new("default");
        stub.set_failing(true);
        assert!(stub.complete("sys", &[ChatTurn::user("x")], 0.0).await.is_err());
    }
}
