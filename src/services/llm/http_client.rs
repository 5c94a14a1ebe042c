//! HTTP client for OpenAI-compatible chat-completions APIs.
//!
//! Modeled on the teacher's LLM HTTP client: `reqwest` with a bearer token,
//! a bounded timeout, and explicit `429`/`Retry-After` handling.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatRole, ChatTurn, LlmClient, LlmError};

pub struct HttpLlmClient {
    http_client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build LLM http client");

        Self { http_client, api_base: api_base.into(), api_key: api_key.into(), model: model.into() }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, messages: &[ChatTurn], temperature: f32) -> Result<String, LlmError> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(ChatMessage { role: "system".to_string(), content: system.to_string() });
        for turn in messages {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            wire_messages.push(ChatMessage { role: role.to_string(), content: turn.content.clone() });
        }

        let body = ChatCompletionRequest { model: self.model.clone(), messages: wire_messages, temperature };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout } else { LlmError::ApiError(e.to_string()) })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::ApiError(format!("API error {}: {}", status, text)));
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ParseError("empty response from LLM".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
