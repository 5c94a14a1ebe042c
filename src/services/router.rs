//! Router: decides whether a query is small talk the gateway can answer
//! directly, or an oceanographic data request that belongs to the
//! Orchestrator. A small, fixed regex pre-pass handles the deterministic
//! cases (greetings, thanks, "what was my previous question") without ever
//! touching the LLM; everything else goes through an LLM classification
//! call that fails open to `oceanographic` so a flaky LLM never silently
//! drops a data request into small talk.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ConversationMessage;
use crate::services::llm::{ChatTurn, LlmClient};

const RECALL_TRUNCATE_CHARS: usize = 200;

static GREETING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(hi|hello|hey|good (morning|afternoon|evening))\b").unwrap());
static THANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(thanks|thank you|ty)\b").unwrap());
static HISTORY_RECALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(previous|last|earlier) (question|query|message)\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterDecision {
    /// The gateway answers directly; the Orchestrator is never invoked.
    Conversational(String),
    /// Hand off to the Orchestrator.
    Oceanographic,
}

pub struct Router;

impl Router {
    /// `history` is the conversation's prior turns, not including the query
    /// being routed right now.
    pub async fn route(
        query: &str,
        history: &[ConversationMessage],
        llm: &dyn LlmClient,
        router_classification_system: &str,
        conversational_system: &str,
    ) -> RouterDecision {
        if HISTORY_RECALL.is_match(query) {
            return RouterDecision::Conversational(recall_previous_message(history));
        }

        if GREETING.is_match(query) || THANKS.is_match(query) {
            return RouterDecision::Conversational(Self::conversational_reply(query, llm, conversational_system).await);
        }

        match llm.complete(router_classification_system, &[ChatTurn::user(query.to_string())], 0.0).await {
            Ok(verdict) if verdict.to_lowercase().contains("conversational") => {
                RouterDecision::Conversational(Self::conversational_reply(query, llm, conversational_system).await)
            }
            _ => RouterDecision::Oceanographic,
        }
    }

    async fn conversational_reply(query: &str, llm: &dyn LlmClient, conversational_system: &str) -> String {
        match llm.complete(conversational_system, &[ChatTurn::user(query.to_string())], 0.5).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            _ => "Hello! Ask me anything about float measurements, regions, or deployments.".to_string(),
        }
    }
}

fn recall_previous_message(history: &[ConversationMessage]) -> String {
    let previous = history.iter().rev().find(|m| m.role == crate::models::MessageRole::User);
    match previous {
        Some(message) => message.content.chars().take(RECALL_TRUNCATE_CHARS).collect(),
        None => "I don't have a previous message in this conversation yet.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use crate::services::llm::StubLlmClient;
    use chrono::Utc;
    use uuid::Uuid;

    fn turn(role: MessageRole, content: &str) -> ConversationMessage {
        ConversationMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content: content.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn greeting_is_conversational_without_calling_classifier() {
        let llm = StubLlmClient::new("oceanographic");
        let decision = Router::route("Hello there", &[], &llm, "classify", "chat").await;
        assert!(matches!(decision, RouterDecision::Conversational(_)));
    }

    #[tokio::test]
    async fn history_recall_echoes_previous_user_message_verbatim() {
        let history =
            vec![turn(MessageRole::User, "what was the temperature at float 7902073"), turn(MessageRole::Assistant, "24.5C")];
        let llm = StubLlmClient::new("unused");
        let decision = Router::route("what was my previous question", &history, &llm, "classify", "chat").await;
        match decision {
            RouterDecision::Conversational(text) => {
                assert_eq!(text, "what was the temperature at float 7902073");
            }
            other => panic!("expected Conversational, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oceanographic_query_classifies_through_llm() {
        let llm = StubLlmClient::new("oceanographic");
        let decision = Router::route("salinity near the arabian sea", &[], &llm, "classify", "chat").await;
        assert_eq!(decision, RouterDecision::Oceanographic);
    }

    #[tokio::test]
    async fn llm_failure_fails_open_to_oceanographic() {
        let llm = StubLlmClient::new("conversational");
        llm.set_failing(true);
        let decision = Router::route("salinity near the arabian sea", &[], &llm, "classify", "chat").await;
        assert_eq!(decision, RouterDecision::Oceanographic);
    }
}
