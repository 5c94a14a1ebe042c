//! The chat endpoint: the façade's single entry point into the router and
//! orchestrator. `chat` answers in one shot; `chat_stream` drives the same
//! pipeline but turns `OrchestratorEvent`s into SSE progress frames as they
//! happen, tied to the state machine's real transitions rather than a
//! fabricated percentage.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ChatMetadata, ChatRequest, ChatResponse, MessageRole};
use crate::services::{OrchestratorEvent, Router, RouterDecision};
use crate::AppState;

const MIN_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_QUERY_CHARS: usize = 2000;
const ROUTER_HISTORY_TURNS: usize = 8;

fn validate_query(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::invalid_input(format!("query must be 1-{MAX_QUERY_CHARS} characters after trimming")));
    }
    Ok(trimmed.to_string())
}

fn validate_timeout(raw: Option<u64>, default_secs: u64) -> AppResult<u64> {
    match raw {
        None => Ok(default_secs),
        Some(t) if (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&t) => Ok(t),
        Some(_) => Err(AppError::invalid_input(format!("timeout must be within {MIN_TIMEOUT_SECS}..{MAX_TIMEOUT_SECS} seconds"))),
    }
}

/// Shared prelude for both the plain and streaming endpoints: validates the
/// request, resolves (or creates) the session, and records the user turn.
/// Returns the session id, whether the session already had history, the
/// effective timeout, and the known float ids for intent parsing.
struct Resolved {
    session_id: Uuid,
    has_context: bool,
    timeout_secs: u64,
    known_float_ids: Vec<String>,
    /// The last `ROUTER_HISTORY_TURNS` turns as of just before the current
    /// query was appended — never includes the turn being routed right now,
    /// per the Router's own contract.
    history: Vec<crate::models::ConversationMessage>,
}

async fn resolve(state: &AppState, req: &ChatRequest, query: &str) -> AppResult<Resolved> {
    let session_id = match req.session_id {
        Some(id) => {
            state.session_store.get(id).ok_or_else(|| AppError::session_not_found(id.to_string()))?;
            id
        }
        None => state.session_store.create(req.user_preferences.clone()),
    };

    let existing_history = state.session_store.history(session_id, None)?;
    let has_context = !existing_history.is_empty();
    let context = state.session_store.context(session_id)?;
    let history = tail(existing_history, ROUTER_HISTORY_TURNS);

    let timeout_secs = validate_timeout(req.timeout, state.config.orchestrator.agent_timeout_secs)?;

    state.session_store.append(session_id, MessageRole::User, query, serde_json::Value::Null)?;

    Ok(Resolved { session_id, has_context, timeout_secs, known_float_ids: context.float_ids, history })
}

fn tail(mut messages: Vec<crate::models::ConversationMessage>, limit: usize) -> Vec<crate::models::ConversationMessage> {
    if messages.len() > limit {
        messages.drain(..messages.len() - limit);
    }
    messages
}

pub async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> AppResult<Json<ChatResponse>> {
    let started = Instant::now();
    let query_id = Uuid::new_v4();
    let query = validate_query(&req.query)?;
    let resolved = resolve(&state, &req, &query).await?;

    let decision = Router::route(
        &query,
        &resolved.history,
        state.llm.as_ref(),
        &state.config.prompts.router_classification_system,
        &state.config.prompts.conversational_system,
    )
    .await;

    let response_text = match decision {
        RouterDecision::Conversational(text) => {
            state.session_store.append(resolved.session_id, MessageRole::Assistant, &text, serde_json::Value::Null)?;
            state.metrics.record_request(true, started.elapsed().as_millis() as u64);
            text
        }
        RouterDecision::Oceanographic => {
            let intent = state.intent_parser.parse(&query, &resolved.known_float_ids);
            let deadline = Instant::now() + Duration::from_secs(resolved.timeout_secs);

            let outcome = state.orchestrator.run(&query, intent, deadline, None).await;
            match outcome {
                Ok(output) => {
                    for kind in &output.agents_used {
                        state.metrics.record_agent_call(*kind, true);
                    }
                    for kind in &output.agents_errored {
                        state.metrics.record_agent_call(*kind, false);
                    }
                    state.metrics.record_request(true, started.elapsed().as_millis() as u64);

                    let text = render_with_visualizations(&output.coordinator);
                    state.session_store.append(resolved.session_id, MessageRole::Assistant, &text, serde_json::Value::Null)?;
                    text
                }
                Err(err) => {
                    // Scenario: the user turn is already persisted; the
                    // assistant turn is intentionally never appended when
                    // the orchestrator fails.
                    state.metrics.record_request(false, started.elapsed().as_millis() as u64);
                    return Err(err);
                }
            }
        }
    };

    let conversation_context = state.session_store.context(resolved.session_id)?;
    Ok(Json(ChatResponse {
        response: response_text,
        session_id: resolved.session_id,
        metadata: ChatMetadata {
            query_id,
            timestamp: Utc::now(),
            response_time: started.elapsed().as_secs_f64(),
            has_context: resolved.has_context,
            max_cycles: state.config.orchestrator.max_cycles,
            quality_threshold: state.config.orchestrator.quality_threshold,
        },
        status: "success".to_string(),
        conversation_context,
    }))
}

fn render_with_visualizations(output: &crate::models::CoordinatorOutput) -> String {
    match &output.visualizations {
        Some(charts) if !charts.is_empty() => {
            let payload = serde_json::json!({ "visualizations": charts });
            format!("{}\n\n```viz\n{}\n```", output.narrative, payload)
        }
        _ => output.narrative.clone(),
    }
}

fn progress_message(event: OrchestratorEvent) -> (&'static str, f64) {
    match event {
        OrchestratorEvent::ParseIntent => ("parsing intent", 0.05),
        OrchestratorEvent::ExecuteAgents { .. } => ("querying agents", 0.4),
        OrchestratorEvent::Analyze { .. } => ("analyzing coverage", 0.65),
        OrchestratorEvent::Refine { .. } => ("refining query", 0.75),
        OrchestratorEvent::Synthesize => ("synthesizing response", 0.9),
    }
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let started = Instant::now();
    let query_id = Uuid::new_v4();
    let query = validate_query(&req.query)?;
    let resolved = resolve(&state, &req, &query).await?;

    let decision = Router::route(
        &query,
        &resolved.history,
        state.llm.as_ref(),
        &state.config.prompts.router_classification_system,
        &state.config.prompts.conversational_system,
    )
    .await;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    match decision {
        RouterDecision::Conversational(text) => {
            state.session_store.append(resolved.session_id, MessageRole::Assistant, &text, serde_json::Value::Null)?;
            state.metrics.record_request(true, started.elapsed().as_millis() as u64);
            let metadata = ChatMetadata {
                query_id,
                timestamp: Utc::now(),
                response_time: started.elapsed().as_secs_f64(),
                has_context: resolved.has_context,
                max_cycles: state.config.orchestrator.max_cycles,
                quality_threshold: state.config.orchestrator.quality_threshold,
            };
            let frame = crate::models::StreamFrame::Completed { response: text, metadata };
            let _ = tx.send(Event::default().json_data(&frame).unwrap_or_else(|_| Event::default().data("{}")));
        }
        RouterDecision::Oceanographic => {
            let intent = state.intent_parser.parse(&query, &resolved.known_float_ids);
            let deadline = Instant::now() + Duration::from_secs(resolved.timeout_secs);
            let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel::<OrchestratorEvent>();

            let progress_tx = tx.clone();
            let progress_task = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    let (message, progress) = progress_message(event);
                    let frame = crate::models::StreamFrame::Progress { message: message.to_string(), progress };
                    let _ = progress_tx.send(Event::default().json_data(&frame).unwrap_or_else(|_| Event::default().data("{}")));
                }
            });

            let outcome = state.orchestrator.run(&query, intent, deadline, Some(events_tx)).await;
            let _ = progress_task.await;

            match outcome {
                Ok(output) => {
                    for kind in &output.agents_used {
                        state.metrics.record_agent_call(*kind, true);
                    }
                    for kind in &output.agents_errored {
                        state.metrics.record_agent_call(*kind, false);
                    }
                    state.metrics.record_request(true, started.elapsed().as_millis() as u64);

                    let text = render_with_visualizations(&output.coordinator);
                    state.session_store.append(resolved.session_id, MessageRole::Assistant, &text, serde_json::Value::Null)?;

                    let metadata = ChatMetadata {
                        query_id,
                        timestamp: Utc::now(),
                        response_time: started.elapsed().as_secs_f64(),
                        has_context: resolved.has_context,
                        max_cycles: state.config.orchestrator.max_cycles,
                        quality_threshold: state.config.orchestrator.quality_threshold,
                    };
                    let frame = crate::models::StreamFrame::Completed { response: text, metadata };
                    let _ = tx.send(Event::default().json_data(&frame).unwrap_or_else(|_| Event::default().data("{}")));
                }
                Err(err) => {
                    state.metrics.record_request(false, started.elapsed().as_millis() as u64);
                    return Err(err);
                }
            }
        }
    }

    let _ = tx.send(Event::default().data("[DONE]"));
    drop(tx);
    let stream = UnboundedReceiverStream::new(rx).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
