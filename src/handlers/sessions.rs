//! Session endpoints: thin wrappers over `SessionStore` that translate its
//! `AppResult` directly into the façade's error mapping.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    HistoryQuery, HistoryResponse, PreferencesUpdateRequest, SessionCreateRequest, SessionCreateResponse,
    SessionResponse, SessionStatsResponse,
};
use crate::AppState;

const MAX_HISTORY_LIMIT: usize = 100;

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionCreateRequest>,
) -> Json<SessionCreateResponse> {
    let id = state.session_store.create(req.user_preferences);
    Json(SessionCreateResponse { session_id: id, created_at: Utc::now(), status: "active".to_string() })
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.session_store.get(id).ok_or_else(|| AppError::session_not_found(id.to_string()))?;
    Ok(Json(SessionResponse {
        id: session.id,
        created_at: session.created_at,
        last_activity: session.last_activity,
        message_count: session.messages.len(),
        preferences: serde_json::Value::Object(session.preferences.0),
    }))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    if let Some(limit) = q.limit {
        if limit == 0 || limit > MAX_HISTORY_LIMIT {
            return Err(AppError::invalid_input(format!("limit must be within 1..{MAX_HISTORY_LIMIT}")));
        }
    }
    let messages = state.session_store.history(id, q.limit)?;
    Ok(Json(HistoryResponse { session_id: id, messages }))
}

pub async fn get_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<crate::models::SessionContext>> {
    Ok(Json(state.session_store.context(id)?))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PreferencesUpdateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.session_store.update_preferences(id, req.0)?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

pub async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<serde_json::Value>> {
    if !state.session_store.delete(id) {
        return Err(AppError::session_not_found(id.to_string()));
    }
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

pub async fn list_stats(State(state): State<Arc<AppState>>) -> Json<SessionStatsResponse> {
    let stats = state.session_store.stats();
    Json(SessionStatsResponse { active_sessions: stats.active_sessions, total_messages: stats.total_messages })
}
