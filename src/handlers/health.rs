//! Liveness/readiness/detailed health, grounded in the teacher's
//! `health_check`/`ready_check` pair but extended with the orchestrator's
//! own notion of ready (adapters constructed, agents reporting healthy).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{DetailedHealthResponse, HealthResponse};
use crate::AppState;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn health_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.ready.load(std::sync::atomic::Ordering::Relaxed) && state.metrics.all_agents_healthy();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(HealthResponse { status: if ready { "ready" } else { "not_ready" } }))
}

pub async fn health_detailed(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let ready = state.ready.load(std::sync::atomic::Ordering::Relaxed);
    let stats = state.session_store.stats();
    Json(DetailedHealthResponse {
        status: if ready { "ok" } else { "starting" },
        ready,
        agents_healthy: state.metrics.render_json()["agent_healthy"].clone(),
        error_rate: state.metrics.error_rate(),
        avg_response_time_seconds: state.metrics.avg_response_time_seconds(),
        active_sessions: stats.active_sessions,
    })
}
