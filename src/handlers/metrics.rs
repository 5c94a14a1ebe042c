use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::AppState;

pub async fn metrics_json(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.metrics.render_json())
}

pub async fn metrics_prometheus(State(state): State<Arc<AppState>>) -> Response {
    let body = state.metrics.render_prometheus();
    ([("content-type", "text/plain; version=0.0.4")], body).into_response()
}
