use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::AppError;
use crate::services::rate_limiter::RateLimitDecision;
use crate::services::RateLimiter;

/// Resolves the client key (`X-Forwarded-For` first element, else
/// `X-Real-IP`, else peer address), checks the token bucket, and on
/// rejection returns 429 with `Retry-After`/`X-RateLimit-*` headers. On
/// success the same headers are still attached so a client can see its
/// remaining budget.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let forwarded_for = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let real_ip = req.headers().get("x-real-ip").and_then(|v| v.to_str().ok());
    let key = RateLimiter::client_key(forwarded_for, real_ip, &peer.to_string());

    let decision = state.rate_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        AppError::rate_limited(decision.retry_after_secs).into_response()
    };
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
}
