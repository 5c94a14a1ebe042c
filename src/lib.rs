//! Oceanus Gateway library
//!
//! Houses the full query orchestration core (config, models, services) plus
//! the HTTP façade (handlers, middleware) that exposes it. `main.rs` only
//! wires these together and starts the server.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
use services::llm::LlmClient;
use services::{IntentParser, MetricsRegistry, Orchestrator, RateLimiter, SessionStore};

/// Process-wide shared state. Every handler receives this behind
/// `State<Arc<AppState>>`; nothing here is mutated by replacing the field
/// itself; interior mutability (mutexes, atomics) lives inside the services
/// that need it.
pub struct AppState {
    pub config: Config,
    pub session_store: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRegistry>,
    pub llm: Arc<dyn LlmClient>,
    pub intent_parser: Arc<IntentParser>,
    pub orchestrator: Arc<Orchestrator>,
    /// Flipped to `true` once startup finishes constructing every adapter;
    /// `/health/ready` reports `not_ready` until then instead of racing a
    /// request against backend connection setup.
    pub ready: AtomicBool,
}
