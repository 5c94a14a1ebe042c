//! Domain model for the query orchestration core.
//!
//! These types are plain data — no behavior beyond small, pure helper methods.
//! Ownership follows the spec: an `Intent` is copied and mutated across
//! cycles, a `CycleState` belongs to exactly one orchestrator invocation, and
//! a `Session` exclusively owns its messages.

mod agent_result;
mod http;
mod measurement;
mod metadata;
mod query;
mod semantic;
mod session;
mod viz;

pub use agent_result::{AgentResult, ErrorResult};
pub use http::{
    ChatMetadata, ChatRequest, ChatResponse, DetailedHealthResponse, HealthResponse, HistoryQuery, HistoryResponse,
    PreferencesUpdateRequest, SessionCreateRequest, SessionCreateResponse, SessionResponse, SessionStatsResponse,
    StreamFrame,
};
pub use measurement::{Measurement, Statistics};
pub use metadata::{FloatMetadata, RegionMetadata};
pub use query::{AgentKind, AgentMask, BoundingBox, Intent, IntentFlags, Parameter, TemporalBounds};
pub use semantic::SemanticHit;
pub use session::{ConversationMessage, MessageRole, Session, SessionContext, SessionPreferences};
pub use viz::{ChartData, ChartSpec, ChartType, CoordinatorOutput};

/// Global coordinate limits an expanding bounding box may never cross.
pub const LAT_MIN: f64 = -90.0;
pub const LAT_MAX: f64 = 90.0;
pub const LON_MIN: f64 = -180.0;
pub const LON_MAX: f64 = 180.0;
