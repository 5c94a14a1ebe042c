//! Query orchestration core: adapters, agents, and the analyzer/refiner/
//! coordinator/orchestrator/router/session-store machinery built on top of
//! them. Module layout mirrors the teacher's flat `services/` directory
//! with one file (or submodule) per responsibility.

pub mod adapters;
pub mod agents;
pub mod analyzer;
pub mod coordinator;
pub mod intent_parser;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod rate_limiter;
pub mod refiner;
pub mod router;
pub mod session_store;

pub use adapters::{GraphAdapter, SqlAdapter, VectorAdapter};
pub use agents::{MeasurementAgent, MetadataAgent, SemanticAgent};
pub use analyzer::Analyzer;
pub use coordinator::Coordinator;
pub use intent_parser::IntentParser;
pub use llm::{ChatTurn, LlmClient, LlmError};
pub use metrics::MetricsRegistry;
pub use orchestrator::{Orchestrator, OrchestratorEvent, OrchestratorOutput};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use refiner::Refiner;
pub use router::{Router, RouterDecision};
pub use session_store::{SessionSweeper, SessionStats, SessionStore};
