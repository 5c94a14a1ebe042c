use serde::{Deserialize, Serialize};

use super::{FloatMetadata, Measurement, RegionMetadata, SemanticHit, Statistics};

/// The outcome of running a single agent for one cycle. A failing agent
/// never propagates as an exception across the fan-out boundary — it
/// becomes an `Error` value that the Coordinator and Analyzer both see.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "agent", rename_all = "snake_case")]
pub enum AgentResult {
    Measurement {
        measurements: Vec<Measurement>,
        statistics: std::collections::HashMap<String, Statistics>,
    },
    Metadata {
        floats: Vec<FloatMetadata>,
        regions: Vec<RegionMetadata>,
    },
    Semantic {
        hits: Vec<SemanticHit>,
    },
    Error(ErrorResult),
}

impl AgentResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// The failure value an agent reports instead of raising. `retriable`
/// mirrors the distinction the façade makes between `BACKEND_UNAVAILABLE`
/// and `BACKEND_QUERY_ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResult {
    pub agent: &'static str,
    pub message: String,
    pub retriable: bool,
}
