//! Typed, narrow access to each backend. Agents never embed a backend's own
//! idiom (SQL dialect, Cypher, vector-store filter syntax) outside these
//! traits — swapping a store is limited to its adapter, mirroring the
//! teacher's `ClusterAdapter` trait-per-backend pattern.

mod graph;
mod sql;
mod vector;

pub use graph::{Neo4jGraphAdapter, StubGraphAdapter};
pub use sql::{SqlxSqlAdapter, StubSqlAdapter};
pub use vector::{PineconeVectorAdapter, StubVectorAdapter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{
    BoundingBox, FloatMetadata, Measurement, Parameter, RegionMetadata, SemanticHit, Statistics, TemporalBounds,
};

/// A typed failure from a backend call. `retriable` mirrors the façade's
/// `BACKEND_UNAVAILABLE` (transient, retriable) vs `BACKEND_QUERY_ERROR`
/// (malformed query, not retriable) distinction.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub retriable: bool,
    pub detail: HashMap<String, String>,
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retriable: true, detail: HashMap::new() }
    }

    pub fn query_error(message: impl Into<String>) -> Self {
        Self { message: message.into(), retriable: false, detail: HashMap::new() }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationBucket {
    Day,
    Week,
    Month,
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait SqlAdapter: Send + Sync {
    async fn measurements_by_float(
        &self,
        platform_id: &str,
        time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>>;

    async fn measurements_by_region(
        &self,
        bbox: BoundingBox,
        time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>>;

    async fn stats(
        &self,
        platform_id: &str,
        param: Parameter,
        depth_range: (f64, f64),
        time_range: Option<TemporalBounds>,
    ) -> BackendResult<Option<Statistics>>;

    async fn aggregate(
        &self,
        platform_id: &str,
        param: Parameter,
        bucket: AggregationBucket,
        time_range: Option<TemporalBounds>,
    ) -> BackendResult<Vec<Value>>;

    /// Escape hatch for LLM-generated SQL. Rows are returned unmodified as
    /// JSON objects; the caller (Measurement Agent) is responsible for any
    /// further interpretation.
    async fn execute(&self, sql: &str) -> BackendResult<Vec<Value>>;
}

#[async_trait]
pub trait GraphAdapter: Send + Sync {
    async fn float_metadata(&self, platform_id: &str) -> BackendResult<Option<FloatMetadata>>;

    async fn region_metadata(&self, name: &str) -> BackendResult<Option<RegionMetadata>>;

    async fn floats_in_region(&self, name: &str, recursive: bool) -> BackendResult<Vec<String>>;

    async fn region_hierarchy(&self) -> BackendResult<Value>;

    async fn parameter_coverage(&self, region: Option<&str>) -> BackendResult<HashMap<String, usize>>;

    /// Escape hatch for LLM-generated Cypher.
    async fn execute(&self, cypher: &str) -> BackendResult<Vec<Value>>;
}

#[derive(Debug, Clone, Default)]
pub struct SemanticFilters {
    pub region: Option<String>,
    pub time_range: Option<TemporalBounds>,
    pub parameter: Option<Parameter>,
}

#[async_trait]
pub trait VectorAdapter: Send + Sync {
    async fn semantic_search(
        &self,
        query_vector: &[f32; 384],
        k: usize,
        filters: SemanticFilters,
    ) -> BackendResult<Vec<SemanticHit>>;

    async fn nearest(
        &self,
        platform_id: &str,
        time: DateTime<Utc>,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>>;

    async fn similar_profiles(
        &self,
        platform_id: &str,
        time_range: TemporalBounds,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>>;
}
