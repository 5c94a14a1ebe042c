use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Graph-sourced float metadata: deployment facts, not measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatMetadata {
    pub platform_id: String,
    pub program: Option<String>,
    pub deployment_date: Option<DateTime<Utc>>,
    pub last_profile_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub region: Option<String>,
    pub sensor_types: Vec<String>,
}

/// Graph-sourced region facts, used when a query names a region rather than
/// a float.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionMetadata {
    pub name: String,
    pub float_count: usize,
    pub active_float_count: usize,
    pub programs: Vec<String>,
}
