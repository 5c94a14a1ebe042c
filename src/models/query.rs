use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LAT_MAX, LAT_MIN, LON_MAX, LON_MIN};

/// Which backend-facing agent a bit in `AgentMask` enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Measurement,
    Metadata,
    Semantic,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Measurement, AgentKind::Metadata, AgentKind::Semantic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::Metadata => "metadata",
            Self::Semantic => "semantic",
        }
    }
}

/// A non-empty set of enabled agents. Construction enforces the invariant
/// that `agent_mask` is never empty by refusing to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMask(u8);

const MEASUREMENT_BIT: u8 = 0b001;
const METADATA_BIT: u8 = 0b010;
const SEMANTIC_BIT: u8 = 0b100;

impl AgentMask {
    /// Only for exercising the orchestrator's defensive empty-mask check;
    /// every public construction path (`new`, the intent parser) guarantees
    /// non-emptiness.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self(0)
    }

    pub fn new(kinds: &[AgentKind]) -> Option<Self> {
        let mut bits = 0u8;
        for k in kinds {
            bits |= Self::bit(*k);
        }
        if bits == 0 { None } else { Some(Self(bits)) }
    }

    fn bit(kind: AgentKind) -> u8 {
        match kind {
            AgentKind::Measurement => MEASUREMENT_BIT,
            AgentKind::Metadata => METADATA_BIT,
            AgentKind::Semantic => SEMANTIC_BIT,
        }
    }

    pub fn contains(&self, kind: AgentKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn popcount(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = AgentKind> + '_ {
        AgentKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    pub fn with(&self, kind: AgentKind) -> Self {
        Self(self.0 | Self::bit(kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// `min <= max` on both axes, as the spec data model requires.
    pub fn is_valid(&self) -> bool {
        self.min_lat <= self.max_lat && self.min_lon <= self.max_lon
    }

    /// Grow the box by `degrees` on each side, clamped to global limits; the
    /// expansion never crosses (-90,90) latitude or (-180,180) longitude.
    pub fn expand(&self, degrees: f64) -> Self {
        Self {
            min_lat: (self.min_lat - degrees).max(LAT_MIN),
            max_lat: (self.max_lat + degrees).min(LAT_MAX),
            min_lon: (self.min_lon - degrees).max(LON_MIN),
            max_lon: (self.max_lon + degrees).min(LON_MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalBounds {
    /// Widen the range by 50% on each side. A no-op has no meaning here since
    /// the range always exists when this is called; see `Intent::expand_temporal`
    /// for the "no bound present" no-op case.
    pub fn widen(&self, fraction: f64) -> Self {
        let span = self.end - self.start;
        let pad = chrono::Duration::milliseconds((span.num_milliseconds() as f64 * fraction) as i64);
        Self { start: self.start - pad, end: self.end + pad }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntentFlags {
    pub semantic_broadened: bool,
    pub metadata_enhanced: bool,
}

/// The structured interpretation of a user query, mutated across
/// orchestrator cycles by the Refiner only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub float_id: Option<String>,
    pub spatial_bounds: Option<BoundingBox>,
    pub temporal_bounds: Option<TemporalBounds>,
    pub parameters: Vec<Parameter>,
    pub agent_mask: AgentMask,
    pub flags: IntentFlags,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Salinity,
    Pressure,
}

impl Intent {
    /// True iff the data-model invariant holds: `agent_mask` non-empty and,
    /// when `spatial_bounds` is present, `min <= max` on both axes.
    pub fn is_valid(&self) -> bool {
        if self.agent_mask.is_empty() {
            return false;
        }
        match &self.spatial_bounds {
            Some(bbox) => bbox.is_valid(),
            None => true,
        }
    }
}
