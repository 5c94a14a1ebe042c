//! Refiner: applies the Analyzer's suggestions to a copy of the intent.
//! Bounded, deterministic mutation only — never consults the LLM, never
//! touches agent results.

use crate::models::Intent;
use crate::services::analyzer::Suggestion;

const SPATIAL_EXPANSION_DEGREES: f64 = 2.0;
const TEMPORAL_WIDEN_FRACTION: f64 = 0.5;

pub struct Refiner;

impl Refiner {
    pub fn refine(intent: &Intent, suggestions: &[Suggestion]) -> Intent {
        let mut refined = intent.clone();
        for suggestion in suggestions {
            match suggestion {
                Suggestion::ExpandSpatial => {
                    refined.spatial_bounds = refined.spatial_bounds.map(|b| b.expand(SPATIAL_EXPANSION_DEGREES));
                }
                // Widening a bound that doesn't exist is a no-op; there is
                // nothing to widen without an existing start/end pair.
                Suggestion::ExpandTemporal => {
                    refined.temporal_bounds = refined.temporal_bounds.map(|b| b.widen(TEMPORAL_WIDEN_FRACTION));
                }
                Suggestion::BroadenSemantic => {
                    refined.flags.semantic_broadened = true;
                }
                Suggestion::EnhanceMetadata => {
                    refined.flags.metadata_enhanced = true;
                }
            }
        }
        refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, AgentMask, BoundingBox, IntentFlags, TemporalBounds};
    use chrono::Utc;

    fn base_intent() -> Intent {
        Intent {
            float_id: None,
            spatial_bounds: Some(BoundingBox { min_lat: 10.0, max_lat: 20.0, min_lon: 50.0, max_lon: 60.0 }),
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: AgentMask::new(&[AgentKind::Measurement]).unwrap(),
            flags: IntentFlags::default(),
            limit: 50,
        }
    }

    #[test]
    fn expand_spatial_grows_bbox_by_two_degrees() {
        let refined = Refiner::refine(&base_intent(), &[Suggestion::ExpandSpatial]);
        let bbox = refined.spatial_bounds.unwrap();
        assert_eq!(bbox.min_lat, 8.0);
        assert_eq!(bbox.max_lat, 22.0);
    }

    #[test]
    fn expand_temporal_is_noop_when_absent() {
        let refined = Refiner::refine(&base_intent(), &[Suggestion::ExpandTemporal]);
        assert!(refined.temporal_bounds.is_none());
    }

    #[test]
    fn expand_temporal_widens_when_present() {
        let mut intent = base_intent();
        let start = Utc::now();
        let end = start + chrono::Duration::hours(10);
        intent.temporal_bounds = Some(TemporalBounds { start, end });

        let refined = Refiner::refine(&intent, &[Suggestion::ExpandTemporal]);
        let widened = refined.temporal_bounds.unwrap();
        assert!(widened.start < start);
        assert!(widened.end > end);
    }

    #[test]
    fn flags_are_idempotent() {
        let mut intent = base_intent();
        intent.flags.semantic_broadened = true;
        let refined = Refiner::refine(&intent, &[Suggestion::BroadenSemantic]);
        assert!(refined.flags.semantic_broadened);
    }
}
