//! Intent parsing: the Orchestrator's `parse_intent` step. Turns raw query
//! text plus the closed vocabulary in `Config` into a structured `Intent`.
//! The agent-family keyword check is shared with the Analyzer's
//! completeness scoring (`analyzer::demanded_agents`) so the two always
//! agree on what a query is asking for.

use regex::Regex;
use std::collections::HashMap;

use crate::config::VocabularyConfig;
use crate::models::{AgentKind, AgentMask, BoundingBox, Intent, IntentFlags, Parameter};
use crate::services::analyzer::demanded_agents;

const DEFAULT_LIMIT: usize = 50;

pub struct IntentParser {
    regions: Vec<String>,
    parameters_vocab: Vec<String>,
    float_id_regex: Regex,
    region_bounds: HashMap<String, BoundingBox>,
}

impl IntentParser {
    pub fn new(vocab: &VocabularyConfig) -> Self {
        Self {
            regions: vocab.regions.clone(),
            parameters_vocab: vocab.parameters.clone(),
            float_id_regex: Regex::new(&vocab.float_id_regex).expect("configured float_id_regex must compile"),
            region_bounds: vocab.region_bounds.clone(),
        }
    }

    /// Builds cycle-0's `Intent`. `known_float_ids` are prior float IDs
    /// already extracted into the session's context; they are used only
    /// when the current query names none of its own. Falls back to the
    /// full agent set when no keyword family matches, so a non-empty
    /// `agent_mask` is always produced for non-empty query text.
    pub fn parse(&self, query: &str, known_float_ids: &[String]) -> Intent {
        let lower = query.to_lowercase();

        let float_id =
            self.float_id_regex.find(query).map(|m| m.as_str().to_string()).or_else(|| known_float_ids.last().cloned());

        let region = self.regions.iter().find(|r| lower.contains(r.as_str()));
        let spatial_bounds = region.and_then(|r| self.region_bounds.get(r)).copied();

        let parameters: Vec<Parameter> = self
            .parameters_vocab
            .iter()
            .filter_map(|p| if lower.contains(p.as_str()) { parameter_from_str(p) } else { None })
            .collect();

        let mut kinds = demanded_agents(&lower);
        if kinds.is_empty() {
            kinds = AgentKind::ALL.to_vec();
        }
        let agent_mask = AgentMask::new(&kinds).expect("demanded_agents never returns empty after the ALL fallback");

        Intent {
            float_id,
            spatial_bounds,
            temporal_bounds: None,
            parameters,
            agent_mask,
            flags: IntentFlags::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

fn parameter_from_str(s: &str) -> Option<Parameter> {
    match s {
        "temperature" => Some(Parameter::Temperature),
        "salinity" => Some(Parameter::Salinity),
        "pressure" => Some(Parameter::Pressure),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IntentParser {
        IntentParser::new(&VocabularyConfig::default())
    }

    #[test]
    fn extracts_float_id_and_parameter() {
        let intent = parser().parse("what is the temperature at float 7902073", &[]);
        assert_eq!(intent.float_id.as_deref(), Some("7902073"));
        assert_eq!(intent.parameters, vec![Parameter::Temperature]);
        assert!(intent.agent_mask.contains(AgentKind::Measurement));
    }

    #[test]
    fn resolves_known_region_to_bounding_box() {
        let intent = parser().parse("salinity in the arabian sea", &[]);
        let bbox = intent.spatial_bounds.expect("arabian sea has a bounding box");
        assert_eq!(bbox.min_lat, 10.0);
        assert_eq!(bbox.max_lon, 75.0);
    }

    #[test]
    fn falls_back_to_known_float_id_when_query_names_none() {
        let intent = parser().parse("show me more about this float", &["7902073".to_string()]);
        assert_eq!(intent.float_id.as_deref(), Some("7902073"));
    }

    #[test]
    fn query_with_no_keyword_family_enables_all_agents() {
        let intent = parser().parse("tell me something interesting", &[]);
        assert_eq!(intent.agent_mask.popcount(), 3);
    }
}
