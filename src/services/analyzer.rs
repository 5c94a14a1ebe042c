//! Analyzer: pure quality scoring over one cycle's agent results. Never
//! mutates `Intent` — that is the Refiner's job, one step later in the
//! orchestrator's state machine.

use std::collections::HashMap;

use crate::models::{AgentKind, AgentResult, Intent};

const MEASUREMENT_KEYWORDS: &[&str] = &["temperature", "salinity", "pressure", "measurement", "profile"];
const METADATA_KEYWORDS: &[&str] =
    &["metadata", "parameter", "region", "program", "deployment", "hierarchy", "float count"];
const SEMANTIC_KEYWORDS: &[&str] = &["similar", "pattern", "like", "resembl"];

/// Fixed trigger for a single sub-score's refinement suggestion. Distinct
/// from the configurable overall `quality_threshold` gate that decides
/// whether the orchestrator refines at all.
const SUGGESTION_TRIGGER: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suggestion {
    ExpandSpatial,
    ExpandTemporal,
    BroadenSemantic,
    EnhanceMetadata,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub measurement_quality: f64,
    pub metadata_quality: f64,
    pub semantic_quality: f64,
    pub completeness: f64,
}

impl Scores {
    pub fn overall(&self) -> f64 {
        (self.measurement_quality + self.metadata_quality + self.semantic_quality + self.completeness) / 4.0
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub scores: Scores,
    pub overall: f64,
    pub needs_refinement: bool,
    pub suggestions: Vec<Suggestion>,
}

pub struct Analyzer;

impl Analyzer {
    /// Scores one cycle's results against the query and intent that produced
    /// them. `results` holds at most one entry per enabled agent kind.
    /// `quality_threshold` is the configured overall gate (`Config`'s
    /// `orchestrator.quality_threshold`, default 0.7) that decides whether
    /// the cycle needs refinement.
    pub fn analyze(
        query: &str,
        intent: &Intent,
        results: &HashMap<AgentKind, AgentResult>,
        quality_threshold: f64,
    ) -> Analysis {
        let scores = Scores {
            measurement_quality: measurement_quality(intent, results.get(&AgentKind::Measurement)),
            metadata_quality: metadata_quality(results.get(&AgentKind::Metadata)),
            semantic_quality: semantic_quality(results.get(&AgentKind::Semantic)),
            completeness: completeness(query, results),
        };
        let overall = scores.overall();

        let mut suggestions = Vec::new();
        if scores.measurement_quality < SUGGESTION_TRIGGER {
            if intent.spatial_bounds.is_some() {
                suggestions.push(Suggestion::ExpandSpatial);
            }
            if intent.temporal_bounds.is_some() {
                suggestions.push(Suggestion::ExpandTemporal);
            }
        }
        if scores.semantic_quality < SUGGESTION_TRIGGER && intent.agent_mask.contains(AgentKind::Semantic) {
            suggestions.push(Suggestion::BroadenSemantic);
        }
        if scores.metadata_quality < SUGGESTION_TRIGGER && intent.agent_mask.contains(AgentKind::Metadata) {
            suggestions.push(Suggestion::EnhanceMetadata);
        }

        let needs_refinement = overall < quality_threshold || !suggestions.is_empty();
        Analysis { scores, overall, needs_refinement, suggestions }
    }
}

fn measurement_quality(intent: &Intent, result: Option<&AgentResult>) -> f64 {
    let Some(AgentResult::Measurement { measurements, statistics }) = result else {
        return 0.0;
    };
    let mut score = 0.0;
    if !measurements.is_empty() {
        score += 0.4;
    }
    if !statistics.is_empty() {
        score += 0.3;
    }
    if intent.temporal_bounds.is_some() {
        score += 0.2;
    }
    if intent.spatial_bounds.is_some() {
        score += 0.1;
    }
    score
}

fn metadata_quality(result: Option<&AgentResult>) -> f64 {
    let Some(AgentResult::Metadata { floats, regions }) = result else {
        return 0.0;
    };
    let mut score = 0.0;
    if !floats.is_empty() || !regions.is_empty() {
        score += 0.5;
    }
    if floats.iter().any(|f| f.program.is_some() || f.status.is_some()) || !regions.is_empty() {
        score += 0.3;
    }
    if !floats.is_empty() || !regions.is_empty() {
        score += 0.2;
    }
    score
}

fn semantic_quality(result: Option<&AgentResult>) -> f64 {
    let Some(AgentResult::Semantic { hits }) = result else {
        return 0.0;
    };
    let mut score = 0.0;
    if !hits.is_empty() {
        score += 0.6;
    }
    if hits.first().is_some_and(|h| !h.text.trim().is_empty()) {
        score += 0.4;
    }
    score
}

/// Which agent kinds a query's keyword families demand. Shared with the
/// intent parser's initial `agent_mask` construction so the two stay in
/// lockstep: whatever the analyzer considers "demanded" for completeness
/// scoring is exactly what the parser enables up front.
pub(crate) fn demanded_agents(lower_query: &str) -> Vec<AgentKind> {
    let mut demanded = Vec::new();
    if MEASUREMENT_KEYWORDS.iter().any(|kw| lower_query.contains(kw)) {
        demanded.push(AgentKind::Measurement);
    }
    if METADATA_KEYWORDS.iter().any(|kw| lower_query.contains(kw)) {
        demanded.push(AgentKind::Metadata);
    }
    if SEMANTIC_KEYWORDS.iter().any(|kw| lower_query.contains(kw)) {
        demanded.push(AgentKind::Semantic);
    }
    demanded
}

fn completeness(query: &str, results: &HashMap<AgentKind, AgentResult>) -> f64 {
    let lower = query.to_lowercase();
    let demanded = demanded_agents(&lower);

    if demanded.is_empty() {
        return 1.0;
    }

    let satisfied = demanded.iter().filter(|kind| results.get(kind).is_some_and(|r| !r.is_error())).count();
    satisfied as f64 / demanded.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMask, BoundingBox, ErrorResult, IntentFlags, Measurement, Statistics};
    use chrono::Utc;

    fn base_intent() -> Intent {
        Intent {
            float_id: Some("7902073".to_string()),
            spatial_bounds: None,
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: AgentMask::new(&[AgentKind::Measurement]).unwrap(),
            flags: IntentFlags::default(),
            limit: 100,
        }
    }

    #[test]
    fn full_measurement_result_scores_perfectly_with_bounds() {
        let mut intent = base_intent();
        intent.temporal_bounds = Some(crate::models::TemporalBounds { start: Utc::now(), end: Utc::now() });
        intent.spatial_bounds =
            Some(BoundingBox { min_lat: 0.0, max_lat: 1.0, min_lon: 0.0, max_lon: 1.0 });

        let mut results = HashMap::new();
        let mut statistics = HashMap::new();
        statistics.insert("temperature".to_string(), Statistics::compute(vec![Some(20.0)]).unwrap());
        results.insert(
            AgentKind::Measurement,
            AgentResult::Measurement {
                measurements: vec![Measurement {
                    platform_id: "7902073".to_string(),
                    time: Utc::now(),
                    lat: 0.5,
                    lon: 0.5,
                    pressure: None,
                    temperature: Some(20.0),
                    salinity: None,
                }],
                statistics,
            },
        );

        let analysis = Analyzer::analyze("temperature at float 7902073", &intent, &results, 0.7);
        assert!((analysis.scores.measurement_quality - 1.0).abs() < 1e-9);
        assert!(!analysis.needs_refinement);
    }

    #[test]
    fn errored_agent_scores_zero_and_suggests_nothing_for_it() {
        let intent = base_intent();
        let mut results = HashMap::new();
        results.insert(
            AgentKind::Measurement,
            AgentResult::Error(ErrorResult { agent: "measurement", message: "boom".to_string(), retriable: true }),
        );

        let analysis = Analyzer::analyze("temperature at float 7902073", &intent, &results, 0.7);
        assert_eq!(analysis.scores.measurement_quality, 0.0);
        assert!(analysis.needs_refinement);
    }

    #[test]
    fn no_demanded_agents_is_vacuously_complete() {
        let intent = base_intent();
        let results = HashMap::new();
        let analysis = Analyzer::analyze("hello there", &intent, &results, 0.7);
        assert_eq!(analysis.scores.completeness, 1.0);
    }
}
