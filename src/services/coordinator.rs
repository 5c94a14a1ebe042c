//! Coordinator: fuses per-agent results into a narrative plus an optional
//! visualization block. Deterministic table/sample/chart rules never depend
//! on the LLM; a closing natural-language summary is LLM-assisted but falls
//! back to a templated sentence on any failure. Grounded in the original
//! `response_agent`'s truncation and visualization-inference rules.

use std::collections::HashMap;

use crate::models::{AgentKind, AgentResult, ChartData, ChartSpec, ChartType, CoordinatorOutput};
use crate::services::llm::{ChatTurn, LlmClient};

const DEFAULT_ROW_CAP: usize = 100;
const SAMPLE_SIZE: usize = 10;
const HARD_ROW_CAP: usize = 1000;

const FULL_DATA_PHRASES: &[&str] = &[
    "whole data",
    "all data",
    "complete data",
    "entire data",
    "full data",
    "all measurements",
    "every measurement",
    "all rows",
    "complete list",
    "entire list",
];

pub struct Coordinator;

impl Coordinator {
    pub async fn synthesize(
        query: &str,
        results: &HashMap<AgentKind, AgentResult>,
        llm: &dyn LlmClient,
        narrative_summary_system: &str,
    ) -> CoordinatorOutput {
        let wants_full_data = {
            let lower = query.to_lowercase();
            FULL_DATA_PHRASES.iter().any(|p| lower.contains(p))
        };

        let leading = AgentKind::ALL.iter().find_map(|k| results.get(k).filter(|r| !r.is_error()));

        let (row_count, truncated_row_count) = match leading {
            Some(result) => {
                let total = row_count_of(result);
                let cap = if wants_full_data { HARD_ROW_CAP } else { DEFAULT_ROW_CAP };
                if total > cap {
                    (total, Some(if wants_full_data { HARD_ROW_CAP } else { SAMPLE_SIZE }))
                } else {
                    (total, None)
                }
            }
            None => (0, None),
        };

        let deterministic_summary = build_deterministic_summary(query, results, row_count, truncated_row_count);
        let visualizations = leading.and_then(infer_charts);

        let narrative = match llm
            .complete(narrative_summary_system, &[ChatTurn::user(format!("{deterministic_summary}\n\n{query}"))], 0.3)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => format!("{deterministic_summary}\n\n{}", summary.trim()),
            _ => deterministic_summary,
        };

        CoordinatorOutput { narrative, visualizations, truncated_row_count }
    }
}

fn row_count_of(result: &AgentResult) -> usize {
    match result {
        AgentResult::Measurement { measurements, .. } => measurements.len(),
        AgentResult::Metadata { floats, regions } => floats.len() + regions.len(),
        AgentResult::Semantic { hits } => hits.len(),
        AgentResult::Error(_) => 0,
    }
}

fn build_deterministic_summary(
    query: &str,
    results: &HashMap<AgentKind, AgentResult>,
    row_count: usize,
    truncated_row_count: Option<usize>,
) -> String {
    let mut lines = Vec::new();

    if let Some(AgentResult::Measurement { measurements, statistics }) = results.get(&AgentKind::Measurement) {
        if measurements.is_empty() {
            lines.push("No measurements matched this query.".to_string());
        } else {
            lines.push(format!("Found {} measurement(s).", measurements.len()));
            for (param, stats) in statistics {
                lines.push(format!(
                    "{param}: mean {:.2}, min {:.2}, max {:.2} (n={}).",
                    stats.mean, stats.min, stats.max, stats.count
                ));
            }
        }
    }

    if let Some(AgentResult::Metadata { floats, regions }) = results.get(&AgentKind::Metadata) {
        if !floats.is_empty() {
            lines.push(format!("Found metadata for {} float(s).", floats.len()));
        }
        for region in regions {
            lines.push(format!(
                "{}: {} float(s) registered, {} active.",
                region.name, region.float_count, region.active_float_count
            ));
        }
    }

    if let Some(AgentResult::Semantic { hits }) = results.get(&AgentKind::Semantic) {
        if hits.is_empty() {
            lines.push("No semantically similar profiles were found.".to_string());
        } else {
            lines.push(format!("Found {} semantically similar result(s).", hits.len()));
        }
    }

    for (kind, result) in results {
        if let AgentResult::Error(err) = result {
            lines.push(format!("The {} agent could not complete this request: {}.", kind.as_str(), err.message));
        }
    }

    if let Some(sample) = truncated_row_count {
        lines.push(format!("Showing {sample} of {row_count} total row(s); ask for the full data to see the rest."));
    }

    if lines.is_empty() {
        lines.push(format!("No data sources produced a result for \"{query}\"."));
    }

    lines.join(" ")
}

fn infer_charts(result: &AgentResult) -> Option<Vec<ChartSpec>> {
    match result {
        AgentResult::Measurement { measurements, .. } if !measurements.is_empty() => {
            let has_position = measurements.iter().all(|m| m.lat != 0.0 || m.lon != 0.0);
            let parameter_count = [
                measurements.iter().any(|m| m.temperature.is_some()),
                measurements.iter().any(|m| m.salinity.is_some()),
                measurements.iter().any(|m| m.pressure.is_some()),
            ]
            .into_iter()
            .filter(|present| *present)
            .count();

            let chart_type = if has_position && measurements.iter().any(|m| m.pressure.is_some()) {
                ChartType::Scatter3d
            } else if has_position {
                ChartType::MapPoints
            } else if parameter_count > 1 {
                ChartType::Composed
            } else if measurements.iter().any(|m| m.pressure.is_some()) {
                ChartType::Scatter
            } else {
                ChartType::Line
            };

            // Field name follows Argo's adjusted-value convention so the
            // encoding names the actual parameter plotted, not a generic
            // placeholder.
            let value_field = if measurements.iter().any(|m| m.temperature.is_some()) {
                "temp_adjusted"
            } else if measurements.iter().any(|m| m.salinity.is_some()) {
                "psal_adjusted"
            } else {
                "pres_adjusted"
            };

            let fields = vec!["time".to_string(), "lat".to_string(), "lon".to_string(), value_field.to_string()];
            let rows = measurements
                .iter()
                .map(|m| {
                    let value = m.temperature.or(m.salinity).or(m.pressure).unwrap_or(f64::NAN);
                    vec![
                        serde_json::json!(m.time),
                        serde_json::json!(m.lat),
                        serde_json::json!(m.lon),
                        serde_json::json!(value),
                    ]
                })
                .collect();

            Some(vec![ChartSpec {
                chart_type,
                title: "Measurements".to_string(),
                subtitle: None,
                data: ChartData { fields, rows },
                encodings: serde_json::json!({ "x": "time", "y": value_field }),
                options: serde_json::Value::Null,
                styling: serde_json::Value::Null,
            }])
        }
        AgentResult::Metadata { regions, .. } if !regions.is_empty() => Some(vec![ChartSpec {
            chart_type: ChartType::Bar,
            title: "Float counts by region".to_string(),
            subtitle: None,
            data: ChartData {
                fields: vec!["region".to_string(), "float_count".to_string()],
                rows: regions
                    .iter()
                    .map(|r| vec![serde_json::json!(r.name), serde_json::json!(r.float_count)])
                    .collect(),
            },
            encodings: serde_json::json!({ "x": "region", "y": "float_count" }),
            options: serde_json::Value::Null,
            styling: serde_json::Value::Null,
        }]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;
    use crate::services::llm::StubLlmClient;
    use chrono::Utc;

    #[tokio::test]
    async fn small_result_set_is_not_truncated() {
        let mut results = HashMap::new();
        results.insert(
            AgentKind::Measurement,
            AgentResult::Measurement {
                measurements: vec![Measurement {
                    platform_id: "a".to_string(),
                    time: Utc::now(),
                    lat: 1.0,
                    lon: 2.0,
                    pressure: None,
                    temperature: Some(20.0),
                    salinity: None,
                }],
                statistics: HashMap::new(),
            },
        );
        let llm = StubLlmClient::new("The water here is warm.");
        let output = Coordinator::synthesize("temperature at float a", &results, &llm, "system").await;
        assert!(output.truncated_row_count.is_none());
        assert!(output.visualizations.is_some());
    }

    #[tokio::test]
    async fn large_result_set_without_full_data_phrase_is_truncated() {
        let measurements: Vec<Measurement> = (0..150)
            .map(|i| Measurement {
                platform_id: format!("f{i}"),
                time: Utc::now(),
                lat: 1.0,
                lon: 2.0,
                pressure: None,
                temperature: Some(20.0),
                salinity: None,
            })
            .collect();
        let mut results = HashMap::new();
        results.insert(AgentKind::Measurement, AgentResult::Measurement { measurements, statistics: HashMap::new() });

        let llm = StubLlmClient::new("summary");
        let output = Coordinator::synthesize("show me temperature readings", &results, &llm, "system").await;
        assert_eq!(output.truncated_row_count, Some(SAMPLE_SIZE));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_deterministic_narrative() {
        let mut results = HashMap::new();
        results.insert(
            AgentKind::Measurement,
            AgentResult::Measurement { measurements: Vec::new(), statistics: HashMap::new() },
        );
        let llm = StubLlmClient::new("unused");
        llm.set_failing(true);
        let output = Coordinator::synthesize("temperature at float a", &results, &llm, "system").await;
        assert!(output.narrative.contains("No measurements matched"));
    }
}
