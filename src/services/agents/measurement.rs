//! Measurement Agent: dispatches to the SQL adapter, either through its
//! typed methods or, for "list platform IDs"-shaped requests, through an
//! LLM-generated SQL escape hatch. Grounded in the original `cockroachdb_agent`:
//! same keyword family, same code-fence stripping, same server-side statement
//! timeout guard before execution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{AgentResult, ErrorResult, Intent, Measurement, Statistics};
use crate::services::adapters::SqlAdapter;
use crate::services::llm::{ChatTurn, LlmClient};

const LIST_PLATFORM_KEYWORDS: &[&str] = &["all float", "float id", "platform number"];
const STATEMENT_TIMEOUT: &str = "SET statement_timeout = '100s';";

pub struct MeasurementAgent {
    sql: Arc<dyn SqlAdapter>,
    llm: Arc<dyn LlmClient>,
    sql_generation_system: String,
}

impl MeasurementAgent {
    pub fn new(sql: Arc<dyn SqlAdapter>, llm: Arc<dyn LlmClient>, sql_generation_system: impl Into<String>) -> Self {
        Self { sql, llm, sql_generation_system: sql_generation_system.into() }
    }

    pub async fn run(&self, query: &str, intent: &Intent) -> AgentResult {
        let lower = query.to_lowercase();
        if LIST_PLATFORM_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return self.run_custom_sql(query).await;
        }

        let rows = if let Some(float_id) = &intent.float_id {
            self.sql.measurements_by_float(float_id, intent.temporal_bounds, intent.limit).await
        } else if let Some(bbox) = intent.spatial_bounds {
            self.sql.measurements_by_region(bbox, intent.temporal_bounds, intent.limit).await
        } else {
            return error_result("measurement agent needs a float_id or spatial_bounds", false);
        };

        match rows {
            Ok(measurements) => summarize(measurements),
            Err(e) => error_result(e.message, e.retriable),
        }
    }

    async fn run_custom_sql(&self, query: &str) -> AgentResult {
        let messages = [ChatTurn::user(query)];
        let generated = match self.llm.complete(&self.sql_generation_system, &messages, 0.0).await {
            Ok(text) => text,
            Err(e) => return error_result(format!("sql generation failed: {e}"), true),
        };

        let mut sql = super::strip_code_fence(&generated);
        if !sql.to_lowercase().contains("statement_timeout") {
            sql = format!("{STATEMENT_TIMEOUT} {sql}");
        }

        match self.sql.execute(&sql).await {
            // Rows are returned unmodified, per the escape hatch contract;
            // a row that doesn't parse as a measurement is dropped rather
            // than coerced, since the prompt pins the full column set.
            Ok(rows) => {
                let measurements: Vec<Measurement> =
                    rows.into_iter().filter_map(|row| serde_json::from_value(row).ok()).collect();
                summarize(measurements)
            }
            Err(e) => error_result(e.message, e.retriable),
        }
    }
}

fn summarize(measurements: Vec<Measurement>) -> AgentResult {
    let mut statistics = HashMap::new();
    if let Some(stats) = Statistics::compute(measurements.iter().map(|m| m.pressure)) {
        statistics.insert("pressure".to_string(), stats);
    }
    if let Some(stats) = Statistics::compute(measurements.iter().map(|m| m.temperature)) {
        statistics.insert("temperature".to_string(), stats);
    }
    if let Some(stats) = Statistics::compute(measurements.iter().map(|m| m.salinity)) {
        statistics.insert("salinity".to_string(), stats);
    }
    AgentResult::Measurement { measurements, statistics }
}

fn error_result(message: impl Into<String>, retriable: bool) -> AgentResult {
    AgentResult::Error(ErrorResult { agent: "measurement", message: message.into(), retriable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMask, IntentFlags};
    use crate::services::adapters::StubSqlAdapter;
    use crate::services::llm::StubLlmClient;
    use chrono::Utc;

    fn base_intent() -> Intent {
        Intent {
            float_id: Some("7902073".to_string()),
            spatial_bounds: None,
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: AgentMask::new(&[crate::models::AgentKind::Measurement]).unwrap(),
            flags: IntentFlags::default(),
            limit: 100,
        }
    }

    #[tokio::test]
    async fn dispatches_by_float_id_and_computes_statistics() {
        let stub = Arc::new(StubSqlAdapter::new(vec![Measurement {
            platform_id: "7902073".to_string(),
            time: Utc::now(),
            lat: 10.0,
            lon: 65.0,
            pressure: Some(10.0),
            temperature: Some(20.0),
            salinity: None,
        }]));
        let llm = Arc::new(StubLlmClient::new("unused"));
        let agent = MeasurementAgent::new(stub, llm, "system prompt");

        let result = agent.run("show me temperature at 7902073", &base_intent()).await;
        match result {
            AgentResult::Measurement { measurements, statistics } => {
                assert_eq!(measurements.len(), 1);
                assert!(statistics.contains_key("temperature"));
                assert!(!statistics.contains_key("salinity"));
            }
            other => panic!("expected Measurement, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_dispatch_key_is_error() {
        let stub = Arc::new(StubSqlAdapter::new(vec![]));
        let llm = Arc::new(StubLlmClient::new("unused"));
        let agent = MeasurementAgent::new(stub, llm, "system prompt");

        let mut intent = base_intent();
        intent.float_id = None;
        let result = agent.run("tell me about the ocean", &intent).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn list_platform_query_goes_through_llm_sql_escape_hatch() {
        let stub = Arc::new(StubSqlAdapter::new(vec![Measurement {
            platform_id: "1234567".to_string(),
            time: Utc::now(),
            lat: 1.0,
            lon: 2.0,
            pressure: None,
            temperature: None,
            salinity: None,
        }]));
        let llm = Arc::new(StubLlmClient::new("```sql\nSELECT * FROM measurements\n```"));
        let agent = MeasurementAgent::new(stub, llm, "system prompt");

        let result = agent.run("list all float ids in the region", &base_intent()).await;
        match result {
            AgentResult::Measurement { measurements, .. } => assert_eq!(measurements.len(), 1),
            other => panic!("expected Measurement, got {other:?}"),
        }
    }
}
