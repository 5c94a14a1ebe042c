//! Metadata Agent: graph-shaped list/hierarchy requests go through an
//! LLM-generated Cypher escape hatch; everything else dispatches to the
//! typed `float_metadata`/`region_metadata` methods. Grounded in the
//! original `metadata_agent`'s Cypher-generation system prompt and its
//! `LIMIT 50` rule for list queries.

use std::sync::Arc;

use crate::models::{AgentResult, ErrorResult, FloatMetadata, Intent, RegionMetadata};
use crate::services::adapters::GraphAdapter;
use crate::services::llm::{ChatTurn, LlmClient};

const GRAPH_SHAPED_KEYWORDS: &[&str] =
    &["all regions", "hierarchy", "float count", "deployment info", "parameter coverage", "list float"];

pub struct MetadataAgent {
    graph: Arc<dyn GraphAdapter>,
    llm: Arc<dyn LlmClient>,
    cypher_generation_system: String,
    known_regions: Vec<String>,
}

impl MetadataAgent {
    pub fn new(
        graph: Arc<dyn GraphAdapter>,
        llm: Arc<dyn LlmClient>,
        cypher_generation_system: impl Into<String>,
        known_regions: Vec<String>,
    ) -> Self {
        Self { graph, llm, cypher_generation_system: cypher_generation_system.into(), known_regions }
    }

    pub async fn run(&self, query: &str, intent: &Intent) -> AgentResult {
        let lower = query.to_lowercase();
        if GRAPH_SHAPED_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return self.run_custom_cypher(query).await;
        }

        if let Some(float_id) = &intent.float_id {
            return match self.graph.float_metadata(float_id).await {
                Ok(Some(meta)) => self.enhance_if_requested(vec![meta], Vec::new(), intent).await,
                Ok(None) => AgentResult::Metadata { floats: Vec::new(), regions: Vec::new() },
                Err(e) => error_result(e.message, e.retriable),
            };
        }

        if let Some(region) = self.resolve_region(&lower) {
            return match self.graph.region_metadata(region).await {
                Ok(Some(meta)) => self.enhance_if_requested(Vec::new(), vec![meta], intent).await,
                Ok(None) => AgentResult::Metadata { floats: Vec::new(), regions: Vec::new() },
                Err(e) => error_result(e.message, e.retriable),
            };
        }

        error_result("metadata agent needs a float_id or a recognized region name", false)
    }

    fn resolve_region<'a>(&'a self, lower_query: &str) -> Option<&'a str> {
        self.known_regions.iter().find(|r| lower_query.contains(r.as_str())).map(|s| s.as_str())
    }

    /// When `flags.metadata_enhanced` is set, also pulls the region
    /// hierarchy as extra corroborating context; the typed result shape
    /// carries only floats/regions, so the hierarchy fetch's only visible
    /// effect is surfacing a backend error if the graph store is down.
    async fn enhance_if_requested(
        &self,
        floats: Vec<FloatMetadata>,
        regions: Vec<RegionMetadata>,
        intent: &Intent,
    ) -> AgentResult {
        if intent.flags.metadata_enhanced {
            if let Err(e) = self.graph.region_hierarchy().await {
                return error_result(e.message, e.retriable);
            }
        }
        AgentResult::Metadata { floats, regions }
    }

    async fn run_custom_cypher(&self, query: &str) -> AgentResult {
        let messages = [ChatTurn::user(query)];
        let generated = match self.llm.complete(&self.cypher_generation_system, &messages, 0.0).await {
            Ok(text) => text,
            Err(e) => return error_result(format!("cypher generation failed: {e}"), true),
        };

        let mut cypher = super::strip_code_fence(&generated);
        if !cypher.to_uppercase().contains("LIMIT") {
            cypher.push_str(" LIMIT 50");
        }

        match self.graph.execute(&cypher).await {
            Ok(rows) => {
                let regions: Vec<RegionMetadata> =
                    rows.into_iter().filter_map(|row| serde_json::from_value(row).ok()).collect();
                AgentResult::Metadata { floats: Vec::new(), regions }
            }
            Err(e) => error_result(e.message, e.retriable),
        }
    }
}

fn error_result(message: impl Into<String>, retriable: bool) -> AgentResult {
    AgentResult::Error(ErrorResult { agent: "metadata", message: message.into(), retriable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, AgentMask, IntentFlags};
    use crate::services::adapters::StubGraphAdapter;
    use crate::services::llm::StubLlmClient;

    fn base_intent() -> Intent {
        Intent {
            float_id: None,
            spatial_bounds: None,
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: AgentMask::new(&[AgentKind::Metadata]).unwrap(),
            flags: IntentFlags::default(),
            limit: 50,
        }
    }

    fn regions_vocab() -> Vec<String> {
        vec!["arabian sea".to_string(), "bay of bengal".to_string()]
    }

    #[tokio::test]
    async fn dispatches_by_float_id() {
        let graph = Arc::new(StubGraphAdapter::new().with_float(FloatMetadata {
            platform_id: "7902073".to_string(),
            program: Some("Argo".to_string()),
            deployment_date: None,
            last_profile_date: None,
            status: Some("active".to_string()),
            region: Some("arabian sea".to_string()),
            sensor_types: vec!["temperature".to_string()],
        }));
        let llm = Arc::new(StubLlmClient::new("unused"));
        let agent = MetadataAgent::new(graph, llm, "system prompt", regions_vocab());

        let mut intent = base_intent();
        intent.float_id = Some("7902073".to_string());
        let result = agent.run("tell me about float 7902073", &intent).await;
        match result {
            AgentResult::Metadata { floats, regions } => {
                assert_eq!(floats.len(), 1);
                assert!(regions.is_empty());
            }
            other => panic!("expected Metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatches_by_recognized_region_name() {
        let graph = Arc::new(StubGraphAdapter::new().with_region(RegionMetadata {
            name: "arabian sea".to_string(),
            float_count: 12,
            active_float_count: 9,
            programs: vec!["Argo".to_string()],
        }));
        let llm = Arc::new(StubLlmClient::new("unused"));
        let agent = MetadataAgent::new(graph, llm, "system prompt", regions_vocab());

        let result = agent.run("how many floats are active in the Arabian Sea", &base_intent()).await;
        match result {
            AgentResult::Metadata { regions, .. } => assert_eq!(regions[0].float_count, 12),
            other => panic!("expected Metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_dispatch_key_is_error() {
        let graph = Arc::new(StubGraphAdapter::new());
        let llm = Arc::new(StubLlmClient::new("unused"));
        let agent = MetadataAgent::new(graph, llm, "system prompt", regions_vocab());

        let result = agent.run("what do you think about the weather", &base_intent()).await;
        assert!(result.is_error());
    }
}
