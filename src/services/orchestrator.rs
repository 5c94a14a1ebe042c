//! Cyclic Orchestrator: the deterministic state machine driving agent
//! fan-out, quality analysis, refinement, and synthesis. Expressed as a
//! plain `loop` over an explicit state enum (no external graph-builder
//! crate), so the cycle bound is just a counter, not a runtime graph.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, AppResult};
use crate::models::{AgentKind, AgentResult, CoordinatorOutput, Intent};
use crate::services::agents::{MeasurementAgent, MetadataAgent, SemanticAgent};
use crate::services::analyzer::Analyzer;
use crate::services::coordinator::Coordinator;
use crate::services::llm::LlmClient;
use crate::services::refiner::Refiner;

/// One transition of the state machine in the component design. `events`
/// receives one of these per transition so the streaming façade can turn
/// them into SSE progress frames tied to real state, not fabricated labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    ParseIntent,
    ExecuteAgents { cycle_index: u32 },
    Analyze { cycle_index: u32 },
    Refine { cycle_index: u32 },
    Synthesize,
}

pub type ProgressSink = tokio::sync::mpsc::UnboundedSender<OrchestratorEvent>;

pub struct OrchestratorOutput {
    pub coordinator: CoordinatorOutput,
    pub cycles_used: u32,
    pub agents_used: Vec<AgentKind>,
    pub agents_errored: Vec<AgentKind>,
    pub final_quality: f64,
}

pub struct Orchestrator {
    measurement: Arc<MeasurementAgent>,
    metadata: Arc<MetadataAgent>,
    semantic: Arc<SemanticAgent>,
    llm: Arc<dyn LlmClient>,
    narrative_summary_system: String,
    max_cycles: u32,
    quality_threshold: f64,
}

impl Orchestrator {
    pub fn new(
        measurement: Arc<MeasurementAgent>,
        metadata: Arc<MetadataAgent>,
        semantic: Arc<SemanticAgent>,
        llm: Arc<dyn LlmClient>,
        narrative_summary_system: impl Into<String>,
        max_cycles: u32,
        quality_threshold: f64,
    ) -> Self {
        Self {
            measurement,
            metadata,
            semantic,
            llm,
            narrative_summary_system: narrative_summary_system.into(),
            max_cycles,
            quality_threshold,
        }
    }

    /// Runs cycle 0 through `done`/`error`. `deadline` bounds the whole
    /// fan-out across every cycle; blowing through it fails the request with
    /// `AGENT_TIMEOUT` and discards any partial-cycle work rather than
    /// surfacing it.
    pub async fn run(
        &self,
        query: &str,
        intent: Intent,
        deadline: Instant,
        events: Option<ProgressSink>,
    ) -> AppResult<OrchestratorOutput> {
        emit(&events, OrchestratorEvent::ParseIntent);

        if intent.agent_mask.is_empty() {
            return Err(AppError::invalid_input("intent has an empty agent_mask"));
        }

        let mut current_intent = intent;
        let mut cycle_index = 0u32;
        let mut results: HashMap<AgentKind, AgentResult>;
        let mut quality = 0.0;

        loop {
            emit(&events, OrchestratorEvent::ExecuteAgents { cycle_index });
            results = self.execute_agents(query, &current_intent, deadline).await?;

            emit(&events, OrchestratorEvent::Analyze { cycle_index });
            let analysis = Analyzer::analyze(query, &current_intent, &results, self.quality_threshold);
            quality = analysis.overall;

            if analysis.needs_refinement && cycle_index < self.max_cycles {
                emit(&events, OrchestratorEvent::Refine { cycle_index });
                current_intent = Refiner::refine(&current_intent, &analysis.suggestions);
                cycle_index += 1;
                continue;
            }

            break;
        }

        emit(&events, OrchestratorEvent::Synthesize);

        let demanded: Vec<AgentKind> = current_intent.agent_mask.iter().collect();
        let all_errored = demanded.iter().all(|k| results.get(k).is_some_and(AgentResult::is_error));
        if all_errored {
            return Err(most_severe_error(&results));
        }

        let coordinator =
            Coordinator::synthesize(query, &results, self.llm.as_ref(), &self.narrative_summary_system).await;

        let (agents_used, agents_errored) =
            demanded.into_iter().partition(|k| results.get(k).is_some_and(|r| !r.is_error()));

        Ok(OrchestratorOutput { coordinator, cycles_used: cycle_index, agents_used, agents_errored, final_quality: quality })
    }

    async fn execute_agents(
        &self,
        query: &str,
        intent: &Intent,
        deadline: Instant,
    ) -> AppResult<HashMap<AgentKind, AgentResult>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AppError::agent_timeout(query));
        }

        let measurement_enabled = intent.agent_mask.contains(AgentKind::Measurement);
        let metadata_enabled = intent.agent_mask.contains(AgentKind::Metadata);
        let semantic_enabled = intent.agent_mask.contains(AgentKind::Semantic);

        let fan_out = async {
            tokio::join!(
                run_if(measurement_enabled, AgentKind::Measurement, self.measurement.run(query, intent)),
                run_if(metadata_enabled, AgentKind::Metadata, self.metadata.run(query, intent)),
                run_if(semantic_enabled, AgentKind::Semantic, self.semantic.run(query, intent)),
            )
        };

        let (m, g, s) =
            tokio::time::timeout(remaining, fan_out).await.map_err(|_| AppError::agent_timeout(query))?;

        Ok([m, g, s].into_iter().flatten().collect())
    }
}

/// Builds the future unconditionally (futures are inert until polled, so
/// this costs nothing when `enabled` is false) and awaits it only when the
/// mask has that bit set.
async fn run_if(
    enabled: bool,
    kind: AgentKind,
    fut: impl std::future::Future<Output = AgentResult>,
) -> Option<(AgentKind, AgentResult)> {
    if enabled { Some((kind, fut.await)) } else { None }
}

fn emit(sink: &Option<ProgressSink>, event: OrchestratorEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}

fn most_severe_error(results: &HashMap<AgentKind, AgentResult>) -> AppError {
    let mut detail = HashMap::new();
    let mut non_retriable: Option<String> = None;
    let mut retriable: Option<String> = None;

    for (kind, result) in results {
        if let AgentResult::Error(err) = result {
            detail.insert(kind.as_str().to_string(), err.message.clone());
            if err.retriable {
                retriable.get_or_insert_with(|| err.message.clone());
            } else {
                non_retriable.get_or_insert_with(|| err.message.clone());
            }
        }
    }

    match non_retriable {
        Some(message) => AppError::BackendQueryError { message, detail },
        None => AppError::BackendUnavailable {
            message: retriable.unwrap_or_else(|| "all demanded agents failed".to_string()),
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMask, IntentFlags, Measurement, SemanticHit};
    use crate::services::adapters::{StubGraphAdapter, StubSqlAdapter, StubVectorAdapter};
    use crate::services::llm::StubLlmClient;
    use chrono::Utc;
    use std::time::Duration;

    fn orchestrator(max_cycles: u32, quality_threshold: f64) -> Orchestrator {
        let sql = Arc::new(StubSqlAdapter::new(vec![Measurement {
            platform_id: "7902073".to_string(),
            time: Utc::now(),
            lat: 12.0,
            lon: 65.0,
            pressure: None,
            temperature: Some(24.5),
            salinity: None,
        }]));
        let llm = Arc::new(StubLlmClient::new("calm seas"));
        let measurement = Arc::new(MeasurementAgent::new(sql, llm.clone(), "system"));
        let metadata = Arc::new(MetadataAgent::new(Arc::new(StubGraphAdapter::new()), llm.clone(), "system", vec![]));
        let semantic = Arc::new(SemanticAgent::new(Arc::new(StubVectorAdapter::new(Vec::<SemanticHit>::new())), vec![]));
        Orchestrator::new(measurement, metadata, semantic, llm, "narrate this", max_cycles, quality_threshold)
    }

    fn intent(mask: AgentMask) -> Intent {
        Intent {
            float_id: Some("7902073".to_string()),
            spatial_bounds: None,
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: mask,
            flags: IntentFlags::default(),
            limit: 50,
        }
    }

    #[tokio::test]
    async fn empty_agent_mask_reaches_error_without_running_any_agent() {
        let orchestrator = orchestrator(3, 0.7);
        let malformed = intent(AgentMask::empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = orchestrator.run("temperature", malformed, deadline, None).await;
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn high_quality_result_completes_in_a_single_cycle() {
        let orchestrator = orchestrator(3, 0.0);
        let deadline = Instant::now() + Duration::from_secs(5);
        let output = orchestrator
            .run(
                "temperature at float 7902073",
                intent(AgentMask::new(&[AgentKind::Measurement]).unwrap()),
                deadline,
                None,
            )
            .await
            .unwrap();
        assert_eq!(output.cycles_used, 0);
    }

    #[tokio::test]
    async fn unreachable_quality_gate_stops_at_max_cycles() {
        let orchestrator = orchestrator(2, 1.1);
        let deadline = Instant::now() + Duration::from_secs(5);
        let output = orchestrator
            .run(
                "temperature at float 7902073",
                intent(AgentMask::new(&[AgentKind::Measurement]).unwrap()),
                deadline,
                None,
            )
            .await
            .unwrap();
        assert_eq!(output.cycles_used, 2);
    }

    #[tokio::test]
    async fn immediate_deadline_fails_with_agent_timeout() {
        let orchestrator = orchestrator(3, 0.7);
        let deadline = Instant::now();
        let result = orchestrator
            .run(
                "temperature at float 7902073",
                intent(AgentMask::new(&[AgentKind::Measurement]).unwrap()),
                deadline,
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::AgentTimeout { .. })));
    }
}
