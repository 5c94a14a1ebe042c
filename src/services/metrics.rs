//! Metrics Registry: in-process counters and gauges rendered as JSON (for
//! `/metrics`) and Prometheus text (for `/metrics/prometheus`). Atomics only;
//! no external metrics crate, since the whole registry is a handful of
//! counters this process owns, per the spec's ambient-stack minimalism.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::models::AgentKind;

const RELAXED: Ordering = Ordering::Relaxed;

struct AgentCounters {
    queries_total: AtomicU64,
    errors_total: AtomicU64,
    healthy: AtomicBool,
}

impl AgentCounters {
    fn new() -> Self {
        Self { queries_total: AtomicU64::new(0), errors_total: AtomicU64::new(0), healthy: AtomicBool::new(true) }
    }
}

pub struct MetricsRegistry {
    measurement: AgentCounters,
    metadata: AgentCounters,
    semantic: AgentCounters,
    requests_total: AtomicU64,
    request_errors_total: AtomicU64,
    response_time_total_ms: AtomicU64,
    response_time_samples: AtomicU64,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            measurement: AgentCounters::new(),
            metadata: AgentCounters::new(),
            semantic: AgentCounters::new(),
            requests_total: AtomicU64::new(0),
            request_errors_total: AtomicU64::new(0),
            response_time_total_ms: AtomicU64::new(0),
            response_time_samples: AtomicU64::new(0),
        }
    }

    fn agent(&self, kind: AgentKind) -> &AgentCounters {
        match kind {
            AgentKind::Measurement => &self.measurement,
            AgentKind::Metadata => &self.metadata,
            AgentKind::Semantic => &self.semantic,
        }
    }

    pub fn record_agent_call(&self, kind: AgentKind, succeeded: bool) {
        let agent = self.agent(kind);
        agent.queries_total.fetch_add(1, RELAXED);
        if !succeeded {
            agent.errors_total.fetch_add(1, RELAXED);
        }
        agent.healthy.store(succeeded, RELAXED);
    }

    pub fn record_request(&self, succeeded: bool, response_time_ms: u64) {
        self.requests_total.fetch_add(1, RELAXED);
        if !succeeded {
            self.request_errors_total.fetch_add(1, RELAXED);
        }
        self.response_time_total_ms.fetch_add(response_time_ms, RELAXED);
        self.response_time_samples.fetch_add(1, RELAXED);
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.requests_total.load(RELAXED);
        if total == 0 {
            return 0.0;
        }
        self.request_errors_total.load(RELAXED) as f64 / total as f64
    }

    pub fn avg_response_time_seconds(&self) -> f64 {
        let samples = self.response_time_samples.load(RELAXED);
        if samples == 0 {
            return 0.0;
        }
        (self.response_time_total_ms.load(RELAXED) as f64 / samples as f64) / 1000.0
    }

    pub fn all_agents_healthy(&self) -> bool {
        self.measurement.healthy.load(RELAXED) && self.metadata.healthy.load(RELAXED) && self.semantic.healthy.load(RELAXED)
    }

    pub fn render_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests_total": self.requests_total.load(RELAXED),
            "request_errors_total": self.request_errors_total.load(RELAXED),
            "error_rate": self.error_rate(),
            "avg_response_time_seconds": self.avg_response_time_seconds(),
            "measurement_queries_total": self.measurement.queries_total.load(RELAXED),
            "measurement_errors_total": self.measurement.errors_total.load(RELAXED),
            "metadata_queries_total": self.metadata.queries_total.load(RELAXED),
            "metadata_errors_total": self.metadata.errors_total.load(RELAXED),
            "semantic_queries_total": self.semantic.queries_total.load(RELAXED),
            "semantic_errors_total": self.semantic.errors_total.load(RELAXED),
            "agent_healthy": {
                "measurement": self.measurement.healthy.load(RELAXED),
                "metadata": self.metadata.healthy.load(RELAXED),
                "semantic": self.semantic.healthy.load(RELAXED),
            },
        })
    }

    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let counter = |out: &mut String, name: &str, value: u64| {
            out.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        };
        let gauge = |out: &mut String, name: &str, value: f64| {
            out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
        };

        counter(&mut out, "requests_total", self.requests_total.load(RELAXED));
        counter(&mut out, "request_errors_total", self.request_errors_total.load(RELAXED));
        counter(&mut out, "measurement_queries_total", self.measurement.queries_total.load(RELAXED));
        counter(&mut out, "measurement_errors_total", self.measurement.errors_total.load(RELAXED));
        counter(&mut out, "metadata_queries_total", self.metadata.queries_total.load(RELAXED));
        counter(&mut out, "metadata_errors_total", self.metadata.errors_total.load(RELAXED));
        counter(&mut out, "semantic_queries_total", self.semantic.queries_total.load(RELAXED));
        counter(&mut out, "semantic_errors_total", self.semantic.errors_total.load(RELAXED));
        gauge(&mut out, "error_rate", self.error_rate());
        gauge(&mut out, "avg_response_time_seconds", self.avg_response_time_seconds());
        for (kind, healthy) in [
            ("measurement", self.measurement.healthy.load(RELAXED)),
            ("metadata", self.metadata.healthy.load(RELAXED)),
            ("semantic", self.semantic.healthy.load(RELAXED)),
        ] {
            out.push_str(&format!("agent_healthy{{agent=\"{kind}\"}} {}\n", if healthy { 1 } else { 0 }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_reflects_recorded_failures() {
        let metrics = MetricsRegistry::new();
        metrics.record_request(true, 10);
        metrics.record_request(false, 20);
        assert!((metrics.error_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn agent_failure_marks_it_unhealthy_until_a_success() {
        let metrics = MetricsRegistry::new();
        metrics.record_agent_call(AgentKind::Semantic, false);
        assert!(!metrics.all_agents_healthy());
        metrics.record_agent_call(AgentKind::Semantic, true);
        assert!(metrics.all_agents_healthy());
    }

    #[test]
    fn prometheus_output_includes_counter_and_gauge_lines() {
        let metrics = MetricsRegistry::new();
        let text = metrics.render_prometheus();
        assert!(text.contains("requests_total"));
        assert!(text.contains("agent_healthy{agent=\"measurement\"}"));
    }
}
