//! Layered configuration: TOML file → environment overrides → CLI overrides → validate.
//!
//! Mirrors the teacher's `Config::load()` pipeline. The closed environment
//! variable set and the vocabulary/prompt tables below are policy, not code:
//! nothing in the orchestration core hardcodes a region name, a parameter
//! keyword, or a prompt string.

use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::models::BoundingBox;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub environment: Environment,
    pub server: ServerConfig,
    pub cors_origins: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub orchestrator: OrchestratorConfig,
    pub session: SessionConfig,
    pub backends: BackendsConfig,
    pub llm: LlmConfig,
    pub vocabulary: VocabularyConfig,
    pub prompts: PromptsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "oceanus-gateway".to_string(),
            environment: Environment::Development,
            server: ServerConfig::default(),
            cors_origins: vec!["*".to_string()],
            allowed_hosts: vec!["*".to_string()],
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            session: SessionConfig::default(),
            backends: BackendsConfig::default(),
            llm: LlmConfig::default(),
            vocabulary: VocabularyConfig::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub health_check_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, workers: 4, health_check_interval_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub calls: u32,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true, calls: 60, period_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_cycles: u32,
    pub quality_threshold: f64,
    pub agent_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_cycles: 3, quality_threshold: 0.7, agent_timeout_secs: 120 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_secs: u64,
    pub max_messages_per_session: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_secs: 3600, max_messages_per_session: 50, cleanup_interval_secs: 300 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendsConfig {
    pub sql_url: String,
    pub graph_url: String,
    pub graph_user: String,
    pub graph_pass: String,
    pub vector_api_key: String,
    pub vector_env: String,
    pub vector_index: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { api_base: "https://api.openai.com/v1".to_string(), api_key: String::new(), model: "gpt-4o-mini".to_string() }
    }
}

/// Closed vocabulary used by context extraction (`session_store`) and by the
/// agents' keyword-family routing (measurement/metadata/semantic demand
/// detection). Stated here, not hardcoded in matching logic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub regions: Vec<String>,
    pub parameters: Vec<String>,
    pub float_id_regex: String,
    /// Approximate bounding box per named region, used by the intent parser
    /// to turn a region mention into `spatial_bounds` without a geocoding
    /// service. Any region named in `regions` but absent here is still
    /// recognized as a vocabulary hit (for context extraction) but produces
    /// no spatial bounds on its own.
    pub region_bounds: HashMap<String, BoundingBox>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        let mut region_bounds = HashMap::new();
        region_bounds.insert(
            "arabian sea".to_string(),
            BoundingBox { min_lat: 10.0, max_lat: 25.0, min_lon: 55.0, max_lon: 75.0 },
        );
        region_bounds.insert(
            "bay of bengal".to_string(),
            BoundingBox { min_lat: 5.0, max_lat: 22.0, min_lon: 80.0, max_lon: 100.0 },
        );
        region_bounds.insert(
            "indian ocean".to_string(),
            BoundingBox { min_lat: -40.0, max_lat: 30.0, min_lon: 20.0, max_lon: 120.0 },
        );
        region_bounds.insert(
            "atlantic ocean".to_string(),
            BoundingBox { min_lat: -60.0, max_lat: 60.0, min_lon: -70.0, max_lon: 20.0 },
        );
        region_bounds.insert(
            "southern ocean".to_string(),
            BoundingBox { min_lat: -90.0, max_lat: -60.0, min_lon: -180.0, max_lon: 180.0 },
        );
        region_bounds.insert(
            "equatorial".to_string(),
            BoundingBox { min_lat: -10.0, max_lat: 10.0, min_lon: -180.0, max_lon: 180.0 },
        );

        Self {
            regions: vec![
                "arabian sea".to_string(),
                "bay of bengal".to_string(),
                "indian ocean".to_string(),
                "pacific ocean".to_string(),
                "atlantic ocean".to_string(),
                "southern ocean".to_string(),
                "equatorial".to_string(),
            ],
            parameters: vec!["temperature".to_string(), "salinity".to_string(), "pressure".to_string()],
            float_id_regex: r"\b\d{7}\b".to_string(),
            region_bounds,
        }
    }
}

/// Prompt templates live in configuration, never inline in agent logic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub sql_generation_system: String,
    pub cypher_generation_system: String,
    pub router_classification_system: String,
    pub narrative_summary_system: String,
    pub conversational_system: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            sql_generation_system: concat!(
                "You write read-only SQL against a time-series measurements schema: ",
                "table `measurements(platform_id text, time timestamptz, lat double, lon double, ",
                "pressure double, temperature double, salinity double)` indexed on (platform_id, time). ",
                "Always SELECT the full column list (platform_id, time, lat, lon, pressure, temperature, ",
                "salinity) even for list-style requests such as 'list platform IDs', so every row remains a ",
                "complete measurement; never project a narrower column set. ",
                "Return ONLY the SQL statement, no prose, no code fences.",
            )
            .to_string(),
            cypher_generation_system: concat!(
                "You write read-only Cypher against a graph of (:Float)-[:DEPLOYED_IN]->(:Region) ",
                "nodes with properties platform_id, program, status, name, float_count. ",
                "List queries MUST include `LIMIT 50`. Return ONLY the Cypher statement.",
            )
            .to_string(),
            router_classification_system: concat!(
                "Classify the user message as exactly one word: `conversational` or `oceanographic`. ",
                "`conversational` means small talk, greetings, or thanks with no data request. ",
                "Everything about floats, measurements, regions, or ocean data is `oceanographic`.",
            )
            .to_string(),
            narrative_summary_system: concat!(
                "You summarize oceanographic query results for a user in plain language. ",
                "Be concise, cite concrete numbers from the data given, and never invent values.",
            )
            .to_string(),
            conversational_system: concat!(
                "You are the small-talk voice of an oceanographic data assistant. Reply briefly and ",
                "warmly to greetings and thanks. Do not answer data questions here; if the user asks ",
                "about floats, measurements, or regions, say you'll look into the data.",
            )
            .to_string(),
        }
    }
}

/// Command line overrides, highest priority, mirroring the teacher's
/// `CommandLineArgs` shape.
#[derive(Parser, Debug, Clone)]
#[command(name = "oceanus-gateway")]
#[command(version, about = "Oceanographic float data query orchestration gateway")]
pub struct CommandLineArgs {
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u32>,

    #[arg(long, value_name = "THRESHOLD")]
    pub quality_threshold: Option<f64>,
}

impl Config {
    /// Loading order (priority low to high): defaults < TOML file <
    /// environment variables < CLI flags, then `validate()`.
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(path) = config_path {
            Self::from_toml(&path)?
        } else {
            tracing::warn!("configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file() -> Option<String> {
        let candidates = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        candidates
            .iter()
            .find(|p| Path::new(p).exists())
            .map(|p| p.to_string())
    }

    fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Supported environment variables: the closed set named in the spec's
    /// external-interfaces section.
    fn apply_env_overrides(&mut self) {
        use std::env::var;

        if let Ok(v) = var("APP_NAME") {
            self.app_name = v;
        }
        if let Ok(v) = var("ENVIRONMENT") {
            if let Some(env) = Environment::parse(&v) {
                self.environment = env;
            } else {
                tracing::warn!("ignoring invalid ENVIRONMENT override: {}", v);
            }
        }
        if let Ok(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = var("WORKERS").ok().and_then(|v| v.parse().ok()) {
            self.server.workers = v;
        }
        if let Ok(v) = var("CORS_ORIGINS") {
            self.cors_origins = split_csv(&v);
        }
        if let Ok(v) = var("ALLOWED_HOSTS") {
            self.allowed_hosts = split_csv(&v);
        }
        if let Some(v) = var("ENABLE_RATE_LIMITING").ok().and_then(|v| v.parse().ok()) {
            self.rate_limit.enabled = v;
        }
        if let Some(v) = var("RATE_LIMIT_CALLS").ok().and_then(|v| v.parse().ok()) {
            self.rate_limit.calls = v;
        }
        if let Some(v) = var("RATE_LIMIT_PERIOD").ok().and_then(|v| v.parse().ok()) {
            self.rate_limit.period_secs = v;
        }
        if let Ok(v) = var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = var("HEALTH_CHECK_INTERVAL").ok().and_then(|v| v.parse().ok()) {
            self.server.health_check_interval_secs = v;
        }
        if let Some(v) = var("MAX_CYCLES").ok().and_then(|v| v.parse().ok()) {
            self.orchestrator.max_cycles = v;
        }
        if let Some(v) = var("QUALITY_THRESHOLD").ok().and_then(|v| v.parse().ok()) {
            self.orchestrator.quality_threshold = v;
        }
        if let Some(v) = var("AGENT_TIMEOUT").ok().and_then(|v| v.parse().ok()) {
            self.orchestrator.agent_timeout_secs = v;
        }
        if let Some(v) = var("SESSION_TIMEOUT").ok().and_then(|v| v.parse().ok()) {
            self.session.timeout_secs = v;
        }
        if let Some(v) = var("MAX_MESSAGES_PER_SESSION").ok().and_then(|v| v.parse().ok()) {
            self.session.max_messages_per_session = v;
        }
        if let Some(v) = var("SESSION_CLEANUP_INTERVAL").ok().and_then(|v| v.parse().ok()) {
            self.session.cleanup_interval_secs = v;
        }
        if let Ok(v) = var("SQL_URL") {
            self.backends.sql_url = v;
        }
        if let Ok(v) = var("GRAPH_URL") {
            self.backends.graph_url = v;
        }
        if let Ok(v) = var("GRAPH_USER") {
            self.backends.graph_user = v;
        }
        if let Ok(v) = var("GRAPH_PASS") {
            self.backends.graph_pass = v;
        }
        if let Ok(v) = var("VECTOR_API_KEY") {
            self.backends.vector_api_key = v;
        }
        if let Ok(v) = var("VECTOR_ENV") {
            self.backends.vector_env = v;
        }
        if let Ok(v) = var("VECTOR_INDEX") {
            self.backends.vector_index = v;
        }
        if let Ok(v) = var("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = var("LLM_MODEL") {
            self.llm.model = v;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(v) = &args.host {
            self.server.host = v.clone();
        }
        if let Some(v) = args.port {
            self.server.port = v;
        }
        if let Some(v) = &args.log_level {
            self.logging.level = v.clone();
        }
        if let Some(v) = args.max_cycles {
            self.orchestrator.max_cycles = v;
        }
        if let Some(v) = args.quality_threshold {
            self.orchestrator.quality_threshold = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.rate_limit.calls == 0 {
            anyhow::bail!("rate_limit.calls must be > 0");
        }
        if !(0.0..=1.0).contains(&self.orchestrator.quality_threshold) {
            anyhow::bail!("orchestrator.quality_threshold must be within [0,1]");
        }
        match self.logging.level.split(',').next().unwrap_or("") {
            "DEBUG" | "INFO" | "WARNING" | "ERROR" | "CRITICAL" | "debug" | "info" | "warn" | "warning"
            | "error" | "trace" => {},
            other => anyhow::bail!("invalid LOG_LEVEL: {}", other),
        }
        Ok(())
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_quality_threshold() {
        let mut config = Config::default();
        config.orchestrator.quality_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_rate_limit_calls() {
        let mut config = Config::default();
        config.rate_limit.calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "VERBOSE".to_string();
        assert!(config.validate().is_err());
    }
}
