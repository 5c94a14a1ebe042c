use axum::middleware as axum_middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use oceanus_gateway::config::Config;
use oceanus_gateway::services::adapters::{
    Neo4jGraphAdapter, PineconeVectorAdapter, SqlxSqlAdapter, StubGraphAdapter, StubSqlAdapter, StubVectorAdapter,
};
use oceanus_gateway::services::agents::{MeasurementAgent, MetadataAgent, SemanticAgent};
use oceanus_gateway::services::llm::{HttpLlmClient, LlmClient, StubLlmClient};
use oceanus_gateway::services::{IntentParser, MetricsRegistry, Orchestrator, RateLimiter, SessionSweeper, SessionStore};
use oceanus_gateway::utils::ScheduledExecutor;
use oceanus_gateway::{handlers, middleware, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    tracing_subscriber::registry().with(log_filter).with(tracing_subscriber::fmt::layer()).init();

    tracing::info!("oceanus-gateway starting up");
    tracing::info!("configuration loaded successfully");

    let app_state = Arc::new(build_state(&config).await?);
    tracing::info!("adapters, agents, and orchestrator constructed");

    let sweeper = Arc::new(SessionSweeper::new(Arc::clone(&app_state.session_store)));
    let sweep_interval = std::time::Duration::from_secs(app_state.session_store.cleanup_interval_secs());
    tokio::spawn(async move {
        ScheduledExecutor::new("session-sweeper", sweep_interval).start(sweeper).await;
    });
    tracing::info!("session sweeper started");

    app_state.ready.store(true, std::sync::atomic::Ordering::Relaxed);

    let chat_routes = Router::new()
        .route("/api/v1/chat", post(handlers::chat::chat))
        .route("/api/v1/chat/stream", post(handlers::chat::chat_stream))
        .layer(axum_middleware::from_fn_with_state(Arc::clone(&app_state), middleware::rate_limit_middleware));

    let session_routes = Router::new()
        .route("/api/v1/sessions/create", post(handlers::sessions::create_session))
        .route("/api/v1/sessions/:id", get(handlers::sessions::get_session).delete(handlers::sessions::delete_session))
        .route("/api/v1/sessions/:id/history", get(handlers::sessions::get_history))
        .route("/api/v1/sessions/:id/context", get(handlers::sessions::get_context))
        .route("/api/v1/sessions/:id/preferences", put(handlers::sessions::update_preferences))
        .route("/api/v1/sessions/", get(handlers::sessions::list_stats));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/ready", get(handlers::health::health_ready))
        .route("/health/detailed", get(handlers::health::health_detailed));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics::metrics_json))
        .route("/metrics/prometheus", get(handlers::metrics::metrics_prometheus));

    let cors = build_cors(&config.cors_origins);

    let app = Router::new()
        .merge(chat_routes)
        .merge(session_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .with_state(Arc::clone(&app_state))
        .layer(axum_middleware::from_fn(middleware::security_headers_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server listening on http://{}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn build_cors(origins: &[String]) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{AllowOrigin, CorsLayer};

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Builds every backend adapter, agent, and the orchestration core from
/// `config.backends`. A backend whose URL/key is unset falls back to its
/// stub so the gateway still boots (and answers health checks) in a
/// development environment without live data stores.
async fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let llm: Arc<dyn LlmClient> = if config.llm.api_key.is_empty() {
        tracing::warn!("LLM_API_KEY not set, falling back to the stub LLM client");
        Arc::new(StubLlmClient::new("I don't have enough information to answer that."))
    } else {
        Arc::new(HttpLlmClient::new(config.llm.api_base.clone(), config.llm.api_key.clone(), config.llm.model.clone()))
    };

    let sql: Arc<dyn oceanus_gateway::services::SqlAdapter> = if config.backends.sql_url.is_empty() {
        tracing::warn!("SQL_URL not set, falling back to the stub SQL adapter");
        Arc::new(StubSqlAdapter::new(Vec::new()))
    } else {
        let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(&config.backends.sql_url).await?;
        Arc::new(SqlxSqlAdapter::new(pool))
    };

    let graph: Arc<dyn oceanus_gateway::services::GraphAdapter> = if config.backends.graph_url.is_empty() {
        tracing::warn!("GRAPH_URL not set, falling back to the stub graph adapter");
        Arc::new(StubGraphAdapter::new())
    } else {
        Arc::new(Neo4jGraphAdapter::connect(&config.backends.graph_url, &config.backends.graph_user, &config.backends.graph_pass).await?)
    };

    let vector: Arc<dyn oceanus_gateway::services::VectorAdapter> = if config.backends.vector_api_key.is_empty() {
        tracing::warn!("VECTOR_API_KEY not set, falling back to the stub vector adapter");
        Arc::new(StubVectorAdapter::new(Vec::new()))
    } else {
        let index_url = format!("https://{}-{}.svc.pinecone.io", config.backends.vector_index, config.backends.vector_env);
        Arc::new(PineconeVectorAdapter::new(index_url, config.backends.vector_api_key.clone()))
    };

    let measurement = Arc::new(MeasurementAgent::new(sql, llm.clone(), config.prompts.sql_generation_system.clone()));
    let metadata = Arc::new(MetadataAgent::new(
        graph,
        llm.clone(),
        config.prompts.cypher_generation_system.clone(),
        config.vocabulary.regions.clone(),
    ));
    let semantic = Arc::new(SemanticAgent::new(vector, config.vocabulary.regions.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        measurement,
        metadata,
        semantic,
        llm.clone(),
        config.prompts.narrative_summary_system.clone(),
        config.orchestrator.max_cycles,
        config.orchestrator.quality_threshold,
    ));

    Ok(AppState {
        config: config.clone(),
        session_store: Arc::new(SessionStore::new(&config.session, &config.vocabulary)),
        rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
        metrics: Arc::new(MetricsRegistry::new()),
        llm,
        intent_parser: Arc::new(IntentParser::new(&config.vocabulary)),
        orchestrator,
        ready: AtomicBool::new(false),
    })
}
