mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod retry;
mod routes;
mod skills;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::interview::analyzer::ResponseAnalyzer;
use crate::interview::registry::{spawn_sweeper, SessionRegistry};
use crate::interview::service::InterviewService;
use crate::interview::session_store::PgSessionRepository;
use crate::interview::worker::{self, TurnWorker};
use crate::llm_client::{ChatModel, LlmClient};
use crate::routes::build_router;
use crate::skills::aggregator::SkillAggregator;
use crate::skills::repository::PgSkillRepository;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm: Arc<dyn ChatModel> = Arc::new(LlmClient::new(config.anthropic_api_key.clone()));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Session registry with idle eviction
    let registry = Arc::new(SessionRegistry::new(config.max_root_resets));
    spawn_sweeper(
        registry.clone(),
        Duration::from_secs(config.session_ttl_secs),
        Duration::from_secs(config.session_sweep_interval_secs.max(1)),
    );

    // Background turn worker
    let (jobs, shards) = worker::channel(config.background_queue_capacity, config.worker_shards);
    TurnWorker::new(
        registry.clone(),
        ResponseAnalyzer::new(llm.clone(), Duration::from_secs(config.analysis_timeout_secs)),
        SkillAggregator::new(Arc::new(PgSkillRepository::new(db.clone()))),
        Arc::new(PgSessionRepository::new(db, s3, config.s3_bucket.clone())),
        config.summary_interval_turns,
    )
    .spawn(shards);
    info!(
        "Turn worker ready ({} shards, queue capacity {}, summary every {} turns)",
        config.worker_shards, config.background_queue_capacity, config.summary_interval_turns
    );

    let state = AppState {
        interview: Arc::new(InterviewService::new(registry, llm, jobs)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interview-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
