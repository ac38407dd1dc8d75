use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on a single response-analysis call before the heuristic takes over.
    pub analysis_timeout_secs: u64,
    /// Idle time after which a session's in-memory state is evicted.
    pub session_ttl_secs: u64,
    pub session_sweep_interval_secs: u64,
    /// Max queued background turn jobs, split across shards; further jobs are dropped.
    pub background_queue_capacity: usize,
    /// Background consumers; a session's turns always go to the same one.
    pub worker_shards: usize,
    pub summary_interval_turns: u32,
    pub max_root_resets: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            analysis_timeout_secs: env_or("ANALYSIS_TIMEOUT_SECS", 10)?,
            session_ttl_secs: env_or("SESSION_TTL_SECS", 3600)?,
            session_sweep_interval_secs: env_or("SESSION_SWEEP_INTERVAL_SECS", 60)?,
            background_queue_capacity: env_or("BACKGROUND_QUEUE_CAPACITY", 256)?,
            worker_shards: env_or::<usize>("WORKER_SHARDS", 4)?.max(1),
            summary_interval_turns: env_or("SUMMARY_INTERVAL_TURNS", 5)?,
            max_root_resets: env_or("MAX_ROOT_RESETS", 3)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
