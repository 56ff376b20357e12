use crate::domain::chunking::{clamp_chunk_size, DEFAULT_CHUNK_SIZE};
use crate::domain::credentials::{
    CredentialTracker, DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
use crate::domain::session::DEFAULT_SESSION_MAX_AGE_HOURS;
use crate::domain::synthesis::retry::{DEFAULT_CHUNK_MAX_RETRIES, DEFAULT_MANUAL_MAX_RETRIES};
use crate::infrastructure::repositories::gemini_synthesis_repository::{
    DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL,
};
use crate::infrastructure::repositories::session_repository::DEFAULT_ARTIFACT_CACHE_CAPACITY;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Credentials loaded at startup, more can be supplied over HTTP
    pub api_keys: Vec<String>,
    // Synthesis endpoint
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub request_timeout_secs: u64,
    // Scheduling
    pub default_chunk_size: usize,
    pub default_max_concurrency: usize,
    pub chunk_max_retries: u32,
    pub manual_retry_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_step_delay_ms: u64,
    pub inter_batch_delay_ms: u64,
    // Session store
    pub session_store: SessionStoreKind,
    pub database_url: Option<String>,
    pub session_max_age_hours: i64,
    pub session_cache_capacity: u64,
    pub session_purge_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    Memory,
    Postgres,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let session_store = match env::var("SESSION_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => SessionStoreKind::Postgres,
            _ => SessionStoreKind::Memory,
        };

        let database_url = env::var("DATABASE_URL").ok();
        if session_store == SessionStoreKind::Postgres && database_url.is_none() {
            return Err("DATABASE_URL is required when SESSION_STORE=postgres".into());
        }

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            api_keys: env::var("SYNTH_API_KEYS")
                .map(|keys| CredentialTracker::parse_credentials(&keys))
                .unwrap_or_default(),
            gemini_api_base: env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            request_timeout_secs: env::var("SYNTH_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            default_chunk_size: clamp_chunk_size(
                env::var("DEFAULT_CHUNK_SIZE")
                    .unwrap_or_else(|_| DEFAULT_CHUNK_SIZE.to_string())
                    .parse()?,
            ),
            default_max_concurrency: env::var("DEFAULT_MAX_CONCURRENCY")
                .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENCY.to_string())
                .parse::<usize>()?
                .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            chunk_max_retries: env::var("CHUNK_MAX_RETRIES")
                .unwrap_or_else(|_| DEFAULT_CHUNK_MAX_RETRIES.to_string())
                .parse()?,
            manual_retry_max_retries: env::var("MANUAL_RETRY_MAX_RETRIES")
                .unwrap_or_else(|_| DEFAULT_MANUAL_MAX_RETRIES.to_string())
                .parse()?,
            retry_base_delay_ms: env::var("RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            retry_step_delay_ms: env::var("RETRY_STEP_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            inter_batch_delay_ms: env::var("INTER_BATCH_DELAY_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            session_store,
            database_url,
            session_max_age_hours: env::var("SESSION_MAX_AGE_HOURS")
                .unwrap_or_else(|_| DEFAULT_SESSION_MAX_AGE_HOURS.to_string())
                .parse::<i64>()?
                .max(1),
            session_cache_capacity: env::var("SESSION_CACHE_CAPACITY")
                .unwrap_or_else(|_| DEFAULT_ARTIFACT_CACHE_CAPACITY.to_string())
                .parse()?,
            session_purge_interval_secs: env::var("SESSION_PURGE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse::<u64>()?
                .max(1),
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_step_delay(&self) -> Duration {
        Duration::from_millis(self.retry_step_delay_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_max_age_hours)
    }

    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval_secs)
    }
}
