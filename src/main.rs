use std::sync::Arc;
use speechbatch_backend::controllers::{
    credentials::CredentialsController, health::HealthState, sessions::SessionsController,
    synthesis::SynthesisController,
};
use speechbatch_backend::domain::credentials::CredentialTracker;
use speechbatch_backend::domain::synthesis::{
    BatchScheduler, ChunkProcessor, RetryPolicy, RunConfig, SynthesisService, SynthesisServiceApi,
};
use speechbatch_backend::infrastructure::audio::WavMerger;
use speechbatch_backend::infrastructure::config::{Config, LogFormat, SessionStoreKind};
use speechbatch_backend::infrastructure::db::{check_connection, create_pool, run_migrations};
use speechbatch_backend::infrastructure::http::{build_router, start_http_server};
use speechbatch_backend::infrastructure::repositories::{
    GeminiSynthesisRepository, InMemorySessionRepository, PgSessionRepository, SessionRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting SpeechBatch Backend on {}:{}",
        config.host,
        config.port
    );

    // Session store
    let session_repo: Arc<dyn SessionRepository> = match config.session_store {
        SessionStoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required when SESSION_STORE=postgres")?;
            let pool = create_pool(database_url).await?;
            tracing::info!("Database connection pool created");

            check_connection(&pool).await?;
            run_migrations(&pool).await?;
            tracing::info!("Database connection verified and migrations applied");

            Arc::new(PgSessionRepository::new(Arc::new(pool)))
        }
        SessionStoreKind::Memory => {
            tracing::info!(
                cache_capacity = config.session_cache_capacity,
                "Using in-memory session store"
            );
            Arc::new(InMemorySessionRepository::new(config.session_cache_capacity))
        }
    };

    // Credential pool
    let tracker = Arc::new(CredentialTracker::new(config.default_max_concurrency));
    if config.api_keys.is_empty() {
        tracing::warn!("No API keys configured, supply them with PUT /api/credentials");
    } else {
        let accepted = tracker.set_credentials(&config.api_keys)?;
        tracing::info!(accepted, "Credential pool loaded from environment");
    }

    // Synthesis client
    tracing::info!(model = %config.gemini_model, "Initializing synthesis client");
    let synth_repo = Arc::new(GeminiSynthesisRepository::new(
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
        config.request_timeout(),
    )?);

    // Scheduling pipeline
    let retry_policy = RetryPolicy::new(
        config.chunk_max_retries,
        config.retry_base_delay(),
        config.retry_step_delay(),
    );
    let processor = Arc::new(ChunkProcessor::new(
        tracker.clone(),
        synth_repo,
        retry_policy,
    ));
    let scheduler = Arc::new(
        BatchScheduler::new(tracker.clone(), processor.clone(), session_repo.clone())
            .with_max_retries(config.chunk_max_retries)
            .with_inter_batch_delay(config.inter_batch_delay()),
    );
    let synthesis_service = Arc::new(
        SynthesisService::new(
            tracker.clone(),
            processor,
            scheduler,
            session_repo.clone(),
            Arc::new(WavMerger::default()),
        )
        .with_manual_max_retries(config.manual_retry_max_retries)
        .with_session_max_age(config.session_max_age()),
    );

    spawn_session_reaper(synthesis_service.clone(), &config);

    // Controllers
    let defaults = RunConfig {
        chunk_size: config.default_chunk_size,
        max_concurrency: config.default_max_concurrency,
    };
    let health_state = Arc::new(HealthState {
        session_repo,
        tracker: tracker.clone(),
    });
    let credentials_controller = Arc::new(CredentialsController::new(tracker));
    let synthesis_controller = Arc::new(SynthesisController::new(
        synthesis_service.clone(),
        defaults,
    ));
    let sessions_controller = Arc::new(SessionsController::new(synthesis_service));

    let app = build_router(
        health_state,
        credentials_controller,
        synthesis_controller,
        sessions_controller,
    );

    start_http_server(Arc::new(config), app).await?;

    Ok(())
}

/// Periodically drop sessions older than the configured max age
fn spawn_session_reaper(service: Arc<SynthesisService>, config: &Config) {
    let interval = config.session_purge_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match service.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
                Err(e) => tracing::error!(error = %e, "Failed to purge expired sessions"),
            }
        }
    });
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "speechbatch_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "speechbatch_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
