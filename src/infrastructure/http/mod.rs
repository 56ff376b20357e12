pub mod request_id;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

use crate::controllers::{
    credentials::CredentialsController,
    health::{self, HealthState},
    sessions::SessionsController,
    synthesis::SynthesisController,
};
use crate::infrastructure::config::Config;

/// Build the application router with all routes configured
pub fn build_router(
    health_state: Arc<HealthState>,
    credentials_controller: Arc<CredentialsController>,
    synthesis_controller: Arc<SynthesisController>,
    sessions_controller: Arc<SessionsController>,
) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(health_state);

    let credential_routes = Router::new()
        .route(
            "/api/credentials",
            get(CredentialsController::list_credentials).put(CredentialsController::set_credentials),
        )
        .route(
            "/api/credentials/concurrency",
            put(CredentialsController::set_concurrency),
        )
        .with_state(credentials_controller);

    let synthesis_routes = Router::new()
        .route("/api/synthesis", post(SynthesisController::synthesize))
        .route("/api/synthesis/estimate", post(SynthesisController::estimate))
        .with_state(synthesis_controller);

    let session_routes = Router::new()
        .route("/api/sessions", get(SessionsController::list_sessions))
        .route(
            "/api/sessions/:id",
            get(SessionsController::get_session).delete(SessionsController::delete_session),
        )
        .route("/api/sessions/:id/resume", post(SessionsController::resume_session))
        .route("/api/sessions/:id/cancel", post(SessionsController::cancel_session))
        .route("/api/sessions/:id/audio", get(SessionsController::merged_audio))
        .route(
            "/api/sessions/:id/chunks/:index/retry",
            post(SessionsController::retry_chunk),
        )
        .route(
            "/api/sessions/:id/chunks/:index/audio",
            get(SessionsController::chunk_audio),
        )
        .with_state(sessions_controller);

    Router::new()
        .merge(health_routes)
        .merge(credential_routes)
        .merge(synthesis_routes)
        .merge(session_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the configured address and serve the router
pub async fn start_http_server(
    config: Arc<Config>,
    app: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
