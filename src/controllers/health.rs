use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::credentials::CredentialTracker;
use crate::infrastructure::repositories::SessionRepository;

/// Dependencies probed by the readiness check
pub struct HealthState {
    pub session_repo: Arc<dyn SessionRepository>,
    pub tracker: Arc<CredentialTracker>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let healthy_credentials = state.tracker.healthy_count();
    let credentials = if healthy_credentials > 0 {
        "available"
    } else {
        "exhausted"
    };

    match state.session_repo.check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "session_store": "connected",
                "credentials": credentials,
                "healthy_credentials": healthy_credentials
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Session store check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "session_store": "disconnected",
                    "credentials": credentials,
                    "healthy_credentials": healthy_credentials
                })),
            )
        }
    }
}
