use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    domain::credentials::{CredentialStats, CredentialTracker},
    error::{AppError, AppResult},
};

/// Request for PUT /api/credentials, either a list or a pasted block
#[derive(Debug, Serialize, Deserialize)]
pub struct SetCredentialsRequest {
    pub keys: Option<Vec<String>>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetCredentialsResponse {
    pub accepted: usize,
    pub effective_concurrency: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsResponse {
    pub credentials: Vec<CredentialStats>,
    pub healthy: usize,
    pub max_concurrency: usize,
    pub effective_concurrency: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConcurrencyRequest {
    pub max_concurrency: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConcurrencyResponse {
    pub max_concurrency: usize,
    pub effective_concurrency: usize,
}

pub struct CredentialsController {
    tracker: Arc<CredentialTracker>,
}

impl CredentialsController {
    pub fn new(tracker: Arc<CredentialTracker>) -> Self {
        Self { tracker }
    }

    /// PUT /api/credentials - Replace the credential pool
    pub async fn set_credentials(
        State(controller): State<Arc<CredentialsController>>,
        Json(request): Json<SetCredentialsRequest>,
    ) -> AppResult<Json<SetCredentialsResponse>> {
        let keys = match (request.keys, request.text) {
            (Some(keys), _) => keys,
            (None, Some(text)) => CredentialTracker::parse_credentials(&text),
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Provide either keys or text".to_string(),
                ))
            }
        };

        let accepted = controller.tracker.set_credentials(keys)?;

        Ok(Json(SetCredentialsResponse {
            accepted,
            effective_concurrency: controller.tracker.effective_concurrency(),
        }))
    }

    /// GET /api/credentials - Masked credential health and usage
    pub async fn list_credentials(
        State(controller): State<Arc<CredentialsController>>,
    ) -> AppResult<Json<CredentialsResponse>> {
        let tracker = &controller.tracker;
        Ok(Json(CredentialsResponse {
            credentials: tracker.stats(),
            healthy: tracker.healthy_count(),
            max_concurrency: tracker.max_concurrency(),
            effective_concurrency: tracker.effective_concurrency(),
        }))
    }

    /// PUT /api/credentials/concurrency - Set the parallelism ceiling
    pub async fn set_concurrency(
        State(controller): State<Arc<CredentialsController>>,
        Json(request): Json<ConcurrencyRequest>,
    ) -> AppResult<Json<ConcurrencyResponse>> {
        let max_concurrency = controller
            .tracker
            .set_max_concurrency(request.max_concurrency);

        Ok(Json(ConcurrencyResponse {
            max_concurrency,
            effective_concurrency: controller.tracker.effective_concurrency(),
        }))
    }
}
