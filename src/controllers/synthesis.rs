use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::synthesis::{
        RunConfig, RunRequest, RunSummary, SynthesisService, SynthesisServiceApi, DEFAULT_VOICE,
    },
    error::{AppError, AppResult},
};

/// Request for POST /api/synthesis
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub session_id: Option<Uuid>,
}

/// Request for POST /api/synthesis/estimate
#[derive(Debug, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub text: String,
    pub chunk_size: Option<usize>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EstimateResponse {
    pub chunks: usize,
    pub batches: usize,
}

pub struct SynthesisController {
    synthesis_service: Arc<SynthesisService>,
    defaults: RunConfig,
}

impl SynthesisController {
    pub fn new(synthesis_service: Arc<SynthesisService>, defaults: RunConfig) -> Self {
        Self {
            synthesis_service,
            defaults,
        }
    }

    /// POST /api/synthesis - Synthesize a text across the credential pool
    pub async fn synthesize(
        State(controller): State<Arc<SynthesisController>>,
        Json(request): Json<SynthesisRequest>,
    ) -> AppResult<Json<RunSummary>> {
        if request.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text cannot be empty".to_string()));
        }

        let voice = request
            .voice
            .filter(|voice| !voice.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());

        let config = RunConfig {
            chunk_size: request.chunk_size.unwrap_or(controller.defaults.chunk_size),
            max_concurrency: request
                .max_concurrency
                .unwrap_or(controller.defaults.max_concurrency),
        };

        let mut run = RunRequest::new(request.text, voice, config);
        run.session_id = request.session_id;

        let result = controller.synthesis_service.start_run(run).await?;

        Ok(Json(RunSummary::from(&result)))
    }

    /// POST /api/synthesis/estimate - Predict chunk and batch counts
    pub async fn estimate(
        State(controller): State<Arc<SynthesisController>>,
        Json(request): Json<EstimateRequest>,
    ) -> AppResult<Json<EstimateResponse>> {
        let estimate = controller.synthesis_service.estimate(
            &request.text,
            request.chunk_size.unwrap_or(controller.defaults.chunk_size),
            request
                .max_concurrency
                .unwrap_or(controller.defaults.max_concurrency),
        );

        Ok(Json(EstimateResponse {
            chunks: estimate.chunks,
            batches: estimate.batches,
        }))
    }
}
