use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::session::{Session, SessionStatus},
    domain::synthesis::{FailureRecord, RunSummary, SynthesisService, SynthesisServiceApi},
    error::{AppError, AppResult},
    infrastructure::audio::WAV_CONTENT_TYPE,
};

pub const X_MISSING_CHUNKS: &str = "x-missing-chunks";

const PREVIEW_CHARS: usize = 80;

/// Session listing entry, without the full source text
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub status: SessionStatus,
    pub voice: String,
    pub preview: String,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            status: session.status,
            voice: session.voice.clone(),
            preview: session.source_text.chars().take(PREVIEW_CHARS).collect(),
            total_chunks: session.total_chunks,
            completed_chunks: session.completed_indices.len(),
            failed_chunks: session.failures.len(),
            updated_at: session.updated_at,
        }
    }
}

/// Full session state, as returned by GET /api/sessions/:id
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub status: SessionStatus,
    pub source_text: String,
    pub voice: String,
    pub chunk_size: usize,
    pub max_concurrency: usize,
    pub total_chunks: usize,
    pub completed_indices: Vec<usize>,
    pub failures: Vec<FailureRecord>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            status: session.status,
            source_text: session.source_text,
            voice: session.voice,
            chunk_size: session.chunk_size,
            max_concurrency: session.max_concurrency,
            total_chunks: session.total_chunks,
            completed_indices: session.completed_indices.into_iter().collect(),
            failures: session.failures,
            error_message: session.error_message,
            started_at: session.started_at,
            ended_at: session.ended_at,
            updated_at: session.updated_at,
        }
    }
}

/// Optional body for a manual chunk retry
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RetryChunkRequest {
    pub credential: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub struct SessionsController {
    synthesis_service: Arc<SynthesisService>,
}

impl SessionsController {
    pub fn new(synthesis_service: Arc<SynthesisService>) -> Self {
        Self { synthesis_service }
    }

    /// GET /api/sessions - List sessions that can be resumed
    pub async fn list_sessions(
        State(controller): State<Arc<SessionsController>>,
    ) -> AppResult<Json<Vec<SessionSummary>>> {
        let sessions = controller.synthesis_service.list_resumable().await?;
        Ok(Json(sessions.iter().map(SessionSummary::from).collect()))
    }

    /// GET /api/sessions/:id - Get a session's full state
    pub async fn get_session(
        State(controller): State<Arc<SessionsController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<SessionResponse>> {
        let session = controller.synthesis_service.get_session(id).await?;
        Ok(Json(SessionResponse::from(session)))
    }

    /// DELETE /api/sessions/:id - Delete a session and its cached audio
    pub async fn delete_session(
        State(controller): State<Arc<SessionsController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller.synthesis_service.delete_session(id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// POST /api/sessions/:id/resume - Continue a partial or failed session
    pub async fn resume_session(
        State(controller): State<Arc<SessionsController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<RunSummary>> {
        let result = controller.synthesis_service.resume_session(id).await?;
        Ok(Json(RunSummary::from(&result)))
    }

    /// POST /api/sessions/:id/cancel - Stop an active run after its current batch
    pub async fn cancel_session(
        State(controller): State<Arc<SessionsController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<CancelResponse>> {
        let cancelled = controller.synthesis_service.cancel_run(id);
        Ok(Json(CancelResponse { cancelled }))
    }

    /// POST /api/sessions/:id/chunks/:index/retry - Retry one failed chunk
    pub async fn retry_chunk(
        State(controller): State<Arc<SessionsController>>,
        Path((id, index)): Path<(Uuid, usize)>,
        request: Option<Json<RetryChunkRequest>>,
    ) -> AppResult<Json<SessionResponse>> {
        let credential = request
            .and_then(|Json(request)| request.credential)
            .filter(|credential| !credential.trim().is_empty());

        let session = controller
            .synthesis_service
            .retry_chunk(id, index, credential)
            .await?;

        Ok(Json(SessionResponse::from(session)))
    }

    /// GET /api/sessions/:id/audio - Download the merged WAV
    ///
    /// Chunks without audio are skipped and listed in the `x-missing-chunks` header.
    pub async fn merged_audio(
        State(controller): State<Arc<SessionsController>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Response> {
        let merged = controller.synthesis_service.merged_audio(id).await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(merged.content_type),
        );
        headers.insert(
            header::CONTENT_DISPOSITION,
            attachment(&format!("session-{}.wav", id))?,
        );

        if !merged.missing_chunks.is_empty() {
            let missing = merged
                .missing_chunks
                .iter()
                .map(|index| index.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let value = HeaderValue::from_str(&missing)
                .map_err(|e| AppError::Internal(format!("Invalid header value: {}", e)))?;
            headers.insert(X_MISSING_CHUNKS, value);
        }

        Ok((StatusCode::OK, headers, merged.bytes).into_response())
    }

    /// GET /api/sessions/:id/chunks/:index/audio - Download one chunk as WAV
    pub async fn chunk_audio(
        State(controller): State<Arc<SessionsController>>,
        Path((id, index)): Path<(Uuid, usize)>,
    ) -> AppResult<Response> {
        let bytes = controller.synthesis_service.chunk_audio(id, index).await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(WAV_CONTENT_TYPE),
        );
        headers.insert(
            header::CONTENT_DISPOSITION,
            attachment(&format!("session-{}-chunk-{}.wav", id, index))?,
        );

        Ok((StatusCode::OK, headers, bytes).into_response())
    }
}

fn attachment(filename: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| AppError::Internal(format!("Invalid header value: {}", e)))
}
