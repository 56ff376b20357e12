use super::error::{SchedulerError, SynthesisError, SynthesisErrorKind};
use super::model::{AudioArtifact, ChunkOutcome, FailureRecord, RunRequest, RunResult};
use super::processor::ChunkProcessor;
use super::retry::DEFAULT_CHUNK_MAX_RETRIES;
use crate::domain::chunking::{chunk_text, clamp_chunk_size, Chunk};
use crate::domain::credentials::{
    CredentialError, CredentialTracker, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
use crate::domain::session::Session;
use crate::infrastructure::repositories::SessionRepository;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_secs(3);

/// Drives a run as a sequence of concurrent batches, persisting the session
/// after every batch
pub struct BatchScheduler {
    tracker: Arc<CredentialTracker>,
    processor: Arc<ChunkProcessor>,
    session_repo: Arc<dyn SessionRepository>,
    max_retries: u32,
    inter_batch_delay: Duration,
}

impl BatchScheduler {
    pub fn new(
        tracker: Arc<CredentialTracker>,
        processor: Arc<ChunkProcessor>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            tracker,
            processor,
            session_repo,
            max_retries: DEFAULT_CHUNK_MAX_RETRIES,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    /// Execute a run to completion, cancellation, or pool exhaustion.
    ///
    /// Individual chunk failures never fail the run; they end up in
    /// `RunResult::failures` and in the stored session.
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunResult, SchedulerError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SchedulerError::Validation("text must not be empty".to_string()));
        }
        if self.tracker.credential_count() == 0 {
            return Err(SchedulerError::Validation(
                "no credentials configured".to_string(),
            ));
        }
        if !self.tracker.has_healthy_credentials() {
            return Err(CredentialError::NoCredentialAvailable.into());
        }

        let chunk_size = clamp_chunk_size(request.config.chunk_size);
        let chunks = chunk_text(text, chunk_size);
        let total_chunks = chunks.len();
        let requested = request
            .config
            .max_concurrency
            .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        let effective = self.tracker.effective_concurrency().min(requested).max(1);

        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
        let mut artifacts: BTreeMap<usize, AudioArtifact> = request
            .existing_artifacts
            .into_iter()
            .filter(|artifact| artifact.chunk_index < total_chunks)
            .map(|artifact| (artifact.chunk_index, artifact))
            .collect();

        let mut session = Session::new(
            session_id,
            text.to_string(),
            request.voice.clone(),
            chunk_size,
            requested,
            total_chunks,
        );
        if let Some(previous) = self.session_repo.get(session_id).await? {
            session.started_at = previous.started_at;
        }
        session.completed_indices = artifacts.keys().copied().collect();

        tracing::info!(
            session_id = %session_id,
            total_chunks = total_chunks,
            chunk_size = chunk_size,
            effective_concurrency = effective,
            resume_from = request.resume_from,
            already_completed = session.completed_indices.len(),
            "Starting synthesis run"
        );

        self.persist(&session, &artifacts).await?;

        let mut cancelled = false;
        let mut batch_start = request.resume_from.min(total_chunks);

        while batch_start < total_chunks {
            let batch_end = (batch_start + effective).min(total_chunks);
            let pending: Vec<Chunk> = chunks[batch_start..batch_end]
                .iter()
                .filter(|chunk| !session.completed_indices.contains(&chunk.index))
                .cloned()
                .collect();

            if pending.is_empty() {
                batch_start = batch_end;
                continue;
            }

            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let assignments = match self.tracker.distribute_for_batch(pending.len()) {
                Ok(assignments) => assignments,
                Err(err) => return Err(self.abort(session, &artifacts, err).await),
            };

            tracing::info!(
                session_id = %session_id,
                batch_start = batch_start,
                batch_end = batch_end,
                chunks = pending.len(),
                "Dispatching batch"
            );

            for outcome in self.run_batch(pending, assignments, &request.voice).await {
                match outcome {
                    ChunkOutcome::Success(artifact) => {
                        session.record_success(artifact.chunk_index);
                        artifacts.insert(artifact.chunk_index, artifact);
                    }
                    ChunkOutcome::Failure(failure) => session.record_failure(failure),
                }
            }

            session.mark_progress();
            self.persist(&session, &artifacts).await?;

            tracing::info!(
                session_id = %session_id,
                completed = session.completed_indices.len(),
                failed = session.failures.len(),
                total_chunks = total_chunks,
                "Batch finished"
            );

            batch_start = batch_end;
            if batch_start < total_chunks && !self.pause(&cancel).await {
                cancelled = true;
                break;
            }
        }

        session.mark_finished();
        self.persist(&session, &artifacts).await?;

        tracing::info!(
            session_id = %session_id,
            status = %session.status,
            completed = session.completed_indices.len(),
            failed = session.failures.len(),
            cancelled = cancelled,
            "Synthesis run finished"
        );

        Ok(RunResult {
            session_id,
            completed: session.is_complete(),
            cancelled,
            total_chunks,
            completed_chunks: session.completed_indices.len(),
            effective_concurrency: effective,
            chunk_size,
            failures: session.failures,
            artifacts: artifacts.into_values().collect(),
        })
    }

    /// Fan out one task per chunk and wait for every one of them
    async fn run_batch(
        &self,
        pending: Vec<Chunk>,
        assignments: Vec<String>,
        voice: &str,
    ) -> Vec<ChunkOutcome> {
        let (chunks, handles): (Vec<Chunk>, Vec<_>) = pending
            .into_iter()
            .zip(assignments)
            .map(|(chunk, credential)| {
                let processor = self.processor.clone();
                let voice = voice.to_string();
                let max_retries = self.max_retries;
                let task_chunk = chunk.clone();
                let handle = tokio::spawn(async move {
                    processor
                        .process(&task_chunk, &voice, Some(&credential), max_retries)
                        .await
                });
                (chunk, handle)
            })
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(chunks)
            .map(|(joined, chunk)| match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    tracing::error!(
                        chunk_index = chunk.index,
                        error = %join_error,
                        "Chunk task did not complete"
                    );
                    let error = SynthesisError::new(
                        SynthesisErrorKind::Internal,
                        format!("chunk task did not complete: {}", join_error),
                    );
                    ChunkOutcome::Failure(FailureRecord::new(&chunk, &error, None))
                }
            })
            .collect()
    }

    /// Inter-batch wait. Returns false when cancelled while waiting.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        if self.inter_batch_delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.inter_batch_delay) => true,
            _ = cancel.cancelled() => false,
        }
    }

    async fn persist(
        &self,
        session: &Session,
        artifacts: &BTreeMap<usize, AudioArtifact>,
    ) -> Result<(), SchedulerError> {
        let artifacts: Vec<AudioArtifact> = artifacts.values().cloned().collect();
        self.session_repo.save(session).await?;
        self.session_repo
            .cache_artifacts(session.id, &artifacts)
            .await?;
        Ok(())
    }

    /// Pool exhausted mid-run: keep the progress, mark the session as failed
    async fn abort(
        &self,
        mut session: Session,
        artifacts: &BTreeMap<usize, AudioArtifact>,
        err: CredentialError,
    ) -> SchedulerError {
        let message = err.to_string();
        session.mark_failed(message.clone());

        tracing::error!(
            session_id = %session.id,
            completed = session.completed_indices.len(),
            total_chunks = session.total_chunks,
            "Run aborted, no credential available"
        );

        if let Err(store_err) = self.persist(&session, artifacts).await {
            return store_err;
        }
        SchedulerError::NoCredentialAvailable(message)
    }
}
