use super::error::SynthesisServiceError;
use super::model::{AudioArtifact, ChunkOutcome, RunConfig, RunRequest, RunResult};
use super::processor::ChunkProcessor;
use super::retry::DEFAULT_MANUAL_MAX_RETRIES;
use super::scheduler::BatchScheduler;
use crate::domain::chunking::{self, chunk_text, Chunk, ChunkEstimate};
use crate::domain::credentials::{
    is_valid_credential, CredentialTracker, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
use crate::domain::session::{Session, SessionStatus, DEFAULT_SESSION_MAX_AGE_HOURS};
use crate::infrastructure::audio::AudioMerger;
use crate::infrastructure::repositories::SessionRepository;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MergedAudio {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub missing_chunks: Vec<usize>,
}

pub struct SynthesisService {
    tracker: Arc<CredentialTracker>,
    processor: Arc<ChunkProcessor>,
    scheduler: Arc<BatchScheduler>,
    session_repo: Arc<dyn SessionRepository>,
    merger: Arc<dyn AudioMerger>,
    active_runs: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    manual_max_retries: u32,
    session_max_age: chrono::Duration,
}

impl SynthesisService {
    pub fn new(
        tracker: Arc<CredentialTracker>,
        processor: Arc<ChunkProcessor>,
        scheduler: Arc<BatchScheduler>,
        session_repo: Arc<dyn SessionRepository>,
        merger: Arc<dyn AudioMerger>,
    ) -> Self {
        Self {
            tracker,
            processor,
            scheduler,
            session_repo,
            merger,
            active_runs: Arc::new(Mutex::new(HashMap::new())),
            manual_max_retries: DEFAULT_MANUAL_MAX_RETRIES,
            session_max_age: chrono::Duration::hours(DEFAULT_SESSION_MAX_AGE_HOURS),
        }
    }

    pub fn with_manual_max_retries(mut self, max_retries: u32) -> Self {
        self.manual_max_retries = max_retries;
        self
    }

    pub fn with_session_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.session_max_age = max_age;
        self
    }
}

#[async_trait]
pub trait SynthesisServiceApi: Send + Sync {
    /// Chunk the text and synthesize it across the credential pool
    ///
    /// Returns once every batch has run, the run was cancelled, or the pool
    /// ran dry. Chunk failures are part of the result, not errors.
    async fn start_run(&self, request: RunRequest) -> Result<RunResult, SynthesisServiceError>;

    /// Continue a `partial` or `error` session without repeating cached chunks
    async fn resume_session(&self, id: Uuid) -> Result<RunResult, SynthesisServiceError>;

    /// Ask an active run to stop before its next batch
    fn cancel_run(&self, id: Uuid) -> bool;

    /// Re-synthesize one chunk of a stored session
    ///
    /// With an explicit credential a single attempt is made on it, otherwise
    /// the chunk gets the manual retry budget on the best credentials.
    async fn retry_chunk(
        &self,
        id: Uuid,
        index: usize,
        credential: Option<String>,
    ) -> Result<Session, SynthesisServiceError>;

    async fn get_session(&self, id: Uuid) -> Result<Session, SynthesisServiceError>;

    async fn list_resumable(&self) -> Result<Vec<Session>, SynthesisServiceError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), SynthesisServiceError>;

    async fn purge_expired(&self) -> Result<usize, SynthesisServiceError>;

    async fn merged_audio(&self, id: Uuid) -> Result<MergedAudio, SynthesisServiceError>;

    async fn chunk_audio(&self, id: Uuid, index: usize) -> Result<Vec<u8>, SynthesisServiceError>;

    fn estimate(&self, text: &str, chunk_size: usize, max_concurrency: usize) -> ChunkEstimate;
}

#[async_trait]
impl SynthesisServiceApi for SynthesisService {
    async fn start_run(&self, request: RunRequest) -> Result<RunResult, SynthesisServiceError> {
        tracing::info!(
            text_length = request.text.chars().count(),
            voice = %request.voice,
            chunk_size = request.config.chunk_size,
            max_concurrency = request.config.max_concurrency,
            "Synthesis run requested"
        );
        self.execute(request, RunKind::Fresh).await
    }

    async fn resume_session(&self, id: Uuid) -> Result<RunResult, SynthesisServiceError> {
        let session = self.find_session(id).await?;
        if session.status == SessionStatus::Completed {
            return Err(SynthesisServiceError::Conflict(format!(
                "Session {} is already completed",
                id
            )));
        }

        let artifacts = self.session_repo.cached_artifacts(id).await?;
        let resume_from = resume_point(&session, &artifacts);

        tracing::info!(
            session_id = %id,
            resume_from = resume_from,
            cached_artifacts = artifacts.len(),
            total_chunks = session.total_chunks,
            "Resuming session"
        );

        let request = RunRequest {
            text: session.source_text,
            voice: session.voice,
            config: RunConfig {
                chunk_size: session.chunk_size,
                max_concurrency: session.max_concurrency,
            },
            session_id: Some(id),
            resume_from,
            existing_artifacts: artifacts,
        };

        self.execute(request, RunKind::Resume).await
    }

    fn cancel_run(&self, id: Uuid) -> bool {
        match self.active_runs.lock().get(&id) {
            Some(token) => {
                token.cancel();
                tracing::info!(session_id = %id, "Run cancellation requested");
                true
            }
            None => false,
        }
    }

    async fn retry_chunk(
        &self,
        id: Uuid,
        index: usize,
        credential: Option<String>,
    ) -> Result<Session, SynthesisServiceError> {
        let mut session = self.find_session(id).await?;
        if self.is_active(id) {
            return Err(SynthesisServiceError::Conflict(format!(
                "Session {} has a run in progress",
                id
            )));
        }
        if index >= session.total_chunks {
            return Err(SynthesisServiceError::Invalid(format!(
                "chunk {} out of range, session has {} chunks",
                index, session.total_chunks
            )));
        }
        if let Some(credential) = credential.as_deref() {
            if !is_valid_credential(credential) {
                return Err(SynthesisServiceError::Invalid(
                    "credential is not well-formed".to_string(),
                ));
            }
        }

        let chunk = chunk_for_retry(&session, index)?;
        let outcome = match credential.as_deref() {
            Some(credential) => {
                self.processor
                    .process_with_credential(&chunk, &session.voice, credential)
                    .await
            }
            None => {
                self.processor
                    .process(&chunk, &session.voice, None, self.manual_max_retries)
                    .await
            }
        };

        match outcome {
            ChunkOutcome::Success(artifact) => {
                let mut artifacts = self.session_repo.cached_artifacts(id).await?;
                artifacts.retain(|existing| existing.chunk_index != index);
                artifacts.push(artifact);

                session.record_success(index);
                if session.is_complete() {
                    session.mark_finished();
                } else {
                    session.updated_at = Utc::now();
                }

                self.session_repo.cache_artifacts(id, &artifacts).await?;
                self.session_repo.save(&session).await?;

                tracing::info!(
                    session_id = %id,
                    chunk_index = index,
                    status = %session.status,
                    "Chunk retry succeeded"
                );
                Ok(session)
            }
            ChunkOutcome::Failure(failure) => {
                let error = failure.to_error();
                session.record_failure(failure);
                session.updated_at = Utc::now();
                self.session_repo.save(&session).await?;

                tracing::warn!(
                    session_id = %id,
                    chunk_index = index,
                    error_kind = %error.kind,
                    "Chunk retry failed"
                );
                Err(SynthesisServiceError::ChunkFailed { index, error })
            }
        }
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, SynthesisServiceError> {
        self.find_session(id).await
    }

    async fn list_resumable(&self) -> Result<Vec<Session>, SynthesisServiceError> {
        Ok(self.session_repo.list_resumable().await?)
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), SynthesisServiceError> {
        self.cancel_run(id);
        if !self.session_repo.delete(id).await? {
            return Err(SynthesisServiceError::NotFound(id));
        }
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SynthesisServiceError> {
        let purged = self
            .session_repo
            .purge_older_than(self.session_max_age)
            .await?;
        if purged > 0 {
            tracing::info!(
                purged = purged,
                max_age_hours = self.session_max_age.num_hours(),
                "Purged expired sessions"
            );
        }
        Ok(purged)
    }

    async fn merged_audio(&self, id: Uuid) -> Result<MergedAudio, SynthesisServiceError> {
        let session = self.find_session(id).await?;
        let artifacts = self.session_repo.cached_artifacts(id).await?;
        if artifacts.is_empty() {
            return Err(SynthesisServiceError::NoAudio(id));
        }

        let present: BTreeSet<usize> = artifacts.iter().map(|a| a.chunk_index).collect();
        let missing_chunks = (0..session.total_chunks)
            .filter(|index| !present.contains(index))
            .collect();

        Ok(MergedAudio {
            bytes: self.merger.merge(&artifacts)?,
            content_type: self.merger.content_type(),
            missing_chunks,
        })
    }

    async fn chunk_audio(&self, id: Uuid, index: usize) -> Result<Vec<u8>, SynthesisServiceError> {
        self.find_session(id).await?;
        let artifact = self
            .session_repo
            .cached_artifacts(id)
            .await?
            .into_iter()
            .find(|artifact| artifact.chunk_index == index)
            .ok_or(SynthesisServiceError::NoAudio(id))?;

        Ok(self.merger.encode_chunk(&artifact)?)
    }

    fn estimate(&self, text: &str, chunk_size: usize, max_concurrency: usize) -> ChunkEstimate {
        let concurrency = max_concurrency
            .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
            .min(self.tracker.healthy_count())
            .max(1);
        chunking::estimate(text, chunk_size, concurrency)
    }
}

impl SynthesisService {
    async fn find_session(&self, id: Uuid) -> Result<Session, SynthesisServiceError> {
        self.session_repo
            .get(id)
            .await?
            .ok_or(SynthesisServiceError::NotFound(id))
    }

    fn is_active(&self, id: Uuid) -> bool {
        self.active_runs.lock().contains_key(&id)
    }

    /// Run the scheduler with a cancellation token registered under the session id
    ///
    /// The scheduler runs on its own task, so a caller that goes away does not
    /// abandon the run halfway through a batch. The task releases the session
    /// id when it ends.
    async fn execute(
        &self,
        mut request: RunRequest,
        kind: RunKind,
    ) -> Result<RunResult, SynthesisServiceError> {
        let id = *request.session_id.get_or_insert_with(Uuid::new_v4);
        let token = CancellationToken::new();
        let guard = self.register_run(id, token.clone())?;

        if kind == RunKind::Fresh && self.session_repo.get(id).await?.is_some() {
            return Err(SynthesisServiceError::Conflict(format!(
                "Session {} already exists, resume it instead",
                id
            )));
        }

        let scheduler = self.scheduler.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            scheduler.run(request, token).await
        });

        let result = handle.await.map_err(|err| {
            tracing::error!(session_id = %id, error = %err, "Synthesis run task aborted");
            anyhow::anyhow!("synthesis run for session {} aborted: {}", id, err)
        })?;

        if let Err(err) = &result {
            tracing::error!(session_id = %id, error = %err, "Synthesis run failed");
        }
        Ok(result?)
    }

    fn register_run(
        &self,
        id: Uuid,
        token: CancellationToken,
    ) -> Result<ActiveRun, SynthesisServiceError> {
        let mut active = self.active_runs.lock();
        if active.contains_key(&id) {
            return Err(SynthesisServiceError::Conflict(format!(
                "Session {} has a run in progress",
                id
            )));
        }
        active.insert(id, token);
        Ok(ActiveRun {
            id,
            active_runs: self.active_runs.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Fresh,
    Resume,
}

/// Registration of a running session, released on drop
struct ActiveRun {
    id: Uuid,
    active_runs: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.active_runs.lock().remove(&self.id);
    }
}

/// Lowest of the session's own resume point and the first completed chunk
/// whose audio is no longer cached
fn resume_point(session: &Session, artifacts: &[AudioArtifact]) -> usize {
    let cached: BTreeSet<usize> = artifacts.iter().map(|a| a.chunk_index).collect();
    let first_evicted = session
        .completed_indices
        .iter()
        .copied()
        .find(|index| !cached.contains(index));

    match first_evicted {
        Some(index) => session.resume_point().min(index),
        None => session.resume_point(),
    }
}

fn chunk_for_retry(session: &Session, index: usize) -> Result<Chunk, SynthesisServiceError> {
    if let Some(failure) = session.failure_for(index) {
        return Ok(Chunk {
            index,
            text: failure.chunk_text.clone(),
        });
    }

    chunk_text(&session.source_text, session.chunk_size)
        .into_iter()
        .nth(index)
        .ok_or_else(|| {
            SynthesisServiceError::Invalid(format!("chunk {} no longer matches the source", index))
        })
}
