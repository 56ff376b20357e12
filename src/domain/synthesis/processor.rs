use super::error::{SynthesisError, SynthesisErrorKind};
use super::model::{AudioArtifact, ChunkOutcome, FailureRecord};
use super::retry::RetryPolicy;
use crate::domain::chunking::Chunk;
use crate::domain::credentials::{mask_credential, CredentialTracker};
use crate::infrastructure::repositories::SynthesisRepository;
use std::sync::Arc;

/// Runs a single chunk against the remote endpoint, moving to another
/// credential after each failed attempt
pub struct ChunkProcessor {
    tracker: Arc<CredentialTracker>,
    synth_repo: Arc<dyn SynthesisRepository>,
    retry_policy: RetryPolicy,
}

impl ChunkProcessor {
    pub fn new(
        tracker: Arc<CredentialTracker>,
        synth_repo: Arc<dyn SynthesisRepository>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            tracker,
            synth_repo,
            retry_policy,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Up to `max_retries + 1` attempts. Never returns an error: a chunk that
    /// runs out of attempts comes back as `ChunkOutcome::Failure`.
    pub async fn process(
        &self,
        chunk: &Chunk,
        voice: &str,
        preferred: Option<&str>,
        max_retries: u32,
    ) -> ChunkOutcome {
        let policy = self.retry_policy.with_max_retries(max_retries);
        let mut last_error: Option<SynthesisError> = None;
        let mut last_credential: Option<String> = None;

        for attempt in 0..=max_retries {
            let credential = match self.select_credential(attempt, preferred) {
                Ok(credential) => credential,
                Err(error) => {
                    tracing::warn!(
                        chunk_index = chunk.index,
                        attempt = attempt + 1,
                        "No credential available for chunk"
                    );
                    last_error = Some(error);
                    break;
                }
            };

            tracing::debug!(
                chunk_index = chunk.index,
                attempt = attempt + 1,
                credential = %mask_credential(&credential),
                chars = chunk.text.chars().count(),
                "Synthesizing chunk"
            );

            match self
                .synth_repo
                .synthesize(&chunk.text, voice, &credential)
                .await
            {
                Ok(bytes) => {
                    self.tracker.report_success(&credential);
                    tracing::debug!(
                        chunk_index = chunk.index,
                        bytes = bytes.len(),
                        "Chunk synthesized"
                    );
                    return ChunkOutcome::Success(AudioArtifact::new(
                        chunk.index,
                        bytes,
                        &credential,
                    ));
                }
                Err(error) => {
                    tracing::warn!(
                        chunk_index = chunk.index,
                        attempt = attempt + 1,
                        credential = %mask_credential(&credential),
                        error_kind = %error.kind,
                        error = %error,
                        "Chunk attempt failed"
                    );
                    self.tracker.report_failure(&credential, &error);
                    last_error = Some(error);
                    last_credential = Some(credential);

                    if !policy.has_attempts_left(attempt) || !self.tracker.has_healthy_credentials()
                    {
                        break;
                    }
                    policy.wait_before_retry(attempt).await;
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            SynthesisError::new(SynthesisErrorKind::Internal, "chunk was never attempted")
        });
        tracing::warn!(
            chunk_index = chunk.index,
            error_kind = %error.kind,
            "Chunk failed after exhausting attempts"
        );
        ChunkOutcome::Failure(FailureRecord::new(
            chunk,
            &error,
            last_credential.as_deref(),
        ))
    }

    /// One attempt on a caller-chosen credential, still reported to the tracker
    pub async fn process_with_credential(
        &self,
        chunk: &Chunk,
        voice: &str,
        credential: &str,
    ) -> ChunkOutcome {
        tracing::info!(
            chunk_index = chunk.index,
            credential = %mask_credential(credential),
            "Manual chunk retry"
        );

        match self
            .synth_repo
            .synthesize(&chunk.text, voice, credential)
            .await
        {
            Ok(bytes) => {
                self.tracker.report_success(credential);
                ChunkOutcome::Success(AudioArtifact::new(chunk.index, bytes, credential))
            }
            Err(error) => {
                self.tracker.report_failure(credential, &error);
                ChunkOutcome::Failure(FailureRecord::new(chunk, &error, Some(credential)))
            }
        }
    }

    fn select_credential(
        &self,
        attempt: u32,
        preferred: Option<&str>,
    ) -> Result<String, SynthesisError> {
        if attempt == 0 {
            if let Some(preferred) = preferred.filter(|id| self.tracker.is_healthy(id)) {
                return Ok(preferred.to_string());
            }
        }
        Ok(self.tracker.best_credential()?)
    }
}
