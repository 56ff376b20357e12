use super::error::{SynthesisError, SynthesisErrorKind};
use crate::domain::chunking::{Chunk, DEFAULT_CHUNK_SIZE};
use crate::domain::credentials::{mask_credential, DEFAULT_MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_VOICE: &str = "Kore";

/// Audio produced for one chunk. `credential_id` holds the masked credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub chunk_index: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub credential_id: String,
}

impl AudioArtifact {
    pub fn new(chunk_index: usize, bytes: Vec<u8>, credential: &str) -> Self {
        Self {
            chunk_index,
            bytes,
            credential_id: mask_credential(credential),
        }
    }
}

/// Chunk that exhausted its attempts in the latest pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub chunk_index: usize,
    pub error_kind: SynthesisErrorKind,
    pub message: String,
    pub credential_id: Option<String>,
    pub chunk_text: String,
}

impl FailureRecord {
    pub fn new(chunk: &Chunk, error: &SynthesisError, credential: Option<&str>) -> Self {
        Self {
            chunk_index: chunk.index,
            error_kind: error.kind,
            message: error.message.clone(),
            credential_id: credential.map(mask_credential),
            chunk_text: chunk.text.clone(),
        }
    }

    pub fn to_error(&self) -> SynthesisError {
        SynthesisError::new(self.error_kind, self.message.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Success(AudioArtifact),
    Failure(FailureRecord),
}

impl ChunkOutcome {
    pub fn chunk_index(&self) -> usize {
        match self {
            ChunkOutcome::Success(artifact) => artifact.chunk_index,
            ChunkOutcome::Failure(failure) => failure.chunk_index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub chunk_size: usize,
    pub max_concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub text: String,
    pub voice: String,
    pub config: RunConfig,
    pub session_id: Option<Uuid>,
    pub resume_from: usize,
    pub existing_artifacts: Vec<AudioArtifact>,
}

impl RunRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, config: RunConfig) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            config,
            session_id: None,
            resume_from: 0,
            existing_artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub session_id: Uuid,
    pub artifacts: Vec<AudioArtifact>,
    pub failures: Vec<FailureRecord>,
    pub completed: bool,
    pub cancelled: bool,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub effective_concurrency: usize,
    pub chunk_size: usize,
}

/// Serializable view of a run, without audio payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: Uuid,
    pub completed: bool,
    pub cancelled: bool,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub effective_concurrency: usize,
    pub chunk_size: usize,
    pub failures: Vec<FailureRecord>,
}

impl From<&RunResult> for RunSummary {
    fn from(result: &RunResult) -> Self {
        Self {
            session_id: result.session_id,
            completed: result.completed,
            cancelled: result.cancelled,
            total_chunks: result.total_chunks,
            completed_chunks: result.completed_chunks,
            effective_concurrency: result.effective_concurrency,
            chunk_size: result.chunk_size,
            failures: result.failures.clone(),
        }
    }
}
