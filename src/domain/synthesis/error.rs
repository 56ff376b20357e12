use crate::domain::credentials::CredentialError;
use crate::domain::session::SessionStoreError;
use crate::error::AppError;
use crate::infrastructure::audio::AudioError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classified failure of a single synthesis call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisErrorKind {
    InvalidRequest,
    Unauthorized,
    QuotaOrForbidden,
    RateLimited,
    ServerError,
    Unavailable,
    Timeout,
    NetworkError,
    /// Raised locally when no credential could be selected for an attempt
    NoCredentialAvailable,
    /// Raised locally when a chunk task ended without producing an outcome
    Internal,
}

impl SynthesisErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid-request",
            Self::Unauthorized => "unauthorized",
            Self::QuotaOrForbidden => "quota-or-forbidden",
            Self::RateLimited => "rate-limited",
            Self::ServerError => "server-error",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::NetworkError => "network-error",
            Self::NoCredentialAvailable => "no-credential-available",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SynthesisError {
    pub kind: SynthesisErrorKind,
    pub message: String,
}

impl SynthesisError {
    pub fn new(kind: SynthesisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CredentialError> for SynthesisError {
    fn from(err: CredentialError) -> Self {
        Self::new(SynthesisErrorKind::NoCredentialAvailable, err.to_string())
    }
}

/// Errors that abort a whole scheduling run
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no credential available: {0}")]
    NoCredentialAvailable(String),
    #[error("session store error: {0}")]
    Store(String),
}

impl From<CredentialError> for SchedulerError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoValidCredentials => SchedulerError::Validation(err.to_string()),
            CredentialError::NoCredentialAvailable => {
                SchedulerError::NoCredentialAvailable(err.to_string())
            }
        }
    }
}

impl From<SessionStoreError> for SchedulerError {
    fn from(err: SessionStoreError) -> Self {
        SchedulerError::Store(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisServiceError {
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("no audio available for session {0}")]
    NoAudio(Uuid),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no credential available: {0}")]
    NoCredentialAvailable(String),
    #[error("chunk {index} failed: {error}")]
    ChunkFailed {
        index: usize,
        error: SynthesisError,
    },
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<SchedulerError> for SynthesisServiceError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Validation(msg) => SynthesisServiceError::Invalid(msg),
            SchedulerError::NoCredentialAvailable(msg) => {
                SynthesisServiceError::NoCredentialAvailable(msg)
            }
            SchedulerError::Store(msg) => SynthesisServiceError::Dependency(msg),
        }
    }
}

impl From<SessionStoreError> for SynthesisServiceError {
    fn from(err: SessionStoreError) -> Self {
        SynthesisServiceError::Dependency(err.to_string())
    }
}

impl From<AudioError> for SynthesisServiceError {
    fn from(err: AudioError) -> Self {
        SynthesisServiceError::Dependency(err.to_string())
    }
}

impl From<SynthesisServiceError> for AppError {
    fn from(err: SynthesisServiceError) -> Self {
        match err {
            SynthesisServiceError::Invalid(msg) => AppError::BadRequest(msg),
            SynthesisServiceError::NotFound(id) => AppError::NotFound(format!("Session {}", id)),
            SynthesisServiceError::NoAudio(id) => {
                AppError::NotFound(format!("Audio for session {}", id))
            }
            SynthesisServiceError::Conflict(msg) => AppError::Conflict(msg),
            SynthesisServiceError::NoCredentialAvailable(msg) => {
                AppError::NoCredentialAvailable(msg)
            }
            SynthesisServiceError::ChunkFailed { index, error } => AppError::ExternalService(
                format!("chunk {} failed ({}): {}", index, error.kind, error.message),
            ),
            SynthesisServiceError::Dependency(msg) => AppError::Internal(msg),
            SynthesisServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
