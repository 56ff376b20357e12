use crate::domain::synthesis::FailureRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Partial,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Processing => "processing",
            SessionStatus::Partial => "partial",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    /// Listed as resumable; `processing` sessions are still owned by a run
    pub fn is_resumable(&self) -> bool {
        matches!(self, SessionStatus::Partial | SessionStatus::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(SessionStatus::Processing),
            "partial" => Ok(SessionStatus::Partial),
            "completed" => Ok(SessionStatus::Completed),
            "error" => Ok(SessionStatus::Error),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Progress of one synthesis job across runs
///
/// Audio payloads are kept apart from the session, in the artifact cache of
/// the session store, keyed by the session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub source_text: String,
    pub voice: String,
    pub chunk_size: usize,
    pub max_concurrency: usize,
    pub total_chunks: usize,
    pub completed_indices: BTreeSet<usize>,
    pub failures: Vec<FailureRecord>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: Uuid,
        source_text: String,
        voice: String,
        chunk_size: usize,
        max_concurrency: usize,
        total_chunks: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_text,
            voice,
            chunk_size,
            max_concurrency,
            total_chunks,
            completed_indices: BTreeSet::new(),
            failures: Vec::new(),
            status: SessionStatus::Processing,
            error_message: None,
            started_at: now,
            ended_at: None,
            updated_at: now,
        }
    }

    pub fn record_success(&mut self, index: usize) {
        self.completed_indices.insert(index);
        self.failures.retain(|failure| failure.chunk_index != index);
    }

    /// Replaces any earlier failure of the same chunk
    pub fn record_failure(&mut self, failure: FailureRecord) {
        match self
            .failures
            .iter_mut()
            .find(|existing| existing.chunk_index == failure.chunk_index)
        {
            Some(existing) => *existing = failure,
            None => self.failures.push(failure),
        }
    }

    pub fn failure_for(&self, index: usize) -> Option<&FailureRecord> {
        self.failures
            .iter()
            .find(|failure| failure.chunk_index == index)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_indices.len() == self.total_chunks
    }

    pub fn pending_count(&self) -> usize {
        self.total_chunks
            .saturating_sub(self.completed_indices.len() + self.failures.len())
    }

    /// First chunk a resumed run has to revisit
    pub fn resume_point(&self) -> usize {
        self.failures
            .iter()
            .map(|failure| failure.chunk_index)
            .min()
            .unwrap_or(self.completed_indices.len())
    }

    /// Status at a batch boundary while the run is still going
    pub fn mark_progress(&mut self) {
        self.status = if self.failures.is_empty() {
            SessionStatus::Processing
        } else {
            SessionStatus::Partial
        };
        self.updated_at = Utc::now();
    }

    pub fn mark_finished(&mut self) {
        let now = Utc::now();
        self.status = if self.is_complete() {
            SessionStatus::Completed
        } else {
            SessionStatus::Partial
        };
        self.ended_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.status = SessionStatus::Error;
        self.error_message = Some(message.into());
        self.ended_at = Some(now);
        self.updated_at = now;
    }
}
