use crate::domain::session::{Session, SessionStoreError};
use crate::domain::synthesis::AudioArtifact;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_ARTIFACT_CACHE_CAPACITY: u64 = 100;

/// Durable home of sessions and of the audio each session has produced.
///
/// Artifacts are addressed by session id and replaced as a whole on every
/// write, always ordered by chunk index on read.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Session>, SessionStoreError>;

    async fn cache_artifacts(
        &self,
        id: Uuid,
        artifacts: &[AudioArtifact],
    ) -> Result<(), SessionStoreError>;

    /// Empty when nothing was cached or the entry was evicted
    async fn cached_artifacts(&self, id: Uuid) -> Result<Vec<AudioArtifact>, SessionStoreError>;

    /// Removes the session and its artifacts. Returns whether a session existed.
    async fn delete(&self, id: Uuid) -> Result<bool, SessionStoreError>;

    /// `partial` and `error` sessions, most recently updated first
    async fn list_resumable(&self) -> Result<Vec<Session>, SessionStoreError>;

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, SessionStoreError>;

    async fn check(&self) -> Result<(), SessionStoreError>;
}

pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<Uuid, Session>>,
    artifacts: Cache<Uuid, Arc<Vec<AudioArtifact>>>,
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_CACHE_CAPACITY)
    }
}

impl InMemorySessionRepository {
    pub fn new(cache_capacity: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            artifacts: Cache::builder().max_capacity(cache_capacity).build(),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn cache_artifacts(
        &self,
        id: Uuid,
        artifacts: &[AudioArtifact],
    ) -> Result<(), SessionStoreError> {
        let mut sorted = artifacts.to_vec();
        sorted.sort_by_key(|artifact| artifact.chunk_index);
        self.artifacts.insert(id, Arc::new(sorted)).await;
        Ok(())
    }

    async fn cached_artifacts(&self, id: Uuid) -> Result<Vec<AudioArtifact>, SessionStoreError> {
        Ok(self
            .artifacts
            .get(&id)
            .await
            .map(|artifacts| artifacts.as_ref().clone())
            .unwrap_or_default())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, SessionStoreError> {
        let existed = self.sessions.write().await.remove(&id).is_some();
        self.artifacts.invalidate(&id).await;
        Ok(existed)
    }

    async fn list_resumable(&self) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| session.status.is_resumable())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, SessionStoreError> {
        let cutoff = Utc::now() - max_age;
        let expired: Vec<Uuid> = {
            let mut sessions = self.sessions.write().await;
            let expired: Vec<Uuid> = sessions
                .values()
                .filter(|session| session.updated_at < cutoff)
                .map(|session| session.id)
                .collect();
            for id in &expired {
                sessions.remove(id);
            }
            expired
        };

        for id in &expired {
            self.artifacts.invalidate(id).await;
        }

        Ok(expired.len())
    }

    async fn check(&self) -> Result<(), SessionStoreError> {
        Ok(())
    }
}
