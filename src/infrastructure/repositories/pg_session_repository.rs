use super::session_repository::SessionRepository;
use crate::domain::session::{Session, SessionStatus, SessionStoreError};
use crate::domain::synthesis::{AudioArtifact, FailureRecord};
use crate::infrastructure::db::{check_connection, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    source_text: String,
    voice: String,
    chunk_size: i32,
    max_concurrency: i32,
    total_chunks: i32,
    completed_indices: Json<Vec<usize>>,
    failures: Json<Vec<FailureRecord>>,
    status: String,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = SessionStoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<SessionStatus>()
            .map_err(SessionStoreError::Corrupt)?;

        Ok(Session {
            id: row.id,
            source_text: row.source_text,
            voice: row.voice,
            chunk_size: row.chunk_size as usize,
            max_concurrency: row.max_concurrency as usize,
            total_chunks: row.total_chunks as usize,
            completed_indices: row.completed_indices.0.into_iter().collect(),
            failures: row.failures.0,
            status,
            error_message: row.error_message,
            started_at: row.started_at,
            ended_at: row.ended_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ArtifactRow {
    chunk_index: i32,
    credential_id: String,
    audio: Vec<u8>,
}

impl From<ArtifactRow> for AudioArtifact {
    fn from(row: ArtifactRow) -> Self {
        AudioArtifact {
            chunk_index: row.chunk_index as usize,
            bytes: row.audio,
            credential_id: row.credential_id,
        }
    }
}

const SESSION_COLUMNS: &str = r#"
    id, source_text, voice, chunk_size, max_concurrency, total_chunks,
    completed_indices, failures, status, error_message, started_at, ended_at, updated_at
"#;

/// Session store backed by Postgres, surviving restarts of the service
pub struct PgSessionRepository {
    pool: Arc<DbPool>,
}

impl PgSessionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let pool = self.pool.as_ref();
        let completed: Vec<usize> = session.completed_indices.iter().copied().collect();

        sqlx::query(
            r#"
            INSERT INTO synthesis_sessions (
                id, source_text, voice, chunk_size, max_concurrency, total_chunks,
                completed_indices, failures, status, error_message, started_at, ended_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id)
            DO UPDATE SET
                source_text = EXCLUDED.source_text,
                voice = EXCLUDED.voice,
                chunk_size = EXCLUDED.chunk_size,
                max_concurrency = EXCLUDED.max_concurrency,
                total_chunks = EXCLUDED.total_chunks,
                completed_indices = EXCLUDED.completed_indices,
                failures = EXCLUDED.failures,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                started_at = EXCLUDED.started_at,
                ended_at = EXCLUDED.ended_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(session.id)
        .bind(&session.source_text)
        .bind(&session.voice)
        .bind(session.chunk_size as i32)
        .bind(session.max_concurrency as i32)
        .bind(session.total_chunks as i32)
        .bind(Json(completed))
        .bind(Json(&session.failures))
        .bind(session.status.as_str())
        .bind(&session.error_message)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, SessionStoreError> {
        let pool = self.pool.as_ref();

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM synthesis_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn cache_artifacts(
        &self,
        id: Uuid,
        artifacts: &[AudioArtifact],
    ) -> Result<(), SessionStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM synthesis_artifacts WHERE session_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for artifact in artifacts {
            sqlx::query(
                r#"
                INSERT INTO synthesis_artifacts (session_id, chunk_index, credential_id, audio)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(artifact.chunk_index as i32)
            .bind(&artifact.credential_id)
            .bind(&artifact.bytes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn cached_artifacts(&self, id: Uuid) -> Result<Vec<AudioArtifact>, SessionStoreError> {
        let pool = self.pool.as_ref();

        let rows = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT chunk_index, credential_id, audio
            FROM synthesis_artifacts
            WHERE session_id = $1
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(AudioArtifact::from).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, SessionStoreError> {
        let pool = self.pool.as_ref();

        let result = sqlx::query("DELETE FROM synthesis_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_resumable(&self) -> Result<Vec<Session>, SessionStoreError> {
        let pool = self.pool.as_ref();

        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM synthesis_sessions WHERE status IN ('partial', 'error') ORDER BY updated_at DESC",
            SESSION_COLUMNS
        ))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, SessionStoreError> {
        let pool = self.pool.as_ref();
        let cutoff = Utc::now() - max_age;

        let result = sqlx::query("DELETE FROM synthesis_sessions WHERE updated_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn check(&self) -> Result<(), SessionStoreError> {
        check_connection(&self.pool).await?;
        Ok(())
    }
}
