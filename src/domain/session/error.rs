use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt session data: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for SessionStoreError {
    fn from(err: serde_json::Error) -> Self {
        SessionStoreError::Corrupt(err.to_string())
    }
}

impl From<SessionStoreError> for AppError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::Database(e) => AppError::Database(e),
            SessionStoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}
