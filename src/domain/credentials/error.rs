use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no valid credentials supplied")]
    NoValidCredentials,
    #[error("all credentials are disabled or cooling down, wait a few minutes or supply new ones")]
    NoCredentialAvailable,
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoValidCredentials => AppError::BadRequest(err.to_string()),
            CredentialError::NoCredentialAvailable => {
                AppError::NoCredentialAvailable(err.to_string())
            }
        }
    }
}
