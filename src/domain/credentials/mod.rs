pub mod error;
pub mod model;
pub mod tracker;

pub use error::CredentialError;
pub use model::{
    is_valid_credential, mask_credential, CredentialHealth, CredentialRecord, CredentialStats,
};
pub use tracker::{classify_throttle, CredentialTracker, ThrottleTier};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 10;

/// Consecutive non-throttle failures that disable a credential
pub const ERROR_THRESHOLD: u32 = 2;
