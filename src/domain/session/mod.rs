pub mod error;
pub mod model;

pub use error::SessionStoreError;
pub use model::{Session, SessionStatus};

/// Sessions untouched for longer than this are purged
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;
