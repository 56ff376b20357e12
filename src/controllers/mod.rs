pub mod credentials;
pub mod health;
pub mod sessions;
pub mod synthesis;
