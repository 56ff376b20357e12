pub mod chunking;
pub mod credentials;
pub mod session;
pub mod synthesis;
