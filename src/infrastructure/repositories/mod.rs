pub mod gemini_synthesis_repository;
pub mod pg_session_repository;
pub mod session_repository;
pub mod synthesis_repository;

pub use gemini_synthesis_repository::GeminiSynthesisRepository;
pub use pg_session_repository::PgSessionRepository;
pub use session_repository::{InMemorySessionRepository, SessionRepository};
pub use synthesis_repository::SynthesisRepository;
