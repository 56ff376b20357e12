pub mod error;
pub mod model;
pub mod processor;
pub mod retry;
pub mod scheduler;
pub mod service;


pub use error::{SchedulerError, SynthesisError, SynthesisErrorKind, SynthesisServiceError};
pub use model::{
    AudioArtifact, ChunkOutcome, FailureRecord, RunConfig, RunRequest, RunResult, RunSummary,
    DEFAULT_VOICE,
};
pub use processor::ChunkProcessor;
pub use retry::RetryPolicy;
pub use scheduler::BatchScheduler;
pub use service::{MergedAudio, SynthesisService, SynthesisServiceApi};
