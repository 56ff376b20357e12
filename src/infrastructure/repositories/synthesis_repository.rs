use crate::domain::synthesis::SynthesisError;
use async_trait::async_trait;

/// Remote text-to-speech endpoint, called once per chunk attempt.
///
/// Implementations classify every failure into a `SynthesisErrorKind` so the
/// credential tracker can tell throttling apart from broken credentials.
#[async_trait]
pub trait SynthesisRepository: Send + Sync {
    /// Synthesize `text` with `voice` using `credential`
    ///
    /// Returns raw 16-bit mono PCM at 24 kHz
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        credential: &str,
    ) -> Result<Vec<u8>, SynthesisError>;
}
