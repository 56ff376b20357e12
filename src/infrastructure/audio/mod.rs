use crate::domain::synthesis::AudioArtifact;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

pub const PCM_SAMPLE_RATE: u32 = 24_000;
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio to encode")]
    Empty,
    #[error("wav encoding failed: {0}")]
    Encoding(#[from] hound::Error),
}

/// Turns raw per-chunk PCM into playable files
pub trait AudioMerger: Send + Sync {
    /// One file with every artifact, in the order given
    fn merge(&self, artifacts: &[AudioArtifact]) -> Result<Vec<u8>, AudioError>;

    fn encode_chunk(&self, artifact: &AudioArtifact) -> Result<Vec<u8>, AudioError>;

    fn content_type(&self) -> &'static str;
}

/// 16-bit little-endian mono PCM wrapped in a WAV container
pub struct WavMerger {
    sample_rate: u32,
}

impl Default for WavMerger {
    fn default() -> Self {
        Self::new(PCM_SAMPLE_RATE)
    }
}

impl WavMerger {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write_wav<'a>(&self, parts: impl Iterator<Item = &'a [u8]>) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec())?;
            for part in parts {
                // a trailing odd byte is not a whole sample
                for sample in part.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
                }
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

impl AudioMerger for WavMerger {
    fn merge(&self, artifacts: &[AudioArtifact]) -> Result<Vec<u8>, AudioError> {
        if artifacts.is_empty() {
            return Err(AudioError::Empty);
        }
        self.write_wav(artifacts.iter().map(|artifact| artifact.bytes.as_slice()))
    }

    fn encode_chunk(&self, artifact: &AudioArtifact) -> Result<Vec<u8>, AudioError> {
        self.write_wav(std::iter::once(artifact.bytes.as_slice()))
    }

    fn content_type(&self) -> &'static str {
        WAV_CONTENT_TYPE
    }
}
