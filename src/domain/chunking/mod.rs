pub mod chunker;

pub use chunker::{chunk_text, clamp_chunk_size, estimate, Chunk, ChunkEstimate};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 2000;
