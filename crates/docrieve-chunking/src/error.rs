//! Error types for the chunking crate

use thiserror::Error;

/// Chunking-specific error types
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// `chunk_size` was not strictly greater than `overlap`
    #[error("chunk_size ({chunk_size}) must be greater than overlap ({overlap})")]
    InvalidArgument { chunk_size: usize, overlap: usize },
}

/// Result type alias for chunking operations
pub type ChunkingResult<T> = Result<T, ChunkingError>;
