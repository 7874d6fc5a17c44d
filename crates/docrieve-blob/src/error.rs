//! Error types for blob store operations

use thiserror::Error;

/// Result type alias for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors a blob store operation can raise.
#[derive(Error, Debug)]
pub enum BlobError {
    /// Underlying filesystem operation failed
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested original or processed blob does not exist
    #[error("blob not found for doc_id {0}")]
    NotFound(String),
}
