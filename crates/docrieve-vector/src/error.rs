//! Error types for the vector index façade

use thiserror::Error;

/// Result type alias for vector index operations
pub type VectorResult<T> = Result<T, VectorError>;

/// Errors the vector index façade can raise. These map to the pipeline's
/// `IndexWriteFailed` (logged, non-fatal on add) and surfaced-unchanged
/// (on search/list) policies from §7.
#[derive(Error, Debug)]
pub enum VectorError {
    /// The underlying engine is unreachable or returned an error
    #[error("vector engine error: {0}")]
    Engine(String),

    /// A chunk/embedding count mismatch or other caller-side misuse
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
