//! Error type for the search façade.

use thiserror::Error;

pub type SearchResult<T> = Result<T, SearchError>;

/// Wraps the vector façade's own error; this crate adds no failure modes
/// of its own, only timing instrumentation around the call.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("vector search failed: {0}")]
    Vector(#[from] docrieve_vector::VectorError),
}
