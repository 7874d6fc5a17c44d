//! Error types for the embedding client

use thiserror::Error;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors the embedding client can raise.
///
/// [`EmbeddingClient::embed_one`](crate::EmbeddingClient::embed_one) never
/// returns [`EmbeddingError::Transient`] to its caller — that variant is
/// retried internally and, after the final attempt, degraded to a zero
/// vector rather than propagated (see §4.5 of the design).
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Request failed in a way that may succeed on retry: connection
    /// refused, timeout, 5xx response.
    #[error("embedding request failed: {0}")]
    Transient(String),

    /// The embedding service responded but with a body that could not be
    /// parsed as the expected `{"embedding": [..]}` shape.
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    /// Configuration error building the underlying HTTP client.
    #[error("embedding client configuration error: {0}")]
    Config(String),
}
