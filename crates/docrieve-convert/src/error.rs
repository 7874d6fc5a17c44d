//! Error types for text conversion strategies

use thiserror::Error;

/// Result type alias for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors a [`crate::TextConverter`] strategy can raise. The pipeline wraps
/// any of these into the task's `ConversionFailed` terminal state.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The file could not be read from disk
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),

    /// The extraction service returned a non-success response
    #[error("text extraction service returned an error: {0}")]
    ServiceError(String),

    /// The extraction service was unreachable
    #[error("text extraction service unreachable: {0}")]
    Transport(String),

    /// The file format is not supported by any configured strategy
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}
