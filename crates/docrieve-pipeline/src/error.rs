//! Error kinds for the processing pipeline (§7).

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("original file missing for doc {0}")]
    FileMissing(String),

    #[error("text conversion failed: {0}")]
    ConversionFailed(String),

    #[error("metadata store error: {0}")]
    Meta(#[from] docrieve_meta::MetaError),

    #[error("blob store error: {0}")]
    Blob(#[from] docrieve_blob::BlobError),

    #[error("vector index error: {0}")]
    Vector(#[from] docrieve_vector::VectorError),

    #[error("search error: {0}")]
    Search(#[from] docrieve_search::SearchError),

    #[error("text converter error: {0}")]
    Convert(#[from] docrieve_convert::ConvertError),

    #[error("chunking error: {0}")]
    Chunking(#[from] docrieve_chunking::ChunkingError),
}

/// Translate a [`docrieve_meta::MetaError`] into the matching domain-level
/// [`PipelineError`] variant (§7's *NotFound*/*AlreadyExists*/
/// *PermissionDenied*/*UnknownUser*/*UnknownCollection* kinds), falling
/// back to the generic wrapper for anything else (transport/database
/// failures).
#[must_use]
pub fn classify_meta_error(err: docrieve_meta::MetaError) -> PipelineError {
    use docrieve_meta::MetaError;
    match err {
        MetaError::AlreadyExists(s) => PipelineError::AlreadyExists(s),
        MetaError::UnknownUser(s) => PipelineError::UnknownUser(s),
        MetaError::UnknownCollection(s) => PipelineError::UnknownCollection(s),
        MetaError::PermissionDenied(s) => PipelineError::PermissionDenied(s),
        MetaError::NotFound(s) => PipelineError::NotFound(s),
        other => PipelineError::Meta(other),
    }
}
