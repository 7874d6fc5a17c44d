//! Error types for the metadata store.

use thiserror::Error;

pub type MetaResult<T> = Result<T, MetaError>;

/// Errors the metadata store's operations can raise (§4.3, §7).
#[derive(Error, Debug)]
pub enum MetaError {
    /// A `doc_id` or `collection_id` insert collided with an existing row.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A referenced `user_token` does not exist.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// A referenced `collection_id` does not exist.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The requesting user does not own the collection or record they are
    /// addressing.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A `doc_id` looked up for read/update/delete was not found.
    #[error("upload record not found: {0}")]
    NotFound(String),

    /// The underlying database rejected the query or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations failed to apply at startup.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
