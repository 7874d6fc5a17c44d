//! Repository trait for dependency injection and testing.

use async_trait::async_trait;

use crate::error::MetaResult;
use crate::models::{Collection, UploadRecord, UploadRecordUpdate, UploadStatus, UserInfo};

/// All metadata store operations from §4.3, as one async trait so a
/// `sqlx`-backed implementation and an in-memory mock satisfy the same
/// contract.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert-or-get a user. Idempotent.
    async fn create_user_if_absent(&self, user_token: &str) -> MetaResult<UserInfo>;

    /// Create a collection owned by `created_by`.
    ///
    /// Fails with [`crate::MetaError::AlreadyExists`] if `collection_id` is
    /// taken, [`crate::MetaError::UnknownUser`] if `created_by` does not
    /// exist.
    async fn create_collection(
        &self,
        collection_id: &str,
        name: &str,
        created_by: &str,
        description: Option<&str>,
    ) -> MetaResult<Collection>;

    /// Fetch a single collection by id, regardless of owner. Used for
    /// existence checks that happen before an ownership check is
    /// meaningful (e.g. `submit`'s preflight on an explicit
    /// `collection_id`).
    async fn get_collection(&self, collection_id: &str) -> MetaResult<Option<Collection>>;

    /// List every collection owned by `user_token`, including the implicit
    /// default collection once it has been created.
    async fn list_collections(&self, user_token: &str) -> MetaResult<Vec<Collection>>;

    /// Insert an upload record.
    ///
    /// Fails with [`crate::MetaError::AlreadyExists`] if `doc_id` is
    /// present, [`crate::MetaError::UnknownUser`] if `record.user_token`
    /// does not exist, [`crate::MetaError::UnknownCollection`] if an
    /// explicit `record.collection_id` does not exist, or
    /// [`crate::MetaError::PermissionDenied`] if it exists but is not owned
    /// by `record.user_token`. A `None` `collection_id` is resolved to the
    /// user's default collection, lazily creating it if absent.
    async fn add_upload_record(&self, record: UploadRecord) -> MetaResult<UploadRecord>;

    /// Apply a whitelisted partial update to an upload record.
    ///
    /// Returns whether a row was modified. If `fields.collection_id` is
    /// `Some(Some(id))`, `id`'s existence is verified first. The caller is
    /// responsible for respecting the status state machine; this does not
    /// enforce transition legality.
    async fn update_upload_record(
        &self,
        doc_id: &str,
        fields: UploadRecordUpdate,
    ) -> MetaResult<bool>;

    /// Fetch a single upload record by id.
    async fn get_upload_record(&self, doc_id: &str) -> MetaResult<Option<UploadRecord>>;

    /// List a user's own upload records, most recent first, optionally
    /// filtered by status.
    async fn get_user_uploads(
        &self,
        user_token: &str,
        limit: Option<i64>,
        status: Option<UploadStatus>,
    ) -> MetaResult<Vec<UploadRecord>>;

    /// List a collection's upload records.
    ///
    /// Fails with [`crate::MetaError::PermissionDenied`] if `user_token`
    /// does not own `collection_id`, [`crate::MetaError::UnknownCollection`]
    /// if it does not exist.
    async fn get_collection_uploads(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> MetaResult<Vec<UploadRecord>>;

    /// Delete a single upload record. Idempotent: deleting a missing record
    /// is not an error.
    async fn delete_upload_record(&self, doc_id: &str) -> MetaResult<()>;

    /// Delete a user and cascade their collections and upload records in
    /// one transaction.
    async fn delete_user(&self, user_token: &str) -> MetaResult<()>;
}
