//! Domain models for the metadata store's three tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user, identified by an opaque bearer token. Created lazily on first
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserInfo {
    pub user_token: String,
    pub create_time: DateTime<Utc>,
}

/// A named logical partition of a user's documents, in both the metadata
/// store and the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub collection_id: String,
    pub collection_name: String,
    pub description: Option<String>,
    pub create_time: DateTime<Utc>,
    pub created_by: String,
}

/// Upload status state machine: pending -> processing -> {completed, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown upload status: {other}")),
        }
    }
}

/// A document's upload record, tracking its journey through the processing
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub doc_id: String,
    pub user_token: String,
    pub collection_id: Option<String>,
    pub filename: String,
    pub mime_type: Option<String>,
    pub status: UploadStatus,
    pub upload_time: DateTime<Utc>,
    pub process_start_time: Option<DateTime<Utc>>,
    pub process_end_time: Option<DateTime<Utc>>,
    pub err_msg: Option<String>,
}

impl UploadRecord {
    /// A new record ready for insertion with status=pending.
    #[must_use]
    pub fn new_pending(
        doc_id: impl Into<String>,
        user_token: impl Into<String>,
        collection_id: Option<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            user_token: user_token.into(),
            collection_id,
            filename: filename.into(),
            mime_type,
            status: UploadStatus::Pending,
            upload_time: Utc::now(),
            process_start_time: None,
            process_end_time: None,
            err_msg: None,
        }
    }
}

/// Whitelisted mutable fields for [`super::traits::UserRepository::update_upload_record`].
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UploadRecordUpdate {
    pub collection_id: Option<Option<String>>,
    pub filename: Option<String>,
    pub status: Option<UploadStatus>,
    pub upload_time: Option<DateTime<Utc>>,
    pub process_start_time: Option<Option<DateTime<Utc>>>,
    pub process_end_time: Option<Option<DateTime<Utc>>>,
    pub err_msg: Option<Option<String>>,
    pub mime_type: Option<Option<String>>,
}

/// The default collection's fixed display name, used when it is lazily
/// created on first upload.
pub const DEFAULT_COLLECTION_NAME: &str = "Default";
pub const DEFAULT_COLLECTION_DESCRIPTION: &str = "Automatically created default collection";

#[must_use]
pub fn default_collection_id(user_token: &str) -> String {
    format!("default_{user_token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_parse() {
        for status in [
            UploadStatus::Pending,
            UploadStatus::Processing,
            UploadStatus::Completed,
            UploadStatus::Failed,
        ] {
            let parsed: UploadStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn default_collection_id_is_namespaced_per_user() {
        assert_eq!(default_collection_id("alice"), "default_alice");
        assert_ne!(default_collection_id("alice"), default_collection_id("bob"));
    }
}
