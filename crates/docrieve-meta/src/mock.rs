//! In-memory [`UserRepository`] for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{MetaError, MetaResult};
use crate::models::{
    Collection, DEFAULT_COLLECTION_DESCRIPTION, DEFAULT_COLLECTION_NAME, UploadRecord,
    UploadRecordUpdate, UploadStatus, UserInfo, default_collection_id,
};
use crate::traits::UserRepository;

#[derive(Default)]
struct State {
    users: HashMap<String, UserInfo>,
    collections: HashMap<String, Collection>,
    uploads: HashMap<String, UploadRecord>,
}

/// Mock repository backing every other crate's unit tests, using a plain
/// `Mutex<HashMap<...>>` as its backing store.
#[derive(Default)]
pub struct MockUserRepository {
    state: Mutex<State>,
}

impl MockUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create_user_if_absent(&self, user_token: &str) -> MetaResult<UserInfo> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        Ok(state
            .users
            .entry(user_token.to_string())
            .or_insert_with(|| UserInfo {
                user_token: user_token.to_string(),
                create_time: Utc::now(),
            })
            .clone())
    }

    async fn create_collection(
        &self,
        collection_id: &str,
        name: &str,
        created_by: &str,
        description: Option<&str>,
    ) -> MetaResult<Collection> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        if !state.users.contains_key(created_by) {
            return Err(MetaError::UnknownUser(created_by.to_string()));
        }
        if state.collections.contains_key(collection_id) {
            return Err(MetaError::AlreadyExists(collection_id.to_string()));
        }
        let collection = Collection {
            collection_id: collection_id.to_string(),
            collection_name: name.to_string(),
            description: description.map(str::to_string),
            create_time: Utc::now(),
            created_by: created_by.to_string(),
        };
        state
            .collections
            .insert(collection_id.to_string(), collection.clone());
        Ok(collection)
    }

    async fn get_collection(&self, collection_id: &str) -> MetaResult<Option<Collection>> {
        let state = self.state.lock().expect("mock lock poisoned");
        Ok(state.collections.get(collection_id).cloned())
    }

    async fn list_collections(&self, user_token: &str) -> MetaResult<Vec<Collection>> {
        let state = self.state.lock().expect("mock lock poisoned");
        let mut collections: Vec<Collection> = state
            .collections
            .values()
            .filter(|c| c.created_by == user_token)
            .cloned()
            .collect();
        collections.sort_by(|a, b| a.create_time.cmp(&b.create_time));
        Ok(collections)
    }

    async fn add_upload_record(&self, mut record: UploadRecord) -> MetaResult<UploadRecord> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        if !state.users.contains_key(&record.user_token) {
            return Err(MetaError::UnknownUser(record.user_token));
        }
        if state.uploads.contains_key(&record.doc_id) {
            return Err(MetaError::AlreadyExists(record.doc_id));
        }

        record.collection_id = match record.collection_id.take() {
            Some(collection_id) => {
                let collection = state
                    .collections
                    .get(&collection_id)
                    .ok_or_else(|| MetaError::UnknownCollection(collection_id.clone()))?;
                if collection.created_by != record.user_token {
                    return Err(MetaError::PermissionDenied(format!(
                        "{} does not own collection {collection_id}",
                        record.user_token
                    )));
                }
                Some(collection_id)
            }
            None => {
                let collection_id = default_collection_id(&record.user_token);
                state.collections.entry(collection_id.clone()).or_insert_with(|| Collection {
                    collection_id: collection_id.clone(),
                    collection_name: DEFAULT_COLLECTION_NAME.to_string(),
                    description: Some(DEFAULT_COLLECTION_DESCRIPTION.to_string()),
                    create_time: Utc::now(),
                    created_by: record.user_token.clone(),
                });
                Some(collection_id)
            }
        };

        state.uploads.insert(record.doc_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_upload_record(
        &self,
        doc_id: &str,
        fields: UploadRecordUpdate,
    ) -> MetaResult<bool> {
        let mut state = self.state.lock().expect("mock lock poisoned");

        if let Some(Some(collection_id)) = &fields.collection_id {
            if !state.collections.contains_key(collection_id) {
                return Err(MetaError::UnknownCollection(collection_id.clone()));
            }
        }

        let Some(record) = state.uploads.get_mut(doc_id) else {
            return Ok(false);
        };

        if let Some(collection_id) = fields.collection_id {
            record.collection_id = collection_id;
        }
        if let Some(filename) = fields.filename {
            record.filename = filename;
        }
        if let Some(status) = fields.status {
            record.status = status;
        }
        if let Some(upload_time) = fields.upload_time {
            record.upload_time = upload_time;
        }
        if let Some(process_start_time) = fields.process_start_time {
            record.process_start_time = process_start_time;
        }
        if let Some(process_end_time) = fields.process_end_time {
            record.process_end_time = process_end_time;
        }
        if let Some(err_msg) = fields.err_msg {
            record.err_msg = err_msg;
        }
        if let Some(mime_type) = fields.mime_type {
            record.mime_type = mime_type;
        }
        Ok(true)
    }

    async fn get_upload_record(&self, doc_id: &str) -> MetaResult<Option<UploadRecord>> {
        let state = self.state.lock().expect("mock lock poisoned");
        Ok(state.uploads.get(doc_id).cloned())
    }

    async fn get_user_uploads(
        &self,
        user_token: &str,
        limit: Option<i64>,
        status: Option<UploadStatus>,
    ) -> MetaResult<Vec<UploadRecord>> {
        let state = self.state.lock().expect("mock lock poisoned");
        let mut records: Vec<UploadRecord> = state
            .uploads
            .values()
            .filter(|r| r.user_token == user_token)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        if let Some(limit) = limit {
            #[allow(clippy::cast_sign_loss)]
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }

    async fn get_collection_uploads(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> MetaResult<Vec<UploadRecord>> {
        let state = self.state.lock().expect("mock lock poisoned");
        let collection = state
            .collections
            .get(collection_id)
            .ok_or_else(|| MetaError::UnknownCollection(collection_id.to_string()))?;
        if collection.created_by != user_token {
            return Err(MetaError::PermissionDenied(format!(
                "{user_token} does not own collection {collection_id}"
            )));
        }
        let mut records: Vec<UploadRecord> = state
            .uploads
            .values()
            .filter(|r| r.collection_id.as_deref() == Some(collection_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(records)
    }

    async fn delete_upload_record(&self, doc_id: &str) -> MetaResult<()> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        state.uploads.remove(doc_id);
        Ok(())
    }

    async fn delete_user(&self, user_token: &str) -> MetaResult<()> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        state.uploads.retain(|_, r| r.user_token != user_token);
        state.collections.retain(|_, c| c.created_by != user_token);
        state.users.remove(user_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_user_if_absent_is_idempotent() {
        let repo = MockUserRepository::new();
        let first = repo.create_user_if_absent("alice").await.unwrap();
        let second = repo.create_user_if_absent("alice").await.unwrap();
        assert_eq!(first.create_time, second.create_time);
    }

    #[tokio::test]
    async fn add_upload_record_resolves_null_collection_to_default() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();

        let record = repo
            .add_upload_record(UploadRecord::new_pending(
                "doc1", "alice", None, "a.txt", None,
            ))
            .await
            .unwrap();
        assert_eq!(record.collection_id, Some("default_alice".to_string()));
    }

    #[tokio::test]
    async fn add_upload_record_rejects_cross_owner_collection() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();
        repo.create_user_if_absent("bob").await.unwrap();
        repo.create_collection("c1", "Alice's stuff", "alice", None)
            .await
            .unwrap();

        let err = repo
            .add_upload_record(UploadRecord::new_pending(
                "doc1",
                "bob",
                Some("c1".to_string()),
                "a.txt",
                None,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn add_upload_record_rejects_duplicate_doc_id() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();
        repo.add_upload_record(UploadRecord::new_pending("doc1", "alice", None, "a.txt", None))
            .await
            .unwrap();

        let err = repo
            .add_upload_record(UploadRecord::new_pending("doc1", "alice", None, "b.txt", None))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_collection_uploads_rejects_non_owner() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();
        repo.create_user_if_absent("bob").await.unwrap();
        repo.create_collection("c1", "Alice's stuff", "alice", None)
            .await
            .unwrap();

        let err = repo.get_collection_uploads("bob", "c1").await.unwrap_err();
        assert!(matches!(err, MetaError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn list_collections_only_returns_the_owners_own() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();
        repo.create_user_if_absent("bob").await.unwrap();
        repo.create_collection("c1", "Alice's stuff", "alice", None)
            .await
            .unwrap();
        repo.create_collection("c2", "Bob's stuff", "bob", None)
            .await
            .unwrap();

        let alices = repo.list_collections("alice").await.unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].collection_id, "c1");
    }

    #[tokio::test]
    async fn delete_user_cascades_collections_and_uploads() {
        let repo = MockUserRepository::new();
        repo.create_user_if_absent("alice").await.unwrap();
        repo.create_collection("c1", "Alice's stuff", "alice", None)
            .await
            .unwrap();
        repo.add_upload_record(UploadRecord::new_pending(
            "doc1",
            "alice",
            Some("c1".to_string()),
            "a.txt",
            None,
        ))
        .await
        .unwrap();

        repo.delete_user("alice").await.unwrap();
        assert!(repo.get_upload_record("doc1").await.unwrap().is_none());
        assert!(
            repo.create_collection("c2", "whatever", "alice", None)
                .await
                .is_err()
        );
    }
}
