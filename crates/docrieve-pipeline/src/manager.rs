//! The processing manager: submission path, worker pool, and the
//! status/query operation surface the rest of the system calls (§4.7/§4.8).
//!
//! A document is the unit of work end to end here, rather than a stream of
//! independently schedulable chunks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use docrieve_blob::BlobStore;
use docrieve_config::{ChunkingConfig, PipelineConfig};
use docrieve_convert::TextConverter;
use docrieve_meta::{
    Collection, UploadRecord, UploadRecordUpdate, UploadStatus, UserRepository,
};
use docrieve_search::SearchService;
use docrieve_vector::{ChunkWrite, IndexedChunk, SearchResults, VectorIndexFacade};
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult, classify_meta_error};
use crate::queue::{InMemoryTaskQueue, QueueStatus, Task, TaskStatus};

/// Document count for one (user, collection) pair, as surfaced by
/// `index_collection_stats`/`list_user_collections_with_counts`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection_id: String,
    pub document_count: usize,
}

/// Tunables for [`ProcessingManager`]. `max_workers` also sizes the
/// in-flight-work semaphore (§5 "a semaphore of size `W`").
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub max_workers: usize,
    pub queue_poll_interval_ms: u64,
    pub enable_vector_index: bool,
    pub shutdown_timeout: Duration,
}

impl ManagerConfig {
    #[must_use]
    pub fn from_pipeline_config(config: &PipelineConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            queue_poll_interval_ms: config.queue_poll_interval_ms,
            enable_vector_index: true,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// The orchestrator (§4.7). Owns no state of its own beyond the in-process
/// task queue mirror and a shutdown flag; the metadata store remains the
/// source of truth for everything else.
pub struct ProcessingManager {
    meta: Arc<dyn UserRepository>,
    blob: Arc<BlobStore>,
    converter: Arc<dyn TextConverter>,
    vector: Arc<VectorIndexFacade>,
    search: SearchService,
    queue: Arc<InMemoryTaskQueue>,
    chunking: ChunkingConfig,
    config: ManagerConfig,
    semaphore: Arc<Semaphore>,
    shutdown_signal: Arc<AtomicBool>,
}

impl ProcessingManager {
    #[must_use]
    pub fn new(
        meta: Arc<dyn UserRepository>,
        blob: Arc<BlobStore>,
        converter: Arc<dyn TextConverter>,
        vector: Arc<VectorIndexFacade>,
        queue: Arc<InMemoryTaskQueue>,
        chunking: ChunkingConfig,
        config: ManagerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let search = SearchService::new(Arc::clone(&vector));
        Self {
            meta,
            blob,
            converter,
            vector,
            search,
            queue,
            chunking,
            config,
            semaphore,
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle callers can flip to request shutdown of [`Self::run`].
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_signal)
    }

    /// Submission path (§4.7): persist the original bytes and an upload
    /// record, then enqueue a task. Any failure before enqueue rolls back
    /// whatever was already written so submission is all-or-nothing.
    ///
    /// # Errors
    /// Returns [`PipelineError::UnknownCollection`] if `collection_id` is
    /// supplied but does not exist, or a wrapped blob/metadata error.
    pub async fn submit<S, E>(
        &self,
        user_token: &str,
        filename: &str,
        mime_type: Option<String>,
        collection_id: Option<String>,
        doc_id: Option<String>,
        body: S,
    ) -> PipelineResult<String>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let doc_id = doc_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        self.meta
            .create_user_if_absent(user_token)
            .await
            .map_err(classify_meta_error)?;

        if let Some(collection_id) = &collection_id {
            self.meta
                .get_collection(collection_id)
                .await
                .map_err(classify_meta_error)?
                .ok_or_else(|| PipelineError::UnknownCollection(collection_id.clone()))?;
        }

        self.blob
            .save_original(user_token, &doc_id, filename, body)
            .await?;

        let record = UploadRecord::new_pending(
            doc_id.clone(),
            user_token,
            collection_id,
            filename,
            mime_type,
        );
        if let Err(e) = self.meta.add_upload_record(record).await {
            let _ = self.blob.delete_doc(user_token, &doc_id).await;
            return Err(classify_meta_error(e));
        }

        self.queue.add(Task {
            doc_id: doc_id.clone(),
            user_token: user_token.to_string(),
            filename: filename.to_string(),
            created_at: Utc::now(),
        });

        Ok(doc_id)
    }

    /// Run the worker pool until [`Self::shutdown_handle`] is flipped, then
    /// wait up to `config.shutdown_timeout` for in-flight tasks before
    /// abandoning them (§4.7 "Lifecycle").
    pub async fn run(&self) {
        tracing::info!(workers = self.config.max_workers, "processing manager started");

        let mut join_set = tokio::task::JoinSet::new();
        for worker_id in 0..self.config.max_workers {
            let meta = Arc::clone(&self.meta);
            let blob = Arc::clone(&self.blob);
            let converter = Arc::clone(&self.converter);
            let vector = Arc::clone(&self.vector);
            let queue = Arc::clone(&self.queue);
            let semaphore = Arc::clone(&self.semaphore);
            let shutdown = Arc::clone(&self.shutdown_signal);
            let chunk_size = self.chunking.chunk_size;
            let overlap = self.chunking.overlap;
            let enable_vector_index = self.config.enable_vector_index;
            let poll_interval_ms = self.config.queue_poll_interval_ms;

            join_set.spawn(async move {
                worker_loop(
                    worker_id,
                    meta,
                    blob,
                    converter,
                    vector,
                    queue,
                    semaphore,
                    chunk_size,
                    overlap,
                    enable_vector_index,
                    shutdown,
                    poll_interval_ms,
                )
                .await;
            });
        }

        loop {
            if self.shutdown_signal.load(Ordering::Relaxed) {
                tracing::info!("shutdown signal received, waiting for workers to finish");
                break;
            }
            sleep(Duration::from_millis(self.config.queue_poll_interval_ms)).await;
        }

        let drain = async {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "processing worker panicked");
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = join_set.len(),
                "shutdown timeout elapsed, abandoning in-flight workers"
            );
            join_set.abort_all();
        }

        tracing::info!("processing manager stopped");
    }

    /// Read-only status lookup, source of truth is the metadata store.
    ///
    /// # Errors
    /// Returns [`PipelineError::NotFound`] if `doc_id` does not exist.
    pub async fn get_task(&self, doc_id: &str) -> PipelineResult<UploadRecord> {
        self.meta
            .get_upload_record(doc_id)
            .await
            .map_err(classify_meta_error)?
            .ok_or_else(|| PipelineError::NotFound(doc_id.to_string()))
    }

    #[must_use]
    pub fn get_queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// # Errors
    /// Returns a wrapped metadata error if the query fails.
    pub async fn list_user_tasks(
        &self,
        user_token: &str,
        limit: Option<i64>,
        status: Option<UploadStatus>,
    ) -> PipelineResult<Vec<UploadRecord>> {
        self.meta
            .get_user_uploads(user_token, limit, status)
            .await
            .map_err(classify_meta_error)
    }

    /// # Errors
    /// Returns [`PipelineError::AlreadyExists`] if `collection_id` is taken.
    pub async fn create_collection(
        &self,
        collection_id: &str,
        name: &str,
        user_token: &str,
        description: Option<&str>,
    ) -> PipelineResult<Collection> {
        self.meta
            .create_user_if_absent(user_token)
            .await
            .map_err(classify_meta_error)?;
        self.meta
            .create_collection(collection_id, name, user_token, description)
            .await
            .map_err(classify_meta_error)
    }

    /// # Errors
    /// Returns a wrapped metadata error if the query fails.
    pub async fn list_collections(&self, user_token: &str) -> PipelineResult<Vec<Collection>> {
        self.meta
            .list_collections(user_token)
            .await
            .map_err(classify_meta_error)
    }

    /// # Errors
    /// Returns [`PipelineError::PermissionDenied`] if `user_token` does not
    /// own `collection_id`.
    pub async fn list_collection_documents(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> PipelineResult<Vec<UploadRecord>> {
        self.meta
            .get_collection_uploads(user_token, collection_id)
            .await
            .map_err(classify_meta_error)
    }

    async fn check_collection_ownership(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> PipelineResult<()> {
        let collection = self
            .meta
            .get_collection(collection_id)
            .await
            .map_err(classify_meta_error)?
            .ok_or_else(|| PipelineError::UnknownCollection(collection_id.to_string()))?;
        if collection.created_by != user_token {
            return Err(PipelineError::PermissionDenied(format!(
                "{user_token} does not own collection {collection_id}"
            )));
        }
        Ok(())
    }

    /// Verifies ownership, then delegates to the façade (§4.7).
    ///
    /// # Errors
    /// Returns [`PipelineError::PermissionDenied`]/[`PipelineError::UnknownCollection`]
    /// if ownership fails, or a wrapped vector error.
    #[tracing::instrument(skip(self, query))]
    pub async fn search(
        &self,
        user_token: &str,
        collection_id: &str,
        query: &str,
        top_k: usize,
    ) -> PipelineResult<SearchResults> {
        self.check_collection_ownership(user_token, collection_id)
            .await?;
        Ok(self.search.search(collection_id, query, top_k).await?)
    }

    /// # Errors
    /// Returns an ownership error or a wrapped vector error.
    pub async fn list_index_documents(
        &self,
        user_token: &str,
        collection_id: &str,
        limit: Option<usize>,
    ) -> PipelineResult<Vec<IndexedChunk>> {
        self.check_collection_ownership(user_token, collection_id)
            .await?;
        Ok(self.vector.list_all(collection_id, limit).await?)
    }

    /// # Errors
    /// Returns an ownership error or a wrapped vector error.
    pub async fn index_document_count(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> PipelineResult<usize> {
        self.check_collection_ownership(user_token, collection_id)
            .await?;
        Ok(self.vector.document_count(collection_id).await?)
    }

    /// # Errors
    /// Returns an ownership error or a wrapped vector error.
    pub async fn delete_document_from_index(
        &self,
        user_token: &str,
        collection_id: &str,
        doc_id: &str,
    ) -> PipelineResult<usize> {
        self.check_collection_ownership(user_token, collection_id)
            .await?;
        Ok(self.vector.delete_document(collection_id, doc_id).await?)
    }

    /// # Errors
    /// Returns an ownership error or a wrapped vector error.
    pub async fn index_collection_stats(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> PipelineResult<CollectionStats> {
        self.check_collection_ownership(user_token, collection_id)
            .await?;
        let document_count = self.vector.document_count(collection_id).await?;
        Ok(CollectionStats {
            collection_id: collection_id.to_string(),
            document_count,
        })
    }

    /// # Errors
    /// Returns a wrapped metadata or vector error.
    pub async fn list_user_collections_with_counts(
        &self,
        user_token: &str,
    ) -> PipelineResult<Vec<CollectionStats>> {
        let collections = self
            .meta
            .list_collections(user_token)
            .await
            .map_err(classify_meta_error)?;
        let mut stats = Vec::with_capacity(collections.len());
        for collection in collections {
            let document_count = self.vector.document_count(&collection.collection_id).await?;
            stats.push(CollectionStats {
                collection_id: collection.collection_id,
                document_count,
            });
        }
        Ok(stats)
    }

    /// Delete an upload record and cascade to its blobs and (if indexed)
    /// vector-index entries (§6 "wraps blob+metadata+index delete").
    /// Idempotent for an unknown `doc_id`, matching
    /// [`UserRepository::delete_upload_record`]'s own idempotence.
    ///
    /// # Errors
    /// Returns [`PipelineError::PermissionDenied`] if `doc_id` belongs to a
    /// different user, or a wrapped blob/metadata error.
    pub async fn delete_upload_record(&self, user_token: &str, doc_id: &str) -> PipelineResult<()> {
        if let Some(record) = self
            .meta
            .get_upload_record(doc_id)
            .await
            .map_err(classify_meta_error)?
        {
            if record.user_token != user_token {
                return Err(PipelineError::PermissionDenied(format!(
                    "{user_token} does not own document {doc_id}"
                )));
            }
            self.blob.delete_doc(user_token, doc_id).await?;
            if let Some(collection_id) = &record.collection_id {
                if let Err(e) = self.vector.delete_document(collection_id, doc_id).await {
                    tracing::warn!(doc_id, error = %e, "vector index delete failed during document delete");
                }
            }
        }
        self.meta
            .delete_upload_record(doc_id)
            .await
            .map_err(classify_meta_error)?;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    meta: Arc<dyn UserRepository>,
    blob: Arc<BlobStore>,
    converter: Arc<dyn TextConverter>,
    vector: Arc<VectorIndexFacade>,
    queue: Arc<InMemoryTaskQueue>,
    semaphore: Arc<Semaphore>,
    chunk_size: usize,
    overlap: usize,
    enable_vector_index: bool,
    shutdown: Arc<AtomicBool>,
    poll_interval_ms: u64,
) {
    tracing::debug!(worker_id, "processing worker starting");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let Some(task) = queue.claim_next() else {
            sleep(Duration::from_millis(poll_interval_ms)).await;
            continue;
        };

        let permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        tracing::info!(worker_id, doc_id = %task.doc_id, "processing document");
        let result = process_task(
            &task,
            &meta,
            &blob,
            &converter,
            &vector,
            chunk_size,
            overlap,
            enable_vector_index,
        )
        .await;
        drop(permit);

        match result {
            Ok(()) => {
                queue.update_status(&task.doc_id, TaskStatus::Completed, None);
            }
            Err(e) => {
                tracing::error!(worker_id, doc_id = %task.doc_id, error = %e, "document processing failed");
                queue.update_status(&task.doc_id, TaskStatus::Failed, Some(e.to_string()));
                let _ = meta
                    .update_upload_record(
                        &task.doc_id,
                        UploadRecordUpdate {
                            status: Some(UploadStatus::Failed),
                            process_end_time: Some(Some(Utc::now())),
                            err_msg: Some(Some(e.to_string())),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
    }

    tracing::debug!(worker_id, "processing worker stopping");
}

async fn process_task(
    task: &Task,
    meta: &Arc<dyn UserRepository>,
    blob: &BlobStore,
    converter: &Arc<dyn TextConverter>,
    vector: &VectorIndexFacade,
    chunk_size: usize,
    overlap: usize,
    enable_vector_index: bool,
) -> PipelineResult<()> {
    meta.update_upload_record(
        &task.doc_id,
        UploadRecordUpdate {
            status: Some(UploadStatus::Processing),
            process_start_time: Some(Some(Utc::now())),
            ..Default::default()
        },
    )
    .await
    .map_err(classify_meta_error)?;

    let record = meta
        .get_upload_record(&task.doc_id)
        .await
        .map_err(classify_meta_error)?
        .ok_or_else(|| PipelineError::NotFound(task.doc_id.clone()))?;

    let origin_path = blob
        .find_origin_path(&task.user_token, &task.doc_id)
        .await?
        .ok_or_else(|| PipelineError::FileMissing(task.doc_id.clone()))?;

    let text = converter
        .convert(&origin_path)
        .await
        .map_err(|e| PipelineError::ConversionFailed(e.to_string()))?;

    blob.write_processed(&task.user_token, &task.doc_id, &text)
        .await?;

    if enable_vector_index && !text.is_empty() {
        let collection_id = record
            .collection_id
            .clone()
            .unwrap_or_else(|| docrieve_meta::default_collection_id(&task.user_token));

        if let Err(e) = index_document(
            vector,
            &collection_id,
            &task.doc_id,
            &task.user_token,
            &task.filename,
            &text,
            chunk_size,
            overlap,
        )
        .await
        {
            tracing::warn!(doc_id = %task.doc_id, error = %e, "vector index write failed; document still marked completed");
        }
    }

    meta.update_upload_record(
        &task.doc_id,
        UploadRecordUpdate {
            status: Some(UploadStatus::Completed),
            process_end_time: Some(Some(Utc::now())),
            ..Default::default()
        },
    )
    .await
    .map_err(classify_meta_error)?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn index_document(
    vector: &VectorIndexFacade,
    collection_id: &str,
    doc_id: &str,
    user_token: &str,
    filename: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> PipelineResult<()> {
    let pieces = docrieve_chunking::chunk(text, chunk_size, overlap)?;
    if pieces.is_empty() {
        return Ok(());
    }

    let embeddings = vector.embed_batch(&pieces).await;
    let created_at = Utc::now();
    let chunks: Vec<ChunkWrite> = pieces
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(chunk_index, (text, embedding))| {
            let text_length = text.chars().count();
            ChunkWrite {
                text,
                embedding,
                metadata: serde_json::json!({
                    "doc_id": doc_id,
                    "chunk_index": chunk_index,
                    "user_token": user_token,
                    "collection_id": collection_id,
                    "filename": filename,
                    "text_length": text_length,
                    "created_at": created_at,
                }),
            }
        })
        .collect();

    vector.add_chunks(collection_id, doc_id, &chunks).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrieve_config::EmbeddingConfig;
    use docrieve_convert::PlainTextConverter;
    use docrieve_meta::MockUserRepository;
    use docrieve_vector::MockVectorIndex;
    use futures_util::stream;
    use std::time::Duration as StdDuration;

    fn test_manager(dir: &tempfile::TempDir) -> ProcessingManager {
        let meta: Arc<dyn UserRepository> = Arc::new(MockUserRepository::new());
        let blob = Arc::new(BlobStore::new(dir.path()));
        let converter: Arc<dyn TextConverter> = Arc::new(PlainTextConverter);
        let index: Arc<dyn docrieve_vector::VectorIndex> = Arc::new(MockVectorIndex::new());
        let embeddings = Arc::new(docrieve_embeddings::EmbeddingClient::new_unprobed(
            EmbeddingConfig {
                api_url: "http://127.0.0.1:0".to_string(),
                model_name: "bge-m3".to_string(),
                dimension: 4,
                batch_size: 8,
                concurrency_limit: 2,
                max_retries: 1,
                retry_base_delay_ms: 1,
                request_timeout_seconds: 1,
            },
        ));
        let vector = Arc::new(VectorIndexFacade::new(index, embeddings));
        let queue = Arc::new(InMemoryTaskQueue::new());
        let chunking = ChunkingConfig {
            chunk_size: 3000,
            overlap: 500,
        };
        let config = ManagerConfig {
            max_workers: 2,
            queue_poll_interval_ms: 10,
            enable_vector_index: true,
            shutdown_timeout: StdDuration::from_secs(2),
        };
        ProcessingManager::new(meta, blob, converter, vector, queue, chunking, config)
    }

    #[tokio::test]
    async fn submit_creates_pending_record_and_enqueues() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(&dir);
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"Hello world. This is a test. Goodbye.",
        ))]);

        let doc_id = manager
            .submit("u1", "a.txt", None, None, None, body)
            .await
            .unwrap();

        let record = manager.get_task(&doc_id).await.unwrap();
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.collection_id.as_deref(), Some("default_u1"));
        assert_eq!(manager.get_queue_status().queue_size, 1);
    }

    #[tokio::test]
    async fn submit_rejects_unknown_collection() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(&dir);
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hi"))]);

        let err = manager
            .submit("u1", "a.txt", None, Some("nope".to_string()), None, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCollection(_)));
    }

    #[tokio::test]
    async fn worker_pool_drains_queue_to_completed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(&dir));

        for i in 0..4 {
            let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
                b"Hello world. This is a test. Goodbye.",
            ))]);
            manager
                .submit("u1", &format!("doc{i}.txt"), None, None, None, body)
                .await
                .unwrap();
        }

        let shutdown = manager.shutdown_handle();
        let run_manager = Arc::clone(&manager);
        let handle = tokio::spawn(async move { run_manager.run().await });

        let mut completed = 0;
        for _ in 0..200 {
            if manager.get_queue_status().completed_count == 4 {
                completed = 4;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        assert_eq!(completed, 4);

        shutdown.store(true, Ordering::Relaxed);
        handle.await.unwrap();

        let tasks = manager.list_user_tasks("u1", None, None).await.unwrap();
        assert!(tasks.iter().all(|t| t.status == UploadStatus::Completed));
    }

    #[tokio::test]
    async fn search_rejects_non_owner() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(&dir);
        manager
            .create_collection("c1", "Shared", "alice", None)
            .await
            .unwrap();

        let err = manager
            .search("bob", "c1", "hello", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn delete_upload_record_rejects_non_owner() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(&dir);
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hi"))]);
        let doc_id = manager
            .submit("alice", "a.txt", None, None, None, body)
            .await
            .unwrap();

        let err = manager
            .delete_upload_record("bob", &doc_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PermissionDenied(_)));
    }
}
