//! The vector index façade — the only interface the processing pipeline
//! uses to talk to the (external, black-box) vector engine.

use crate::VectorResult;
use async_trait::async_trait;

/// One already-embedded chunk ready to be written to the index.
#[derive(Debug, Clone)]
pub struct ChunkWrite {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// Results of a similarity search, in descending order of relevance.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub chunk_ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<serde_json::Value>,
    /// Cosine-style distance for each result, smaller is more similar.
    pub distances: Vec<f32>,
}

impl SearchResults {
    /// `1 - distance` for every result, the "higher is better" score
    /// surfaced to callers (§ glossary, "Relevance score").
    #[must_use]
    pub fn relevance_scores(&self) -> Vec<f32> {
        self.distances.iter().map(|d| 1.0 - d).collect()
    }
}

/// One chunk as returned by [`VectorIndex::list_all`].
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub document: String,
    pub metadata: serde_json::Value,
}

/// Per-user handle over a per-(user, collection) partition of the vector
/// engine (§4.4).
///
/// The metadata store is authoritative for collection ownership; this
/// trait performs no access-control checks of its own — callers (the
/// processing manager) must verify ownership before invoking it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write `chunks` for `doc_id`, assigning ids `{doc_id}_0 ..
    /// {doc_id}_{n-1}` in input order. Duplicate adds for an id already
    /// present are engine-defined (the pipeline only adds on first
    /// successful processing, so this never happens in practice).
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine rejects the write.
    async fn add_chunks(
        &self,
        collection_id: &str,
        doc_id: &str,
        chunks: &[ChunkWrite],
    ) -> VectorResult<Vec<String>>;

    /// Return up to `top_k` nearest chunks to `vector`.
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine query fails.
    async fn search_by_embedding(
        &self,
        collection_id: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<SearchResults>;

    /// Enumerate up to `limit` chunks in `collection_id` (all of them, if
    /// `limit` is `None`).
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine query fails.
    async fn list_all(
        &self,
        collection_id: &str,
        limit: Option<usize>,
    ) -> VectorResult<Vec<IndexedChunk>>;

    /// Count the chunks currently stored in `collection_id`.
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine query fails.
    async fn document_count(&self, collection_id: &str) -> VectorResult<usize>;

    /// Remove every chunk belonging to `doc_id`, returning how many were
    /// deleted. Calling this twice in a row returns the real count, then
    /// `0` (§8 idempotence property).
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine delete fails.
    async fn delete_document(&self, collection_id: &str, doc_id: &str) -> VectorResult<usize>;

    /// Whether any chunk for `doc_id` is currently indexed.
    ///
    /// # Errors
    /// Returns [`crate::VectorError`] if the engine query fails.
    async fn exists(&self, collection_id: &str, doc_id: &str) -> VectorResult<bool>;
}
