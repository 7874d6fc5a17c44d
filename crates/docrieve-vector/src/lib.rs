//! Vector index façade: the processing pipeline's only window onto the
//! (external, black-box) vector engine (§4.4).
//!
//! [`VectorIndexFacade`] pairs a [`VectorIndex`] backend with an
//! [`EmbeddingClient`](docrieve_embeddings::EmbeddingClient) so callers can
//! search by raw query text instead of pre-embedding it themselves.

pub mod error;
pub mod storage;

pub use error::{VectorError, VectorResult};
pub use storage::{ChunkWrite, IndexedChunk, MockVectorIndex, QdrantVectorIndex, SearchResults, VectorIndex};

use std::sync::Arc;

/// Combines a [`VectorIndex`] backend with an embedding client so callers can
/// search by text directly. Cloning is cheap; both fields are `Arc`.
#[derive(Clone)]
pub struct VectorIndexFacade {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<docrieve_embeddings::EmbeddingClient>,
}

impl VectorIndexFacade {
    #[must_use]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<docrieve_embeddings::EmbeddingClient>,
    ) -> Self {
        Self { index, embeddings }
    }

    /// Embed `texts` in input order (§4.5 batching/concurrency/backoff
    /// apply), for callers that need to embed several chunks before a
    /// single [`VectorIndexFacade::add_chunks`] call.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.embeddings.embed_batch(texts).await
    }

    /// Embed `query` and search for its nearest chunks.
    ///
    /// # Errors
    /// Returns [`VectorError`] if the underlying engine query fails.
    pub async fn search_by_text(
        &self,
        collection_id: &str,
        query: &str,
        top_k: usize,
    ) -> VectorResult<SearchResults> {
        let vector = self.embeddings.embed_one(query).await;
        self.index.search_by_embedding(collection_id, vector, top_k).await
    }

    /// # Errors
    /// Returns [`VectorError`] if the underlying engine write fails.
    pub async fn add_chunks(
        &self,
        collection_id: &str,
        doc_id: &str,
        chunks: &[ChunkWrite],
    ) -> VectorResult<Vec<String>> {
        self.index.add_chunks(collection_id, doc_id, chunks).await
    }

    /// # Errors
    /// Returns [`VectorError`] if the underlying engine query fails.
    pub async fn list_all(
        &self,
        collection_id: &str,
        limit: Option<usize>,
    ) -> VectorResult<Vec<IndexedChunk>> {
        self.index.list_all(collection_id, limit).await
    }

    /// # Errors
    /// Returns [`VectorError`] if the underlying engine query fails.
    pub async fn document_count(&self, collection_id: &str) -> VectorResult<usize> {
        self.index.document_count(collection_id).await
    }

    /// # Errors
    /// Returns [`VectorError`] if the underlying engine delete fails.
    pub async fn delete_document(&self, collection_id: &str, doc_id: &str) -> VectorResult<usize> {
        self.index.delete_document(collection_id, doc_id).await
    }

    /// # Errors
    /// Returns [`VectorError`] if the underlying engine query fails.
    pub async fn exists(&self, collection_id: &str, doc_id: &str) -> VectorResult<bool> {
        self.index.exists(collection_id, doc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrieve_config::EmbeddingConfig;

    #[tokio::test]
    async fn search_by_text_embeds_then_searches() {
        let index: Arc<dyn VectorIndex> = Arc::new(MockVectorIndex::new());
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
        let facade = VectorIndexFacade::new(index, embeddings);

        // no documents indexed yet, empty text embeds to a zero vector and
        // the mock backend returns no matches
        let results = facade.search_by_text("c1", "", 5).await.unwrap();
        assert!(results.documents.is_empty());
    }
}
