//! Thin façade the processing manager calls for `search` (§4.9).

use std::sync::Arc;

use docrieve_vector::{SearchResults, VectorIndexFacade};

use crate::error::SearchResult;

/// Wraps [`VectorIndexFacade::search_by_text`], adding the one piece of
/// ambient behavior production search code always has: a span per query
/// recording how long it took.
///
/// This crate performs no access control; the caller (the processing
/// manager) is responsible for verifying collection ownership before
/// calling it (§4.4 "Ownership").
pub struct SearchService {
    vector: Arc<VectorIndexFacade>,
}

impl SearchService {
    #[must_use]
    pub fn new(vector: Arc<VectorIndexFacade>) -> Self {
        Self { vector }
    }

    /// Embed `query` and return its `top_k` nearest chunks in
    /// `collection_id`.
    ///
    /// # Errors
    /// Returns [`crate::SearchError`] if the underlying vector engine
    /// query fails.
    #[tracing::instrument(skip(self, query), fields(collection_id, top_k, elapsed_ms))]
    pub async fn search(
        &self,
        collection_id: &str,
        query: &str,
        top_k: usize,
    ) -> SearchResult<SearchResults> {
        let start = std::time::Instant::now();
        let results = self.vector.search_by_text(collection_id, query, top_k).await?;
        tracing::Span::current().record("elapsed_ms", start.elapsed().as_millis());
        tracing::debug!(hits = results.documents.len(), "search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrieve_config::EmbeddingConfig;
    use docrieve_vector::{MockVectorIndex, VectorIndex};

    fn facade() -> VectorIndexFacade {
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
        VectorIndexFacade::new(index, embeddings)
    }

    #[tokio::test]
    async fn search_against_empty_collection_returns_no_hits() {
        let service = SearchService::new(Arc::new(facade()));
        let results = service.search("c1", "hello world", 5).await.unwrap();
        assert!(results.documents.is_empty());
    }
}
