//! In-memory [`VectorIndex`] for unit tests, no Qdrant instance required.

use crate::VectorResult;
use crate::storage::traits::{ChunkWrite, IndexedChunk, SearchResults, VectorIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk_id: String,
    doc_id: String,
    document: String,
    embedding: Vec<f32>,
    metadata: serde_json::Value,
}

/// In-memory stand-in for a real vector engine, keyed by collection id.
/// Similarity is cosine distance computed directly over stored vectors —
/// fine for the small fixtures unit tests use, not meant to scale.
#[derive(Default)]
pub struct MockVectorIndex {
    collections: Mutex<HashMap<String, Vec<StoredChunk>>>,
}

impl MockVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn add_chunks(
        &self,
        collection_id: &str,
        doc_id: &str,
        chunks: &[ChunkWrite],
    ) -> VectorResult<Vec<String>> {
        let mut collections = self.collections.lock().expect("mock lock poisoned");
        let store = collections.entry(collection_id.to_string()).or_default();

        let mut ids = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_id = format!("{doc_id}_{index}");
            store.push(StoredChunk {
                chunk_id: chunk_id.clone(),
                doc_id: doc_id.to_string(),
                document: chunk.text.clone(),
                embedding: chunk.embedding.clone(),
                metadata: chunk.metadata.clone(),
            });
            ids.push(chunk_id);
        }
        Ok(ids)
    }

    async fn search_by_embedding(
        &self,
        collection_id: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<SearchResults> {
        let collections = self.collections.lock().expect("mock lock poisoned");
        let Some(store) = collections.get(collection_id) else {
            return Ok(SearchResults::default());
        };

        let mut scored: Vec<(&StoredChunk, f32)> = store
            .iter()
            .map(|c| (c, cosine_distance(&vector, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut results = SearchResults::default();
        for (chunk, distance) in scored.into_iter().take(top_k) {
            results.chunk_ids.push(chunk.chunk_id.clone());
            results.documents.push(chunk.document.clone());
            results.metadatas.push(chunk.metadata.clone());
            results.distances.push(distance);
        }
        Ok(results)
    }

    async fn list_all(
        &self,
        collection_id: &str,
        limit: Option<usize>,
    ) -> VectorResult<Vec<IndexedChunk>> {
        let collections = self.collections.lock().expect("mock lock poisoned");
        let Some(store) = collections.get(collection_id) else {
            return Ok(Vec::new());
        };
        let iter = store.iter().map(|c| IndexedChunk {
            chunk_id: c.chunk_id.clone(),
            document: c.document.clone(),
            metadata: c.metadata.clone(),
        });
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn document_count(&self, collection_id: &str) -> VectorResult<usize> {
        let collections = self.collections.lock().expect("mock lock poisoned");
        Ok(collections.get(collection_id).map_or(0, Vec::len))
    }

    async fn delete_document(&self, collection_id: &str, doc_id: &str) -> VectorResult<usize> {
        let mut collections = self.collections.lock().expect("mock lock poisoned");
        let Some(store) = collections.get_mut(collection_id) else {
            return Ok(0);
        };
        let before = store.len();
        store.retain(|c| c.doc_id != doc_id);
        Ok(before - store.len())
    }

    async fn exists(&self, collection_id: &str, doc_id: &str) -> VectorResult<bool> {
        let collections = self.collections.lock().expect("mock lock poisoned");
        Ok(collections
            .get(collection_id)
            .is_some_and(|store| store.iter().any(|c| c.doc_id == doc_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, embedding: Vec<f32>) -> ChunkWrite {
        ChunkWrite {
            text: text.to_string(),
            embedding,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn add_then_search_returns_closest_first() {
        let index = MockVectorIndex::new();
        index
            .add_chunks(
                "c1",
                "doc1",
                &[chunk("near", vec![1.0, 0.0]), chunk("far", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let results = index
            .search_by_embedding("c1", vec![1.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(results.documents[0], "near");
    }

    #[tokio::test]
    async fn delete_document_is_idempotent() {
        let index = MockVectorIndex::new();
        index
            .add_chunks("c1", "doc1", &[chunk("a", vec![1.0]), chunk("b", vec![1.0])])
            .await
            .unwrap();

        assert_eq!(index.delete_document("c1", "doc1").await.unwrap(), 2);
        assert_eq!(index.delete_document("c1", "doc1").await.unwrap(), 0);
        assert!(!index.exists("c1", "doc1").await.unwrap());
    }

    #[tokio::test]
    async fn document_count_tracks_collection_size() {
        let index = MockVectorIndex::new();
        assert_eq!(index.document_count("c1").await.unwrap(), 0);
        index
            .add_chunks("c1", "doc1", &[chunk("a", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.document_count("c1").await.unwrap(), 1);
    }
}
