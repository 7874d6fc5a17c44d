//! Qdrant-backed implementation of the vector index façade.
//!
//! A collection maps to one Qdrant collection, named `doc_{collection_id}`
//! (sanitized to Qdrant's allowed character set). `collection_id` is
//! system-wide unique (§3 invariant), so this alone is enough to partition
//! the engine's storage one-to-one with the metadata store's notion of a
//! collection; ownership is the metadata store's job, not this layer's
//! (§4.4 "Ownership"). Collection creation is cached in a [`DashSet`] so a
//! busy worker doesn't round-trip an existence check on every add.
//!
//! Logical chunk ids (`{doc_id}_{chunk_index}`, per §4.4) are stored in each
//! point's payload rather than used as the Qdrant point id directly —
//! Qdrant point ids must be an unsigned integer or a UUID, so the point id
//! is a UUIDv5 derived deterministically from the logical chunk id.

use crate::storage::traits::{ChunkWrite, IndexedChunk, SearchResults, VectorIndex};
use crate::{VectorError, VectorResult};
use async_trait::async_trait;
use dashmap::DashSet;
use qdrant_client::{Payload, Qdrant};
use qdrant_client::qdrant::condition::ConditionOneOf;
use qdrant_client::qdrant::points_selector::PointsSelectorOneOf;
use qdrant_client::qdrant::r#match::MatchValue;
use qdrant_client::qdrant::{
    CollectionExistsRequest, Condition, CountPoints, CreateCollection, DeletePoints, Distance,
    FieldCondition, Filter, Match, PointId, PointStruct, PointsSelector, ScrollPoints,
    SearchPoints, UpsertPoints, Value, VectorParams,
};
use std::collections::HashMap;

/// Qdrant-backed [`VectorIndex`], shared across every tenant in the
/// process — collections are partitioned by `collection_id` alone.
pub struct QdrantVectorIndex {
    client: Qdrant,
    dimension: u64,
    ensured_collections: DashSet<String>,
}

impl QdrantVectorIndex {
    /// Connect to Qdrant at `url`.
    ///
    /// # Errors
    /// Returns [`VectorError::Engine`] if the client cannot be constructed.
    pub fn connect(url: &str, dimension: usize) -> VectorResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Ok(api_key) = std::env::var("QDRANT_API_KEY") {
            builder = builder.api_key(api_key);
        }
        let client = builder
            .build()
            .map_err(|e| VectorError::Engine(format!("failed to create qdrant client: {e}")))?;
        Ok(Self {
            client,
            dimension: dimension as u64,
            ensured_collections: DashSet::new(),
        })
    }

    fn collection_name(collection_id: &str) -> String {
        let sanitized: String = collection_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("doc_{sanitized}")
    }

    async fn ensure_collection(&self, collection_id: &str) -> VectorResult<String> {
        let name = Self::collection_name(collection_id);
        if self.ensured_collections.contains(&name) {
            return Ok(name);
        }

        let exists = self
            .client
            .collection_exists(CollectionExistsRequest {
                collection_name: name.clone(),
            })
            .await
            .map_err(|e| VectorError::Engine(format!("collection_exists failed: {e}")))?;

        if !exists {
            let request = CreateCollection {
                collection_name: name.clone(),
                vectors_config: Some(
                    VectorParams {
                        size: self.dimension,
                        distance: Distance::Cosine as i32,
                        ..Default::default()
                    }
                    .into(),
                ),
                ..Default::default()
            };
            match self.client.create_collection(request).await {
                Ok(_) => {}
                Err(e) if e.to_string().contains("already exists") => {}
                Err(e) => return Err(VectorError::Engine(format!("create_collection failed: {e}"))),
            }
        }

        self.ensured_collections.insert(name.clone());
        Ok(name)
    }

    fn point_id_for(collection_id: &str, chunk_id: &str) -> PointId {
        let name = format!("{collection_id}/{chunk_id}");
        let uuid = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes());
        PointId::from(uuid.to_string())
    }

    fn doc_id_filter(doc_id: &str) -> Filter {
        Filter {
            must: vec![Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: "doc_id".to_string(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::Keyword(doc_id.to_string())),
                    }),
                    ..Default::default()
                })),
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    #[tracing::instrument(skip(self, chunks), fields(doc_id, chunk_count = chunks.len()))]
    async fn add_chunks(
        &self,
        collection_id: &str,
        doc_id: &str,
        chunks: &[ChunkWrite],
    ) -> VectorResult<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let collection_name = self.ensure_collection(collection_id).await?;

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        let mut points = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_id = format!("{doc_id}_{index}");
            let point_id = Self::point_id_for(collection_id, &chunk_id);

            let mut payload: HashMap<String, Value> = HashMap::new();
            payload.insert("chunk_id".to_string(), Value::from(chunk_id.clone()));
            payload.insert("doc_id".to_string(), Value::from(doc_id.to_string()));
            payload.insert("document".to_string(), Value::from(chunk.text.clone()));
            payload.insert(
                "metadata".to_string(),
                Value::from(chunk.metadata.to_string()),
            );

            points.push(PointStruct::new(
                point_id,
                chunk.embedding.clone(),
                Payload::from(payload),
            ));
            chunk_ids.push(chunk_id);
        }

        let request = UpsertPoints {
            collection_name,
            points,
            ..Default::default()
        };
        self.client
            .upsert_points(request)
            .await
            .map_err(|e| VectorError::Engine(format!("upsert failed: {e}")))?;

        Ok(chunk_ids)
    }

    #[tracing::instrument(skip(self, vector), fields(query_dim = vector.len(), top_k))]
    async fn search_by_embedding(
        &self,
        collection_id: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<SearchResults> {
        let collection_name = self.ensure_collection(collection_id).await?;

        let request = SearchPoints {
            collection_name,
            vector,
            limit: top_k as u64,
            with_payload: Some(true.into()),
            ..Default::default()
        };
        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorError::Engine(format!("search failed: {e}")))?;

        let mut results = SearchResults::default();
        for scored in response.result {
            let payload = &scored.payload;
            results.chunk_ids.push(string_field(payload, "chunk_id"));
            results.documents.push(string_field(payload, "document"));
            results
                .metadatas
                .push(metadata_field(payload, "metadata"));
            results.distances.push(1.0 - scored.score);
        }
        Ok(results)
    }

    async fn list_all(
        &self,
        collection_id: &str,
        limit: Option<usize>,
    ) -> VectorResult<Vec<IndexedChunk>> {
        let collection_name = self.ensure_collection(collection_id).await?;

        let request = ScrollPoints {
            collection_name,
            limit: Some(limit.unwrap_or(10_000) as u32),
            with_payload: Some(true.into()),
            with_vectors: Some(false.into()),
            ..Default::default()
        };
        let response = self
            .client
            .scroll(request)
            .await
            .map_err(|e| VectorError::Engine(format!("scroll failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| IndexedChunk {
                chunk_id: string_field(&point.payload, "chunk_id"),
                document: string_field(&point.payload, "document"),
                metadata: metadata_field(&point.payload, "metadata"),
            })
            .collect())
    }

    async fn document_count(&self, collection_id: &str) -> VectorResult<usize> {
        let collection_name = self.ensure_collection(collection_id).await?;
        let request = CountPoints {
            collection_name,
            exact: Some(true),
            ..Default::default()
        };
        let response = self
            .client
            .count(request)
            .await
            .map_err(|e| VectorError::Engine(format!("count failed: {e}")))?;
        Ok(response
            .result
            .map(|r| r.count as usize)
            .unwrap_or_default())
    }

    async fn delete_document(&self, collection_id: &str, doc_id: &str) -> VectorResult<usize> {
        let collection_name = self.ensure_collection(collection_id).await?;
        let filter = Self::doc_id_filter(doc_id);

        let count_request = CountPoints {
            collection_name: collection_name.clone(),
            filter: Some(filter.clone()),
            exact: Some(true),
            ..Default::default()
        };
        let deleted = self
            .client
            .count(count_request)
            .await
            .map_err(|e| VectorError::Engine(format!("count before delete failed: {e}")))?
            .result
            .map(|r| r.count as usize)
            .unwrap_or_default();

        if deleted == 0 {
            return Ok(0);
        }

        let delete_request = DeletePoints {
            collection_name,
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Filter(filter)),
            }),
            ..Default::default()
        };
        self.client
            .delete_points(delete_request)
            .await
            .map_err(|e| VectorError::Engine(format!("delete failed: {e}")))?;

        Ok(deleted)
    }

    async fn exists(&self, collection_id: &str, doc_id: &str) -> VectorResult<bool> {
        let collection_name = self.ensure_collection(collection_id).await?;
        let request = CountPoints {
            collection_name,
            filter: Some(Self::doc_id_filter(doc_id)),
            exact: Some(true),
            ..Default::default()
        };
        let count = self
            .client
            .count(request)
            .await
            .map_err(|e| VectorError::Engine(format!("count failed: {e}")))?
            .result
            .map(|r| r.count)
            .unwrap_or_default();
        Ok(count > 0)
    }
}

fn string_field(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}

fn metadata_field(payload: &HashMap<String, Value>, key: &str) -> serde_json::Value {
    let raw = string_field(payload, key);
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null)
}
