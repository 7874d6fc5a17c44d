//! Assembles a [`ProcessingManager`] from [`ApplicationConfig`], wiring the
//! same collaborators `docrieve-pipeline`'s tests wire against mocks, but
//! against the real Postgres/Qdrant/Ollama/Tika backends.

use std::sync::Arc;

use anyhow::Context;
use docrieve_blob::BlobStore;
use docrieve_config::ApplicationConfig;
use docrieve_convert::TextConverter;
use docrieve_embeddings::EmbeddingClient;
use docrieve_meta::{DbUserRepository, UserRepository};
use docrieve_pipeline::{InMemoryTaskQueue, ManagerConfig, ProcessingManager};
use docrieve_vector::{QdrantVectorIndex, VectorIndex, VectorIndexFacade};

/// Connect every external collaborator and build a [`ProcessingManager`].
/// No worker is started; callers decide whether to run the pool
/// ([`ProcessingManager::run`]) or just issue read/write operations.
///
/// # Errors
/// Returns an error if the metadata store or vector engine cannot be
/// reached.
pub async fn build_manager(config: &ApplicationConfig) -> anyhow::Result<Arc<ProcessingManager>> {
    let meta: Arc<dyn UserRepository> = Arc::new(
        DbUserRepository::from_config(&config.database)
            .await
            .context("connecting to metadata store")?,
    );

    let blob = Arc::new(BlobStore::new(&config.blob_store.data_dir));

    let converter: Arc<dyn TextConverter> =
        Arc::new(docrieve_convert::TikaConverter::new(&config.convert));

    let index: Arc<dyn VectorIndex> = Arc::new(
        QdrantVectorIndex::connect(&config.vector_storage.url, config.vector_storage.dimension)
            .context("connecting to vector engine")?,
    );
    let embeddings = Arc::new(EmbeddingClient::connect(config.embedding.clone()).await);
    let vector = Arc::new(VectorIndexFacade::new(index, embeddings));

    let queue = Arc::new(InMemoryTaskQueue::new());
    let manager_config = ManagerConfig::from_pipeline_config(&config.pipeline);

    Ok(Arc::new(ProcessingManager::new(
        meta,
        blob,
        converter,
        vector,
        queue,
        config.chunking.clone(),
        manager_config,
    )))
}
