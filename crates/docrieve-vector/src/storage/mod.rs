pub mod mock;
pub mod qdrant;
pub mod traits;

pub use self::mock::MockVectorIndex;
pub use self::qdrant::QdrantVectorIndex;
pub use self::traits::{ChunkWrite, IndexedChunk, SearchResults, VectorIndex};
