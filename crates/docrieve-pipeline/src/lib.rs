//! Processing pipeline: the orchestrator wiring the metadata store, blob
//! store, text converter, vector index façade, and task queue into the
//! upload → convert → chunk → embed → index flow (§4.7).

pub mod error;
pub mod manager;
pub mod queue;

pub use error::{PipelineError, PipelineResult};
pub use manager::{CollectionStats, ManagerConfig, ProcessingManager};
pub use queue::{InMemoryTaskQueue, QueueStatus, Task, TaskStatus};
