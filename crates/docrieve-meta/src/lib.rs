//! Metadata store: three relational tables (user, collection, upload
//! record) reached through a `UserRepository` trait, backed by `PostgreSQL`
//! via `sqlx` in production and an in-memory mock in tests (§4.3).

pub mod error;
pub mod migrations;
pub mod mock;
pub mod models;
pub mod pool;
pub mod repository;
pub mod traits;

pub use error::{MetaError, MetaResult};
pub use mock::MockUserRepository;
pub use models::{
    Collection, UploadRecord, UploadRecordUpdate, UploadStatus, UserInfo, default_collection_id,
};
pub use pool::PoolManager;
pub use repository::DbUserRepository;
pub use traits::UserRepository;

pub use docrieve_config::DatabaseConfig;
