//! `sqlx`-backed implementation of [`UserRepository`].

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::{MetaError, MetaResult};
use crate::models::{
    Collection, DEFAULT_COLLECTION_DESCRIPTION, DEFAULT_COLLECTION_NAME, UploadRecord,
    UploadRecordUpdate, UploadStatus, UserInfo, default_collection_id,
};
use crate::pool::PoolManager;
use crate::traits::UserRepository;

/// Repository for the three-table relational schema (§4.3).
pub struct DbUserRepository {
    pools: PoolManager,
}

impl DbUserRepository {
    #[must_use]
    pub const fn new(pools: PoolManager) -> Self {
        Self { pools }
    }

    /// Build from environment, connecting and migrating.
    ///
    /// # Errors
    /// Returns [`MetaError`] if the connection or migrations fail.
    pub async fn from_env() -> MetaResult<Self> {
        let config = docrieve_config::DatabaseConfig::from_env();
        Self::from_config(&config).await
    }

    /// Build from an already-loaded [`DatabaseConfig`], connecting and
    /// migrating. Preferred over [`Self::from_env`] by callers that already
    /// hold a validated [`ApplicationConfig`](docrieve_config::ApplicationConfig),
    /// so the database section isn't re-read from the environment a second time.
    ///
    /// # Errors
    /// Returns [`MetaError`] if the connection or migrations fail.
    pub async fn from_config(config: &docrieve_config::DatabaseConfig) -> MetaResult<Self> {
        let pools = PoolManager::connect(config).await?;
        Ok(Self::new(pools))
    }

    fn pool(&self) -> &PgPool {
        self.pools.pool()
    }

    async fn user_exists(pool: &PgPool, user_token: &str) -> MetaResult<bool> {
        let row = sqlx::query("SELECT 1 FROM user_info WHERE user_token = $1")
            .bind(user_token)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch_collection(pool: &PgPool, collection_id: &str) -> MetaResult<Option<Collection>> {
        let row = sqlx::query(
            "SELECT collection_id, collection_name, description, create_time, created_by
             FROM kb_collections WHERE collection_id = $1",
        )
        .bind(collection_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|row| Collection {
            collection_id: row.get("collection_id"),
            collection_name: row.get("collection_name"),
            description: row.get("description"),
            create_time: row.get("create_time"),
            created_by: row.get("created_by"),
        }))
    }

    /// Ensure `user_token`'s default collection exists, creating it with
    /// fixed name/description if absent, and return its id.
    async fn ensure_default_collection(pool: &PgPool, user_token: &str) -> MetaResult<String> {
        let collection_id = default_collection_id(user_token);
        if Self::fetch_collection(pool, &collection_id).await?.is_some() {
            return Ok(collection_id);
        }

        sqlx::query(
            "INSERT INTO kb_collections (collection_id, collection_name, description, created_by)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (collection_id) DO NOTHING",
        )
        .bind(&collection_id)
        .bind(DEFAULT_COLLECTION_NAME)
        .bind(DEFAULT_COLLECTION_DESCRIPTION)
        .bind(user_token)
        .execute(pool)
        .await?;

        Ok(collection_id)
    }

    fn row_to_upload_record(row: &sqlx::postgres::PgRow) -> MetaResult<UploadRecord> {
        let status_raw: String = row.get("status");
        let status: UploadStatus = status_raw
            .parse()
            .map_err(|_| MetaError::Database(sqlx::Error::Decode("invalid status".into())))?;

        Ok(UploadRecord {
            doc_id: row.get("doc_id"),
            user_token: row.get("user_token"),
            collection_id: row.get("collection_id"),
            filename: row.get("filename"),
            mime_type: row.get("mime_type"),
            status,
            upload_time: row.get("upload_time"),
            process_start_time: row.get("process_start_time"),
            process_end_time: row.get("process_end_time"),
            err_msg: row.get("err_msg"),
        })
    }
}

const UPLOAD_RECORD_COLUMNS: &str = "doc_id, user_token, collection_id, filename, mime_type, \
     status, upload_time, process_start_time, process_end_time, err_msg";

#[async_trait]
impl UserRepository for DbUserRepository {
    async fn create_user_if_absent(&self, user_token: &str) -> MetaResult<UserInfo> {
        let pool = self.pool();
        let _guard = self.pools.write_lock().await;

        sqlx::query(
            "INSERT INTO user_info (user_token) VALUES ($1) ON CONFLICT (user_token) DO NOTHING",
        )
        .bind(user_token)
        .execute(pool)
        .await?;

        let row = sqlx::query("SELECT user_token, create_time FROM user_info WHERE user_token = $1")
            .bind(user_token)
            .fetch_one(pool)
            .await?;

        Ok(UserInfo {
            user_token: row.get("user_token"),
            create_time: row.get("create_time"),
        })
    }

    async fn create_collection(
        &self,
        collection_id: &str,
        name: &str,
        created_by: &str,
        description: Option<&str>,
    ) -> MetaResult<Collection> {
        let pool = self.pool();
        let _guard = self.pools.write_lock().await;

        if !Self::user_exists(pool, created_by).await? {
            return Err(MetaError::UnknownUser(created_by.to_string()));
        }
        if Self::fetch_collection(pool, collection_id).await?.is_some() {
            return Err(MetaError::AlreadyExists(collection_id.to_string()));
        }

        sqlx::query(
            "INSERT INTO kb_collections (collection_id, collection_name, description, created_by)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(collection_id)
        .bind(name)
        .bind(description)
        .bind(created_by)
        .execute(pool)
        .await?;

        Self::fetch_collection(pool, collection_id)
            .await?
            .ok_or_else(|| MetaError::UnknownCollection(collection_id.to_string()))
    }

    async fn get_collection(&self, collection_id: &str) -> MetaResult<Option<Collection>> {
        Self::fetch_collection(self.pool(), collection_id).await
    }

    async fn list_collections(&self, user_token: &str) -> MetaResult<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT collection_id, collection_name, description, create_time, created_by
             FROM kb_collections WHERE created_by = $1 ORDER BY create_time",
        )
        .bind(user_token)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| Collection {
                collection_id: row.get("collection_id"),
                collection_name: row.get("collection_name"),
                description: row.get("description"),
                create_time: row.get("create_time"),
                created_by: row.get("created_by"),
            })
            .collect())
    }

    async fn add_upload_record(&self, mut record: UploadRecord) -> MetaResult<UploadRecord> {
        let pool = self.pool();
        let _guard = self.pools.write_lock().await;

        if !Self::user_exists(pool, &record.user_token).await? {
            return Err(MetaError::UnknownUser(record.user_token));
        }

        let row = sqlx::query("SELECT 1 FROM user_upload_record WHERE doc_id = $1")
            .bind(&record.doc_id)
            .fetch_optional(pool)
            .await?;
        if row.is_some() {
            return Err(MetaError::AlreadyExists(record.doc_id));
        }

        record.collection_id = match record.collection_id.take() {
            Some(collection_id) => {
                let collection = Self::fetch_collection(pool, &collection_id)
                    .await?
                    .ok_or_else(|| MetaError::UnknownCollection(collection_id.clone()))?;
                if collection.created_by != record.user_token {
                    return Err(MetaError::PermissionDenied(format!(
                        "{} does not own collection {collection_id}",
                        record.user_token
                    )));
                }
                Some(collection_id)
            }
            None => Some(Self::ensure_default_collection(pool, &record.user_token).await?),
        };

        let query = format!(
            "INSERT INTO user_upload_record ({UPLOAD_RECORD_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&query)
            .bind(&record.doc_id)
            .bind(&record.user_token)
            .bind(&record.collection_id)
            .bind(&record.filename)
            .bind(&record.mime_type)
            .bind(record.status.to_string())
            .bind(record.upload_time)
            .bind(record.process_start_time)
            .bind(record.process_end_time)
            .bind(&record.err_msg)
            .execute(pool)
            .await?;

        Ok(record)
    }

    async fn update_upload_record(
        &self,
        doc_id: &str,
        fields: UploadRecordUpdate,
    ) -> MetaResult<bool> {
        let pool = self.pool();
        let _guard = self.pools.write_lock().await;

        if let Some(Some(collection_id)) = &fields.collection_id {
            Self::fetch_collection(pool, collection_id)
                .await?
                .ok_or_else(|| MetaError::UnknownCollection(collection_id.clone()))?;
        }

        let mut builder = sqlx::QueryBuilder::new("UPDATE user_upload_record SET ");
        let mut separated = builder.separated(", ");
        let mut touched = false;

        if let Some(collection_id) = fields.collection_id {
            separated.push("collection_id = ").push_bind_unseparated(collection_id);
            touched = true;
        }
        if let Some(filename) = fields.filename {
            separated.push("filename = ").push_bind_unseparated(filename);
            touched = true;
        }
        if let Some(status) = fields.status {
            separated
                .push("status = ")
                .push_bind_unseparated(status.to_string());
            touched = true;
        }
        if let Some(upload_time) = fields.upload_time {
            separated.push("upload_time = ").push_bind_unseparated(upload_time);
            touched = true;
        }
        if let Some(process_start_time) = fields.process_start_time {
            separated
                .push("process_start_time = ")
                .push_bind_unseparated(process_start_time);
            touched = true;
        }
        if let Some(process_end_time) = fields.process_end_time {
            separated
                .push("process_end_time = ")
                .push_bind_unseparated(process_end_time);
            touched = true;
        }
        if let Some(err_msg) = fields.err_msg {
            separated.push("err_msg = ").push_bind_unseparated(err_msg);
            touched = true;
        }
        if let Some(mime_type) = fields.mime_type {
            separated.push("mime_type = ").push_bind_unseparated(mime_type);
            touched = true;
        }
        if !touched {
            return Ok(false);
        }

        builder.push(" WHERE doc_id = ");
        builder.push_bind(doc_id.to_string());

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_upload_record(&self, doc_id: &str) -> MetaResult<Option<UploadRecord>> {
        let query = format!(
            "SELECT {UPLOAD_RECORD_COLUMNS} FROM user_upload_record WHERE doc_id = $1"
        );
        let row = sqlx::query(&query)
            .bind(doc_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(Self::row_to_upload_record).transpose()
    }

    async fn get_user_uploads(
        &self,
        user_token: &str,
        limit: Option<i64>,
        status: Option<UploadStatus>,
    ) -> MetaResult<Vec<UploadRecord>> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {UPLOAD_RECORD_COLUMNS} FROM user_upload_record WHERE user_token = "
        ));
        builder.push_bind(user_token.to_string());

        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.to_string());
        }
        builder.push(" ORDER BY upload_time DESC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder.build().fetch_all(self.pool()).await?;
        rows.iter().map(Self::row_to_upload_record).collect()
    }

    async fn get_collection_uploads(
        &self,
        user_token: &str,
        collection_id: &str,
    ) -> MetaResult<Vec<UploadRecord>> {
        let pool = self.pool();
        let collection = Self::fetch_collection(pool, collection_id)
            .await?
            .ok_or_else(|| MetaError::UnknownCollection(collection_id.to_string()))?;
        if collection.created_by != user_token {
            return Err(MetaError::PermissionDenied(format!(
                "{user_token} does not own collection {collection_id}"
            )));
        }

        let query = format!(
            "SELECT {UPLOAD_RECORD_COLUMNS} FROM user_upload_record
             WHERE collection_id = $1 ORDER BY upload_time DESC"
        );
        let rows = sqlx::query(&query).bind(collection_id).fetch_all(pool).await?;
        rows.iter().map(Self::row_to_upload_record).collect()
    }

    async fn delete_upload_record(&self, doc_id: &str) -> MetaResult<()> {
        let _guard = self.pools.write_lock().await;
        sqlx::query("DELETE FROM user_upload_record WHERE doc_id = $1")
            .bind(doc_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_user(&self, user_token: &str) -> MetaResult<()> {
        let _guard = self.pools.write_lock().await;
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM user_upload_record WHERE user_token = $1")
            .bind(user_token)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM kb_collections WHERE created_by = $1")
            .bind(user_token)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_info WHERE user_token = $1")
            .bind(user_token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
