//! Per-user filesystem layout for original uploads, converted text, and the
//! vector engine's own on-disk state.
//!
//! Every path under the store root is namespaced by `user_token` so that a
//! worker never needs cross-user locking: distinct users' files simply live
//! in disjoint subtrees.
//!
//! ```text
//! {base}/user/{user_token}/
//!   uploads/origin/{doc_id}{ext}      original bytes, as uploaded
//!   uploads/processed/{doc_id}.txt    converted plain text
//!   chroma_kb/                        opaque, owned by the vector engine
//! ```

pub mod error;

use bytes::Bytes;
pub use error::{BlobError, BlobResult};
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Paths written by [`BlobStore::save_original`].
#[derive(Debug, Clone)]
pub struct SavedOriginal {
    pub doc_id: String,
    pub origin_path: PathBuf,
    pub size: u64,
}

/// A single entry reported by [`BlobStore::list_docs`].
#[derive(Debug, Clone)]
pub struct DocEntry {
    pub doc_id: String,
    pub filename: String,
    pub size: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed: bool,
}

/// Filesystem-backed blob store rooted at a configurable base directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base: PathBuf,
}

impl BlobStore {
    /// Build a store rooted at `base` (created lazily; nothing touches disk
    /// until an operation runs).
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn user_root(&self, user_token: &str) -> PathBuf {
        self.base.join("user").join(user_token)
    }

    fn origin_dir(&self, user_token: &str) -> PathBuf {
        self.user_root(user_token).join("uploads").join("origin")
    }

    fn processed_dir(&self, user_token: &str) -> PathBuf {
        self.user_root(user_token).join("uploads").join("processed")
    }

    fn vector_dir(&self, user_token: &str) -> PathBuf {
        self.user_root(user_token).join("chroma_kb")
    }

    fn processed_path(&self, user_token: &str, doc_id: &str) -> PathBuf {
        self.processed_dir(user_token).join(format!("{doc_id}.txt"))
    }

    /// Ensure the three per-user subdirectories exist. Idempotent.
    async fn ensure_user_dirs(&self, user_token: &str) -> BlobResult<()> {
        tokio::fs::create_dir_all(self.origin_dir(user_token)).await?;
        tokio::fs::create_dir_all(self.processed_dir(user_token)).await?;
        tokio::fs::create_dir_all(self.vector_dir(user_token)).await?;
        Ok(())
    }

    /// Stream `body` to `origin/{doc_id}{ext}`, where `ext` is taken from
    /// `filename`. On any write failure the partial file is removed before
    /// the error is returned.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] if directory creation, file creation, or
    /// any write to the underlying filesystem fails.
    pub async fn save_original<S, E>(
        &self,
        user_token: &str,
        doc_id: &str,
        filename: &str,
        mut body: S,
    ) -> BlobResult<SavedOriginal>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        self.ensure_user_dirs(user_token).await?;
        let ext = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let origin_path = self.origin_dir(user_token).join(format!("{doc_id}{ext}"));

        let result = async {
            let mut file = tokio::fs::File::create(&origin_path).await?;
            let mut size = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| {
                    std::io::Error::other(format!("upload stream error: {e}"))
                })?;
                file.write_all(&chunk).await?;
                size += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, std::io::Error>(size)
        }
        .await;

        match result {
            Ok(size) => Ok(SavedOriginal {
                doc_id: doc_id.to_string(),
                origin_path,
                size,
            }),
            Err(e) => {
                let _ = tokio::fs::remove_file(&origin_path).await;
                Err(BlobError::Io(e))
            }
        }
    }

    /// Write `text` to `processed/{doc_id}.txt`, replacing any existing
    /// file.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] if the write fails.
    pub async fn write_processed(&self, user_token: &str, doc_id: &str, text: &str) -> BlobResult<()> {
        self.ensure_user_dirs(user_token).await?;
        tokio::fs::write(self.processed_path(user_token, doc_id), text.as_bytes()).await?;
        Ok(())
    }

    /// Read back the processed text for `doc_id`, or `None` if it has not
    /// been converted yet.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] for failures other than the file being
    /// absent.
    pub async fn read_processed(&self, user_token: &str, doc_id: &str) -> BlobResult<Option<String>> {
        match tokio::fs::read_to_string(self.processed_path(user_token, doc_id)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    /// Locate and read the original upload whose filename stem equals
    /// `doc_id`, regardless of extension. Returns `None` if no such file
    /// exists.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] if the origin directory cannot be read.
    pub async fn read_original(&self, user_token: &str, doc_id: &str) -> BlobResult<Option<(PathBuf, Bytes)>> {
        let Some(path) = self.find_origin_path(user_token, doc_id).await? else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some((path, Bytes::from(bytes))))
    }

    /// Locate the on-disk path of the original upload for `doc_id` without
    /// reading its contents.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] if the origin directory cannot be read.
    pub async fn find_origin_path(&self, user_token: &str, doc_id: &str) -> BlobResult<Option<PathBuf>> {
        let dir = self.origin_dir(user_token);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BlobError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(doc_id) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Remove both the original and processed blobs for `doc_id`. Succeeds
    /// (as a no-op) if neither existed.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] for failures other than "not found".
    pub async fn delete_doc(&self, user_token: &str, doc_id: &str) -> BlobResult<()> {
        if let Some(origin) = self.find_origin_path(user_token, doc_id).await? {
            remove_file_ignoring_missing(&origin).await?;
        }
        remove_file_ignoring_missing(&self.processed_path(user_token, doc_id)).await?;
        Ok(())
    }

    /// Remove the entire per-user directory tree, including the vector
    /// engine's own files.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] for failures other than "not found".
    pub async fn delete_user(&self, user_token: &str) -> BlobResult<()> {
        match tokio::fs::remove_dir_all(self.user_root(user_token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    /// Enumerate every original upload for `user_token`.
    ///
    /// # Errors
    /// Returns [`BlobError::Io`] if the origin directory cannot be read or
    /// an entry's metadata cannot be fetched.
    pub async fn list_docs(&self, user_token: &str) -> BlobResult<Vec<DocEntry>> {
        let dir = self.origin_dir(user_token);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BlobError::Io(e)),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(doc_id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(&doc_id)
                .to_string();
            let metadata = entry.metadata().await?;
            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());
            let processed = tokio::fs::try_exists(self.processed_path(user_token, &doc_id))
                .await
                .unwrap_or(false);

            out.push(DocEntry {
                doc_id,
                filename,
                size: metadata.len(),
                created_at,
                processed,
            });
        }
        Ok(out)
    }
}

async fn remove_file_ignoring_missing(path: &Path) -> BlobResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BlobError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn save_and_read_original_round_trips() {
        let (_dir, store) = store();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello world"))]);
        let saved = store
            .save_original("u1", "doc1", "a.txt", body)
            .await
            .unwrap();
        assert_eq!(saved.size, 11);

        let (path, bytes) = store.read_original("u1", "doc1").await.unwrap().unwrap();
        assert!(path.ends_with("doc1.txt"));
        assert_eq!(bytes.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn write_and_read_processed_round_trips() {
        let (_dir, store) = store();
        store.write_processed("u1", "doc1", "converted text").await.unwrap();
        let text = store.read_processed("u1", "doc1").await.unwrap();
        assert_eq!(text.as_deref(), Some("converted text"));
    }

    #[tokio::test]
    async fn read_processed_missing_returns_none() {
        let (_dir, store) = store();
        assert!(store.read_processed("u1", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_doc_removes_both_blobs_and_is_idempotent() {
        let (_dir, store) = store();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"x"))]);
        store.save_original("u1", "doc1", "a.txt", body).await.unwrap();
        store.write_processed("u1", "doc1", "x").await.unwrap();

        store.delete_doc("u1", "doc1").await.unwrap();
        assert!(store.read_original("u1", "doc1").await.unwrap().is_none());
        assert!(store.read_processed("u1", "doc1").await.unwrap().is_none());

        // Second delete is a no-op, not an error.
        store.delete_doc("u1", "doc1").await.unwrap();
    }

    #[tokio::test]
    async fn list_docs_reports_processed_flag() {
        let (_dir, store) = store();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"abc"))]);
        store.save_original("u1", "doc1", "report.pdf", body).await.unwrap();

        let docs = store.list_docs("u1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id, "doc1");
        assert!(!docs[0].processed);

        store.write_processed("u1", "doc1", "text").await.unwrap();
        let docs = store.list_docs("u1").await.unwrap();
        assert!(docs[0].processed);
    }

    #[tokio::test]
    async fn delete_user_removes_entire_tree() {
        let (_dir, store) = store();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"abc"))]);
        store.save_original("u1", "doc1", "a.txt", body).await.unwrap();

        store.delete_user("u1").await.unwrap();
        assert!(store.list_docs("u1").await.unwrap().is_empty());
        // Idempotent.
        store.delete_user("u1").await.unwrap();
    }

    #[tokio::test]
    async fn save_original_cleans_up_partial_file_on_stream_error() {
        let (_dir, store) = store();
        let body = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let result = store.save_original("u1", "doc1", "a.txt", body).await;
        assert!(result.is_err());
        assert!(store.find_origin_path("u1", "doc1").await.unwrap().is_none());
    }
}
