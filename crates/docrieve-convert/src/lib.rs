//! Text extraction strategies.
//!
//! The processing pipeline is injected a [`TextConverter`] trait object; it
//! never knows which concrete strategy is behind it. Two strategies ship
//! here: [`TikaConverter`], an HTTP client for a Tika-style extraction
//! service (handles PDF, DOCX, and other office/binary formats server-side),
//! and [`PlainTextConverter`], a zero-dependency fallback for already-text
//! formats that also backs the Tika strategy when the remote service
//! returns `502`.

pub mod error;

pub use error::{ConvertError, ConvertResult};

use async_trait::async_trait;
use docrieve_config::ConvertConfig;
use std::path::Path;
use std::time::Duration;

/// Extensions read back as UTF-8 (lossily) rather than sent to an external
/// extraction service.
const KNOWN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "json", "log", "yaml", "yml", "toml", "ini",
];

/// Strategy for turning a file on disk into plain text.
///
/// Implementations may fail (a corrupt PDF, an unreachable extraction
/// service); the pipeline records conversion failures as a terminal
/// `ConversionFailed` state rather than retrying.
#[async_trait]
pub trait TextConverter: Send + Sync {
    /// Convert the file at `path` to plain text.
    ///
    /// # Errors
    /// Returns [`ConvertError`] if the file cannot be read or the
    /// conversion strategy itself fails.
    async fn convert(&self, path: &Path) -> ConvertResult<String>;
}

fn is_known_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| KNOWN_TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Reads known text-like extensions directly off disk as UTF-8 (with lossy
/// replacement of invalid sequences). Used standalone in environments with
/// no extraction service configured, and as the fallback leg of
/// [`TikaConverter`].
#[derive(Debug, Clone, Default)]
pub struct PlainTextConverter;

#[async_trait]
impl TextConverter for PlainTextConverter {
    async fn convert(&self, path: &Path) -> ConvertResult<String> {
        if !is_known_text_extension(path) {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} is not a recognized plain-text format",
                path.display()
            )));
        }
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// HTTP client for a Tika-style text extraction service (§6): `PUT
/// {base}/tika` with the raw file bytes, `Accept: text/plain`.
///
/// A `502` response triggers the plain-text fallback for known text
/// formats; any other failure (including an unreachable service) surfaces
/// as [`ConvertError`] for formats the fallback cannot handle.
pub struct TikaConverter {
    client: reqwest::Client,
    base_url: String,
    fallback: PlainTextConverter,
}

impl TikaConverter {
    /// Build a client from [`ConvertConfig`], using its `timeout_seconds`
    /// as the per-request timeout (300s by default, matching the upstream
    /// Tika service's own processing time for large documents).
    ///
    /// # Panics
    /// Panics if the underlying `reqwest` client cannot be constructed,
    /// which only happens for an invalid TLS backend configuration.
    #[must_use]
    pub fn new(config: &ConvertConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("reqwest client construction with default TLS backend cannot fail");
        Self {
            client,
            base_url: config.tika_server_url.trim_end_matches('/').to_string(),
            fallback: PlainTextConverter,
        }
    }

    /// Fetch document metadata via `PUT {base}/meta`. Exposed separately
    /// from `convert` since the pipeline only needs body text, but other
    /// callers (an admin surface, a future enrichment step) may want the
    /// parsed metadata document.
    ///
    /// # Errors
    /// Returns [`ConvertError`] if the request fails or the service
    /// responds with a non-success status.
    pub async fn fetch_metadata(&self, path: &Path) -> ConvertResult<serde_json::Value> {
        let bytes = tokio::fs::read(path).await?;
        let response = self
            .client
            .put(format!("{}/meta", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ConvertError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConvertError::ServiceError(format!(
                "tika /meta returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ConvertError::ServiceError(e.to_string()))
    }
}

#[async_trait]
impl TextConverter for TikaConverter {
    async fn convert(&self, path: &Path) -> ConvertResult<String> {
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .client
            .put(format!("{}/tika", self.base_url))
            .header(reqwest::header::ACCEPT, "text/plain")
            .body(bytes)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return self.fallback_or_err(path, ConvertError::Transport(e.to_string())).await,
        };

        if response.status() == reqwest::StatusCode::BAD_GATEWAY {
            return self
                .fallback_or_err(
                    path,
                    ConvertError::ServiceError("tika /tika returned 502".to_string()),
                )
                .await;
        }

        if !response.status().is_success() {
            return Err(ConvertError::ServiceError(format!(
                "tika /tika returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ConvertError::ServiceError(e.to_string()))
    }
}

impl TikaConverter {
    async fn fallback_or_err(&self, path: &Path, original: ConvertError) -> ConvertResult<String> {
        if is_known_text_extension(path) {
            tracing::warn!(error = %original, path = %path.display(), "tika unavailable, falling back to plain-text read");
            self.fallback.convert(path).await
        } else {
            Err(original)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path as path_matcher};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> ConvertConfig {
        ConvertConfig {
            tika_server_url: url.to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn plain_text_converter_reads_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "hello world").await.unwrap();

        let converter = PlainTextConverter;
        let text = converter.convert(&file).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn plain_text_converter_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        tokio::fs::write(&file, b"%PDF-1.4").await.unwrap();

        let converter = PlainTextConverter;
        assert!(matches!(
            converter.convert(&file).await,
            Err(ConvertError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn tika_converter_returns_extracted_text() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_matcher("/tika"))
            .and(header("accept", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("extracted text"))
            .mount(&server)
            .await;

        let converter = TikaConverter::new(&config_for(&server.uri()));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        tokio::fs::write(&file, b"%PDF-1.4").await.unwrap();

        let text = converter.convert(&file).await.unwrap();
        assert_eq!(text, "extracted text");
    }

    #[tokio::test]
    async fn tika_converter_falls_back_to_plain_text_on_502() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_matcher("/tika"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let converter = TikaConverter::new(&config_for(&server.uri()));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "fallback text").await.unwrap();

        let text = converter.convert(&file).await.unwrap();
        assert_eq!(text, "fallback text");
    }

    #[tokio::test]
    async fn tika_converter_surfaces_502_for_unsupported_fallback_format() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_matcher("/tika"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let converter = TikaConverter::new(&config_for(&server.uri()));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        tokio::fs::write(&file, b"%PDF-1.4").await.unwrap();

        assert!(converter.convert(&file).await.is_err());
    }

    #[tokio::test]
    async fn tika_converter_surfaces_non_502_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_matcher("/tika"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let converter = TikaConverter::new(&config_for(&server.uri()));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "text").await.unwrap();

        assert!(converter.convert(&file).await.is_err());
    }
}
