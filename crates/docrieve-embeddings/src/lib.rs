//! HTTP client for the external embedding service (§4.5).
//!
//! The service is a black box: POST `{base}/api/embeddings` with
//! `{"model": ..., "prompt": ...}`, get back `{"embedding": [f32; N]}`. This
//! crate owns retry/backoff, batching, and the "never propagate a
//! transport failure out of `embed_one`" policy the pipeline depends on to
//! keep a single bad embedding from failing an entire document.

pub mod error;

pub use error::{EmbeddingError, EmbeddingResult};

use docrieve_config::EmbeddingConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How long [`EmbeddingClient::embed_batch`] sleeps between batches to
/// avoid hammering the embedding service.
const INTER_BATCH_PAUSE: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Rate-limited, retrying client for the embedding service.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    /// Build a client and probe the embedding service with a throwaway
    /// request. A failed probe is logged but never aborts construction —
    /// the service may simply not be up yet.
    pub async fn connect(config: EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default reqwest client");
                reqwest::Client::new()
            });
        let client = Self { http, config };

        if let Err(e) = client.request_once("ping").await {
            tracing::warn!(error = %e, url = %client.config.api_url, "embedding service probe failed at startup");
        }

        client
    }

    /// Build a client without probing, for tests that want to control the
    /// mock server's first request deterministically.
    #[must_use]
    pub fn new_unprobed(config: EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Embed a single piece of text.
    ///
    /// Empty input, and input that fails every retry, both return the
    /// zero vector of the configured dimension rather than an error — the
    /// pipeline treats an all-zero embedding as a degraded-but-non-fatal
    /// result (§7, `EmbeddingDegraded`).
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        if text.is_empty() {
            return self.zero_vector();
        }
        match self.embed_with_retry(text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "embedding degraded to zero vector after final retry");
                self.zero_vector()
            }
        }
    }

    /// Embed `texts` in order, preserving their input order in the result.
    ///
    /// Processes in batches of `batch_size`; within a batch up to
    /// `concurrency_limit` requests are in flight at once. Sleeps
    /// [`INTER_BATCH_PAUSE`] between batches to rate-limit the embedding
    /// service.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(texts.len());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));

        let mut chunks = texts.chunks(self.config.batch_size.max(1)).peekable();
        while let Some(batch) = chunks.next() {
            let futures = batch.iter().map(|text| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    self.embed_one(text).await
                }
            });
            out.extend(futures::future::join_all(futures).await);

            if chunks.peek().is_some() {
                tokio::time::sleep(INTER_BATCH_PAUSE).await;
            }
        }
        out
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.config.dimension]
    }

    async fn embed_with_retry(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut last_err = None;
        for attempt in 0..self.config.max_retries.max(1) {
            match self.request_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "embedding request attempt failed");
                    last_err = Some(e);
                    if attempt + 1 < self.config.max_retries {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| EmbeddingError::Transient("no attempts made".into())))
    }

    async fn request_once(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/api/embeddings", self.config.api_url.trim_end_matches('/')))
            .json(&serde_json::json!({
                "model": self.config.model_name,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Transient(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            api_url: url.to_string(),
            model_name: "bge-m3".to_string(),
            dimension: 4,
            batch_size: 2,
            concurrency_limit: 2,
            max_retries: 3,
            retry_base_delay_ms: 1,
            request_timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn embed_one_returns_parsed_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.1, 0.2, 0.3, 0.4]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new_unprobed(config_for(&server.uri()));
        let vector = client.embed_one("hello").await;
        assert_eq!(vector, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[tokio::test]
    async fn embed_one_on_empty_text_returns_zero_vector_without_a_request() {
        let server = MockServer::start().await;
        // No mock registered: any request would fail wiremock's expectations.
        let client = EmbeddingClient::new_unprobed(config_for(&server.uri()));
        let vector = client.embed_one("").await;
        assert_eq!(vector, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn embed_one_degrades_to_zero_vector_after_exhausting_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = config_for(&server.uri());
        config.max_retries = 2;
        config.retry_base_delay_ms = 1;
        let client = EmbeddingClient::new_unprobed(config);
        let vector = client.embed_one("hello").await;
        assert_eq!(vector, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let prompt = body["prompt"].as_str().unwrap();
                let value = prompt.parse::<f32>().unwrap_or(0.0);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "embedding": [value, value, value, value]
                }))
            })
            .mount(&server)
            .await;

        let client = EmbeddingClient::new_unprobed(config_for(&server.uri()));
        let texts: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        let vectors = client.embed_batch(&texts).await;

        assert_eq!(vectors.len(), 5);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }
    }
}
