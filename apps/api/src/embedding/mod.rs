//! Embedding client: turns text into fixed-length vectors via the local
//! model server's `/api/embed` endpoint.
//!
//! Requests are batched and issued with bounded parallelism; results are
//! reassembled in input order. Transport errors and 5xx responses are retried
//! a small number of times with exponential backoff, then surfaced as
//! `EmbeddingError::Unavailable`.

pub mod cache;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use cache::EmbeddingCache;

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unreachable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("embedding model '{0}' not found on the server")]
    ModelNotFound(String),

    #[error("embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// The embedding capability. One vector per input text, same order, same
/// dimension for every vector in a call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model; vectors from different models are not comparable.
    fn model(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Checks the batch invariant: one vector per text, all of one dimension.
/// Returns the shared dimension (`None` for an empty batch).
pub fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<Option<usize>, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dim = first.len();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim || v.is_empty()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }
    Ok(Some(dim))
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for the model server's embedding endpoint.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    batch_size: usize,
    concurrency: usize,
    backoff: Duration,
}

impl EmbeddingClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_batching(mut self, batch_size: usize, concurrency: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Embeds one batch, retrying transient failures.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
            truncate: true,
        };

        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = self.backoff * (1 << (attempt - 1));
                warn!(
                    "Embedding attempt {} failed ({}), retrying after {}ms...",
                    attempt,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                last_error = format!("status {}", status.as_u16());
                continue;
            }
            if status.as_u16() == 404 {
                return Err(EmbeddingError::ModelNotFound(self.model.clone()));
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            match response.json::<EmbedResponse>().await {
                Ok(parsed) => {
                    check_batch(texts.len(), &parsed.embeddings)?;
                    return Ok(parsed.embeddings);
                }
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            }
        }

        Err(EmbeddingError::Unavailable {
            attempts: MAX_RETRIES + 1,
            message: last_error,
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // `buffered` keeps batch order while running up to `concurrency` at once.
        let owned: Vec<Vec<String>> = texts.chunks(self.batch_size).map(<[String]>::to_vec).collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(owned)
            .map(|batch| async move { self.embed_batch(&batch).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        let dim = check_batch(texts.len(), &vectors)?;
        debug!(
            "Embedded {} texts with {} (dim {:?})",
            texts.len(),
            self.model,
            dim
        );
        Ok(vectors)
    }
}
