//! Embedding gateway abstraction and implementations.
//!
//! The core consumes embeddings as an external capability: a text string in,
//! a fixed-dimension float vector out. Two gateways are provided:
//!
//! - **[`DisabledGateway`]** — always errors; used when embeddings are not
//!   configured. Ingestion still works, storing zero vectors flagged as
//!   degraded.
//! - **[`HttpGateway`]** — calls an OpenAI-compatible `/v1/embeddings`
//!   endpoint with retry and exponential backoff.
//!
//! Also provides the vector utilities the pipeline relies on:
//! [`fit_dimension`] (truncate/zero-pad to the collection dimension),
//! [`elide_middle`] (pre-truncation of oversized gateway inputs),
//! [`zero_vector`], and [`cosine_similarity`].

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// Inputs longer than this (in characters) are elided before the gateway
/// call; embedding models truncate silently well below arbitrary lengths.
pub const MAX_EMBED_CHARS: usize = 8000;

/// Marker inserted where the middle of an oversized text was dropped.
pub const ELISION_MARKER: &str = "\n\n[...]\n\n";

/// Maps a text string to a fixed-length float vector.
///
/// Implementations own the transport; callers own degradation policy
/// (ingestion substitutes zero vectors, search falls back to empty results).
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embed a single text. The returned vector's length is the gateway's
    /// native dimension, which may differ from the collection dimension;
    /// callers normalize with [`fit_dimension`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Declared output dimension.
    fn dimension(&self) -> usize;
}

/// Gateway used when `embedding.provider = "disabled"`. Every call errors.
pub struct DisabledGateway {
    dimension: usize,
}

impl DisabledGateway {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingGateway for DisabledGateway {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding gateway is disabled")
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Gateway calling an OpenAI-compatible embeddings endpoint.
///
/// Retry strategy:
/// - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ... capped at 2^5)
/// - other 4xx → fail immediately
/// - network errors → retry
pub struct HttpGateway {
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Build from configuration. Fails when the model is unset or the API
    /// key environment variable is missing.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for the http provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model,
            api_key,
            dimension: config.dimension,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingGateway for HttpGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embedding_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow!("embedding API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("embedding API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("embedding failed after retries")))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("invalid embedding response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create the gateway selected by configuration.
pub fn create_gateway(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingGateway>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGateway::new(config.dimension))),
        "http" => Ok(Box::new(HttpGateway::new(config)?)),
        other => bail!("unknown embedding provider: {}", other),
    }
}

/// A vector of `dimension` zeros, the degraded-ingestion substitute.
pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}

/// Force a vector to exactly `dimension` components: longer vectors are
/// truncated, shorter ones zero-padded. Mismatches are normalized, never
/// rejected.
pub fn fit_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    if vector.len() > dimension {
        vector.truncate(dimension);
    } else {
        vector.resize(dimension, 0.0);
    }
    vector
}

/// Keep the first and last halves of an oversized text, joined with
/// [`ELISION_MARKER`]. Texts at or under `max_chars` pass through unchanged.
/// Counts `char`s, not bytes, so multi-byte text never splits mid-character.
pub fn elide_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail_start = total - half;
    let tail: String = text.chars().skip(tail_start).collect();

    format!("{}{}{}", head, ELISION_MARKER, tail)
}

/// Cosine similarity between two vectors. Returns `0.0` for empty,
/// mismatched-length, or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
