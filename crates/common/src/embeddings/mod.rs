//! Embedding service abstraction
//!
//! Converts text to fixed-dimension vectors with a fallback provider.
//! Used at two points — chunk ingestion and query time — with identical
//! truncation and fallback rules.
//!
//! Only one provider's dimensionality can be authoritative per tenant:
//! mixed dimensionality silently corrupts distance comparisons, so a
//! fallback vector is zero-padded or truncated to the configured standard.

use crate::config::EmbeddingConfig;
use crate::errors::{EngineError, Result};
use crate::metrics::record_embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible embedding client
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a new embedder against an OpenAI-compatible endpoint
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        dimension: usize,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EngineError::HttpClient)?;

        Ok(Self {
            client,
            api_key,
            model,
            dimension,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries,
        })
    }

    /// Make request with capped exponential backoff
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            match self.make_request(texts).await {
                Ok(embeddings) => {
                    record_embedding(started.elapsed().as_secs_f64(), &self.model, true);
                    return Ok(embeddings);
                }
                Err(e) => {
                    record_embedding(started.elapsed().as_secs_f64(), &self.model, false);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::EmbeddingFailure {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::EmbeddingFailure {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::EmbeddingFailure {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EngineError::EmbeddingFailure {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::EmbeddingFailure {
                message: "Empty response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedding service: primary provider, optional fallback, truncation and
/// dimension reconciliation.
pub struct EmbeddingService {
    primary: Arc<dyn Embedder>,
    fallback: Option<Arc<dyn Embedder>>,
    dimension: usize,
    max_input_chars: usize,
    timeout: Duration,
}

impl EmbeddingService {
    pub fn new(
        primary: Arc<dyn Embedder>,
        fallback: Option<Arc<dyn Embedder>>,
        dimension: usize,
        max_input_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            dimension,
            max_input_chars,
            timeout,
        }
    }

    /// Build the service from configuration
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let primary = create_embedder(
            &config.provider,
            config.api_key.clone(),
            config.model.clone(),
            config.api_base.clone(),
            config.dimension,
            timeout,
            config.max_retries,
        )?;

        let fallback = match config.fallback_provider.as_deref() {
            Some(provider) => Some(create_embedder(
                provider,
                config.fallback_api_key.clone(),
                config
                    .fallback_model
                    .clone()
                    .unwrap_or_else(|| config.model.clone()),
                config.fallback_api_base.clone(),
                config.dimension,
                timeout,
                config.max_retries,
            )?),
            None => None,
        };

        Ok(Self::new(
            primary,
            fallback,
            config.dimension,
            config.max_input_chars,
            timeout,
        ))
    }

    /// The tenant-wide embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text: truncate, try primary, fall back once, reconcile
    /// dimensionality. Returns `EmbeddingFailure` only when every provider
    /// failed or timed out.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = self.truncate(text);

        match self.attempt(self.primary.as_ref(), &input).await {
            Ok(vector) => Ok(reconcile_dimension(vector, self.dimension)),
            Err(primary_err) => {
                warn!(
                    model = self.primary.model_name(),
                    error = %primary_err,
                    "Primary embedding provider failed"
                );

                let Some(ref fallback) = self.fallback else {
                    return Err(EngineError::EmbeddingFailure {
                        message: format!("primary failed, no fallback: {}", primary_err),
                    });
                };

                match self.attempt(fallback.as_ref(), &input).await {
                    Ok(vector) => Ok(reconcile_dimension(vector, self.dimension)),
                    Err(fallback_err) => Err(EngineError::EmbeddingFailure {
                        message: format!(
                            "primary: {}; fallback: {}",
                            primary_err, fallback_err
                        ),
                    }),
                }
            }
        }
    }

    async fn attempt(&self, embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.timeout, embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::EmbeddingTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_input_chars {
            text.to_string()
        } else {
            text.chars().take(self.max_input_chars).collect()
        }
    }
}

/// Create an embedder from a provider name
fn create_embedder(
    provider: &str,
    api_key: Option<String>,
    model: String,
    base_url: Option<String>,
    dimension: usize,
    timeout: Duration,
    max_retries: u32,
) -> Result<Arc<dyn Embedder>> {
    match provider {
        "openai" | "openai-compatible" => {
            let key = api_key.ok_or_else(|| EngineError::Configuration {
                message: format!("API key required for provider '{}'", provider),
            })?;
            Ok(Arc::new(HttpEmbedder::new(
                key,
                model,
                base_url,
                dimension,
                timeout,
                max_retries,
            )?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(dimension))),
        other => Err(EngineError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

/// Zero-pad or truncate a vector to the authoritative dimension
fn reconcile_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    if vector.len() != dimension {
        vector.resize(dimension, 0.0);
    }
    vector
}

/// Deterministic mock embedder for tests: a bag-of-hashed-words vector,
/// normalised to unit length, so texts sharing words land near each other.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn word_vector(&self, word: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(word.as_bytes());
        let mut seed = u64::from_le_bytes(digest[..8].try_into().unwrap_or([0; 8]));

        (0..self.dimension)
            .map(|_| {
                // xorshift64
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                (seed as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            for (slot, value) in vector.iter_mut().zip(self.word_vector(word)) {
                *slot += value;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedder that always fails, for outage tests
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(EngineError::EmbeddingFailure {
            message: "provider down".to_string(),
        })
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(EngineError::EmbeddingFailure {
            message: "provider down".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "failing-embedding"
    }

    fn dimension(&self) -> usize {
        0
    }
}
