//! Embedding service abstraction
//!
//! Provides a unified interface over embedding providers:
//! - `HttpEmbedder`: OpenAI-compatible /embeddings endpoint
//! - `HashEmbedder`: deterministic hashed bag-of-words (offline default)
//!
//! `EmbeddingService` layers batching, an in-process vector cache keyed by
//! normalized text, serialized model access, and L2 normalization on top of
//! whichever provider is configured.

use crate::config::EmbeddingConfig;
use crate::errors::{CoreError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Norm tolerance for produced vectors: |v| in [1 - EPS, 1 + EPS]
pub const NORM_EPSILON: f32 = 1e-4;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// HTTP embedding client (OpenAI-compatible endpoint)
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
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder. Client construction failure is fatal to
    /// startup.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| CoreError::Configuration {
            message: "embedding.api_key required for the http provider".to_string(),
        })?;
        let base_url = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration {
                message: format!("failed to build embedding HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url,
            max_retries: config.max_retries,
        })
    }

    /// Pause schedule between attempts: 250ms, quadrupling per retry. One
    /// initial attempt plus `max_retries` backed-off retries; the endpoint's
    /// own request timeout bounds each attempt.
    fn pauses(&self) -> impl Iterator<Item = Duration> {
        (0..self.max_retries).map(|retry| Duration::from_millis(250) * 4u32.saturating_pow(retry))
    }

    async fn embed_with_retries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut pauses = self.pauses();
        loop {
            let error = match self.post_embeddings(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(error) => error,
            };

            let Some(pause) = pauses.next() else {
                return Err(error);
            };
            tracing::warn!(
                pause_ms = pause.as_millis() as u64,
                error = %error,
                "Embedding endpoint unhealthy; backing off"
            );
            tokio::time::sleep(pause).await;
        }
    }

    async fn post_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
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
            .map_err(|e| CoreError::Embedding {
                message: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::Embedding {
                message: format!("API error {}", status),
            });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| CoreError::Embedding {
            message: format!("failed to parse response: {}", e),
        })?;

        if result.data.len() != texts.len() {
            return Err(CoreError::Embedding {
                message: format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    result.data.len()
                ),
            });
        }

        Ok(result.data.into_iter().map(|row| row.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_retries(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic hashed bag-of-words embedder.
///
/// Each whitespace token is hashed into one of D buckets with a sign bit;
/// the resulting count vector is L2-normalized by the service. Identical
/// input text yields a byte-identical vector in every process, which keeps
/// content fingerprints and test fixtures stable.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text.split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[0..8].try_into().unwrap()) as usize % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hashed-bow"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration. An unusable provider is a
/// startup failure, not a degraded mode.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(CoreError::Configuration {
            message: format!("unknown embedding provider '{}'", other),
        }),
    }
}

/// Embedding service: caching, batching, and serialized model access.
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    // Serializes access to the underlying model; one batch in flight at a time
    model_lock: tokio::sync::Mutex<()>,
    // In-process vector cache keyed by normalized text
    cache: Mutex<HashMap<String, Arc<Vec<f32>>>>,
}

impl EmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            model_lock: tokio::sync::Mutex::new(()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed a list of normalized texts, reusing cached vectors and batching
    /// the remainder. Returns one L2-normalized vector per input, in input
    /// order. A model failure is fatal to the current request.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Arc<Vec<f32>>>> {
        let mut results: Vec<Option<Arc<Vec<f32>>>> = vec![None; texts.len()];

        // Cache probe; track the first position wanting each unique miss
        let mut missing: Vec<String> = Vec::new();
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        {
            let cache = self.cache.lock().expect("embedding cache poisoned");
            for (i, text) in texts.iter().enumerate() {
                if let Some(vector) = cache.get(text) {
                    results[i] = Some(Arc::clone(vector));
                } else {
                    let slot = positions.entry(text.clone()).or_default();
                    if slot.is_empty() {
                        missing.push(text.clone());
                    }
                    slot.push(i);
                }
            }
        }

        if !missing.is_empty() {
            let start = Instant::now();
            let computed = self.embed_uncached(&missing).await;
            crate::metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                missing.len(),
                computed.is_ok(),
            );
            let computed = computed?;

            let mut cache = self.cache.lock().expect("embedding cache poisoned");
            for (text, vector) in missing.into_iter().zip(computed) {
                let vector = Arc::new(vector);
                for &i in positions.get(&text).into_iter().flatten() {
                    results[i] = Some(Arc::clone(&vector));
                }
                cache.insert(text, vector);
            }
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.expect("all slots filled"))
            .collect())
    }

    async fn embed_uncached(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _guard = self.model_lock.lock().await;

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self.embedder.embed_batch(chunk).await?;
            if batch.len() != chunk.len() {
                return Err(CoreError::Embedding {
                    message: format!("expected {} vectors, got {}", chunk.len(), batch.len()),
                });
            }
            for vector in batch {
                vectors.push(l2_normalize(vector)?);
            }
        }

        Ok(vectors)
    }
}

/// Normalize to unit length, verifying the result lands inside tolerance.
pub fn l2_normalize(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return Err(CoreError::Embedding {
            message: "zero-norm vector cannot be normalized".to_string(),
        });
    }

    for x in vector.iter_mut() {
        *x /= norm;
    }

    let check: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if (check - 1.0).abs() > NORM_EPSILON {
        return Err(CoreError::Embedding {
            message: format!("normalization failed: |v| = {}", check),
        });
    }

    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(384);
        let a = embedder.embed_batch(&["deep learning".to_string()]).await.unwrap();
        let b = embedder.embed_batch(&["deep learning".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embedder_dimension() {
        let embedder = HashEmbedder::new(128);
        let vectors = embedder.embed_batch(&["one two three".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 128);
    }

    #[tokio::test]
    async fn test_service_normalizes() {
        let service = EmbeddingService::new(Arc::new(HashEmbedder::new(384)), 64);
        let vectors = service.embed(&["neural networks models".to_string()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= NORM_EPSILON);
    }

    #[tokio::test]
    async fn test_service_caches_repeats() {
        let service = EmbeddingService::new(Arc::new(HashEmbedder::new(64)), 64);
        let first = service.embed(&["repeated text".to_string()]).await.unwrap();
        let second = service.embed(&["repeated text".to_string()]).await.unwrap();
        // Same Arc comes back from the cache
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }

    #[tokio::test]
    async fn test_service_duplicate_inputs_share_vector() {
        let service = EmbeddingService::new(Arc::new(HashEmbedder::new(64)), 64);
        let texts = vec!["same".to_string(), "same".to_string()];
        let vectors = service.embed(&texts).await.unwrap();
        assert!(Arc::ptr_eq(&vectors[0], &vectors[1]));
    }

    #[tokio::test]
    async fn test_service_batches_large_input() {
        let service = EmbeddingService::new(Arc::new(HashEmbedder::new(32)), 4);
        let texts: Vec<String> = (0..10).map(|i| format!("text number {}", i)).collect();
        let vectors = service.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 10);
    }

    #[test]
    fn test_l2_normalize_rejects_zero() {
        assert!(l2_normalize(vec![0.0; 8]).is_err());
    }

    #[test]
    fn test_create_embedder_unknown_provider() {
        let mut config = EmbeddingConfig::default();
        config.provider = "quantum".to_string();
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_retry_pause_schedule_quadruples() {
        let mut config = EmbeddingConfig::default();
        config.provider = "http".to_string();
        config.api_key = Some("key".into());
        config.max_retries = 3;

        let embedder = HttpEmbedder::new(&config).unwrap();
        let pauses: Vec<u64> = embedder.pauses().map(|d| d.as_millis() as u64).collect();
        assert_eq!(pauses, vec![250, 1000, 4000]);
    }

    #[test]
    fn test_create_embedder_http_requires_key() {
        let mut config = EmbeddingConfig::default();
        config.provider = "http".to_string();
        config.api_key = None;
        assert!(create_embedder(&config).is_err());
    }
}
