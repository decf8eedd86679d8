//! Configuration management for the CiteGuard service
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<env>.toml)
//! - Default values
//!
//! Everything is read once at startup; there is no hot reload.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis configuration (optional; absent means in-process backends)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// External source federation configuration
    #[serde(default)]
    pub federation: FederationConfig,

    /// Search pipeline configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Request-level rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker processes expected in the process group (informational;
    /// actual process supervision is external)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL; when unset, rate-limiter and dedup state stay per-process
    pub url: Option<String>,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: http, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the HTTP provider
    pub api_key: Option<String>,

    /// API base URL (OpenAI-compatible /embeddings endpoint)
    pub api_base: Option<String>,

    /// Model to request from the HTTP provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries per batch
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory holding the persisted index files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Flat -> HNSW upgrade threshold
    #[serde(default = "default_hnsw_threshold")]
    pub hnsw_threshold: usize,

    /// HNSW -> IVF-Flat upgrade threshold
    #[serde(default = "default_ivf_threshold")]
    pub ivf_threshold: usize,

    /// IVF-Flat -> IVF-PQ upgrade threshold
    #[serde(default = "default_ivfpq_threshold")]
    pub ivfpq_threshold: usize,

    /// Save debounce window in seconds
    #[serde(default = "default_save_debounce")]
    pub save_debounce_secs: u64,

    /// Target cardinality for the dedup filter
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Target false-positive rate for the dedup filter
    #[serde(default = "default_dedup_fp_rate")]
    pub dedup_fp_rate: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FederationConfig {
    /// Global fan-out deadline in seconds
    #[serde(default = "default_federation_deadline")]
    pub global_deadline_secs: u64,

    /// Per-source HTTP timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub per_source_timeout_secs: u64,

    /// Per-source result cap applied before concatenation
    #[serde(default = "default_per_source_cap")]
    pub per_source_cap: usize,

    /// Default token bucket capacity per source
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: u32,

    /// Default token refill rate per source (tokens/second)
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: f64,

    /// Per-source bucket overrides, keyed by source tag
    #[serde(default)]
    pub bucket_overrides: HashMap<String, BucketConfig>,

    /// Consecutive failures before a breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Breaker cooldown before half-open, in seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Contact email used in User-Agent / mailto params (Crossref, OpenAlex)
    pub contact_email: Option<String>,

    /// NCBI API key for PubMed
    pub pubmed_api_key: Option<String>,

    /// Semantic Scholar API key
    pub semantic_scholar_api_key: Option<String>,

    /// CORE API key (source skipped when unset)
    pub core_api_key: Option<String>,

    /// Unpaywall contact email (source skipped when unset)
    pub unpaywall_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketConfig {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Default similarity threshold
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Results kept per query after re-scoring
    #[serde(default = "default_k_result")]
    pub k_result: usize,

    /// Top-k requested from the index probe
    #[serde(default = "default_index_k")]
    pub index_k: usize,

    /// Index results that make a query's work sufficient
    #[serde(default = "default_m_sufficient")]
    pub m_sufficient: usize,

    /// Result cache TTL in seconds
    #[serde(default = "default_result_cache_ttl")]
    pub result_cache_ttl_secs: u64,

    /// Global orchestrator deadline per batch, in seconds
    #[serde(default = "default_batch_deadline")]
    pub batch_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_workers() -> usize { 4 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_key_prefix() -> String { "citeguard".to_string() }
fn default_embedding_provider() -> String { "hash".to_string() }
fn default_embedding_model() -> String { "all-MiniLM-L6-v2".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_batch() -> usize { 64 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_data_dir() -> String { "data".to_string() }
fn default_hnsw_threshold() -> usize { 10_000 }
fn default_ivf_threshold() -> usize { 100_000 }
fn default_ivfpq_threshold() -> usize { 1_000_000 }
fn default_save_debounce() -> u64 { 5 }
fn default_dedup_capacity() -> usize { 1_000_000 }
fn default_dedup_fp_rate() -> f64 { 0.01 }
fn default_federation_deadline() -> u64 { 10 }
fn default_source_timeout() -> u64 { 8 }
fn default_per_source_cap() -> usize { 5 }
fn default_bucket_capacity() -> u32 { 5 }
fn default_refill_per_sec() -> f64 { 1.0 }
fn default_failure_threshold() -> u32 { 5 }
fn default_cooldown() -> u64 { 30 }
fn default_threshold() -> f32 { 0.5 }
fn default_k_result() -> usize { 10 }
fn default_index_k() -> usize { 20 }
fn default_m_sufficient() -> usize { 5 }
fn default_result_cache_ttl() -> u64 { 86_400 }
fn default_batch_deadline() -> u64 { 25 }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "citeguard".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Per-source token bucket parameters, honoring overrides
    pub fn bucket_for(&self, source: &str) -> BucketConfig {
        self.federation
            .bucket_overrides
            .get(source)
            .cloned()
            .unwrap_or(BucketConfig {
                capacity: self.federation.bucket_capacity,
                refill_per_sec: self.federation.refill_per_sec,
            })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            hnsw_threshold: default_hnsw_threshold(),
            ivf_threshold: default_ivf_threshold(),
            ivfpq_threshold: default_ivfpq_threshold(),
            save_debounce_secs: default_save_debounce(),
            dedup_capacity: default_dedup_capacity(),
            dedup_fp_rate: default_dedup_fp_rate(),
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            global_deadline_secs: default_federation_deadline(),
            per_source_timeout_secs: default_source_timeout(),
            per_source_cap: default_per_source_cap(),
            bucket_capacity: default_bucket_capacity(),
            refill_per_sec: default_refill_per_sec(),
            bucket_overrides: HashMap::new(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown(),
            contact_email: None,
            pubmed_api_key: None,
            semantic_scholar_api_key: None,
            core_api_key: None,
            unpaywall_email: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            k_result: default_k_result(),
            index_k: default_index_k(),
            m_sufficient: default_m_sufficient(),
            result_cache_ttl_secs: default_result_cache_ttl(),
            batch_deadline_secs: default_batch_deadline(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            federation: FederationConfig::default(),
            search: SearchConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.search.default_threshold, 0.5);
        assert_eq!(config.federation.per_source_cap, 5);
    }

    #[test]
    fn test_bucket_overrides() {
        let mut config = AppConfig::default();
        config.federation.bucket_overrides.insert(
            "crossref".to_string(),
            BucketConfig {
                capacity: 50,
                refill_per_sec: 10.0,
            },
        );

        assert_eq!(config.bucket_for("crossref").capacity, 50);
        assert_eq!(config.bucket_for("arxiv").capacity, 5);
    }
}
