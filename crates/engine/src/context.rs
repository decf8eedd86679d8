//! Core context
//!
//! Every shared component, constructed once at startup and threaded
//! explicitly through orchestrator calls. No hidden process-level globals:
//! circuit tables, rate buckets, the embedding cache, and the index all
//! hang off this object.

use crate::result_cache::ResultCache;
use citeguard_common::cache::Cache;
use citeguard_common::config::AppConfig;
use citeguard_common::embeddings::{create_embedder, EmbeddingService};
use citeguard_common::errors::Result;
use citeguard_index::dedup::{DedupLedger, DedupStore, InMemoryDedupStore, RedisDedupStore};
use citeguard_index::strategy::UpgradeThresholds;
use citeguard_index::VectorIndex;
use citeguard_sources::adapters::build_adapters;
use citeguard_sources::circuit::CircuitBreaker;
use citeguard_sources::federator::{Federator, SourceFetcher};
use citeguard_sources::rate::{InMemoryRateBackend, RateBackend, RedisRateBackend, SourceRateLimiter};
use citeguard_sources::SourceDriver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct CoreContext {
    pub config: Arc<AppConfig>,
    pub embeddings: Arc<EmbeddingService>,
    pub index: Arc<VectorIndex>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub result_cache: Arc<ResultCache>,
    pub limiter: Arc<SourceRateLimiter>,
    pub breaker: Arc<CircuitBreaker>,
}

impl CoreContext {
    /// Wire every component from configuration. An unusable embedding
    /// provider fails startup; an unreachable cache backend degrades to
    /// in-process state with a warning.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let config = Arc::new(config);

        // Shared cache is optional; everything it backs degrades gracefully
        let cache: Option<Arc<Cache>> = match &config.redis.url {
            Some(url) => match Cache::connect(url, &config.redis.key_prefix).await {
                Ok(cache) => {
                    info!("Connected to shared cache");
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!(error = %e, "Shared cache unavailable; using in-process state");
                    None
                }
            },
            None => None,
        };

        // Embedding provider failure at startup is fatal
        let embedder = create_embedder(&config.embedding)?;
        let embeddings = Arc::new(EmbeddingService::new(
            embedder,
            config.embedding.batch_size,
        ));

        let dedup_store: Arc<dyn DedupStore> = match &cache {
            Some(cache) => Arc::new(RedisDedupStore::new(Arc::clone(cache))),
            None => Arc::new(InMemoryDedupStore::new()),
        };
        let ledger = Arc::new(DedupLedger::new(
            dedup_store,
            config.index.dedup_capacity,
            config.index.dedup_fp_rate,
        ));

        let index = Arc::new(VectorIndex::new(
            config.embedding.dimension,
            ledger,
            UpgradeThresholds {
                hnsw: config.index.hnsw_threshold,
                ivf_flat: config.index.ivf_threshold,
                ivf_pq: config.index.ivfpq_threshold,
            },
            PathBuf::from(&config.index.data_dir),
            Duration::from_secs(config.index.save_debounce_secs),
        ));
        index.load().await?;

        let rate_backend: Arc<dyn RateBackend> = match &cache {
            Some(cache) => Arc::new(RedisRateBackend::new(Arc::clone(cache))),
            None => Arc::new(InMemoryRateBackend::new()),
        };
        let limiter = Arc::new(SourceRateLimiter::new(
            rate_backend,
            config.federation.bucket_overrides.clone(),
            citeguard_common::config::BucketConfig {
                capacity: config.federation.bucket_capacity,
                refill_per_sec: config.federation.refill_per_sec,
            },
        ));

        let breaker = Arc::new(CircuitBreaker::new(
            config.federation.failure_threshold,
            Duration::from_secs(config.federation.cooldown_secs),
        ));

        let http = reqwest::Client::builder()
            .user_agent(format!("citeguard/{}", citeguard_common::VERSION))
            .build()
            .map_err(|e| citeguard_common::errors::CoreError::Configuration {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let driver = Arc::new(SourceDriver::new(
            http,
            Arc::clone(&limiter),
            Arc::clone(&breaker),
            Duration::from_secs(config.federation.per_source_timeout_secs),
        ));

        let adapters = build_adapters(&config.federation);
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(Federator::new(
            adapters,
            driver,
            Duration::from_secs(config.federation.global_deadline_secs),
            config.federation.per_source_cap,
        ));

        let result_cache = Arc::new(ResultCache::new(
            cache,
            config.search.result_cache_ttl_secs,
        ));

        info!(
            dimension = config.embedding.dimension,
            model = embeddings.model_name(),
            "Core context initialized"
        );

        Ok(Self {
            config,
            embeddings,
            index,
            fetcher,
            result_cache,
            limiter,
            breaker,
        })
    }
}
