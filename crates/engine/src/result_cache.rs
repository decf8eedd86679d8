//! Result cache
//!
//! Fingerprint -> ranked matches with a TTL, stored in the shared cache.
//! Strictly advisory: a backend outage reads as a miss and live computation
//! proceeds. The fingerprint covers (theme, language, normalized query,
//! threshold) and deliberately nothing about the execution path, so cached
//! results serve both index-backed and federated runs.

use crate::orchestrator::Match;
use citeguard_common::cache::{keys, Cache};
use citeguard_common::metrics;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

/// Deterministic request fingerprint.
pub fn fingerprint(theme: &str, language: &str, normalized_query: &str, threshold: f32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(theme.as_bytes());
    hasher.update([0x1f]);
    hasher.update(language.as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalized_query.as_bytes());
    hasher.update([0x1f]);
    // Fixed formatting keeps equal thresholds equal across processes
    hasher.update(format!("{:.4}", threshold).as_bytes());
    hex::encode(hasher.finalize())
}

pub struct ResultCache {
    cache: Option<Arc<Cache>>,
    ttl_secs: u64,
}

impl ResultCache {
    pub fn new(cache: Option<Arc<Cache>>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Probe the cache; errors and absence both read as a miss.
    pub async fn lookup(&self, fingerprint: &str) -> Option<Vec<Match>> {
        let cache = self.cache.as_ref()?;

        match cache.get_json::<Vec<Match>>(&keys::result(fingerprint)).await {
            Ok(Some(matches)) => {
                metrics::record_cache(true, "result");
                Some(matches)
            }
            Ok(None) => {
                metrics::record_cache(false, "result");
                None
            }
            Err(e) => {
                warn!(error = %e, "Result cache lookup failed; treating as miss");
                metrics::record_cache(false, "result");
                None
            }
        }
    }

    /// Store a result set; failures are logged and swallowed.
    pub async fn store(&self, fingerprint: &str, matches: &[Match]) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        if let Err(e) = cache
            .put_json(&keys::result(fingerprint), &matches.to_vec(), self.ttl_secs)
            .await
        {
            warn!(error = %e, "Result cache store failed; continuing without cache");
        }
    }

    /// Drop every cached result set. Returns the number of evicted entries
    /// when a backend is configured.
    pub async fn clear(&self) -> u64 {
        let Some(cache) = self.cache.as_ref() else {
            return 0;
        };

        match cache.clear_prefix(keys::RESULT_PREFIX).await {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!(error = %e, "Result cache clear failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint("ml", "en", "neural networks models", 0.5);
        let b = fingerprint("ml", "en", "neural networks models", 0.5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_sensitive_to_each_input() {
        let base = fingerprint("ml", "en", "query text", 0.5);
        assert_ne!(base, fingerprint("bio", "en", "query text", 0.5));
        assert_ne!(base, fingerprint("ml", "de", "query text", 0.5));
        assert_ne!(base, fingerprint("ml", "en", "other text", 0.5));
        assert_ne!(base, fingerprint("ml", "en", "query text", 0.7));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        // Concatenation ambiguity must not collide
        assert_ne!(
            fingerprint("ab", "c", "query", 0.5),
            fingerprint("a", "bc", "query", 0.5)
        );
    }

    #[tokio::test]
    async fn test_absent_backend_is_always_miss() {
        let cache = ResultCache::new(None, 60);
        assert!(cache.lookup("abc").await.is_none());
        cache.store("abc", &[]).await;
        assert!(cache.lookup("abc").await.is_none());
        assert_eq!(cache.clear().await, 0);
    }
}
