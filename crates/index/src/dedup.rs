//! Content-addressed deduplicator
//!
//! A probabilistic "maybe seen" Bloom layer over an authoritative "definitely
//! seen" hash set. The authoritative set is the source of truth; the filter
//! is a rebuildable accelerator. Invariant: every hash in the authoritative
//! set is also in the filter, so a negative filter probe is conclusive.

use crate::paper::ContentHash;
use async_trait::async_trait;
use citeguard_common::cache::{keys, Cache};
use citeguard_common::errors::Result;
use probabilistic_collections::bloom::BloomFilter;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Outcome of a dedup probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    New,
    Duplicate,
}

/// Authoritative hash set backend.
///
/// The in-process store is the default; the redis store shares state across
/// workers of the same process group.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn contains(&self, hash: &str) -> Result<bool>;

    /// Insert a hash, returning true when it was newly added
    async fn insert(&self, hash: &str) -> Result<bool>;

    async fn remove(&self, hash: &str) -> Result<()>;

    async fn all(&self) -> Result<Vec<String>>;

    async fn len(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;
}

/// In-process authoritative store
#[derive(Default)]
pub struct InMemoryDedupStore {
    hashes: Mutex<HashSet<String>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.hashes.lock().expect("dedup store poisoned").contains(hash))
    }

    async fn insert(&self, hash: &str) -> Result<bool> {
        Ok(self
            .hashes
            .lock()
            .expect("dedup store poisoned")
            .insert(hash.to_string()))
    }

    async fn remove(&self, hash: &str) -> Result<()> {
        self.hashes.lock().expect("dedup store poisoned").remove(hash);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<String>> {
        Ok(self
            .hashes
            .lock()
            .expect("dedup store poisoned")
            .iter()
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.hashes.lock().expect("dedup store poisoned").len())
    }

    async fn clear(&self) -> Result<()> {
        self.hashes.lock().expect("dedup store poisoned").clear();
        Ok(())
    }
}

/// Redis-backed authoritative store (cross-worker)
pub struct RedisDedupStore {
    cache: Arc<Cache>,
}

impl RedisDedupStore {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn contains(&self, hash: &str) -> Result<bool> {
        self.cache.set_contains(&keys::dedup_set(), hash).await
    }

    async fn insert(&self, hash: &str) -> Result<bool> {
        self.cache.set_add(&keys::dedup_set(), hash).await
    }

    async fn remove(&self, hash: &str) -> Result<()> {
        self.cache.set_remove(&keys::dedup_set(), hash).await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<String>> {
        self.cache.set_members(&keys::dedup_set()).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.cache.set_members(&keys::dedup_set()).await?.len())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.remove(&keys::dedup_set()).await?;
        Ok(())
    }
}

/// Deduplication statistics for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct DedupStats {
    pub authoritative_count: usize,
    pub filter_capacity: usize,
    pub target_fp_rate: f64,
}

/// Layered dedup ledger: Bloom filter over an authoritative store.
pub struct DedupLedger {
    filter: Mutex<BloomFilter<String>>,
    store: Arc<dyn DedupStore>,
    capacity: usize,
    fp_rate: f64,
}

impl DedupLedger {
    pub fn new(store: Arc<dyn DedupStore>, capacity: usize, fp_rate: f64) -> Self {
        Self {
            filter: Mutex::new(BloomFilter::new(capacity, fp_rate)),
            store,
            capacity,
            fp_rate,
        }
    }

    /// O(1) expected membership-and-insert.
    ///
    /// A negative filter probe is conclusive: the hash is new, and it is
    /// added to both layers. A positive probe may be a false positive, so
    /// the authoritative store decides.
    pub async fn seen_or_add(&self, hash: &ContentHash) -> Result<DedupOutcome> {
        let key = hash.to_hex();

        let maybe_seen = {
            let filter = self.filter.lock().expect("dedup filter poisoned");
            filter.contains(&key)
        };

        if !maybe_seen {
            self.filter
                .lock()
                .expect("dedup filter poisoned")
                .insert(&key);
            self.store.insert(&key).await?;
            return Ok(DedupOutcome::New);
        }

        if self.store.contains(&key).await? {
            return Ok(DedupOutcome::Duplicate);
        }

        // Filter false positive: authoritative store decides New
        self.store.insert(&key).await?;
        Ok(DedupOutcome::New)
    }

    /// Remove a hash from the authoritative store. The filter keeps the
    /// entry; a later probe falls through to the store and reads New.
    pub async fn forget(&self, hash: &ContentHash) -> Result<()> {
        self.store.remove(&hash.to_hex()).await
    }

    /// Rebuild the filter from the authoritative store (startup, or after
    /// bulk removal).
    pub async fn rebuild(&self) -> Result<usize> {
        let hashes = self.store.all().await?;
        let mut fresh = BloomFilter::new(self.capacity, self.fp_rate);
        for hash in &hashes {
            fresh.insert(hash);
        }
        *self.filter.lock().expect("dedup filter poisoned") = fresh;
        tracing::info!(count = hashes.len(), "Dedup filter rebuilt from ledger");
        Ok(hashes.len())
    }

    /// Seed the ledger with hashes recovered from persisted index metadata.
    pub async fn seed(&self, hashes: impl IntoIterator<Item = ContentHash>) -> Result<()> {
        let mut filter = BloomFilter::new(self.capacity, self.fp_rate);
        for hash in hashes {
            let key = hash.to_hex();
            self.store.insert(&key).await?;
            filter.insert(&key);
        }
        // Keep any cross-worker entries the store already held
        for key in self.store.all().await? {
            filter.insert(&key);
        }
        *self.filter.lock().expect("dedup filter poisoned") = filter;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        *self.filter.lock().expect("dedup filter poisoned") =
            BloomFilter::new(self.capacity, self.fp_rate);
        Ok(())
    }

    pub async fn stats(&self) -> Result<DedupStats> {
        Ok(DedupStats {
            authoritative_count: self.store.len().await?,
            filter_capacity: self.capacity,
            target_fp_rate: self.fp_rate,
        })
    }
}
