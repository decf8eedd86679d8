//! The vector index
//!
//! One reader/writer lock per process-local index: writers (add, migrate,
//! remove, save, clear, load) are exclusive, readers (search, stats) are
//! concurrent. Strategy migration happens post-insert under the write lock
//! as a pure rebuild from the authoritative id -> (vector, metadata) map, so
//! concurrent reads see either the old structure or the new one, never a
//! partially populated index.

use crate::dedup::{DedupLedger, DedupOutcome};
use crate::flat::FlatIndex;
use crate::hnsw::HnswIndex;
use crate::ivf::{IvfFlatIndex, IvfPqIndex};
use crate::paper::{ContentHash, Paper};
use crate::persist::{self, PersistedIndex};
use crate::strategy::{IndexStrategy, UpgradeThresholds};
use citeguard_common::errors::{CoreError, Result};
use citeguard_common::metrics;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A scored match from the index
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub paper_id: u64,
    pub score: f32,
}

/// Index statistics for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    pub strategy: &'static str,
    pub supports_removal: bool,
    pub is_approximate: bool,
    pub corrupted: bool,
}

enum Structure {
    Flat(FlatIndex),
    Hnsw(HnswIndex),
    IvfFlat(IvfFlatIndex),
    IvfPq(IvfPqIndex),
}

impl Structure {
    fn build(strategy: IndexStrategy, entries: &[(u64, Vec<f32>)], dimension: usize) -> Self {
        match strategy {
            IndexStrategy::Flat => Structure::Flat(FlatIndex::build(entries)),
            IndexStrategy::Hnsw => Structure::Hnsw(HnswIndex::build(entries)),
            IndexStrategy::IvfFlat => Structure::IvfFlat(IvfFlatIndex::build(entries)),
            IndexStrategy::IvfPq => Structure::IvfPq(IvfPqIndex::build(entries, dimension)),
        }
    }

    fn insert(&mut self, id: u64, vector: &[f32]) {
        match self {
            Structure::Flat(s) => s.insert(id, vector.to_vec()),
            Structure::Hnsw(s) => s.insert(id, vector),
            Structure::IvfFlat(s) => s.insert(id, vector.to_vec()),
            Structure::IvfPq(s) => s.insert(id, vector),
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        match self {
            Structure::Flat(s) => s.remove(id),
            Structure::IvfFlat(s) => s.remove(id),
            Structure::Hnsw(_) | Structure::IvfPq(_) => false,
        }
    }

    fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<(u64, f32)> {
        match self {
            Structure::Flat(s) => s.search(query, k, min_score),
            Structure::Hnsw(s) => s.search(query, k, min_score),
            Structure::IvfFlat(s) => s.search(query, k, min_score),
            Structure::IvfPq(s) => s.search(query, k, min_score),
        }
    }

    fn search_batch(&self, queries: &[Vec<f32>], k: usize, min_score: f32) -> Vec<Vec<(u64, f32)>> {
        match self {
            Structure::Flat(s) => s.search_batch(queries, k, min_score),
            Structure::Hnsw(s) => s.search_batch(queries, k, min_score),
            Structure::IvfFlat(s) => s.search_batch(queries, k, min_score),
            Structure::IvfPq(s) => s.search_batch(queries, k, min_score),
        }
    }
}

struct Inner {
    dimension: usize,
    strategy: IndexStrategy,
    structure: Structure,
    papers: BTreeMap<u64, Paper>,
    by_hash: HashMap<ContentHash, u64>,
    next_paper_id: u64,
    corrupted: bool,
    dirty: bool,
}

impl Inner {
    fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            strategy: IndexStrategy::Flat,
            structure: Structure::Flat(FlatIndex::build(&[])),
            papers: BTreeMap::new(),
            by_hash: HashMap::new(),
            next_paper_id: 1,
            corrupted: false,
            dirty: false,
        }
    }

    /// Rebuild the hash map from the paper map; the lowest id wins a group
    fn reindex_hashes(&mut self) {
        self.by_hash.clear();
        for (&id, paper) in self.papers.iter() {
            self.by_hash.entry(paper.content_hash).or_insert(id);
        }
    }

    fn entries(&self) -> Vec<(u64, Vec<f32>)> {
        self.papers
            .iter()
            .map(|(&id, paper)| (id, paper.embedding.clone()))
            .collect()
    }

    /// Rebuild the structure for `target` from the authoritative map.
    fn rebuild_as(&mut self, target: IndexStrategy) {
        let entries = self.entries();
        self.structure = Structure::build(target, &entries, self.dimension);
        self.strategy = target;
    }

    /// Post-insert upgrade check; runs under the write lock.
    fn maybe_upgrade(&mut self, thresholds: &UpgradeThresholds) {
        let target = IndexStrategy::for_count(self.papers.len(), thresholds);
        if target != self.strategy {
            info!(
                from = self.strategy.name(),
                to = target.name(),
                count = self.papers.len(),
                "Migrating index strategy"
            );
            self.rebuild_as(target);
        }
    }
}

/// In-memory ANN/exact index with ID mapping, metadata, persistence, and
/// auto-upgrade across strategies.
pub struct VectorIndex {
    inner: RwLock<Inner>,
    ledger: Arc<DedupLedger>,
    thresholds: UpgradeThresholds,
    data_dir: PathBuf,
    save_debounce: Duration,
    save_scheduled: AtomicBool,
}

impl VectorIndex {
    pub fn new(
        dimension: usize,
        ledger: Arc<DedupLedger>,
        thresholds: UpgradeThresholds,
        data_dir: PathBuf,
        save_debounce: Duration,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner::empty(dimension)),
            ledger,
            thresholds,
            data_dir,
            save_debounce,
            save_scheduled: AtomicBool::new(false),
        }
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    /// Add papers with precomputed embeddings. Duplicates (by content hash)
    /// are skipped silently; each new paper gets a fresh, never-reused id.
    /// Returns the count actually added.
    pub async fn add(&self, papers: Vec<Paper>) -> Result<usize> {
        let mut inner = self.inner.write().await;

        let mut added = 0;
        let mut skipped = 0;
        for mut paper in papers {
            if paper.embedding.len() != inner.dimension {
                return Err(CoreError::InvalidInput {
                    message: format!(
                        "embedding dimension {} does not match index dimension {}",
                        paper.embedding.len(),
                        inner.dimension
                    ),
                });
            }

            match self.ledger.seen_or_add(&paper.content_hash).await? {
                DedupOutcome::Duplicate => {
                    debug!(hash = %paper.content_hash, "Skipping duplicate paper");
                    skipped += 1;
                }
                DedupOutcome::New => {
                    let id = inner.next_paper_id;
                    inner.next_paper_id += 1;
                    paper.paper_id = id;
                    inner.structure.insert(id, &paper.embedding);
                    inner.by_hash.insert(paper.content_hash, id);
                    inner.papers.insert(id, paper);
                    added += 1;
                }
            }
        }

        if added > 0 {
            inner.maybe_upgrade(&self.thresholds);
            inner.dirty = true;
        }
        metrics::record_index_add(added, skipped, inner.papers.len());

        Ok(added)
    }

    /// Top-k matches with cosine >= min_score, ties broken by lower paper id.
    pub async fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read().await;
        self.check_query(&inner, query)?;

        Ok(inner
            .structure
            .search(query, k, min_score)
            .into_iter()
            .map(|(paper_id, score)| SearchHit { paper_id, score })
            .collect())
    }

    /// Per-query result lists via the structure's batched search primitive.
    pub async fn search_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Vec<SearchHit>>> {
        let inner = self.inner.read().await;
        for query in queries {
            self.check_query(&inner, query)?;
        }

        Ok(inner
            .structure
            .search_batch(queries, k, min_score)
            .into_iter()
            .map(|hits| {
                hits.into_iter()
                    .map(|(paper_id, score)| SearchHit { paper_id, score })
                    .collect()
            })
            .collect())
    }

    fn check_query(&self, inner: &Inner, query: &[f32]) -> Result<()> {
        if query.len() != inner.dimension {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    inner.dimension
                ),
            });
        }
        Ok(())
    }

    /// Fetch metadata for ids (search results carry ids only).
    pub async fn papers(&self, ids: &[u64]) -> Vec<Paper> {
        let inner = self.inner.read().await;
        ids.iter()
            .filter_map(|id| inner.papers.get(id).cloned())
            .collect()
    }

    /// Resolve content hashes to their indexed papers (used to attach
    /// assigned ids to freshly added federated results).
    pub async fn find_by_hashes(&self, hashes: &[ContentHash]) -> HashMap<ContentHash, Paper> {
        let inner = self.inner.read().await;
        hashes
            .iter()
            .filter_map(|hash| {
                let id = inner.by_hash.get(hash)?;
                inner.papers.get(id).map(|paper| (*hash, paper.clone()))
            })
            .collect()
    }

    /// Remove papers by id. Rejected for strategies without removal support.
    pub async fn remove(&self, paper_ids: &[u64]) -> Result<usize> {
        let mut inner = self.inner.write().await;

        if !inner.strategy.supports_removal() {
            return Err(CoreError::UnsupportedOperation {
                message: format!("strategy {} does not support removal", inner.strategy.name()),
            });
        }

        let mut removed = 0;
        for &id in paper_ids {
            if let Some(paper) = inner.papers.remove(&id) {
                inner.structure.remove(id);
                inner.by_hash.remove(&paper.content_hash);
                self.ledger.forget(&paper.content_hash).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            inner.dirty = true;
        }
        Ok(removed)
    }

    /// Group metadata by content hash, keep the lowest paper id per group,
    /// drop the rest. Strategies without point removal are rebuilt from the
    /// surviving map.
    pub async fn remove_duplicates(&self) -> Result<usize> {
        let mut inner = self.inner.write().await;

        let mut keep: BTreeMap<ContentHash, u64> = BTreeMap::new();
        for (&id, paper) in inner.papers.iter() {
            keep.entry(paper.content_hash).or_insert(id);
        }

        let doomed: Vec<u64> = inner
            .papers
            .iter()
            .filter(|(&id, paper)| keep.get(&paper.content_hash) != Some(&id))
            .map(|(&id, _)| id)
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }

        for id in &doomed {
            inner.papers.remove(id);
        }

        if inner.strategy.supports_removal() {
            for id in &doomed {
                inner.structure.remove(*id);
            }
        } else {
            let strategy = inner.strategy;
            inner.rebuild_as(strategy);
        }

        inner.reindex_hashes();
        inner.dirty = true;
        info!(removed = doomed.len(), "Removed duplicate papers");
        Ok(doomed.len())
    }

    /// Persist both index files with the atomic rename pattern. Exclusive
    /// with other writers for the duration of the write.
    pub async fn save(&self) -> Result<()> {
        let mut inner = self.inner.write().await;

        let snapshot = PersistedIndex {
            strategy: inner.strategy,
            dimension: inner.dimension,
            next_paper_id: inner.next_paper_id,
            papers: inner.papers.values().cloned().collect(),
        };
        let data_dir = self.data_dir.clone();

        tokio::task::spawn_blocking(move || persist::write_index(&data_dir, &snapshot))
            .await
            .map_err(|e| CoreError::Internal {
                message: format!("save task failed: {}", e),
            })??;

        inner.dirty = false;
        debug!(count = inner.papers.len(), "Index saved");
        Ok(())
    }

    /// Coalesce save requests: the first caller in a debounce window
    /// schedules one save; later callers return immediately. A failed save
    /// leaves the index dirty so the next window retries.
    pub fn save_debounced(self: &Arc<Self>) {
        if self.save_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let index = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(index.save_debounce).await;
            index.save_scheduled.store(false, Ordering::SeqCst);

            if !index.inner.read().await.dirty {
                return;
            }
            if let Err(e) = index.save().await {
                warn!(error = %e, "Debounced index save failed; will retry next window");
            }
        });
    }

    /// Load persisted state. A missing index starts empty; a corrupted or
    /// dimension-mismatched one is reported via stats and presented empty
    /// rather than crashing. A strategy tag that disagrees with the loaded
    /// count's band is accepted by rebuilding before publication.
    pub async fn load(&self) -> Result<()> {
        let data_dir = self.data_dir.clone();
        let loaded = tokio::task::spawn_blocking(move || persist::read_index(&data_dir))
            .await
            .map_err(|e| CoreError::Internal {
                message: format!("load task failed: {}", e),
            })?;

        let mut inner = self.inner.write().await;
        let expected_dimension = inner.dimension;

        let snapshot = match loaded {
            Ok(None) => {
                info!("No persisted index found; starting empty");
                return Ok(());
            }
            Ok(Some(snapshot)) => snapshot,
            Err(CoreError::IndexCorrupted { message }) => {
                tracing::error!(error = %message, "Persisted index corrupted; presenting empty index");
                *inner = Inner::empty(expected_dimension);
                inner.corrupted = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if snapshot.dimension != expected_dimension {
            tracing::error!(
                persisted = snapshot.dimension,
                configured = expected_dimension,
                "Dimension mismatch; presenting empty index"
            );
            *inner = Inner::empty(expected_dimension);
            inner.corrupted = true;
            return Ok(());
        }

        let target = IndexStrategy::for_count(snapshot.papers.len(), &self.thresholds);
        if target != snapshot.strategy {
            info!(
                persisted = snapshot.strategy.name(),
                rebuilt = target.name(),
                count = snapshot.papers.len(),
                "Persisted strategy disagrees with count band; rebuilding"
            );
        }

        let mut papers = BTreeMap::new();
        for paper in snapshot.papers {
            papers.insert(paper.paper_id, paper);
        }

        let hashes: Vec<_> = papers.values().map(|p| p.content_hash).collect();
        self.ledger.seed(hashes).await?;

        let entries: Vec<(u64, Vec<f32>)> = papers
            .iter()
            .map(|(&id, p)| (id, p.embedding.clone()))
            .collect();

        inner.structure = Structure::build(target, &entries, expected_dimension);
        inner.strategy = target;
        inner.next_paper_id = snapshot.next_paper_id;
        inner.papers = papers;
        inner.reindex_hashes();
        inner.corrupted = false;
        inner.dirty = false;

        info!(
            count = inner.papers.len(),
            strategy = inner.strategy.name(),
            "Index loaded"
        );
        Ok(())
    }

    /// Copy both persisted files into a stamped backup directory.
    pub async fn backup(&self) -> Result<PathBuf> {
        // Persist current state first so the backup is not stale
        self.save().await?;

        let data_dir = self.data_dir.clone();
        tokio::task::spawn_blocking(move || persist::backup(&data_dir))
            .await
            .map_err(|e| CoreError::Internal {
                message: format!("backup task failed: {}", e),
            })?
    }

    /// Empty the index. Paper ids stay monotonic: the next id is preserved
    /// so logs remain sound across a session.
    pub async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let next = inner.next_paper_id;
        let dimension = inner.dimension;

        *inner = Inner::empty(dimension);
        inner.next_paper_id = next;
        inner.dirty = true;

        self.ledger.clear().await?;
        info!("Index cleared");
        Ok(())
    }

    pub async fn stats(&self) -> IndexStats {
        let inner = self.inner.read().await;
        IndexStats {
            count: inner.papers.len(),
            dimension: inner.dimension,
            strategy: inner.strategy.name(),
            supports_removal: inner.strategy.supports_removal(),
            is_approximate: inner.strategy.is_approximate(),
            corrupted: inner.corrupted,
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.papers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::InMemoryDedupStore;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    fn paper(title: &str, abstract_text: &str, embedding: Vec<f32>) -> Paper {
        let mut p = Paper::new(
            title.to_string(),
            abstract_text.to_string(),
            vec!["Author".into()],
            "arxiv".into(),
            "article".into(),
            "2024-01-01".into(),
            String::new(),
            String::new(),
        );
        p.embedding = embedding;
        p
    }

    fn index_with_dir(dir: &std::path::Path, thresholds: UpgradeThresholds) -> Arc<VectorIndex> {
        let ledger = Arc::new(DedupLedger::new(
            Arc::new(InMemoryDedupStore::new()),
            10_000,
            0.01,
        ));
        Arc::new(VectorIndex::new(
            4,
            ledger,
            thresholds,
            dir.to_path_buf(),
            Duration::from_millis(10),
        ))
    }

    fn test_index(dir: &std::path::Path) -> Arc<VectorIndex> {
        index_with_dir(dir, UpgradeThresholds::default())
    }

    #[tokio::test]
    async fn test_add_assigns_monotonic_ids() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        let added = index
            .add(vec![
                paper("one", "first abstract", unit(4, 0)),
                paper("two", "second abstract", unit(4, 1)),
            ])
            .await
            .unwrap();
        assert_eq!(added, 2);

        let hits = index.search(&unit(4, 0), 10, 0.5).await.unwrap();
        assert_eq!(hits[0].paper_id, 1);
    }

    #[tokio::test]
    async fn test_add_skips_duplicates_silently() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index
            .add(vec![paper("same", "identical abstract", unit(4, 0))])
            .await
            .unwrap();
        let added = index
            .add(vec![paper("Same", "Identical   abstract!", unit(4, 1))])
            .await
            .unwrap();

        assert_eq!(added, 0);
        assert_eq!(index.count().await, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        let result = index.add(vec![paper("bad", "wrong dims", vec![1.0; 7])]).await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_search_scores_non_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index
            .add(vec![
                paper("a", "alpha text", unit(4, 0)),
                paper("b", "beta text", vec![0.8, 0.6, 0.0, 0.0]),
                paper("c", "gamma text", unit(4, 1)),
            ])
            .await
            .unwrap();

        let hits = index.search(&unit(4, 0), 10, 0.0).await.unwrap();
        assert!(hits.len() <= 10);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_remove_supported_on_flat() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index.add(vec![paper("x", "to be removed", unit(4, 2))]).await.unwrap();
        let removed = index.remove(&[1]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.count().await, 0);

        // Hash forgotten, so the paper can come back
        let added = index.add(vec![paper("x", "to be removed", unit(4, 2))]).await.unwrap();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn test_remove_rejected_on_hnsw() {
        let dir = tempfile::tempdir().unwrap();
        let thresholds = UpgradeThresholds {
            hnsw: 2,
            ivf_flat: 100_000,
            ivf_pq: 1_000_000,
        };
        let index = index_with_dir(dir.path(), thresholds);

        index
            .add(vec![
                paper("a", "first of three", unit(4, 0)),
                paper("b", "second of three", unit(4, 1)),
                paper("c", "third of three", unit(4, 2)),
            ])
            .await
            .unwrap();

        assert_eq!(index.stats().await.strategy, "hnsw");
        assert!(matches!(
            index.remove(&[1]).await,
            Err(CoreError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_upgrade_to_hnsw() {
        let dir = tempfile::tempdir().unwrap();
        let thresholds = UpgradeThresholds {
            hnsw: 4,
            ivf_flat: 100_000,
            ivf_pq: 1_000_000,
        };
        let index = index_with_dir(dir.path(), thresholds);

        for i in 0..6 {
            index
                .add(vec![paper(
                    &format!("paper {}", i),
                    &format!("abstract number {}", i),
                    unit(4, i % 4),
                )])
                .await
                .unwrap();
        }

        let stats = index.stats().await;
        assert_eq!(stats.strategy, "hnsw");
        assert!(stats.is_approximate);

        // Search still works after migration
        let hits = index.search(&unit(4, 1), 3, 0.5).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_clear_preserves_id_monotonicity() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index.add(vec![paper("a", "before clear", unit(4, 0))]).await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await, 0);

        index.add(vec![paper("b", "after clear", unit(4, 1))]).await.unwrap();
        let hits = index.search(&unit(4, 1), 1, 0.5).await.unwrap();
        assert_eq!(hits[0].paper_id, 2);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index
            .add(vec![
                paper("one", "first persisted", unit(4, 0)),
                paper("two", "second persisted", unit(4, 1)),
            ])
            .await
            .unwrap();
        index.save().await.unwrap();

        let reloaded = test_index(dir.path());
        reloaded.load().await.unwrap();

        assert_eq!(reloaded.count().await, 2);
        let original = index.search(&unit(4, 0), 5, 0.0).await.unwrap();
        let restored = reloaded.search(&unit(4, 0), 5, 0.0).await.unwrap();
        assert_eq!(original, restored);

        // Id monotonicity survives the round trip
        reloaded.add(vec![paper("three", "post reload", unit(4, 2))]).await.unwrap();
        let hits = reloaded.search(&unit(4, 2), 1, 0.5).await.unwrap();
        assert_eq!(hits[0].paper_id, 3);
    }

    #[tokio::test]
    async fn test_load_seeds_dedup_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        index.add(vec![paper("seed", "ledger seed text", unit(4, 0))]).await.unwrap();
        index.save().await.unwrap();

        let reloaded = test_index(dir.path());
        reloaded.load().await.unwrap();

        let added = reloaded
            .add(vec![paper("seed", "ledger seed text", unit(4, 1))])
            .await
            .unwrap();
        assert_eq!(added, 0);
    }

    #[tokio::test]
    async fn test_corrupted_load_presents_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());
        index.add(vec![paper("a", "will be corrupted", unit(4, 0))]).await.unwrap();
        index.save().await.unwrap();

        std::fs::write(dir.path().join(persist::META_FILE), b"garbage").unwrap();

        let reloaded = test_index(dir.path());
        reloaded.load().await.unwrap();

        let stats = reloaded.stats().await;
        assert!(stats.corrupted);
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn test_remove_duplicates_keeps_lowest_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());

        // Force two entries with the same hash past the ledger by clearing
        // the ledger between adds
        index.add(vec![paper("dup", "duplicate body", unit(4, 0))]).await.unwrap();
        index.ledger().clear().await.unwrap();
        index.add(vec![paper("dup", "duplicate body", unit(4, 1))]).await.unwrap();
        assert_eq!(index.count().await, 2);

        let removed = index.remove_duplicates().await.unwrap();
        assert_eq!(removed, 1);

        let remaining = index.papers(&[1, 2]).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].paper_id, 1);
    }

    #[tokio::test]
    async fn test_stats_shape() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(dir.path());
        let stats = index.stats().await;

        assert_eq!(stats.count, 0);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.strategy, "flat");
        assert!(stats.supports_removal);
        assert!(!stats.is_approximate);
        assert!(!stats.corrupted);
    }
}
