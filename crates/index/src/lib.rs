//! CiteGuard Vector Index
//!
//! In-memory ANN/exact index over academic papers with:
//! - Content-addressed deduplication (Bloom layer over an authoritative ledger)
//! - Strategy auto-upgrade (Flat -> HNSW -> IVF-Flat -> IVF-PQ) keyed on size
//! - Crash-safe persistence (atomic rename, length-prefixed metadata stream)

pub mod dedup;
mod flat;
mod hnsw;
pub mod index;
mod ivf;
pub mod paper;
pub mod persist;
pub mod strategy;

pub use dedup::{DedupLedger, DedupOutcome, DedupStats, DedupStore, InMemoryDedupStore, RedisDedupStore};
pub use index::{IndexStats, SearchHit, VectorIndex};
pub use paper::{ContentHash, Paper};
pub use strategy::IndexStrategy;
