//! Index strategy selection
//!
//! The internal structure of the vector index is a state machine keyed on
//! paper count. Transitions fire post-insert under the write lock; each
//! transition is a pure rebuild from the authoritative id -> (vector,
//! metadata) map.

use serde::{Deserialize, Serialize};

/// Upgrade thresholds, configurable at startup
#[derive(Debug, Clone, Copy)]
pub struct UpgradeThresholds {
    pub hnsw: usize,
    pub ivf_flat: usize,
    pub ivf_pq: usize,
}

impl Default for UpgradeThresholds {
    fn default() -> Self {
        Self {
            hnsw: 10_000,
            ivf_flat: 100_000,
            ivf_pq: 1_000_000,
        }
    }
}

/// Internal structure of the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Exact dot-product scan with an ID map
    Flat,
    /// Hierarchical navigable small world graph (~95% recall)
    Hnsw,
    /// Inverted file over coarse centroids, exact residual scoring
    IvfFlat,
    /// Inverted file with product quantization
    IvfPq,
}

impl IndexStrategy {
    /// Target strategy for a given paper count
    pub fn for_count(count: usize, thresholds: &UpgradeThresholds) -> Self {
        if count > thresholds.ivf_pq {
            IndexStrategy::IvfPq
        } else if count > thresholds.ivf_flat {
            IndexStrategy::IvfFlat
        } else if count > thresholds.hnsw {
            IndexStrategy::Hnsw
        } else {
            IndexStrategy::Flat
        }
    }

    pub fn supports_removal(&self) -> bool {
        matches!(self, IndexStrategy::Flat | IndexStrategy::IvfFlat)
    }

    pub fn is_approximate(&self) -> bool {
        !matches!(self, IndexStrategy::Flat)
    }

    /// Single-byte tag used in the persisted header
    pub fn tag(&self) -> u8 {
        match self {
            IndexStrategy::Flat => 0,
            IndexStrategy::Hnsw => 1,
            IndexStrategy::IvfFlat => 2,
            IndexStrategy::IvfPq => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(IndexStrategy::Flat),
            1 => Some(IndexStrategy::Hnsw),
            2 => Some(IndexStrategy::IvfFlat),
            3 => Some(IndexStrategy::IvfPq),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexStrategy::Flat => "flat",
            IndexStrategy::Hnsw => "hnsw",
            IndexStrategy::IvfFlat => "ivf_flat",
            IndexStrategy::IvfPq => "ivf_pq",
        }
    }
}
