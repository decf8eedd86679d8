//! Flat exact index: dot-product scan with an ID map
//!
//! All vectors are stored L2-normalized, so the dot product is the cosine
//! score. Exact, supports removal, and the reference for result ordering:
//! score descending, ties broken by lower paper id.

use std::cmp::Ordering;
use std::collections::HashMap;

/// A scored candidate from a structure scan
pub(crate) type Scored = (u64, f32);

pub(crate) struct FlatIndex {
    ids: Vec<u64>,
    vectors: Vec<Vec<f32>>,
    by_id: HashMap<u64, usize>,
}

impl FlatIndex {
    pub fn build(entries: &[(u64, Vec<f32>)]) -> Self {
        let mut index = Self {
            ids: Vec::with_capacity(entries.len()),
            vectors: Vec::with_capacity(entries.len()),
            by_id: HashMap::with_capacity(entries.len()),
        };
        for (id, vector) in entries {
            index.insert(*id, vector.clone());
        }
        index
    }

    pub fn insert(&mut self, id: u64, vector: Vec<f32>) {
        let pos = self.ids.len();
        self.ids.push(id);
        self.vectors.push(vector);
        self.by_id.insert(id, pos);
    }

    /// Swap-remove, patching the ID map for the displaced tail entry
    pub fn remove(&mut self, id: u64) -> bool {
        let Some(pos) = self.by_id.remove(&id) else {
            return false;
        };
        self.ids.swap_remove(pos);
        self.vectors.swap_remove(pos);
        if pos < self.ids.len() {
            self.by_id.insert(self.ids[pos], pos);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<Scored> {
        let mut scored: Vec<Scored> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .filter_map(|(&id, vector)| {
                let score = dot(query, vector);
                (score >= min_score).then_some((id, score))
            })
            .collect();

        sort_hits(&mut scored);
        scored.truncate(k);
        scored
    }

    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize, min_score: f32) -> Vec<Vec<Scored>> {
        queries.iter().map(|q| self.search(q, k, min_score)).collect()
    }
}

/// Dot product of two equal-length vectors
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Canonical hit ordering: score descending, then paper id ascending
pub(crate) fn sort_hits(hits: &mut [Scored]) {
    hits.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
}
