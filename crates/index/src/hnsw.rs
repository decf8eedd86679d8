//! HNSW strategy: approximate graph search over normalized vectors
//!
//! Wraps `hnsw_rs` with the dot-product distance (vectors are stored
//! L2-normalized, so `score = 1 - distance`). Insertion is supported,
//! removal is not; removal requests are rejected upstream.

use crate::flat::{sort_hits, Scored};
use hnsw_rs::prelude::*;

const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;

pub(crate) struct HnswIndex {
    graph: Hnsw<'static, f32, DistDot>,
    // data-id position -> paper id; append-only
    ids: Vec<u64>,
}

impl HnswIndex {
    pub fn build(entries: &[(u64, Vec<f32>)]) -> Self {
        let capacity = entries.len().max(1024);
        let graph = Hnsw::<f32, DistDot>::new(
            MAX_NB_CONNECTION,
            capacity * 2,
            MAX_LAYER,
            EF_CONSTRUCTION,
            DistDot {},
        );

        let mut index = Self {
            graph,
            ids: Vec::with_capacity(entries.len()),
        };
        for (id, vector) in entries {
            index.insert(*id, vector);
        }
        index
    }

    pub fn insert(&mut self, id: u64, vector: &[f32]) {
        let pos = self.ids.len();
        let owned = vector.to_vec();
        self.graph.insert((&owned, pos));
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<Scored> {
        let neighbours = self.graph.search(query, k, EF_SEARCH);
        self.collect(neighbours, k, min_score)
    }

    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize, min_score: f32) -> Vec<Vec<Scored>> {
        let batched = self.graph.parallel_search(&queries.to_vec(), k, EF_SEARCH);
        batched
            .into_iter()
            .map(|neighbours| self.collect(neighbours, k, min_score))
            .collect()
    }

    fn collect(&self, neighbours: Vec<Neighbour>, k: usize, min_score: f32) -> Vec<Scored> {
        let mut hits: Vec<Scored> = neighbours
            .into_iter()
            .filter_map(|n| {
                let id = *self.ids.get(n.d_id)?;
                let score = 1.0 - n.distance;
                (score >= min_score).then_some((id, score))
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }
}
