//! Inverted-file strategies: IVF-Flat and IVF-PQ
//!
//! Both partition the vector space with a k-means coarse quantizer and scan
//! only the lists nearest the query. IVF-Flat keeps raw vectors per list
//! (exact scoring, limited removal); IVF-PQ stores product-quantized codes
//! (approximate scoring, no removal). K-means initialization takes the
//! first k distinct points in storage order, so rebuilding the same vectors
//! yields the same structure.

use crate::flat::{dot, sort_hits, Scored};

const KMEANS_ITERS: usize = 10;
const PQ_CODEBOOK_SIZE: usize = 16;

pub(crate) struct IvfFlatIndex {
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<(u64, Vec<f32>)>>,
    nprobe: usize,
}

impl IvfFlatIndex {
    pub fn build(entries: &[(u64, Vec<f32>)]) -> Self {
        let vectors: Vec<&[f32]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
        let centroids = kmeans(&vectors, nlist_for(entries.len()), KMEANS_ITERS);
        let nprobe = nprobe_for(centroids.len());

        let mut lists = vec![Vec::new(); centroids.len().max(1)];
        for (id, vector) in entries {
            let list = nearest_centroid(&centroids, vector);
            lists[list].push((*id, vector.clone()));
        }

        Self {
            centroids,
            lists,
            nprobe,
        }
    }

    pub fn insert(&mut self, id: u64, vector: Vec<f32>) {
        let list = nearest_centroid(&self.centroids, &vector);
        self.lists[list].push((id, vector));
    }

    /// Linear scan of the owning list; acceptable for admin-rate removals
    pub fn remove(&mut self, id: u64) -> bool {
        for list in self.lists.iter_mut() {
            if let Some(pos) = list.iter().position(|(entry_id, _)| *entry_id == id) {
                list.swap_remove(pos);
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<Scored> {
        let probes = rank_centroids(&self.centroids, query, self.nprobe);

        let mut hits: Vec<Scored> = probes
            .iter()
            .flat_map(|&list| self.lists[list].iter())
            .filter_map(|(id, vector)| {
                let score = dot(query, vector);
                (score >= min_score).then_some((*id, score))
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }

    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize, min_score: f32) -> Vec<Vec<Scored>> {
        queries.iter().map(|q| self.search(q, k, min_score)).collect()
    }
}

pub(crate) struct IvfPqIndex {
    centroids: Vec<Vec<f32>>,
    // codebooks[sub][code] is the codeword for one subspace
    codebooks: Vec<Vec<Vec<f32>>>,
    lists: Vec<Vec<(u64, Vec<u8>)>>,
    subspaces: usize,
    sub_dim: usize,
    nprobe: usize,
}

impl IvfPqIndex {
    pub fn build(entries: &[(u64, Vec<f32>)], dimension: usize) -> Self {
        let vectors: Vec<&[f32]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
        let centroids = kmeans(&vectors, nlist_for(entries.len()), KMEANS_ITERS);
        let nprobe = nprobe_for(centroids.len());

        let subspaces = [8usize, 4, 2, 1]
            .into_iter()
            .find(|m| dimension % m == 0)
            .unwrap_or(1);
        let sub_dim = dimension / subspaces;

        // Train one codebook per subspace over all stored vectors
        let mut codebooks = Vec::with_capacity(subspaces);
        for sub in 0..subspaces {
            let slices: Vec<&[f32]> = vectors
                .iter()
                .map(|v| &v[sub * sub_dim..(sub + 1) * sub_dim])
                .collect();
            codebooks.push(kmeans(&slices, PQ_CODEBOOK_SIZE, KMEANS_ITERS));
        }

        let mut index = Self {
            lists: vec![Vec::new(); centroids.len().max(1)],
            centroids,
            codebooks,
            subspaces,
            sub_dim,
            nprobe,
        };
        for (id, vector) in entries {
            index.insert(*id, vector);
        }
        index
    }

    pub fn insert(&mut self, id: u64, vector: &[f32]) {
        let list = nearest_centroid(&self.centroids, vector);
        let codes = self.encode(vector);
        self.lists[list].push((id, codes));
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    fn encode(&self, vector: &[f32]) -> Vec<u8> {
        (0..self.subspaces)
            .map(|sub| {
                let slice = &vector[sub * self.sub_dim..(sub + 1) * self.sub_dim];
                nearest_centroid(&self.codebooks[sub], slice) as u8
            })
            .collect()
    }

    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Vec<Scored> {
        let probes = rank_centroids(&self.centroids, query, self.nprobe);

        // Asymmetric distance: per-subspace dot products with each codeword
        let tables: Vec<Vec<f32>> = (0..self.subspaces)
            .map(|sub| {
                let slice = &query[sub * self.sub_dim..(sub + 1) * self.sub_dim];
                self.codebooks[sub].iter().map(|cw| dot(slice, cw)).collect()
            })
            .collect();

        let mut hits: Vec<Scored> = probes
            .iter()
            .flat_map(|&list| self.lists[list].iter())
            .filter_map(|(id, codes)| {
                let score: f32 = codes
                    .iter()
                    .enumerate()
                    .map(|(sub, &code)| tables[sub][code as usize])
                    .sum();
                let score = score.clamp(-1.0, 1.0);
                (score >= min_score).then_some((*id, score))
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }

    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize, min_score: f32) -> Vec<Vec<Scored>> {
        queries.iter().map(|q| self.search(q, k, min_score)).collect()
    }
}

fn nlist_for(count: usize) -> usize {
    ((count as f64).sqrt() as usize).clamp(8, 1024)
}

fn nprobe_for(nlist: usize) -> usize {
    (nlist / 8).max(4).min(nlist.max(1))
}

fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = l2_sq(centroid, vector);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

fn rank_centroids(centroids: &[Vec<f32>], query: &[f32], nprobe: usize) -> Vec<usize> {
    let mut ranked: Vec<(usize, f32)> = centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, l2_sq(c, query)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(nprobe);
    ranked.into_iter().map(|(i, _)| i).collect()
}

/// Lloyd iterations with deterministic initialization: the first k distinct
/// points in storage order. Degenerate inputs with fewer than k distinct
/// points get exactly that many centroids.
fn kmeans(data: &[&[f32]], k: usize, iters: usize) -> Vec<Vec<f32>> {
    if data.is_empty() {
        return Vec::new();
    }
    let dim = data[0].len();
    let k = k.min(data.len());

    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    for point in data {
        if centroids.len() == k {
            break;
        }
        if !centroids.iter().any(|c| c.as_slice() == *point) {
            centroids.push(point.to_vec());
        }
    }
    let k = centroids.len();

    let mut assignment = vec![0usize; data.len()];
    for _ in 0..iters {
        // Assign
        let mut changed = false;
        for (i, vector) in data.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, vector);
            if assignment[i] != nearest {
                assignment[i] = nearest;
                changed = true;
            }
        }

        // Update
        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, vector) in data.iter().enumerate() {
            counts[assignment[i]] += 1;
            for (d, &x) in vector.iter().enumerate() {
                sums[assignment[i]][d] += x;
            }
        }
        for (c, (sum, &count)) in sums.into_iter().zip(&counts).enumerate() {
            if count > 0 {
                centroids[c] = sum.into_iter().map(|x| x / count as f32).collect();
            }
        }

        if !changed {
            break;
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    fn axis_entries(count: usize, dim: usize) -> Vec<(u64, Vec<f32>)> {
        (0..count).map(|i| (i as u64 + 1, unit(dim, i % dim))).collect()
    }

    #[test]
    fn test_kmeans_deterministic() {
        let entries = axis_entries(64, 8);
        let data: Vec<&[f32]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
        let a = kmeans(&data, 8, 10);
        let b = kmeans(&data, 8, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_caps_at_distinct_points() {
        let entries = axis_entries(64, 4);
        let data: Vec<&[f32]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
        let centroids = kmeans(&data, 16, 10);
        assert_eq!(centroids.len(), 4);
    }

    #[test]
    fn test_ivf_flat_finds_axis_match() {
        let index = IvfFlatIndex::build(&axis_entries(256, 8));
        let hits = index.search(&unit(8, 3), 5, 0.9);
        assert!(!hits.is_empty());
        for (id, score) in &hits {
            assert_eq!((id - 1) % 8, 3);
            assert!(*score > 0.99);
        }
    }

    #[test]
    fn test_ivf_flat_remove() {
        let mut index = IvfFlatIndex::build(&axis_entries(32, 8));
        assert!(index.remove(5));
        assert!(!index.remove(5));
        assert_eq!(index.len(), 31);
    }

    #[test]
    fn test_ivf_pq_exact_on_repeated_points() {
        // Every distinct subvector fits in the codebook, so quantization is
        // lossless and matches score at full cosine
        let entries = axis_entries(256, 16);
        let index = IvfPqIndex::build(&entries, 16);
        assert_eq!(index.len(), 256);

        let hits = index.search(&unit(16, 2), 5, 0.5);
        assert!(!hits.is_empty());
        for (id, score) in &hits {
            assert_eq!((id - 1) % 16, 2);
            assert!(*score > 0.99);
        }
    }

    #[test]
    fn test_ivf_pq_scores_clamped() {
        let entries = axis_entries(128, 16);
        let index = IvfPqIndex::build(&entries, 16);
        let hits = index.search(&unit(16, 0), 20, -1.0);
        for (_, score) in &hits {
            assert!(*score <= 1.0 && *score >= -1.0);
        }
    }

    #[test]
    fn test_ivf_pq_insert_after_build() {
        let entries = axis_entries(64, 16);
        let mut index = IvfPqIndex::build(&entries, 16);
        index.insert(1000, &unit(16, 7));
        assert_eq!(index.len(), 65);
    }
}
