use std::collections::HashMap;

use hnsw_rs::prelude::*;
use parking_lot::RwLock;

/// Per-namespace HNSW-like approximate-nearest-neighbor index over
/// cosine similarity (spec §4.4, "ANN index").
///
/// Deletion is not supported by `hnsw_rs`, so the index is rebuilt from the
/// surviving vectors whenever an id is removed — acceptable because the
/// spec requires the index to be rebuildable rather than persisted (§4.4:
/// "The index is rebuilt, not persisted, to keep the on-disk format
/// minimal").
pub struct AnnIndex {
    max_connections: usize,
    ef_construction: usize,
    ef: usize,
    dimension: usize,
    inner: RwLock<Hnsw<'static, f32, DistCosine>>,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
    id_by_slot: RwLock<HashMap<usize, String>>,
    next_slot: RwLock<usize>,
}

fn layer_count(capacity_hint: usize) -> usize {
    16.min((capacity_hint.max(2) as f32).ln().trunc() as usize).max(1)
}

fn new_inner(max_connections: usize, ef_construction: usize, capacity_hint: usize) -> Hnsw<'static, f32, DistCosine> {
    Hnsw::<f32, DistCosine>::new(
        max_connections,
        capacity_hint.max(16),
        layer_count(capacity_hint),
        ef_construction,
        DistCosine {},
    )
}

impl AnnIndex {
    pub fn new(dimension: usize, max_connections: usize, ef_construction: usize, ef: usize) -> Self {
        Self {
            max_connections,
            ef_construction,
            ef,
            dimension,
            inner: RwLock::new(new_inner(max_connections, ef_construction, 1024)),
            vectors: RwLock::new(HashMap::new()),
            id_by_slot: RwLock::new(HashMap::new()),
            next_slot: RwLock::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or replaces the vector for `id`. Growth beyond the index's
    /// initial capacity is handled by a full rebuild (the index "may exceed
    /// initial capacity (grow amortized)" per spec §4.4).
    pub fn add(&self, id: &str, vector: Vec<f32>) {
        let mut vectors = self.vectors.write();
        vectors.insert(id.to_string(), vector);
        let count = vectors.len();
        drop(vectors);
        self.rebuild_locked(count);
    }

    pub fn delete(&self, id: &str) {
        let mut vectors = self.vectors.write();
        if vectors.remove(id).is_some() {
            let count = vectors.len();
            drop(vectors);
            self.rebuild_locked(count);
        }
    }

    fn rebuild_locked(&self, count_hint: usize) {
        let vectors = self.vectors.read();
        let mut inner = new_inner(self.max_connections, self.ef_construction, count_hint.max(16));
        let mut id_by_slot = HashMap::with_capacity(vectors.len());
        for (slot, (id, vector)) in vectors.iter().enumerate() {
            inner.insert((vector.as_slice(), slot));
            id_by_slot.insert(slot, id.clone());
        }
        *self.inner.write() = inner;
        *self.id_by_slot.write() = id_by_slot;
        *self.next_slot.write() = vectors.len();
    }

    /// Cosine-similarity top-k. `min_similarity` filters out weak matches.
    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<(String, f32)> {
        if query.len() != self.dimension || self.is_empty() || k == 0 {
            return Vec::new();
        }
        let ef_search = (k * 2).max(self.ef);
        let inner = self.inner.read();
        let neighbours = inner.search(query, k, ef_search);
        let id_by_slot = self.id_by_slot.read();
        neighbours
            .into_iter()
            .filter_map(|n| {
                let id = id_by_slot.get(&n.d_id)?;
                // hnsw_rs's DistCosine returns a distance in [0, 2]; convert
                // back to a cosine-similarity score in [-1, 1].
                let similarity = 1.0 - n.distance;
                if similarity >= min_similarity {
                    Some((id.clone(), similarity))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Exact cosine similarity, used for invariant checks and as a fallback
/// when a namespace's index has not yet been rebuilt.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_find_exact_vector() {
        let index = AnnIndex::new(4, 16, 100, 32);
        index.add("a", vec![1.0, 0.0, 0.0, 0.0]);
        index.add("b", vec![0.0, 1.0, 0.0, 0.0]);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.9);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 >= 0.99);
    }

    #[test]
    fn delete_removes_from_results() {
        let index = AnnIndex::new(3, 16, 100, 32);
        index.add("a", vec![1.0, 0.0, 0.0]);
        index.delete("a");
        assert!(index.is_empty());
        let results = index.search(&[1.0, 0.0, 0.0], 5, 0.0);
        assert!(results.is_empty());
    }

    #[test]
    fn cosine_similarity_identical_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }
}
