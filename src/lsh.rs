//! Random-hyperplane LSH. Used by duplicate
//! clustering to cut an O(n^2) cosine comparison down to candidates that
//! share at least one bucket. Hyperplanes are drawn once per index from a
//! Box-Muller normal.

pub const NUM_PLANES: usize = 16;
pub const NUM_TABLES: usize = 4;

/// A small xorshift-style PRNG so hyperplane generation has no external
/// dependency and is reproducible given a seed.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform: one standard-normal sample per call.
    fn next_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

pub struct LshIndex {
    dim: usize,
    /// `planes[table][plane]` is a `dim`-length random hyperplane normal.
    planes: Vec<Vec<Vec<f64>>>,
    /// `buckets[table][signature] -> ids`.
    buckets: Vec<std::collections::HashMap<u64, Vec<usize>>>,
}

impl LshIndex {
    pub fn new(dim: usize, seed: u64) -> Self {
        let mut rng = Rng::new(seed);
        let planes = (0..NUM_TABLES)
            .map(|_| {
                (0..NUM_PLANES)
                    .map(|_| (0..dim).map(|_| rng.next_normal()).collect())
                    .collect()
            })
            .collect();
        Self { dim, planes, buckets: vec![std::collections::HashMap::new(); NUM_TABLES] }
    }

    fn signature(&self, table: usize, vector: &[f64]) -> u64 {
        let mut sig = 0u64;
        for (i, plane) in self.planes[table].iter().enumerate() {
            let dot: f64 = plane.iter().zip(vector).map(|(a, b)| a * b).sum();
            if dot >= 0.0 {
                sig |= 1 << i;
            }
        }
        sig
    }

    /// Insert a vector under id `idx`. `vector.len()` must equal `dim`.
    pub fn insert(&mut self, idx: usize, vector: &[f64]) {
        debug_assert_eq!(vector.len(), self.dim);
        for table in 0..NUM_TABLES {
            let sig = self.signature(table, vector);
            self.buckets[table].entry(sig).or_default().push(idx);
        }
    }

    /// All ids sharing at least one bucket with `vector` across any table,
    /// deduplicated, excluding `self_idx`.
    pub fn candidates(&self, self_idx: usize, vector: &[f64]) -> Vec<usize> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for table in 0..NUM_TABLES {
            let sig = self.signature(table, vector);
            if let Some(ids) = self.buckets[table].get(&sig) {
                for &id in ids {
                    if id != self_idx && seen.insert(id) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_vectors_share_a_bucket_with_high_probability() {
        let dim = 128;
        let v1: Vec<f64> = (0..dim).map(|i| (i as f64).cos()).collect();
        let v2: Vec<f64> = (0..dim).map(|i| (i as f64 + 0.1).cos()).collect();
        assert!(cosine_similarity(&v1, &v2) >= 0.9);

        let mut hits = 0;
        for seed in 1..=20u64 {
            let mut index = LshIndex::new(dim, seed);
            index.insert(0, &v1);
            index.insert(1, &v2);
            if index.candidates(0, &v1).contains(&1) {
                hits += 1;
            }
        }
        assert!(hits as f64 / 20.0 > 0.5, "expected most seeds to co-bucket near-identical vectors, got {hits}/20");
    }
}
