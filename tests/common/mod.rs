//! Synthetic datasets shared by the integration tests.

use ivf_search::{VectorDimension, VectorStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` points drawn uniformly from `[0, 1)^dim`.
pub fn random_store(n: usize, dim: usize, seed: u64) -> VectorStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..n * dim).map(|_| rng.random::<f32>()).collect();
    VectorStore::from_flat(VectorDimension::new(dim).unwrap(), &data).unwrap()
}

/// `groups` blobs of `per_group` points; blob `g` sits around `g * spacing`
/// on every axis with uniform jitter below `jitter`. Row order is blob-major.
pub fn blob_store(
    groups: usize,
    per_group: usize,
    dim: usize,
    spacing: f32,
    jitter: f32,
    seed: u64,
) -> VectorStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(groups * per_group * dim);
    for g in 0..groups {
        for _ in 0..per_group {
            for _ in 0..dim {
                data.push(g as f32 * spacing + rng.random::<f32>() * jitter);
            }
        }
    }
    VectorStore::from_flat(VectorDimension::new(dim).unwrap(), &data).unwrap()
}
