//! Query engine: exact brute-force scan and approximate IVF search.
//!
//! Both paths use squared Euclidean distance and return results sorted by
//! ascending distance, ties broken by ascending id. Batch variants run one
//! task per query on the current rayon pool; each worker reuses its own
//! selectors, and results come back in submission order.

use rayon::prelude::*;

use crate::vector::distance::distance_squared;
use crate::vector::ivf::IvfIndex;
use crate::vector::store::VectorStore;
use crate::vector::topk::TopK;
use crate::vector::types::{ClusterId, Neighbor, VectorError};

/// Per-worker scratch selectors, reused across queries.
struct Scratch {
    clusters: TopK,
    results: TopK,
}

impl Scratch {
    fn new(candidate_clusters: usize, k: usize) -> Self {
        Self {
            clusters: TopK::new(candidate_clusters),
            results: TopK::new(k),
        }
    }
}

/// Exact k-nearest neighbours of `query` over the whole store.
///
/// Returns `min(k, N)` entries.
pub fn brute_force(
    store: &VectorStore,
    query: &[f32],
    k: usize,
) -> Result<Vec<Neighbor>, VectorError> {
    store.dimension().validate_vector(query)?;
    let mut results = TopK::new(k.min(store.len()));
    Ok(scan_all(store, query, &mut results))
}

fn scan_all(store: &VectorStore, query: &[f32], results: &mut TopK) -> Vec<Neighbor> {
    for (id, vector) in store.iter() {
        results.offer(id, distance_squared(query, vector));
    }
    results.take_sorted()
}

/// The `candidate_clusters` centroids nearest to `query`, nearest first.
pub fn nearest_clusters(
    index: &IvfIndex,
    query: &[f32],
    candidate_clusters: usize,
) -> Result<Vec<ClusterId>, VectorError> {
    index.dimension().validate_vector(query)?;
    let mut selector = TopK::new(candidate_clusters);
    Ok(probe_order(index, query, &mut selector))
}

fn probe_order(index: &IvfIndex, query: &[f32], selector: &mut TopK) -> Vec<ClusterId> {
    // Cluster ids ride in the selector's id slot.
    for (cluster, centroid) in index.centroids().iter() {
        selector.offer(cluster, distance_squared(query, centroid));
    }
    selector
        .take_sorted()
        .into_iter()
        .map(|n| ClusterId::new(n.id.get()))
        .collect()
}

/// Approximate k-nearest neighbours: scans only the members of the
/// `candidate_clusters` nearest clusters.
///
/// When those clusters hold fewer than `k` vectors in total, fewer than `k`
/// entries are returned.
pub fn ivf_search(
    store: &VectorStore,
    index: &IvfIndex,
    query: &[f32],
    k: usize,
    candidate_clusters: usize,
) -> Result<Vec<Neighbor>, VectorError> {
    store.dimension().validate_vector(query)?;
    let mut scratch = Scratch::new(candidate_clusters, k);
    Ok(scan_clusters(store, index, query, &mut scratch))
}

fn scan_clusters(
    store: &VectorStore,
    index: &IvfIndex,
    query: &[f32],
    scratch: &mut Scratch,
) -> Vec<Neighbor> {
    for cluster in probe_order(index, query, &mut scratch.clusters) {
        for &id in index.members(cluster) {
            scratch
                .results
                .offer(id, distance_squared(query, store.row(id.index())));
        }
    }
    scratch.results.take_sorted()
}

/// Brute-force search for every row of `queries`, in row order.
pub fn brute_force_batch(
    store: &VectorStore,
    queries: &VectorStore,
    k: usize,
) -> Result<Vec<Vec<Neighbor>>, VectorError> {
    check_query_dimension(store, queries)?;
    let k = k.min(store.len());

    Ok((0..queries.len())
        .into_par_iter()
        .with_min_len(1)
        .map_init(
            || TopK::new(k),
            |results, q| scan_all(store, queries.row(q), results),
        )
        .collect())
}

/// IVF search for every row of `queries`, in row order.
pub fn ivf_search_batch(
    store: &VectorStore,
    index: &IvfIndex,
    queries: &VectorStore,
    k: usize,
    candidate_clusters: usize,
) -> Result<Vec<Vec<Neighbor>>, VectorError> {
    check_query_dimension(store, queries)?;

    Ok((0..queries.len())
        .into_par_iter()
        .with_min_len(1)
        .map_init(
            || Scratch::new(candidate_clusters, k),
            |scratch, q| scan_clusters(store, index, queries.row(q), scratch),
        )
        .collect())
}

fn check_query_dimension(store: &VectorStore, queries: &VectorStore) -> Result<(), VectorError> {
    let expected = store.dimension().get();
    let actual = queries.dimension().get();
    if expected != actual {
        return Err(VectorError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
