//! K-means clustering for IVF index construction.
//!
//! Two strategies partition a [`VectorStore`] into clusters with centroids:
//!
//! - **Lloyd**: seed `K` centroids, then alternate assign and update passes
//!   for a fixed budget. Stops early only at a fixed point, where further
//!   passes could not change anything.
//! - **Bisecting**: one assign pass splits the dataset into a few clusters,
//!   then the largest cluster is repeatedly removed, reseeded and split
//!   among fresh centroids until the target leaf count is reached. A split
//!   only ever touches the members of the cluster being split.
//!
//! # Algorithm Details
//! - Distance metric: squared Euclidean ([`distance_squared`])
//! - Seeding: data-point sampling by default; k-means++ and the legacy
//!   uniform-range draw are selectable through [`SeedingPolicy`]
//! - An empty cluster takes over one member of a larger cluster, chosen per
//!   [`EmptyClusterPolicy`]; every takeover is counted
//!
//! # Parallelism
//! The outer iteration loop is strictly sequential. Inside one iteration the
//! assign pass maps over points in parallel (read-only against centroids) and
//! the update pass reduces per cluster: members are grouped in id order and
//! each worker sums whole clusters in `f64`, so centroids are bit-identical
//! regardless of thread count. All randomness is drawn on the calling
//! thread from one seeded generator.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ClusteringStrategy, EmptyClusterPolicy, IndexConfig, SeedingPolicy};
use crate::vector::distance::distance_squared;
use crate::vector::store::VectorStore;
use crate::vector::types::{ClusterId, VectorError, VectorId};

/// Total squared distance below which k-means++ treats all points as coincident.
const EPSILON: f64 = 1e-12;

/// Errors that can occur during clustering operations.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Load base vectors before building the index"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Invalid seeding range [{min}, {max})\nSuggestion: Use finite bounds with min < max"
    )]
    InvalidSeedRange { min: f32, max: f32 },

    #[error("Vector operation error: {0}")]
    VectorError(#[from] VectorError),
}

/// Diagnostics from one index build.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BuildStats {
    pub strategy: ClusteringStrategy,
    /// Assign/update rounds for Lloyd, splits for bisecting.
    pub iterations: usize,
    /// Lloyd reached a fixed point, or bisecting reached its leaf target.
    pub converged: bool,
    /// Centroids reseeded because their cluster came up empty.
    pub reinitialized_clusters: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }
}

/// Result of clustering a store.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster centroids, one row per cluster.
    pub centroids: VectorStore,

    /// Cluster assignment for each input vector, indexed by vector id.
    pub assignments: Vec<ClusterId>,

    pub stats: BuildStats,
}

/// Builds a generator from an optional seed; `None` draws from the OS.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Clusters `store` with the strategy named in `config`.
///
/// Uses the rayon pool of the calling context; wrap the call in
/// [`Executor::install`](crate::vector::Executor::install) to size it.
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_clustering(
    store: &VectorStore,
    config: &IndexConfig,
) -> Result<KMeansResult, ClusteringError> {
    let mut rng = make_rng(config.random_seed);
    match config.strategy {
        ClusteringStrategy::Lloyd => lloyd_kmeans(store, config, &mut rng),
        ClusteringStrategy::Bisecting => bisecting_kmeans(store, config, &mut rng),
    }
}

/// Fixed-K Lloyd iteration over the whole store.
pub fn lloyd_kmeans(
    store: &VectorStore,
    config: &IndexConfig,
    rng: &mut StdRng,
) -> Result<KMeansResult, ClusteringError> {
    let start = Instant::now();
    let k = config.num_clusters;

    if store.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }
    if k == 0 || k > store.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    info!(
        vectors = store.len(),
        dimension = store.dimension().get(),
        clusters = k,
        max_iterations = config.max_iterations,
        "Starting Lloyd k-means"
    );

    let members: Vec<VectorId> = all_ids(store);
    let refined = refine(store, &members, k, config.max_iterations.max(1), config, rng)?;

    if !refined.converged {
        warn!(
            iterations = refined.iterations,
            "K-means did not reach a fixed point within the iteration budget"
        );
    }

    let stats = BuildStats {
        strategy: ClusteringStrategy::Lloyd,
        iterations: refined.iterations,
        converged: refined.converged,
        reinitialized_clusters: refined.reinitialized,
        elapsed: start.elapsed(),
    };
    info!(
        iterations = stats.iterations,
        converged = stats.converged,
        reinitialized = stats.reinitialized_clusters,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Lloyd k-means finished"
    );

    Ok(KMeansResult {
        centroids: refined.centroids,
        assignments: refined
            .labels
            .into_iter()
            .map(|(label, _)| ClusterId::new(label))
            .collect(),
        stats,
    })
}

/// Bisecting k-means: grow the cluster count by splitting the largest cluster.
///
/// Produces exactly `min(num_clusters, N)` clusters, all non-empty.
pub fn bisecting_kmeans(
    store: &VectorStore,
    config: &IndexConfig,
    rng: &mut StdRng,
) -> Result<KMeansResult, ClusteringError> {
    let start = Instant::now();

    if store.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }
    if config.num_clusters == 0 {
        return Err(ClusteringError::InvalidClusterCount(0));
    }

    let target = config.num_clusters.min(store.len());
    let initial = config.bisect.initial_splits.clamp(1, target);
    let branching = config.bisect.branching.max(2);
    let rounds = config.bisect.iterations.max(1);

    info!(
        vectors = store.len(),
        target,
        initial,
        branching,
        "Starting bisecting k-means"
    );

    let mut reinitialized = 0;
    let mut leaves = split(store, &all_ids(store), initial, rounds, config, rng, &mut reinitialized)?;
    let mut splits = 0;

    while leaves.len() < target {
        let Some(largest) = largest_leaf(&leaves) else {
            break;
        };
        if leaves[largest].members.len() < 2 {
            break;
        }

        let leaf = leaves.remove(largest);
        let ways = branching
            .min(target - leaves.len())
            .min(leaf.members.len());
        let children = split(store, &leaf.members, ways, rounds, config, rng, &mut reinitialized)?;
        debug!(
            split = splits,
            size = leaf.members.len(),
            children = children.len(),
            "Split largest cluster"
        );
        leaves.extend(children);
        splits += 1;
    }

    let dimension = store.dimension();
    let mut centroids = VectorStore::zeroed(dimension, leaves.len())?;
    let mut assignments = vec![ClusterId::new(0); store.len()];
    for (cluster, leaf) in leaves.iter().enumerate() {
        centroids.row_mut(cluster).copy_from_slice(&leaf.centroid);
        for id in &leaf.members {
            assignments[id.index()] = ClusterId::new(cluster as u32);
        }
    }

    let stats = BuildStats {
        strategy: ClusteringStrategy::Bisecting,
        iterations: splits,
        converged: leaves.len() == target,
        reinitialized_clusters: reinitialized,
        elapsed: start.elapsed(),
    };
    info!(
        clusters = leaves.len(),
        splits,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Bisecting k-means finished"
    );

    Ok(KMeansResult {
        centroids,
        assignments,
        stats,
    })
}

/// Returns the nearest centroid to `vector` and its squared distance.
///
/// Ties go to the lower cluster id.
pub fn assign_to_nearest_centroid(vector: &[f32], centroids: &VectorStore) -> (ClusterId, f32) {
    let mut best_distance = f32::INFINITY;
    let mut best_cluster = 0;

    for (i, centroid) in centroids.iter() {
        let distance = distance_squared(vector, centroid);
        if distance < best_distance {
            best_distance = distance;
            best_cluster = i.get();
        }
    }

    (ClusterId::new(best_cluster), best_distance)
}

/// One cluster produced by bisecting.
#[derive(Debug)]
struct Leaf {
    members: Vec<VectorId>,
    centroid: Vec<f32>,
}

/// Outcome of running assign/update rounds over a subset of the store.
struct Refinement {
    centroids: VectorStore,
    /// `(cluster, squared distance to its centroid)` per subset member.
    labels: Vec<(u32, f32)>,
    iterations: usize,
    converged: bool,
    reinitialized: usize,
}

fn all_ids(store: &VectorStore) -> Vec<VectorId> {
    (0..store.len() as u32).map(VectorId::new).collect()
}

/// Largest leaf by membership; ties resolve to the earliest leaf.
fn largest_leaf(leaves: &[Leaf]) -> Option<usize> {
    leaves
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.members.len().cmp(&b.members.len()).then(ib.cmp(ia)))
        .map(|(i, _)| i)
}

/// Seeds `k` centroids among `members` and runs up to `rounds` Lloyd rounds.
///
/// Each round assigns every member to its nearest centroid, then moves each
/// centroid to the mean of its members. The returned centroids are always the
/// means of the returned labels and no cluster is left empty.
fn refine(
    store: &VectorStore,
    members: &[VectorId],
    k: usize,
    rounds: usize,
    config: &IndexConfig,
    rng: &mut StdRng,
) -> Result<Refinement, ClusteringError> {
    let mut centroids = seed_centroids(store, members, k, config.seeding, rng)?;
    let mut labels: Vec<(u32, f32)> = Vec::new();
    let mut iterations = 0;
    let mut converged = false;
    let mut reinitialized = 0;

    while iterations < rounds {
        let mut next = assign(store, members, &centroids);
        let changed = if labels.is_empty() {
            next.len()
        } else {
            labels
                .iter()
                .zip(next.iter())
                .filter(|(old, new)| old.0 != new.0)
                .count()
        };

        let reseeded = update_centroids(
            store,
            members,
            &mut next,
            &mut centroids,
            config.empty_cluster,
            rng,
        );
        reinitialized += reseeded;
        labels = next;
        iterations += 1;

        debug!(iteration = iterations, changed, reseeded, "K-means iteration");

        // Unchanged labels and no reseed: the update reproduced the same means.
        if changed == 0 && reseeded == 0 {
            converged = true;
            break;
        }
    }

    Ok(Refinement {
        centroids,
        labels,
        iterations,
        converged,
        reinitialized,
    })
}

/// Assign phase: nearest centroid for every member, in parallel.
fn assign(store: &VectorStore, members: &[VectorId], centroids: &VectorStore) -> Vec<(u32, f32)> {
    members
        .par_iter()
        .map(|id| {
            let (cluster, distance) = assign_to_nearest_centroid(store.row(id.index()), centroids);
            (cluster.get(), distance)
        })
        .collect()
}

/// Update phase: each centroid becomes the mean of its members.
///
/// Every empty cluster first takes over one member, chosen per `policy`,
/// from a cluster that has more than one; `labels` is rewritten to match.
/// Returns how many clusters were reseeded this way.
fn update_centroids(
    store: &VectorStore,
    members: &[VectorId],
    labels: &mut [(u32, f32)],
    centroids: &mut VectorStore,
    policy: EmptyClusterPolicy,
    rng: &mut StdRng,
) -> usize {
    let k = centroids.len();
    let dim = store.dimension().get();

    let mut counts = vec![0usize; k];
    for &(label, _) in labels.iter() {
        counts[label as usize] += 1;
    }

    let mut reseeded = 0;
    for cluster in 0..k {
        if counts[cluster] > 0 {
            continue;
        }
        let donor = match policy {
            EmptyClusterPolicy::RandomPoint => {
                let start = rng.random_range(0..members.len());
                (0..members.len())
                    .map(|step| (start + step) % members.len())
                    .find(|&position| counts[labels[position].0 as usize] > 1)
            }
            EmptyClusterPolicy::FarthestPoint => farthest_member(labels, &counts),
        };
        // Only possible with fewer members than clusters.
        let Some(position) = donor else {
            break;
        };

        counts[labels[position].0 as usize] -= 1;
        counts[cluster] = 1;
        labels[position] = (cluster as u32, 0.0);
        reseeded += 1;
        warn!(
            cluster,
            vector = members[position].get(),
            "Empty cluster reseeded"
        );
    }

    // Group member positions by cluster, keeping id order inside each group.
    let mut offsets = vec![0usize; k + 1];
    for c in 0..k {
        offsets[c + 1] = offsets[c] + counts[c];
    }
    let mut cursor = offsets.clone();
    let mut grouped = vec![0usize; labels.len()];
    for (position, &(label, _)) in labels.iter().enumerate() {
        grouped[cursor[label as usize]] = position;
        cursor[label as usize] += 1;
    }

    centroids
        .as_flat_mut()
        .par_chunks_mut(dim)
        .enumerate()
        .for_each(|(c, centroid)| {
            let group = &grouped[offsets[c]..offsets[c + 1]];
            if group.is_empty() {
                return;
            }
            let mut sum = vec![0.0f64; dim];
            for &position in group {
                for (acc, &value) in sum.iter_mut().zip(store.row(members[position].index())) {
                    *acc += f64::from(value);
                }
            }
            let count = group.len() as f64;
            for (out, acc) in centroid.iter_mut().zip(sum) {
                *out = (acc / count) as f32;
            }
        });

    reseeded
}

/// Member farthest from its assigned centroid among clusters that can spare one.
///
/// Ties go to the lower position.
fn farthest_member(labels: &[(u32, f32)], counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (position, &(label, distance)) in labels.iter().enumerate() {
        if counts[label as usize] < 2 {
            continue;
        }
        if best.is_none_or(|(_, d)| distance > d) {
            best = Some((position, distance));
        }
    }
    best.map(|(position, _)| position)
}

/// Chooses `k` initial centroids for `members` according to `policy`.
fn seed_centroids(
    store: &VectorStore,
    members: &[VectorId],
    k: usize,
    policy: SeedingPolicy,
    rng: &mut StdRng,
) -> Result<VectorStore, ClusteringError> {
    if members.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }
    if k == 0 || k > members.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    let mut centroids = VectorStore::zeroed(store.dimension(), k)?;

    match policy {
        SeedingPolicy::SamplePoints => {
            let picks = rand::seq::index::sample(rng, members.len(), k);
            for (c, position) in picks.iter().enumerate() {
                centroids
                    .row_mut(c)
                    .copy_from_slice(store.row(members[position].index()));
            }
        }
        SeedingPolicy::KmeansPlusPlus => {
            seed_kmeans_plus_plus(store, members, &mut centroids, rng);
        }
        SeedingPolicy::UniformRange { min, max } => {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(ClusteringError::InvalidSeedRange { min, max });
            }
            for value in centroids.as_flat_mut() {
                *value = rng.random_range(min..max);
            }
        }
    }

    Ok(centroids)
}

/// K-means++ seeding: spread seeds out by sampling proportional to the
/// squared distance from the nearest existing seed.
fn seed_kmeans_plus_plus(
    store: &VectorStore,
    members: &[VectorId],
    centroids: &mut VectorStore,
    rng: &mut StdRng,
) {
    let k = centroids.len();

    let first = rng.random_range(0..members.len());
    centroids
        .row_mut(0)
        .copy_from_slice(store.row(members[first].index()));

    let mut nearest: Vec<f32> = members
        .par_iter()
        .map(|id| distance_squared(store.row(id.index()), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = nearest.iter().map(|&d| f64::from(d)).sum();

        let position = if total < EPSILON {
            // Every point coincides with a seed; any choice is as good.
            rng.random_range(0..members.len())
        } else {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = members.len() - 1;
            for (position, &d) in nearest.iter().enumerate() {
                cumulative += f64::from(d);
                if cumulative >= target && d > 0.0 {
                    chosen = position;
                    break;
                }
            }
            chosen
        };

        centroids
            .row_mut(c)
            .copy_from_slice(store.row(members[position].index()));

        let seed = centroids.row(c);
        nearest
            .par_iter_mut()
            .zip(members.par_iter())
            .for_each(|(best, id)| {
                let d = distance_squared(store.row(id.index()), seed);
                if d < *best {
                    *best = d;
                }
            });
    }
}

/// Splits `members` into up to `ways` non-empty leaves.
///
/// When the members cannot be separated (all identical), they are divided
/// into contiguous runs instead so the split always makes progress.
fn split(
    store: &VectorStore,
    members: &[VectorId],
    ways: usize,
    rounds: usize,
    config: &IndexConfig,
    rng: &mut StdRng,
    reinitialized: &mut usize,
) -> Result<Vec<Leaf>, ClusteringError> {
    let refined = refine(store, members, ways, rounds, config, rng)?;
    *reinitialized += refined.reinitialized;

    let mut groups: Vec<Vec<VectorId>> = vec![Vec::new(); ways];
    for (id, (label, _)) in members.iter().zip(refined.labels.iter()) {
        groups[*label as usize].push(*id);
    }
    groups.retain(|group| !group.is_empty());

    if ways >= 2 && groups.len() < 2 {
        debug!(size = members.len(), "Inseparable cluster, splitting by position");
        let run = members.len().div_ceil(ways);
        groups = members.chunks(run).map(<[VectorId]>::to_vec).collect();
    }

    Ok(groups
        .into_iter()
        .map(|members| Leaf {
            centroid: mean_of(store, &members),
            members,
        })
        .collect())
}

fn mean_of(store: &VectorStore, members: &[VectorId]) -> Vec<f32> {
    let dim = store.dimension().get();
    let mut sum = vec![0.0f64; dim];
    for id in members {
        for (acc, &value) in sum.iter_mut().zip(store.row(id.index())) {
            *acc += f64::from(value);
        }
    }
    let count = members.len().max(1) as f64;
    sum.into_iter().map(|acc| (acc / count) as f32).collect()
}
