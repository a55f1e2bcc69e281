//! End-to-end properties of index construction and search.

use std::collections::HashSet;

use ivf_search::vector::{brute_force, ivf_search, kmeans_clustering};
use ivf_search::{
    ClusterId, ClusteringStrategy, ExecutionConfig, IndexConfig, IvfIndex, SeedingPolicy,
    VectorDimension, VectorId, VectorSearchEngine, VectorStore,
};

use crate::common::{blob_store, random_store};

fn threads(n: usize) -> ExecutionConfig {
    ExecutionConfig {
        parallel_threads: n,
    }
}

fn config(strategy: ClusteringStrategy, clusters: usize, probes: usize, k: usize) -> IndexConfig {
    IndexConfig {
        strategy,
        num_clusters: clusters,
        candidate_clusters: probes,
        k,
        random_seed: Some(2024),
        max_iterations: 50,
        ..IndexConfig::default()
    }
}

fn built(store: VectorStore, config: IndexConfig, n_threads: usize) -> VectorSearchEngine {
    let mut engine = VectorSearchEngine::new(store, config, &threads(n_threads)).unwrap();
    engine.build().unwrap();
    engine
}

fn ids(results: &[ivf_search::Neighbor]) -> Vec<u32> {
    results.iter().map(|n| n.id.get()).collect()
}

#[test]
fn test_partition_covers_every_vector_once() {
    for strategy in [ClusteringStrategy::Lloyd, ClusteringStrategy::Bisecting] {
        let engine = built(random_store(500, 16, 1), config(strategy, 12, 3, 10), 4);
        let index = engine.index().unwrap();

        index.check_partition(500).unwrap();
        assert_eq!(index.num_clusters(), 12);
        assert_eq!(index.cluster_sizes().iter().sum::<usize>(), 500);

        let mut seen = HashSet::new();
        for c in 0..index.num_clusters() {
            let cluster = ClusterId::new(c as u32);
            for &id in index.members(cluster) {
                assert!(seen.insert(id), "{id} listed twice");
                assert_eq!(engine.get_cluster_for_vector(id), Some(cluster));
            }
        }
        assert_eq!(seen.len(), 500);
    }
}

#[test]
fn test_brute_force_top_k_is_exact() {
    let store = random_store(300, 8, 2);
    let query = random_store(1, 8, 3);
    let query = query.row(0);

    for k in [1, 7, 50, 300] {
        let results = brute_force(&store, query, k).unwrap();
        assert_eq!(results.len(), k);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

        let unique: HashSet<_> = results.iter().map(|n| n.id).collect();
        assert_eq!(unique.len(), k);
        assert!(results.iter().all(|n| n.id.index() < store.len()));

        // Compare with a full sort of every distance.
        let mut all: Vec<(f32, u32)> = store
            .iter()
            .map(|(id, v)| (ivf_search::vector::distance_squared(query, v), id.get()))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let expected: Vec<u32> = all.iter().take(k).map(|&(_, id)| id).collect();
        assert_eq!(ids(&results), expected);
    }
}

#[test]
fn test_separated_groups_match_brute_force() {
    let data = [
        0.0, 0.1, 0.2, 0.0, //
        0.3, 0.0, 0.1, 0.2, //
        0.1, 0.4, 0.0, 0.1, //
        0.2, 0.2, 0.3, 0.0, //
        100.0, 100.1, 100.2, 100.0, //
        100.3, 100.0, 100.1, 100.2, //
        100.1, 100.4, 100.0, 100.1, //
        100.2, 100.2, 100.3, 100.0,
    ];
    let store = VectorStore::from_flat(VectorDimension::new(4).unwrap(), &data).unwrap();
    let engine = built(store, config(ClusteringStrategy::Lloyd, 2, 1, 4), 2);

    let query = [0.05, 0.05, 0.05, 0.05];
    let approx = engine.search_ivf(&query, 4).unwrap();
    let exact = engine.search_brute(&query, 4).unwrap();

    assert_eq!(approx, exact);
    let mut found = ids(&approx);
    found.sort_unstable();
    assert_eq!(found, vec![0, 1, 2, 3]);
}

#[test]
fn test_small_probe_returns_partial_results() {
    // Four tight blobs of 5; probing one blob cannot yield 8 neighbors.
    let store = blob_store(4, 5, 3, 50.0, 0.5, 4);
    let mut cfg = config(ClusteringStrategy::Lloyd, 4, 1, 8);
    cfg.seeding = SeedingPolicy::KmeansPlusPlus;
    let engine = built(store, cfg, 2);

    let results = engine.search_ivf(&[0.2, 0.2, 0.2], 8).unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|n| n.id.index() < 5));

    let everything = engine.search_brute(&[0.2, 0.2, 0.2], 20).unwrap();
    assert_eq!(everything.len(), 20);
}

#[test]
fn test_probing_every_cluster_is_exact() {
    let store = random_store(400, 12, 5);
    let queries = random_store(20, 12, 6);
    for strategy in [ClusteringStrategy::Lloyd, ClusteringStrategy::Bisecting] {
        let engine = built(store.clone(), config(strategy, 10, 10, 15), 4);
        let approx = engine.search_ivf_batch(&queries, 15).unwrap();
        let exact = engine.search_brute_batch(&queries, 15).unwrap();
        assert_eq!(approx, exact);
    }
}

#[test]
fn test_build_is_deterministic_across_thread_counts() {
    let store = random_store(600, 10, 7);
    for strategy in [ClusteringStrategy::Lloyd, ClusteringStrategy::Bisecting] {
        let one = built(store.clone(), config(strategy, 16, 4, 10), 1);
        let four = built(store.clone(), config(strategy, 16, 4, 10), 4);

        let (a, b) = (one.index().unwrap(), four.index().unwrap());
        assert_eq!(a.cluster_sizes(), b.cluster_sizes());
        assert_eq!(a.centroids().as_flat(), b.centroids().as_flat());

        let queries = random_store(10, 10, 8);
        assert_eq!(
            one.search_ivf_batch(&queries, 10).unwrap(),
            four.search_ivf_batch(&queries, 10).unwrap()
        );
    }
}

#[test]
fn test_bisecting_reaches_leaf_target() {
    let store = random_store(100, 6, 9);
    for target in [1, 2, 5, 10, 33, 100] {
        let cfg = config(ClusteringStrategy::Bisecting, target, 1, 1);
        let result = kmeans_clustering(&store, &cfg).unwrap();
        let index = IvfIndex::from_clustering(result).unwrap();

        assert_eq!(index.num_clusters(), target);
        assert!(index.cluster_sizes().iter().all(|&size| size > 0));
        index.check_partition(100).unwrap();
    }
}

#[test]
fn test_ivf_results_are_members_of_probed_clusters() {
    let store = blob_store(6, 30, 4, 10.0, 2.0, 10);
    let mut cfg = config(ClusteringStrategy::Lloyd, 6, 2, 12);
    cfg.seeding = SeedingPolicy::KmeansPlusPlus;
    let engine = built(store, cfg, 3);
    let index = engine.index().unwrap();

    let query = [21.0, 21.0, 21.0, 21.0];
    let probed = ivf_search::vector::nearest_clusters(index, &query, 2).unwrap();
    let allowed: HashSet<VectorId> = probed
        .iter()
        .flat_map(|&c| index.members(c).iter().copied())
        .collect();

    let results = ivf_search(engine.store(), index, &query, 12, 2).unwrap();
    assert_eq!(results.len(), 12);
    assert!(results.iter().all(|n| allowed.contains(&n.id)));
}
