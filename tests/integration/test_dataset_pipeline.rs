//! Dataset files through search and recall, the way the CLI runs them.

use ivf_search::io::{write_fvecs, write_ivecs};
use ivf_search::{
    ClusteringStrategy, ExecutionConfig, GroundTruth, IndexConfig, IndexError, SeedingPolicy,
    VecsError, VectorSearchEngine, read_fvecs, read_ivecs, recall_at_k,
};
use tempfile::TempDir;

use crate::common::{blob_store, random_store};

fn execution() -> ExecutionConfig {
    ExecutionConfig {
        parallel_threads: 2,
    }
}

#[test]
fn test_brute_force_recall_against_own_ground_truth() {
    let temp_dir = TempDir::new().unwrap();
    let base_path = temp_dir.path().join("base.fvecs");
    let query_path = temp_dir.path().join("query.fvecs");
    let gt_path = temp_dir.path().join("groundtruth.ivecs");

    write_fvecs(&base_path, &random_store(250, 8, 11)).unwrap();
    write_fvecs(&query_path, &random_store(15, 8, 12)).unwrap();

    let base = read_fvecs(&base_path).unwrap();
    let queries = read_fvecs(&query_path).unwrap();
    let config = IndexConfig {
        k: 20,
        ..IndexConfig::default()
    };
    let engine = VectorSearchEngine::new(base, config, &execution()).unwrap();

    let exact = engine.search_brute_batch(&queries, 20).unwrap();
    let truth = GroundTruth::from_rows(
        exact
            .iter()
            .map(|row| row.iter().map(|n| n.id).collect::<Vec<_>>()),
    );
    write_ivecs(&gt_path, &truth).unwrap();
    let truth = read_ivecs(&gt_path).unwrap();

    let recall = recall_at_k(engine.store(), &queries, &exact, &truth, 20).unwrap();
    assert_eq!(recall, 1.0);
}

#[test]
fn test_ivf_recall_improves_with_probes() {
    let base = blob_store(8, 40, 6, 5.0, 3.0, 21);
    let queries = blob_store(8, 2, 6, 5.0, 3.0, 22);

    let exact_engine =
        VectorSearchEngine::new(base.clone(), IndexConfig::default(), &execution()).unwrap();
    let exact = exact_engine.search_brute_batch(&queries, 10).unwrap();
    let truth = GroundTruth::from_rows(
        exact
            .iter()
            .map(|row| row.iter().map(|n| n.id).collect::<Vec<_>>()),
    );

    let recall_with = |probes: usize| {
        let config = IndexConfig {
            strategy: ClusteringStrategy::Lloyd,
            num_clusters: 8,
            candidate_clusters: probes,
            k: 10,
            random_seed: Some(5),
            seeding: SeedingPolicy::KmeansPlusPlus,
            ..IndexConfig::default()
        };
        let mut engine = VectorSearchEngine::new(base.clone(), config, &execution()).unwrap();
        engine.build().unwrap();
        let results = engine.search_ivf_batch(&queries, 10).unwrap();
        recall_at_k(engine.store(), &queries, &results, &truth, 10).unwrap()
    };

    let narrow = recall_with(1);
    let wide = recall_with(8);
    assert!(narrow <= wide);
    assert_eq!(wide, 1.0);
    assert!(narrow > 0.0);
}

#[test]
fn test_query_dimension_mismatch_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let base_path = temp_dir.path().join("base.fvecs");
    let query_path = temp_dir.path().join("query.fvecs");
    write_fvecs(&base_path, &random_store(50, 8, 31)).unwrap();
    write_fvecs(&query_path, &random_store(5, 4, 32)).unwrap();

    let config = IndexConfig {
        k: 5,
        ..IndexConfig::default()
    };
    let engine =
        VectorSearchEngine::new(read_fvecs(&base_path).unwrap(), config, &execution()).unwrap();
    let err = engine
        .search_brute_batch(&read_fvecs(&query_path).unwrap(), 5)
        .unwrap_err();

    assert!(matches!(
        err,
        IndexError::DimensionMismatch {
            expected: 8,
            actual: 4
        }
    ));
    assert!(err.is_config_error());
}

#[test]
fn test_corrupt_dataset_surfaces_as_index_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.fvecs");
    let mut bytes = 3i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&1.0f32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let err = IndexError::from(read_fvecs(&path).unwrap_err());
    assert!(matches!(err, IndexError::Vecs(VecsError::Truncated { .. })));
    assert_eq!(err.status_code(), "VECS_FORMAT_ERROR");
}
