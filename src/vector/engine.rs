//! Vector search engine that orchestrates index building and searching.
//!
//! This module provides the main entry point for search functionality,
//! coordinating the store, clustering, the inverted file, and the worker
//! pool. Configuration is validated against the loaded base set before any
//! work starts.

use std::time::Instant;

use tracing::info;

use crate::config::{ExecutionConfig, IndexConfig};
use crate::error::{IndexError, IndexResult};
use crate::vector::clustering::{BuildStats, kmeans_clustering};
use crate::vector::execution::Executor;
use crate::vector::ivf::IvfIndex;
use crate::vector::search;
use crate::vector::store::VectorStore;
use crate::vector::types::{ClusterId, Neighbor, VectorDimension, VectorError, VectorId};

/// Main search engine over one immutable base set.
///
/// This engine manages:
/// - The aligned base vector store
/// - K-means clustering for IVF indexing
/// - Exact and approximate nearest neighbor search on a sized pool
#[derive(Debug)]
pub struct VectorSearchEngine {
    /// Base vectors, read-only once loaded
    store: VectorStore,

    /// Validated build and search parameters
    config: IndexConfig,

    /// Pool that runs clustering and query batches
    executor: Executor,

    /// Inverted file, present after `build`
    index: Option<IvfIndex>,
}

impl VectorSearchEngine {
    /// Creates an engine over `store`.
    ///
    /// # Errors
    /// Rejects a configuration that does not fit the base set, and reports
    /// worker pool construction failures.
    pub fn new(
        store: VectorStore,
        config: IndexConfig,
        execution: &ExecutionConfig,
    ) -> IndexResult<Self> {
        Self::with_executor(store, config, Executor::from_config(execution)?)
    }

    /// Creates an engine that runs on an existing pool.
    ///
    /// The cluster count is checked against the base set by `build`, so an
    /// engine used only for brute-force search accepts any cluster setting.
    pub fn with_executor(
        store: VectorStore,
        config: IndexConfig,
        executor: Executor,
    ) -> IndexResult<Self> {
        config.validate_parameters()?;
        if config.k > store.len() {
            return Err(IndexError::InvalidK {
                k: config.k,
                n: store.len(),
            });
        }
        Ok(Self {
            store,
            config,
            executor,
            index: None,
        })
    }

    /// Clusters the base set and materializes the inverted file.
    ///
    /// Rebuilding replaces the previous index.
    pub fn build(&mut self) -> IndexResult<&BuildStats> {
        self.config.validate(self.store.len())?;
        info!(
            strategy = %self.config.strategy,
            clusters = self.config.num_clusters,
            vectors = self.store.len(),
            threads = self.executor.threads(),
            "building IVF index"
        );
        let start = Instant::now();

        let store = &self.store;
        let config = &self.config;
        let result = self
            .executor
            .install(|| kmeans_clustering(store, config))?;
        let index = IvfIndex::from_clustering(result)?;

        info!(
            clusters = index.num_clusters(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "IVF index ready"
        );
        Ok(self.index.insert(index).stats())
    }

    /// Exact k nearest neighbors of `query`.
    pub fn search_brute(&self, query: &[f32], k: usize) -> IndexResult<Vec<Neighbor>> {
        self.check_k(k)?;
        self.check_dimension(query.len())?;
        Ok(search::brute_force(&self.store, query, k)?)
    }

    /// Approximate k nearest neighbors of `query`, probing the configured
    /// number of candidate clusters.
    ///
    /// # Algorithm
    /// 1. Select the `candidate_clusters` nearest centroids
    /// 2. Scan every member of those clusters
    /// 3. Return the top-k, possibly fewer when the clusters are small
    pub fn search_ivf(&self, query: &[f32], k: usize) -> IndexResult<Vec<Neighbor>> {
        self.check_k(k)?;
        self.check_dimension(query.len())?;
        let index = self.built_index()?;
        Ok(search::ivf_search(
            &self.store,
            index,
            query,
            k,
            self.config.candidate_clusters,
        )?)
    }

    /// Brute-force search for every query row, results in query order.
    pub fn search_brute_batch(
        &self,
        queries: &VectorStore,
        k: usize,
    ) -> IndexResult<Vec<Vec<Neighbor>>> {
        self.check_k(k)?;
        self.check_dimension(queries.dimension().get())?;
        let store = &self.store;
        Ok(self
            .executor
            .install(|| search::brute_force_batch(store, queries, k))?)
    }

    /// IVF search for every query row, results in query order.
    pub fn search_ivf_batch(
        &self,
        queries: &VectorStore,
        k: usize,
    ) -> IndexResult<Vec<Vec<Neighbor>>> {
        self.check_k(k)?;
        self.check_dimension(queries.dimension().get())?;
        let index = self.built_index()?;
        let store = &self.store;
        let probes = self.config.candidate_clusters;
        Ok(self
            .executor
            .install(|| search::ivf_search_batch(store, index, queries, k, probes))?)
    }

    fn check_k(&self, k: usize) -> IndexResult<()> {
        if k == 0 || k > self.store.len() {
            return Err(IndexError::InvalidK {
                k,
                n: self.store.len(),
            });
        }
        Ok(())
    }

    fn check_dimension(&self, actual: usize) -> IndexResult<()> {
        let expected = self.store.dimension().get();
        if actual != expected {
            return Err(IndexError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    fn built_index(&self) -> IndexResult<&IvfIndex> {
        self.index.as_ref().ok_or(IndexError::IndexNotBuilt)
    }

    /// Gets the cluster assignment for a specific vector.
    ///
    /// Returns None before `build` or for unknown ids.
    #[must_use = "The cluster assignment should be used for cluster-aware operations"]
    pub fn get_cluster_for_vector(&self, id: VectorId) -> Option<ClusterId> {
        self.index.as_ref()?.cluster_of(id)
    }

    /// Gets the cluster centroids for inspection.
    #[must_use]
    pub fn as_centroids(&self) -> Option<&VectorStore> {
        self.index.as_ref().map(IvfIndex::centroids)
    }

    #[must_use]
    pub fn index(&self) -> Option<&IvfIndex> {
        self.index.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Gets the number of base vectors.
    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.store.dimension()
    }

    /// Worker threads in the engine's pool.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.executor.threads()
    }

    /// Looks up a base vector.
    pub fn vector(&self, id: VectorId) -> Result<&[f32], VectorError> {
        self.store.try_get(id)
    }
}
