//! Summary of one benchmark run.

use std::time::Duration;

use serde::Serialize;

use crate::vector::BuildStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Brute,
    Ivf,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Brute => write!(f, "brute force"),
            SearchMode::Ivf => write!(f, "IVF"),
        }
    }
}

/// Timings and quality of a search run, printable as a table or JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub mode: SearchMode,
    pub threads: usize,
    pub base_vectors: usize,
    pub queries: usize,
    pub dimension: usize,
    pub k: usize,
    /// Clusters probed per query; IVF only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_clusters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_sizes: Option<Vec<usize>>,
    pub search_ms: f64,
    pub throughput_qps: f64,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
}

impl BenchmarkReport {
    /// Starts a report for `queries` searched in `search_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: SearchMode,
        threads: usize,
        base_vectors: usize,
        queries: usize,
        dimension: usize,
        k: usize,
        search_time: Duration,
    ) -> Self {
        let search_ms = search_time.as_secs_f64() * 1000.0;
        let (throughput_qps, latency_ms) = if queries == 0 || search_ms == 0.0 {
            (0.0, 0.0)
        } else {
            (
                queries as f64 * 1000.0 / search_ms,
                search_ms / queries as f64,
            )
        };

        Self {
            mode,
            threads,
            base_vectors,
            queries,
            dimension,
            k,
            candidate_clusters: None,
            build: None,
            cluster_sizes: None,
            search_ms,
            throughput_qps,
            latency_ms,
            recall: None,
        }
    }

    pub fn with_index(
        mut self,
        candidate_clusters: usize,
        build: BuildStats,
        cluster_sizes: Vec<usize>,
    ) -> Self {
        self.candidate_clusters = Some(candidate_clusters);
        self.build = Some(build);
        self.cluster_sizes = Some(cluster_sizes);
        self
    }

    pub fn with_recall(mut self, recall: f64) -> Self {
        self.recall = Some(recall);
        self
    }
}
