//! Configuration for index building, search and execution.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `IVF_` and use double underscores
//! to separate nested levels:
//! - `IVF_INDEX__NUM_CLUSTERS=64` sets `index.num_clusters`
//! - `IVF_INDEX__CANDIDATE_CLUSTERS=8` sets `index.candidate_clusters`
//! - `IVF_EXECUTION__PARALLEL_THREADS=4` sets `execution.parallel_threads`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{IndexError, IndexResult};

/// Directory holding the settings file, searched for from the current directory upward.
const CONFIG_DIR: &str = ".ivf";

/// Clustering strategy used to build the inverted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringStrategy {
    /// Fixed-K Lloyd iteration.
    Lloyd,
    /// Repeatedly split the largest cluster until `num_clusters` leaves exist.
    Bisecting,
}

impl std::fmt::Display for ClusteringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lloyd => write!(f, "lloyd"),
            Self::Bisecting => write!(f, "bisecting"),
        }
    }
}

/// How initial centroids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SeedingPolicy {
    /// Distinct data points drawn uniformly without replacement.
    SamplePoints,
    /// K-means++: each new seed drawn with probability proportional to its
    /// squared distance from the nearest seed chosen so far.
    KmeansPlusPlus,
    /// Every coordinate drawn independently from `[min, max)`, ignoring the data.
    UniformRange { min: f32, max: f32 },
}

/// What happens to a centroid whose cluster receives no points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyClusterPolicy {
    /// Hand the cluster a uniformly chosen point taken from a cluster of two or more.
    RandomPoint,
    /// Hand the cluster the point farthest from its centroid, among clusters
    /// of two or more.
    FarthestPoint,
}

/// Parameters specific to bisecting k-means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BisectConfig {
    /// Clusters produced by the initial pass over the whole dataset.
    #[serde(default = "default_initial_splits")]
    pub initial_splits: usize,

    /// Sub-clusters produced by each split of the largest cluster.
    #[serde(default = "default_branching")]
    pub branching: usize,

    /// Assign/update rounds per split; 1 means a single assign pass.
    #[serde(default = "default_bisect_iterations")]
    pub iterations: usize,
}

/// The single value object describing how to build and query an index.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Number of clusters (Lloyd) or target leaf count (bisecting)
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// Iteration budget for Lloyd's algorithm
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Clusters probed per query during IVF search
    #[serde(default = "default_candidate_clusters")]
    pub candidate_clusters: usize,

    /// Neighbors returned per query
    #[serde(default = "default_k")]
    pub k: usize,

    /// Seed for centroid initialization; unset draws from the OS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,

    #[serde(default = "default_strategy")]
    pub strategy: ClusteringStrategy,

    #[serde(default = "default_seeding")]
    pub seeding: SeedingPolicy,

    #[serde(default = "default_empty_cluster")]
    pub empty_cluster: EmptyClusterPolicy,

    #[serde(default)]
    pub bisect: BisectConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Worker threads for clustering and query batches (0 = one per CPU)
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode (verbose logging)
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Index build and search parameters
    #[serde(default)]
    pub index: IndexConfig,

    /// Thread pool settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_num_clusters() -> usize {
    20
}
fn default_max_iterations() -> usize {
    300
}
fn default_candidate_clusters() -> usize {
    2
}
fn default_k() -> usize {
    100
}
fn default_strategy() -> ClusteringStrategy {
    ClusteringStrategy::Lloyd
}
fn default_seeding() -> SeedingPolicy {
    SeedingPolicy::SamplePoints
}
fn default_empty_cluster() -> EmptyClusterPolicy {
    EmptyClusterPolicy::RandomPoint
}
fn default_initial_splits() -> usize {
    2
}
fn default_branching() -> usize {
    2
}
fn default_bisect_iterations() -> usize {
    1
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}

impl Default for BisectConfig {
    fn default() -> Self {
        Self {
            initial_splits: default_initial_splits(),
            branching: default_branching(),
            iterations: default_bisect_iterations(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            max_iterations: default_max_iterations(),
            candidate_clusters: default_candidate_clusters(),
            k: default_k(),
            random_seed: None,
            strategy: default_strategy(),
            seeding: default_seeding(),
            empty_cluster: default_empty_cluster(),
            bisect: BisectConfig::default(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            index: IndexConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Checks parameters that do not depend on the data.
    pub fn validate_parameters(&self) -> IndexResult<()> {
        if self.k == 0 {
            return Err(IndexError::ConfigError {
                reason: "k must be at least 1".to_string(),
            });
        }
        if self.num_clusters == 0 {
            return Err(IndexError::ConfigError {
                reason: "num_clusters must be at least 1".to_string(),
            });
        }
        if self.candidate_clusters == 0 || self.candidate_clusters > self.num_clusters {
            return Err(IndexError::InvalidCandidateClusters {
                candidate_clusters: self.candidate_clusters,
                num_clusters: self.num_clusters,
            });
        }
        if self.max_iterations == 0 {
            return Err(IndexError::ConfigError {
                reason: "max_iterations must be at least 1".to_string(),
            });
        }
        if let SeedingPolicy::UniformRange { min, max } = self.seeding {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(IndexError::ConfigError {
                    reason: format!("uniform seeding range [{min}, {max}) is empty or not finite"),
                });
            }
        }
        if self.bisect.initial_splits == 0 {
            return Err(IndexError::ConfigError {
                reason: "bisect.initial_splits must be at least 1".to_string(),
            });
        }
        if self.bisect.branching < 2 {
            return Err(IndexError::ConfigError {
                reason: "bisect.branching must be at least 2".to_string(),
            });
        }
        if self.bisect.iterations == 0 {
            return Err(IndexError::ConfigError {
                reason: "bisect.iterations must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Checks the configuration against a base set of `n` vectors.
    ///
    /// Bisecting builds accept a leaf target above `n`; they stop at `n`
    /// singleton clusters.
    pub fn validate(&self, n: usize) -> IndexResult<()> {
        self.validate_parameters()?;
        if self.k > n {
            return Err(IndexError::InvalidK { k: self.k, n });
        }
        if self.strategy == ClusteringStrategy::Lloyd && self.num_clusters > n {
            return Err(IndexError::InvalidClusterCount {
                num_clusters: self.num_clusters,
                n,
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config().unwrap_or_else(Self::default_path);
        Self::load_from(config_path)
    }

    /// `.ivf/settings.toml` relative to the current directory
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_DIR).join("settings.toml")
    }

    /// Load configuration from a specific file, still honoring `IVF_` overrides
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed("IVF_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(
        path: impl AsRef<std::path::Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = path.as_ref().to_path_buf();

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# ivf-search configuration

# Version of the configuration schema
version = 1

# Verbose logging
debug = false

[index]
# "lloyd" (fixed cluster count) or "bisecting" (split largest until num_clusters)
strategy = "lloyd"

# Clusters to build (target leaf count for bisecting)
num_clusters = 20

# Lloyd iteration budget
max_iterations = 300

# Clusters probed per query, typically 10-25% of num_clusters
candidate_clusters = 2

# Neighbors returned per query
k = 100

# Fix the seed for reproducible builds
# random_seed = 42

# Centroid seeding: sample_points, kmeans_plus_plus, or uniform_range
# seeding = {{ kind = "uniform_range", min = 0.0, max = 500.0 }}
seeding = {{ kind = "sample_points" }}

# Reseeding of empty clusters: random_point or farthest_point
empty_cluster = "random_point"

[index.bisect]
initial_splits = 2
branching = 2
iterations = 1

[execution]
# Worker threads (defaults to CPU count)
# parallel_threads = {}
"#,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}
