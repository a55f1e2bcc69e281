//! IVF nearest-neighbor search over dense float vectors.

pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod recall;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{
    BisectConfig, ClusteringStrategy, EmptyClusterPolicy, ExecutionConfig, IndexConfig,
    SeedingPolicy, Settings,
};
pub use error::{IndexError, IndexResult};
pub use io::{GroundTruth, VecsError, read_fvecs, read_ivecs};
pub use recall::recall_at_k;
pub use vector::{
    BuildStats, ClusterId, Executor, IvfIndex, Neighbor, VectorDimension, VectorError, VectorId,
    VectorSearchEngine, VectorStore,
};
