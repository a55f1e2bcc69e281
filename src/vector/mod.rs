//! Vector search over fixed-dimension dense float vectors.
//!
//! This module provides aligned vector storage, a SIMD distance kernel,
//! k-means index construction and exact/approximate k-nearest-neighbor
//! search under squared Euclidean distance.
//!
//! # Architecture
//! The index is an IVF (Inverted File with flat vectors): clustering
//! partitions the base set, each cluster keeps a list of member ids, and a
//! query scans only the members of its nearest clusters. Brute-force search
//! over the whole store provides ground truth for the approximation.
//!
//! All state is immutable once built, so queries share the store and the
//! index by reference across worker threads without locking.

mod clustering;
mod distance;
mod engine;
mod execution;
mod ivf;
pub mod search;
mod store;
mod topk;
mod types;

// Re-export core types for public API
pub use clustering::{
    BuildStats, ClusteringError, KMeansResult, assign_to_nearest_centroid, bisecting_kmeans,
    kmeans_clustering, lloyd_kmeans, make_rng,
};
pub use distance::{distance_squared, distance_squared_lanes, distance_squared_scalar};
pub use engine::VectorSearchEngine;
pub use execution::Executor;
pub use ivf::IvfIndex;
pub use search::{brute_force, brute_force_batch, ivf_search, ivf_search_batch, nearest_clusters};
pub use store::{AlignedBuffer, VectorStore};
pub use topk::TopK;
pub use types::{
    ClusterId, Neighbor, SIMD_ALIGNMENT, SIMD_LANES, VectorDimension, VectorError, VectorId,
};
