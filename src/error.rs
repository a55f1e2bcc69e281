//! Error types for index building and search.
//!
//! This module provides structured error types using thiserror for
//! actionable error messages. Configuration problems are rejected before any
//! work starts; they are never clamped into range.

use thiserror::Error;

use crate::io::VecsError;
use crate::vector::{ClusteringError, VectorError};

/// Main error type for building and querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Configuration errors
    #[error("Invalid k: {k}. k must be between 1 and the number of base vectors ({n})")]
    InvalidK { k: usize, n: usize },

    #[error(
        "Invalid cluster count: {num_clusters}. Use between 1 and the number of base vectors ({n})"
    )]
    InvalidClusterCount { num_clusters: usize, n: usize },

    #[error(
        "Invalid candidate cluster count: {candidate_clusters}. Use between 1 and num_clusters ({num_clusters})"
    )]
    InvalidCandidateClusters {
        candidate_clusters: usize,
        num_clusters: usize,
    },

    #[error("Query dimension {actual} does not match base dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("Expected {expected} {what}, found {actual}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Index state errors
    #[error("No index has been built. Call build() before IVF search")]
    IndexNotBuilt,

    #[error("Index was built for {built} vectors but the store holds {actual}")]
    StoreMismatch { built: usize, actual: usize },

    /// Execution errors
    #[error("Failed to start worker pool with {threads} threads: {reason}")]
    ThreadPool { threads: usize, reason: String },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Vecs(#[from] VecsError),
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::InvalidK { .. } => "INVALID_K",
            Self::InvalidClusterCount { .. } => "INVALID_CLUSTER_COUNT",
            Self::InvalidCandidateClusters { .. } => "INVALID_CANDIDATE_CLUSTERS",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::CountMismatch { .. } => "COUNT_MISMATCH",
            Self::IndexNotBuilt => "INDEX_NOT_BUILT",
            Self::StoreMismatch { .. } => "STORE_MISMATCH",
            Self::ThreadPool { .. } => "THREAD_POOL_ERROR",
            Self::Vector(VectorError::Allocation { .. }) => "ALLOCATION_FAILED",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Clustering(_) => "CLUSTERING_ERROR",
            Self::Vecs(_) => "VECS_FORMAT_ERROR",
        }
        .to_string()
    }

    /// True for errors caused by the caller's parameters rather than by
    /// resources or data.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidK { .. }
                | Self::InvalidClusterCount { .. }
                | Self::InvalidCandidateClusters { .. }
                | Self::DimensionMismatch { .. }
                | Self::ConfigError { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidK { .. } => vec![
                "Lower k or load a larger base set",
                "Set [index] k in settings.toml or pass -k",
            ],
            Self::InvalidClusterCount { .. } => vec![
                "Use fewer clusters than base vectors",
                "A common starting point is sqrt(N) clusters",
            ],
            Self::InvalidCandidateClusters { .. } => vec![
                "Probe 10-25% of the clusters for a reasonable recall/speed trade-off",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Check that the query file belongs to the same dataset as the base file",
            ],
            Self::CountMismatch { .. } => vec![
                "Use the ground truth file generated for this query set",
            ],
            Self::IndexNotBuilt => vec!["Build the index before running IVF search"],
            Self::Vector(VectorError::Allocation { .. }) => vec![
                "Reduce the dataset or cluster count",
                "Free memory held by other processes",
            ],
            Self::ThreadPool { .. } => vec!["Lower [execution] parallel_threads"],
            _ => vec![],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(IndexError::InvalidK { k: 0, n: 5 }.status_code(), "INVALID_K");
        assert_eq!(IndexError::IndexNotBuilt.status_code(), "INDEX_NOT_BUILT");
        assert_eq!(
            IndexError::Vector(VectorError::Allocation { bytes: 64 }).status_code(),
            "ALLOCATION_FAILED"
        );
    }

    #[test]
    fn test_config_errors_are_classified() {
        assert!(IndexError::InvalidK { k: 9, n: 5 }.is_config_error());
        assert!(
            IndexError::InvalidCandidateClusters {
                candidate_clusters: 4,
                num_clusters: 2
            }
            .is_config_error()
        );
        assert!(!IndexError::IndexNotBuilt.is_config_error());
    }

    #[test]
    fn test_messages_name_the_offending_value() {
        let err = IndexError::InvalidK { k: 12, n: 10 };
        let message = err.to_string();
        assert!(message.contains("12"));
        assert!(message.contains("10"));
        assert!(!err.recovery_suggestions().is_empty());
    }
}
