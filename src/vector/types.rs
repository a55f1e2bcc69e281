//! Type-safe wrappers and core types for vector search.
//!
//! Identifiers are 0-based and stable for the lifetime of the store they
//! index into. Newtypes keep vector ids and cluster ids from being mixed up
//! at call sites that juggle both.

use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// Number of `f32` lanes processed per step by the vectorized kernel.
pub const SIMD_LANES: usize = 8;

/// Byte alignment of every buffer handed to the distance kernel.
pub const SIMD_ALIGNMENT: usize = 32;

/// Identifier of a vector inside a [`VectorStore`](crate::vector::VectorStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VectorId(u32);

impl VectorId {
    /// Creates a new `VectorId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id as a row index into a store.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a cluster in an inverted file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(u32);

impl ClusterId {
    /// Creates a new `ClusterId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id as an index into the centroid array.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// A dimension is always positive; every vector of one store shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a k-nearest-neighbor result.
///
/// Neighbors order by ascending squared distance, ties broken by the lower
/// vector id. The order is total: `f32::total_cmp` places NaN after every
/// finite distance so a poisoned vector can never displace a real neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// Id of the neighboring vector.
    pub id: VectorId,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

impl Neighbor {
    #[must_use]
    pub const fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure base and query vectors come from the same dataset"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Buffer of {len} floats is not a whole number of {dimension}-dimensional vectors\nSuggestion: Check that the flat buffer was produced with the declared dimension"
    )]
    RaggedBuffer { len: usize, dimension: usize },

    #[error(
        "Failed to allocate {bytes} bytes for vector storage\nSuggestion: Reduce the dataset size or free memory"
    )]
    Allocation { bytes: usize },

    #[error("Vector not found: ID {id} (store holds {len} vectors)")]
    VectorNotFound { id: u32, len: usize },

    #[error(
        "Vector count {0} exceeds the 32-bit id space\nSuggestion: Split the dataset into multiple stores"
    )]
    TooManyVectors(usize),
}
