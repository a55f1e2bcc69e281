//! Inverted file index: centroids plus per-cluster member lists.
//!
//! Member lists are stored flat (CSR layout): `offsets[c]..offsets[c + 1]`
//! indexes into one `members` array. Within a cluster ids are ascending.
//! The index is immutable once built; rebuilding replaces it wholesale.

use crate::error::{IndexError, IndexResult};
use crate::vector::clustering::{BuildStats, KMeansResult};
use crate::vector::store::VectorStore;
use crate::vector::types::{ClusterId, VectorDimension, VectorId};

#[derive(Debug, Clone)]
pub struct IvfIndex {
    centroids: VectorStore,
    offsets: Vec<usize>,
    members: Vec<VectorId>,
    assignments: Vec<ClusterId>,
    stats: BuildStats,
}

impl IvfIndex {
    /// Materializes the inverted file from a clustering result.
    ///
    /// Fails if an assignment names a cluster without a centroid.
    pub fn from_clustering(result: KMeansResult) -> IndexResult<Self> {
        let KMeansResult {
            centroids,
            assignments,
            stats,
        } = result;
        let num_clusters = centroids.len();

        let mut counts = vec![0usize; num_clusters];
        for cluster in &assignments {
            let slot = counts
                .get_mut(cluster.index())
                .ok_or_else(|| IndexError::ConfigError {
                    reason: format!(
                        "assignment to cluster {cluster} but only {num_clusters} centroids exist"
                    ),
                })?;
            *slot += 1;
        }

        let mut offsets = Vec::with_capacity(num_clusters + 1);
        offsets.push(0);
        for count in &counts {
            offsets.push(offsets[offsets.len() - 1] + count);
        }

        // Walking ids in order keeps every member list ascending.
        let mut cursor = offsets.clone();
        let mut members = vec![VectorId::new(0); assignments.len()];
        for (id, cluster) in assignments.iter().enumerate() {
            members[cursor[cluster.index()]] = VectorId::new(id as u32);
            cursor[cluster.index()] += 1;
        }

        Ok(Self {
            centroids,
            offsets,
            members,
            assignments,
            stats,
        })
    }

    /// Number of clusters `K`.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.centroids.dimension()
    }

    /// All centroids, one row per cluster.
    #[must_use]
    pub fn centroids(&self) -> &VectorStore {
        &self.centroids
    }

    #[must_use]
    pub fn centroid(&self, cluster: ClusterId) -> Option<&[f32]> {
        (cluster.index() < self.num_clusters()).then(|| self.centroids.row(cluster.index()))
    }

    /// Member ids of one cluster in ascending order; empty for unknown ids.
    #[must_use]
    pub fn members(&self, cluster: ClusterId) -> &[VectorId] {
        let c = cluster.index();
        if c >= self.num_clusters() {
            return &[];
        }
        &self.members[self.offsets[c]..self.offsets[c + 1]]
    }

    /// The cluster a vector was assigned to.
    #[must_use]
    pub fn cluster_of(&self, id: VectorId) -> Option<ClusterId> {
        self.assignments.get(id.index()).copied()
    }

    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[must_use]
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Verifies that the member lists partition `{0, .., n - 1}`.
    pub fn check_partition(&self, n: usize) -> IndexResult<()> {
        if self.members.len() != n {
            return Err(IndexError::StoreMismatch {
                built: self.members.len(),
                actual: n,
            });
        }
        let mut seen = vec![false; n];
        for id in &self.members {
            match seen.get_mut(id.index()) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(IndexError::ConfigError {
                        reason: format!("vector {id} is missing from the range or listed twice"),
                    });
                }
            }
        }
        Ok(())
    }
}
