//! Bounded top-k selection.
//!
//! [`TopK`] keeps the `k` smallest `(id, distance)` pairs it has seen. It is
//! a max-heap keyed on [`Neighbor`] ordering, so the current worst candidate
//! sits at the root and a push either fills a free slot or replaces the root
//! in O(log k). Capacity is fixed at construction.
//!
//! The same structure serves two purposes during IVF search: choosing the
//! nearest centroids to probe and collecting the nearest data points.

use std::collections::{BinaryHeap, HashSet};

use crate::vector::types::{Neighbor, VectorId};

/// Fixed-capacity selector of the `k` nearest candidates.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    heap: BinaryHeap<Neighbor>,
    members: HashSet<VectorId>,
}

impl TopK {
    /// Creates a selector that retains at most `capacity` candidates.
    ///
    /// A capacity of zero yields a selector that accepts nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Number of candidates currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns true once `capacity` candidates are held.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Distance a new candidate must beat to be admitted, if the selector is full.
    #[must_use]
    pub fn threshold(&self) -> Option<f32> {
        if self.is_full() {
            self.heap.peek().map(|worst| worst.distance)
        } else {
            None
        }
    }

    /// Offers a candidate. Returns true if it was retained.
    ///
    /// Ids are kept distinct: pushing an id that is already held keeps the
    /// smaller of the two distances.
    pub fn push(&mut self, id: VectorId, distance: f32) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let candidate = Neighbor::new(id, distance);

        if self.members.contains(&id) {
            return self.improve_existing(candidate);
        }

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
            self.members.insert(id);
            return true;
        }

        let Some(mut worst) = self.heap.peek_mut() else {
            return false;
        };
        if candidate < *worst {
            self.members.remove(&worst.id);
            self.members.insert(id);
            *worst = candidate;
            true
        } else {
            false
        }
    }

    /// Repeated id with a possibly smaller distance. Rare, so O(k) is fine.
    fn improve_existing(&mut self, candidate: Neighbor) -> bool {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let mut improved = false;
        for entry in entries.iter_mut() {
            if entry.id == candidate.id && candidate < *entry {
                *entry = candidate;
                improved = true;
            }
        }
        self.heap = BinaryHeap::from(entries);
        improved
    }

    /// Offers a candidate only if it can beat the current worst.
    ///
    /// Skips the id bookkeeping of [`push`](Self::push) for candidates that
    /// would be rejected anyway. Callers must not offer the same id twice.
    pub fn offer(&mut self, id: VectorId, distance: f32) -> bool {
        if self.threshold().is_some_and(|worst| distance > worst) {
            return false;
        }
        self.push(id, distance)
    }

    /// Drains the selector into a list sorted by ascending distance.
    ///
    /// The list holds `min(k, distinct ids pushed)` entries; nothing is padded.
    /// The selector keeps its storage and is empty afterwards.
    pub fn take_sorted(&mut self) -> Vec<Neighbor> {
        self.members.clear();
        let mut sorted: Vec<Neighbor> = self.heap.drain().collect();
        sorted.sort_unstable();
        sorted
    }
}
