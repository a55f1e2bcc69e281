//! Recall@k evaluation against ground-truth neighbor lists.
//!
//! Position `j` of a query's result counts as correct when its id equals the
//! ground truth id at `j`, or when both points lie at exactly the same
//! squared distance from the query.
//!
//! Each query is scored over `min(k, ground truth length)` positions; a
//! result list shorter than that counts its missing positions as misses.
//! Queries without ground truth are left out of the average.

use rayon::prelude::*;

use crate::error::{IndexError, IndexResult};
use crate::io::GroundTruth;
use crate::vector::{Neighbor, VectorId, VectorStore, distance_squared};

/// Mean recall@k over all queries with ground truth.
///
/// `results[q]` is the ranked result for `queries.row(q)`. Returns `0.0`
/// when no query has ground truth.
pub fn recall_at_k(
    base: &VectorStore,
    queries: &VectorStore,
    results: &[Vec<Neighbor>],
    truth: &GroundTruth,
    k: usize,
) -> IndexResult<f64> {
    if results.len() != queries.len() {
        return Err(IndexError::CountMismatch {
            what: "result lists",
            expected: queries.len(),
            actual: results.len(),
        });
    }
    if truth.len() < queries.len() {
        return Err(IndexError::CountMismatch {
            what: "ground truth rows",
            expected: queries.len(),
            actual: truth.len(),
        });
    }
    if base.dimension() != queries.dimension() {
        return Err(IndexError::DimensionMismatch {
            expected: base.dimension().get(),
            actual: queries.dimension().get(),
        });
    }

    let scores = results
        .par_iter()
        .enumerate()
        .map(|(q, predicted)| query_recall(base, queries.row(q), predicted, truth.row(q), k))
        .collect::<IndexResult<Vec<_>>>()?;

    let scored: Vec<f64> = scores.into_iter().flatten().collect();
    if scored.is_empty() {
        return Ok(0.0);
    }
    Ok(scored.iter().sum::<f64>() / scored.len() as f64)
}

/// Recall of one query, or `None` when there is nothing to score.
pub fn query_recall(
    base: &VectorStore,
    query: &[f32],
    predicted: &[Neighbor],
    truth: &[VectorId],
    k: usize,
) -> IndexResult<Option<f64>> {
    let positions = k.min(truth.len());
    if positions == 0 {
        return Ok(None);
    }

    let mut correct = 0usize;
    for (neighbor, &expected) in predicted.iter().zip(truth).take(positions) {
        if neighbor.id == expected {
            correct += 1;
            continue;
        }
        let found = distance_squared(query, base.try_get(neighbor.id)?);
        let wanted = distance_squared(query, base.try_get(expected)?);
        if found == wanted {
            correct += 1;
        }
    }

    Ok(Some(correct as f64 / positions as f64))
}
