// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cosine similarity ranking over the vector store.
//!
//! Every candidate present in the store is scored against the query vector,
//! then sorted by score descending with ties broken by ascending ID. The sort is
//! a total order, so parallel scoring yields the same ranking as a sequential
//! pass. Each query is a full scan of the candidates.

use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::embedding::VectorStore;
use crate::errors::{Error, Result};

/// One ranked transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredId {
    pub id: String,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

/// A page of ranked results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub hits: Vec<ScoredId>,
    /// Candidates ranked before pagination
    pub total: usize,
}

/// Cosine similarity of two vectors; 0 when either has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Ranks `candidates` against `query` and returns the page at `offset`.
///
/// Fails with [`Error::DimensionMismatch`] when the query length differs from
/// the store dimension, even if there is nothing to rank.
pub fn search(
    query: &[f32],
    candidates: &BTreeSet<String>,
    store: &VectorStore,
    offset: usize,
    limit: usize,
) -> Result<SearchPage> {
    if query.len() != store.dimension() {
        return Err(Error::DimensionMismatch {
            expected: store.dimension(),
            actual: query.len(),
        });
    }
    if candidates.is_empty() || store.is_empty() {
        return Ok(SearchPage::default());
    }

    let mut ranked: Vec<ScoredId> = candidates
        .par_iter()
        .filter_map(|id| {
            store.get(id).ok().map(|vector| ScoredId {
                id: id.clone(),
                score: cosine_similarity(query, vector),
            })
        })
        .collect();

    ranked.par_sort_unstable_by(rank_order);

    let total = ranked.len();
    let hits = ranked.into_iter().skip(offset).take(limit).collect();
    tracing::debug!(candidates = candidates.len(), total, offset, limit, "ranked candidates");
    Ok(SearchPage { hits, total })
}

fn rank_order(a: &ScoredId, b: &ScoredId) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}
