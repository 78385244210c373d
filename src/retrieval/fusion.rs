//! Reciprocal Rank Fusion.
//!
//! RRF combines independent rankings without needing comparable score
//! scales: `score(d) = sum_r 1 / (k + rank_r(d))` with 1-indexed ranks.
//! The smoothing constant k = 60 is the value recommended by Cormack,
//! Clarke, and Buettcher (SIGIR 2009) and is not reconfigurable at query
//! time.

use std::collections::HashMap;

use crate::types::DocumentId;

/// Smoothing term controlling how quickly rank contributions decay.
pub const RRF_K: f32 = 60.0;

/// Rank assigned to a document absent from the lexical results. Large enough
/// that the lexical term contributes essentially nothing, without acting as
/// an extra penalty.
pub const MISSING_LEXICAL_RANK: usize = 1000;

/// Fused score for one chunk given its vector rank and its document's
/// lexical rank (both 1 = best).
pub fn rrf_score(vector_rank: usize, lexical_rank: usize) -> f32 {
    1.0 / (RRF_K + vector_rank as f32) + 1.0 / (RRF_K + lexical_rank as f32)
}

/// Converts scored lexical results into 1-indexed ranks per document.
///
/// Input order is ignored; entries are ranked by score descending. Ties keep
/// their relative input order (stable sort) so fused output is reproducible.
pub fn lexical_ranks(scored: &[(DocumentId, f32)]) -> HashMap<DocumentId, usize> {
    let mut ordered: Vec<&(DocumentId, f32)> = scored.iter().collect();
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (*id, index + 1))
        .collect()
}
