//! Immutable pipeline configuration.
//!
//! A [`PipelineConfig`] is built once at startup and injected into the
//! ingestion pipeline and retriever, usually behind an `Arc`. Nothing in it
//! is mutated after construction; per-request knobs (field-weight overrides,
//! `k`) travel with the request instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Process-wide field importance table.
///
/// Weights bias both document-vector composition at ingestion time and
/// chunk-level scoring at query time. Fields without an entry weigh 1.0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldWeights {
    weights: BTreeMap<String, f32>,
}

impl FieldWeights {
    pub fn new(weights: BTreeMap<String, f32>) -> Self {
        Self { weights }
    }

    /// Configured weight for a field, defaulting to 1.0 when unlisted.
    pub fn weight_for(&self, field: &str) -> f32 {
        self.weights.get(field).copied().unwrap_or(1.0)
    }

    /// Effective query-time weight: caller override first, then the table,
    /// then 1.0.
    pub fn effective_weight(&self, field: &str, overrides: &BTreeMap<String, f32>) -> f32 {
        overrides
            .get(field)
            .copied()
            .unwrap_or_else(|| self.weight_for(field))
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        let weights = [
            ("Title", 3.0),
            ("CoachingPoints", 2.0),
            ("Purpose", 1.5),
            ("Description", 1.2),
            ("Setup", 1.2),
            ("Adaptations", 1.1),
            ("LearningQuestions", 1.1),
            ("Transcription", 1.0),
        ]
        .into_iter()
        .map(|(field, weight)| (field.to_string(), weight))
        .collect();
        Self { weights }
    }
}

/// Tunables shared by ingestion and retrieval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Dimensionality every embedding in the process must have. Verified
    /// against the collaborator at startup via
    /// [`crate::embeddings::verify_embedding_dimension`].
    pub embedding_dimension: usize,
    /// Token budget per chunk window.
    pub max_chunk_tokens: usize,
    /// Tokens shared between consecutive windows.
    pub chunk_overlap_tokens: usize,
    /// Documents fetched by coarse recall before chunk refinement.
    pub coarse_recall_limit: usize,
    /// Hard upper bound on a request's `k`.
    pub max_k: usize,
    /// Characters kept when formatting a match snippet.
    pub snippet_chars: usize,
    pub field_weights: FieldWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 1536,
            max_chunk_tokens: 1000,
            chunk_overlap_tokens: 50,
            coarse_recall_limit: 50,
            max_k: 100,
            snippet_chars: 200,
            field_weights: FieldWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_field_weighs_one() {
        let weights = FieldWeights::default();
        assert_eq!(weights.weight_for("Title"), 3.0);
        assert_eq!(weights.weight_for("SomethingElse"), 1.0);
    }

    #[test]
    fn override_beats_table_beats_default() {
        let weights = FieldWeights::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("Title".to_string(), 0.5);

        assert_eq!(weights.effective_weight("Title", &overrides), 0.5);
        assert_eq!(weights.effective_weight("Purpose", &overrides), 1.5);
        assert_eq!(weights.effective_weight("Unlisted", &overrides), 1.0);
    }
}
