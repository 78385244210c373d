//! Per-field embedding aggregation and document-vector composition.
//!
//! A field's chunks are embedded in one batched collaborator call and
//! mean-pooled into a single field vector; field vectors are then combined
//! into the document vector with a weighted mean. Both means are
//! component-wise.

use std::collections::BTreeMap;

use crate::config::FieldWeights;
use crate::embeddings::EmbeddingProvider;
use crate::types::{FieldVector, PipelineError};

/// Component-wise arithmetic mean of equal-dimension vectors.
pub fn mean(vectors: &[Vec<f32>]) -> Result<Vec<f32>, PipelineError> {
    let Some(first) = vectors.first() else {
        return Err(PipelineError::EmptyInput("cannot average zero vectors"));
    };
    let mut result = vec![0.0f32; first.len()];
    for vector in vectors {
        for (slot, value) in result.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let count = vectors.len() as f32;
    for slot in &mut result {
        *slot /= count;
    }
    Ok(result)
}

/// Component-wise weighted mean: `sum(w_i * v_i) / sum(w_i)`.
pub fn weighted_mean(entries: &[(&[f32], f32)]) -> Result<Vec<f32>, PipelineError> {
    let Some((first, _)) = entries.first() else {
        return Err(PipelineError::EmptyInput(
            "cannot average zero weighted vectors",
        ));
    };
    let total_weight: f32 = entries.iter().map(|(_, w)| w).sum();
    if total_weight == 0.0 {
        return Err(PipelineError::ZeroWeight);
    }

    let mut result = vec![0.0f32; first.len()];
    for (vector, weight) in entries {
        for (slot, value) in result.iter_mut().zip(*vector) {
            *slot += value * weight;
        }
    }
    for slot in &mut result {
        *slot /= total_weight;
    }
    Ok(result)
}

/// Embeds one field's chunks (a single batched call) and mean-pools them.
async fn field_vector(
    chunks: &[String],
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<f32>, PipelineError> {
    if chunks.is_empty() {
        return Err(PipelineError::EmptyInput("field has no chunks to embed"));
    }
    let embeddings = embedder.embed(chunks).await?;
    if embeddings.len() < chunks.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: chunks.len(),
            actual: embeddings.len(),
        });
    }
    mean(&embeddings)
}

/// Builds one [`FieldVector`] per field that embeds successfully.
///
/// A field whose embedding fails is logged and omitted rather than aborting
/// the whole ingestion; partial field coverage is acceptable. The caller
/// treats an entirely empty result as a hard failure when composing the
/// document vector.
pub async fn build_field_vectors(
    chunks_by_field: &BTreeMap<String, Vec<String>>,
    embedder: &dyn EmbeddingProvider,
    weights: &FieldWeights,
) -> Vec<FieldVector> {
    let mut result = Vec::with_capacity(chunks_by_field.len());
    for (field, chunks) in chunks_by_field {
        if chunks.is_empty() {
            continue;
        }
        match field_vector(chunks, embedder).await {
            Ok(vector) => result.push(FieldVector {
                field: field.clone(),
                vector,
                weight: weights.weight_for(field),
            }),
            Err(err) => {
                tracing::warn!(
                    field = %field,
                    error = %err,
                    "Failed to embed field, omitting it from the document vector"
                );
            }
        }
    }
    result
}

/// Composes the per-field vectors into the single document vector.
///
/// Fails with an empty-input error when no field vectors are supplied —
/// a document without a document vector is unsearchable, so ingestion must
/// treat this as fatal.
pub fn compose_document_vector(per_field: &[FieldVector]) -> Result<Vec<f32>, PipelineError> {
    if per_field.is_empty() {
        return Err(PipelineError::EmptyInput(
            "no per-field vectors to compose a document vector from",
        ));
    }
    let entries: Vec<(&[f32], f32)> = per_field
        .iter()
        .map(|fv| (fv.vector.as_slice(), fv.weight))
        .collect();
    weighted_mean(&entries)
}
