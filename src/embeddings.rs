//! Embedding collaborator seam.
//!
//! The pipeline never talks to a concrete embedding service; everything goes
//! through [`EmbeddingProvider`]. Production deployments wrap their HTTP
//! client in the trait, tests and demos use [`MockEmbeddingProvider`].

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::types::PipelineError;

/// Batched text-to-vector collaborator.
///
/// Implementations must return one vector per input text, in input order,
/// all sharing the process-wide dimensionality.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Probes the collaborator once and compares its output dimensionality
/// against the configured value.
///
/// Run this at service startup so a misconfigured dimension fails the boot
/// instead of the first ingest or search request.
pub async fn verify_embedding_dimension(
    provider: &dyn EmbeddingProvider,
    expected: usize,
) -> Result<(), PipelineError> {
    let probe = vec!["dimension probe".to_string()];
    let vectors = provider.embed(&probe).await?;
    let actual = vectors.first().map(Vec::len).unwrap_or(0);
    if actual != expected {
        return Err(PipelineError::DimensionMismatch { expected, actual });
    }
    tracing::debug!(dimension = expected, "Embedding dimension verified");
    Ok(())
}

/// Deterministic embedding provider for tests and offline demos.
///
/// Vectors are derived from a hash of the input text, so equal texts always
/// embed identically within a process and distinct texts almost always
/// differ. No semantic meaning is implied.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            // xorshift keeps the sequence cheap and reproducible.
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
            vector.push(unit * 2.0 - 1.0);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_is_deterministic_per_text() {
        let provider = MockEmbeddingProvider::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = provider.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        for vector in &vectors {
            assert_eq!(vector.len(), 16);
        }
    }

    #[tokio::test]
    async fn dimension_check_passes_on_match() {
        let provider = MockEmbeddingProvider::new(32);
        verify_embedding_dimension(&provider, 32).await.unwrap();
    }

    #[tokio::test]
    async fn dimension_check_fails_on_mismatch() {
        let provider = MockEmbeddingProvider::new(32);
        let err = verify_embedding_dimension(&provider, 1536)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "dimension_mismatch");
    }
}
