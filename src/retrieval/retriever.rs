//! Two-stage hybrid retrieval.
//!
//! Linear pipeline, no branching back: embed the query once, recall coarse
//! candidates by document-vector similarity, refine at chunk granularity
//! with field-weighted vector scores, fold in an independent lexical
//! ranking, fuse with RRF, and format the top-k snippets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::stores::{ContentStore, LexicalRanker};
use crate::types::{ChunkRecord, DocumentId, PipelineError, SearchMatch, SearchRequest};

use super::fusion::{MISSING_LEXICAL_RANK, lexical_ranks, rrf_score};

/// Read-only consumer of the stored documents, chunks, and vectors.
pub struct HybridRetriever {
    store: Arc<dyn ContentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    lexical: Option<Arc<dyn LexicalRanker>>,
    config: Arc<PipelineConfig>,
}

struct ScoredChunk {
    chunk: ChunkRecord,
    vector_score: f32,
    fused_score: f32,
}

impl HybridRetriever {
    /// `lexical` is optional: without it (or when it fails mid-request) the
    /// retriever degrades to vector-only ranking.
    pub fn new(
        store: Arc<dyn ContentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        lexical: Option<Arc<dyn LexicalRanker>>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            embedder,
            lexical,
            config,
        }
    }

    /// Runs the full search pipeline and returns up to `k` ranked matches.
    ///
    /// Zero coarse candidates is a terminal empty result, not an error.
    /// Embedding or storage failures are fatal to the request; lexical
    /// failures degrade to vector-only ranking with a warning. Dropping the
    /// returned future abandons any in-flight collaborator call and no
    /// further stages run.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchMatch>, PipelineError> {
        request.validate(self.config.max_k)?;

        let query_texts = vec![request.query.clone()];
        let mut query_vectors = self.embedder.embed(&query_texts).await?;
        if query_vectors.is_empty() {
            return Err(PipelineError::Embedding(
                "collaborator returned no vector for the query".into(),
            ));
        }
        let query_vector = query_vectors.swap_remove(0);

        let candidates = self
            .store
            .coarse_recall(
                &query_vector,
                request.doc_type,
                &request.filters,
                self.config.coarse_recall_limit,
            )
            .await?;
        if candidates.is_empty() {
            tracing::debug!(query = %request.query, "No coarse candidates");
            return Ok(Vec::new());
        }
        tracing::debug!(
            candidate_count = candidates.len(),
            "Retrieved candidates for refinement"
        );

        // Chunk fetch and lexical scoring are independent reads over the
        // candidate set; only the lexical side may fail soft.
        let (chunks, lexical_scores) = tokio::join!(
            self.store.chunks_for_documents(&candidates),
            self.lexical_scores(&request.query, &candidates),
        );
        let chunks = chunks?;

        let mut scored: Vec<ScoredChunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            // A stored chunk with a stale dimension must surface, not score
            // on a truncated prefix.
            if chunk.embedding.len() != query_vector.len() {
                return Err(PipelineError::DimensionMismatch {
                    expected: query_vector.len(),
                    actual: chunk.embedding.len(),
                });
            }
            let similarity = 1.0 / (1.0 + l2_distance(&chunk.embedding, &query_vector));
            let weight = self
                .config
                .field_weights
                .effective_weight(&chunk.field, &request.field_weights);
            scored.push(ScoredChunk {
                chunk,
                vector_score: similarity * weight,
                fused_score: 0.0,
            });
        }

        // Vector ranks come from the weighted chunk scores, best first.
        scored.sort_by(|a, b| {
            b.vector_score
                .partial_cmp(&a.vector_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let doc_lexical_ranks = lexical_ranks(&lexical_scores);
        for (index, entry) in scored.iter_mut().enumerate() {
            let vector_rank = index + 1;
            let lexical_rank = doc_lexical_ranks
                .get(&entry.chunk.document_id)
                .copied()
                .unwrap_or(MISSING_LEXICAL_RANK);
            entry.fused_score = rrf_score(vector_rank, lexical_rank);
        }

        // Stable sort keeps tie order reproducible.
        scored.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(request.k);

        self.assemble_matches(scored).await
    }

    async fn lexical_scores(
        &self,
        query: &str,
        candidates: &[DocumentId],
    ) -> Vec<(DocumentId, f32)> {
        let Some(ranker) = &self.lexical else {
            return Vec::new();
        };
        match ranker.rank(query, candidates).await {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Lexical ranking failed, continuing with vector-only results"
                );
                Vec::new()
            }
        }
    }

    async fn assemble_matches(
        &self,
        scored: Vec<ScoredChunk>,
    ) -> Result<Vec<SearchMatch>, PipelineError> {
        let mut seen = HashSet::new();
        let distinct: Vec<DocumentId> = scored
            .iter()
            .map(|entry| entry.chunk.document_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let documents = self.store.fetch_documents(&distinct).await?;
        let by_id: HashMap<DocumentId, _> = documents.into_iter().map(|d| (d.id, d)).collect();

        let mut matches = Vec::with_capacity(scored.len());
        for entry in scored {
            let Some(document) = by_id.get(&entry.chunk.document_id) else {
                tracing::warn!(
                    document_id = %entry.chunk.document_id,
                    "Chunk refers to a document the store no longer returns, skipping"
                );
                continue;
            };
            matches.push(SearchMatch {
                document_id: document.id,
                doc_type: document.doc_type,
                score: entry.fused_score,
                field: entry.chunk.field,
                snippet: make_snippet(&entry.chunk.text, self.config.snippet_chars),
                metadata: document.facets.clone(),
            });
        }
        Ok(matches)
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn make_snippet(text: &str, limit: usize) -> String {
    let mut snippet: String = text.chars().take(limit).collect();
    if text.chars().count() > limit {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_passes_short_text_through() {
        assert_eq!(make_snippet("Title: Warm-up drill", 200), "Title: Warm-up drill");
    }

    #[test]
    fn snippet_truncates_with_ellipsis() {
        let text = "x".repeat(250);
        let snippet = make_snippet(&text, 200);
        assert_eq!(snippet.len(), 203);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(210);
        let snippet = make_snippet(&text, 200);
        assert_eq!(snippet.chars().count(), 203);
    }

    #[test]
    fn closer_vectors_score_higher() {
        let query = [1.0f32, 0.0];
        let near = 1.0 / (1.0 + l2_distance(&[0.9, 0.0], &query));
        let far = 1.0 / (1.0 + l2_distance(&[-1.0, 0.0], &query));
        assert!(near > far);
        assert!(near <= 1.0);
    }

    #[tokio::test]
    async fn stale_chunk_dimension_is_an_error_not_a_prefix_score() {
        use chrono::Utc;
        use uuid::Uuid;

        use crate::config::PipelineConfig;
        use crate::embeddings::MockEmbeddingProvider;
        use crate::stores::MemoryStore;
        use crate::types::{
            DocType, DocumentRecord, DocumentVectorRecord, Facets,
        };

        let store = Arc::new(MemoryStore::new());
        let document_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert_document(DocumentRecord {
                id: document_id,
                doc_type: DocType::Plan,
                source_id: "p1".to_string(),
                version: 1,
                title: None,
                description: None,
                facets: Facets::new(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        store
            .upsert_document_vector(DocumentVectorRecord {
                document_id,
                method: "weighted-mean".to_string(),
                embedding: vec![0.0; 4],
            })
            .await
            .unwrap();
        // Chunk written with a different embedding dimension than the
        // current provider produces.
        store
            .insert_chunks(vec![ChunkRecord {
                id: Uuid::new_v4(),
                document_id,
                field: "Title".to_string(),
                chunk_index: 0,
                text: "Title: Warm-up drill".to_string(),
                char_count: 20,
                embedding: vec![0.0; 2],
            }])
            .await
            .unwrap();

        let retriever = HybridRetriever::new(
            store,
            Arc::new(MockEmbeddingProvider::new(4)),
            None,
            Arc::new(PipelineConfig {
                embedding_dimension: 4,
                ..PipelineConfig::default()
            }),
        );
        let err = retriever
            .search(SearchRequest::new("warm-up"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "dimension_mismatch");
    }
}
