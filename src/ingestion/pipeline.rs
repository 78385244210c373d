//! Ingestion orchestration.
//!
//! Sequences PII scrubbing, chunking, embedding, aggregation, and storage
//! writes for one document descriptor. Idempotent by
//! (type, source id, version): re-ingesting a completed identity returns the
//! stored id without touching any collaborator again. A failed ingestion is
//! rolled back so the same identity can be retried.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::stores::ContentStore;
use crate::types::{
    ChunkRecord, DocumentRecord, DocumentVectorRecord, IngestOutcome, IngestRequest, PipelineError,
};

use super::chunker::TokenChunker;
use super::pii::strip_pii;
use super::vectors::{build_field_vectors, compose_document_vector};

/// Method tag stored with every composed document vector.
pub const COMPOSITION_METHOD: &str = "weighted-mean";

/// Sole writer of documents, chunks, and document vectors.
pub struct IngestionPipeline {
    store: Arc<dyn ContentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TokenChunker,
    config: Arc<PipelineConfig>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: Arc<PipelineConfig>,
    ) -> Result<Self, PipelineError> {
        let chunker = TokenChunker::from_config(&config)?;
        Ok(Self {
            store,
            embedder,
            chunker,
            config,
        })
    }

    /// Ingests one document descriptor and returns its id.
    ///
    /// Any failure between document creation and the document-vector upsert
    /// deletes the partially written document before the error is returned,
    /// so the same identity can be retried; only the trailing lexical-index
    /// refresh is fire-and-forget.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, PipelineError> {
        request.validate()?;

        let key = request.key();
        if let Some(existing) = self.store.find_document(&key).await? {
            // Idempotency covers completed ingestions only: a document
            // without a composed vector is debris from an interrupted run
            // and gets replaced instead of short-circuiting to it.
            if self.store.fetch_document_vector(existing).await?.is_some() {
                tracing::info!(
                    document_id = %existing,
                    source_id = %key.source_id,
                    "Document already ingested, returning existing id"
                );
                return Ok(IngestOutcome {
                    document_id: existing,
                    newly_ingested: false,
                });
            }
            tracing::warn!(
                document_id = %existing,
                source_id = %key.source_id,
                "Replacing vectorless document left by an interrupted ingestion"
            );
            self.store.delete_document(existing).await?;
        }

        let document_id = Uuid::new_v4();
        let now = Utc::now();
        self.store
            .insert_document(DocumentRecord {
                id: document_id,
                doc_type: request.doc_type,
                source_id: request.source_id.clone(),
                version: request.version,
                title: request.title.clone(),
                description: request.description.clone(),
                facets: request.metadata.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        let chunk_count = match self.chunk_embed_compose(document_id, &request).await {
            Ok(count) => count,
            Err(err) => {
                if let Err(cleanup) = self.store.delete_document(document_id).await {
                    tracing::warn!(
                        document_id = %document_id,
                        error = %cleanup,
                        "Failed to roll back partially ingested document"
                    );
                }
                return Err(err);
            }
        };

        // Detached refresh: the document is already durable, a stale lexical
        // index only affects search recency.
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.refresh_lexical_index().await {
                tracing::warn!(error = %err, "Lexical index refresh failed");
            }
        });

        tracing::info!(document_id = %document_id, chunk_count, "Document ingested");
        Ok(IngestOutcome {
            document_id,
            newly_ingested: true,
        })
    }

    /// Fallible middle of an ingestion: chunking through the document-vector
    /// upsert. Returns the number of chunks stored.
    async fn chunk_embed_compose(
        &self,
        document_id: Uuid,
        request: &IngestRequest,
    ) -> Result<usize, PipelineError> {
        // PII is scrubbed before any text reaches the tokenizer, so neither
        // stored chunks nor the embedding collaborator ever see raw patterns.
        let mut chunks_by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, value) in &request.to_embedding {
            if value.trim().is_empty() {
                continue;
            }
            let cleaned = strip_pii(value);
            let chunks = self.chunker.chunk(field, &cleaned);
            if !chunks.is_empty() {
                chunks_by_field.insert(field.clone(), chunks);
            }
        }

        let chunk_records = self
            .embed_and_record(document_id, &chunks_by_field)
            .await?;
        let chunk_count = chunk_records.len();
        tracing::info!(
            document_id = %document_id,
            chunk_count,
            field_count = chunks_by_field.len(),
            "Generated and embedded chunks"
        );
        self.store.insert_chunks(chunk_records).await?;

        let per_field = build_field_vectors(
            &chunks_by_field,
            self.embedder.as_ref(),
            &self.config.field_weights,
        )
        .await;
        let document_vector = compose_document_vector(&per_field)?;
        self.store
            .upsert_document_vector(DocumentVectorRecord {
                document_id,
                method: COMPOSITION_METHOD.to_string(),
                embedding: document_vector,
            })
            .await?;
        Ok(chunk_count)
    }

    /// Embeds every chunk across all fields in one batched collaborator call
    /// and pairs each chunk with its vector.
    async fn embed_and_record(
        &self,
        document_id: Uuid,
        chunks_by_field: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<ChunkRecord>, PipelineError> {
        let mut flat: Vec<(&str, usize, &str)> = Vec::new();
        for (field, chunks) in chunks_by_field {
            for (index, text) in chunks.iter().enumerate() {
                flat.push((field, index, text));
            }
        }
        if flat.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = flat.iter().map(|(_, _, text)| text.to_string()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        if let Some(bad) = embeddings
            .iter()
            .find(|e| e.len() != self.config.embedding_dimension)
        {
            return Err(PipelineError::DimensionMismatch {
                expected: self.config.embedding_dimension,
                actual: bad.len(),
            });
        }

        Ok(flat
            .into_iter()
            .zip(embeddings)
            .map(|((field, chunk_index, text), embedding)| ChunkRecord {
                id: Uuid::new_v4(),
                document_id,
                field: field.to_string(),
                chunk_index,
                text: text.to_string(),
                char_count: text.chars().count(),
                embedding,
            })
            .collect())
    }
}
