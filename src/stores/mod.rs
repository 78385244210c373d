//! Storage and lexical-ranking collaborator seams.
//!
//! The durable vector/full-text index is an external system; this module
//! defines the traits the pipeline talks through plus an in-memory reference
//! backend for tests and demos.
//!
//! ```text
//!               ┌────────────────────┐
//!               │  ContentStore      │
//!               │  (async documents, │
//!               │   chunks, vectors) │
//!               └─────────┬──────────┘
//!                         │
//!            ┌────────────┼─────────────┐
//!            ▼            ▼             ▼
//!     ┌────────────┐ ┌──────────┐ ┌──────────┐
//!     │ MemoryStore│ │ (yours:  │ │ (yours:  │
//!     │ (in-crate) │ │ pgvector)│ │ sqlite)  │
//!     └────────────┘ └──────────┘ └──────────┘
//! ```
//!
//! Implementations should make the document, chunk, and vector writes of a
//! single ingestion atomic; a document that is visible to
//! [`ContentStore::coarse_recall`] without a document vector is a bug.

pub mod memory;

use async_trait::async_trait;

use crate::types::{
    ChunkRecord, DocType, DocumentId, DocumentKey, DocumentRecord, DocumentVectorRecord, Facets,
    PipelineError,
};

pub use memory::MemoryStore;

/// Durable store for documents, chunks, and document vectors.
///
/// The ingestion pipeline is the only writer; the retriever only reads.
/// Coarse recall orders by document-vector similarity (closest first) and
/// applies exact facet containment: every filter key must be present in the
/// document's facets with an equal value.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Looks up an existing document id by identity, for the idempotent
    /// ingest short-circuit. The pipeline treats the identity as ingested
    /// only when [`ContentStore::fetch_document_vector`] also returns a
    /// vector for it.
    async fn find_document(&self, key: &DocumentKey)
    -> Result<Option<DocumentId>, PipelineError>;

    /// Persists document attributes and metadata facets.
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), PipelineError>;

    /// Removes a document together with its chunks, its composed vector, and
    /// its identity mapping. Used to roll back a failed ingestion; an unknown
    /// id is a no-op.
    async fn delete_document(&self, id: DocumentId) -> Result<(), PipelineError>;

    /// Persists a batch of chunks with their embeddings.
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), PipelineError>;

    /// Persists (or replaces) the composed document vector.
    async fn upsert_document_vector(
        &self,
        vector: DocumentVectorRecord,
    ) -> Result<(), PipelineError>;

    /// The composed vector for a document, if one was stored. A `None` marks
    /// the document as incompletely ingested.
    async fn fetch_document_vector(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentVectorRecord>, PipelineError>;

    /// Top documents by vector similarity to `query`, optionally restricted
    /// by type and facet containment. Closest first.
    async fn coarse_recall(
        &self,
        query: &[f32],
        doc_type: Option<DocType>,
        filters: &Facets,
        limit: usize,
    ) -> Result<Vec<DocumentId>, PipelineError>;

    /// Every chunk belonging to any of the given documents.
    async fn chunks_for_documents(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ChunkRecord>, PipelineError>;

    /// Full document attributes for the given ids. Unknown ids are skipped.
    async fn fetch_documents(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<DocumentRecord>, PipelineError>;

    /// Rebuilds the read-optimized lexical index. Triggered fire-and-forget
    /// after ingestion; a failure only affects search recency.
    async fn refresh_lexical_index(&self) -> Result<(), PipelineError>;
}

/// Lexical relevance collaborator.
///
/// Given a query and a candidate set, returns one score per candidate the
/// ranker knows about; candidates missing from its index are simply absent
/// from the result. Score scale is ranker-specific, higher is better — the
/// retriever only consumes ranks.
#[async_trait]
pub trait LexicalRanker: Send + Sync {
    async fn rank(
        &self,
        query: &str,
        candidates: &[DocumentId],
    ) -> Result<Vec<(DocumentId, f32)>, PipelineError>;
}
