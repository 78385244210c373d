//! Hybrid semantic + lexical retrieval for coaching content.
//!
//! Structured documents (videos, training plans, coach-info records) are
//! split into bounded token windows, embedded, and composed into one
//! weighted document vector plus per-chunk vectors. Queries run a two-stage
//! pipeline: coarse document recall, chunk-level refinement, and Reciprocal
//! Rank Fusion with an independent lexical ranking.
//!
//! ```text
//! Ingest descriptor ──► pii::strip_pii ──► TokenChunker (per field)
//!                                              │
//!                         batched embed ◄──────┤
//!                              │               │
//!                              ▼               ▼
//!                      ChunkRecords      build_field_vectors ──► compose
//!                              │               │                    │
//!                              └──────► ContentStore ◄──────────────┘
//!                                            │  (detached lexical refresh)
//!
//! Query ──► embed ──► coarse_recall ──┬─► chunk refine (L2 × field weight)
//!                                     └─► LexicalRanker
//!                                              │
//!                                 RRF fusion ──► top-k SearchMatch list
//! ```
//!
//! The persistent index, the embedding service, and the lexical ranker are
//! collaborators behind traits ([`stores::ContentStore`],
//! [`embeddings::EmbeddingProvider`], [`stores::LexicalRanker`]); the crate
//! ships an in-memory backend and a deterministic mock provider so the whole
//! pipeline runs in tests without external services.

pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use config::{FieldWeights, PipelineConfig};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, verify_embedding_dimension};
pub use ingestion::IngestionPipeline;
pub use retrieval::HybridRetriever;
pub use stores::{ContentStore, LexicalRanker, MemoryStore};
pub use types::{
    DocType, DocumentId, Facets, IngestOutcome, IngestRequest, PipelineError, SearchMatch,
    SearchRequest,
};
