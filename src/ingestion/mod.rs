//! Document ingestion: chunking, scrubbing, embedding, and vector composition.
//!
//! * [`chunker`] — tokenizer-bound windowing of field text.
//! * [`pii`] — email/phone scrubbing applied before chunking.
//! * [`vectors`] — per-field mean pooling and weighted document-vector
//!   composition.
//! * [`pipeline`] — the orchestrator that sequences the above against the
//!   storage and embedding collaborators.

pub mod chunker;
pub mod pii;
pub mod pipeline;
pub mod vectors;

pub use chunker::TokenChunker;
pub use pii::strip_pii;
pub use pipeline::{COMPOSITION_METHOD, IngestionPipeline};
pub use vectors::{build_field_vectors, compose_document_vector, mean, weighted_mean};
