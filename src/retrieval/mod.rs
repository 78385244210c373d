//! Hybrid retrieval: coarse recall, chunk refinement, and rank fusion.

pub mod fusion;
pub mod retriever;

pub use fusion::{MISSING_LEXICAL_RANK, RRF_K, rrf_score};
pub use retriever::HybridRetriever;
