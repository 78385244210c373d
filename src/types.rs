//! Core identifiers, persistence records, request/response types, and the
//! crate-wide error enum.
//!
//! Everything that crosses a collaborator boundary or the caller-facing API
//! lives here so the pipeline modules can stay focused on behavior.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier assigned to a document at first ingestion.
pub type DocumentId = Uuid;

/// Metadata facet mapping attached to a document, used for exact-containment
/// filtering at query time.
pub type Facets = serde_json::Map<String, serde_json::Value>;

/// Closed set of content types the service ingests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Video,
    Plan,
    CoachInfo,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Plan => write!(f, "plan"),
            Self::CoachInfo => write!(f, "coach_info"),
        }
    }
}

/// Identity of a document: re-ingesting the same key is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub doc_type: DocType,
    pub source_id: String,
    pub version: u32,
}

/// Persisted document attributes. The ingestion pipeline is the sole writer;
/// identity fields are immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub doc_type: DocType,
    pub source_id: String,
    pub version: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub facets: Facets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            doc_type: self.doc_type,
            source_id: self.source_id.clone(),
            version: self.version,
        }
    }
}

/// One bounded token window of a field's text together with its embedding.
///
/// Chunk ordinals within a (document, field) pair are contiguous and 0-based.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub document_id: DocumentId,
    pub field: String,
    pub chunk_index: usize,
    pub text: String,
    pub char_count: usize,
    pub embedding: Vec<f32>,
}

/// The single composed vector a completed ingestion leaves behind for
/// coarse recall.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentVectorRecord {
    pub document_id: DocumentId,
    /// Composition method tag, currently always `"weighted-mean"`.
    pub method: String,
    pub embedding: Vec<f32>,
}

/// Per-field mean embedding plus the configured field weight, as produced by
/// the aggregator and consumed by the composer.
#[derive(Clone, Debug)]
pub struct FieldVector {
    pub field: String,
    pub vector: Vec<f32>,
    pub weight: f32,
}

/// Document descriptor accepted by the ingest operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub source_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Field name -> raw text to chunk and embed. Empty values are skipped.
    pub to_embedding: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Facets,
}

fn default_version() -> u32 {
    1
}

impl IngestRequest {
    /// Rejects malformed descriptors before any collaborator is contacted.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.source_id.trim().is_empty() {
            return Err(PipelineError::Validation(
                "source_id must be non-empty".into(),
            ));
        }
        if self.version == 0 {
            return Err(PipelineError::Validation(
                "version must be a positive integer".into(),
            ));
        }
        Ok(())
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            doc_type: self.doc_type,
            source_id: self.source_id.clone(),
            version: self.version,
        }
    }
}

/// Outcome of an ingest call. `newly_ingested` is `false` when the idempotent
/// short-circuit returned an already stored document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub document_id: DocumentId,
    pub newly_ingested: bool,
}

/// Query accepted by the search operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(rename = "type", default)]
    pub doc_type: Option<DocType>,
    /// Exact-containment facet filters applied during coarse recall.
    #[serde(default)]
    pub filters: Facets,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Per-field weight overrides; fields not listed fall back to the
    /// configured weight table, then 1.0.
    #[serde(default)]
    pub field_weights: BTreeMap<String, f32>,
}

fn default_k() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            doc_type: None,
            filters: Facets::new(),
            k: default_k(),
            field_weights: BTreeMap::new(),
        }
    }

    /// Rejects malformed queries before any collaborator is contacted.
    pub fn validate(&self, max_k: usize) -> Result<(), PipelineError> {
        if self.query.trim().is_empty() {
            return Err(PipelineError::Validation("query must be non-empty".into()));
        }
        if self.k == 0 || self.k > max_k {
            return Err(PipelineError::Validation(format!(
                "k must be between 1 and {max_k}, got {}",
                self.k
            )));
        }
        if let Some((field, weight)) = self
            .field_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w <= 0.0)
        {
            return Err(PipelineError::Validation(format!(
                "field weight for '{field}' must be a positive number, got {weight}"
            )));
        }
        Ok(())
    }
}

/// One ranked result returned by the retriever.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchMatch {
    pub document_id: DocumentId,
    pub doc_type: DocType,
    /// Fused RRF score; higher is better.
    pub score: f32,
    /// Field the winning chunk came from.
    pub field: String,
    /// First 200 characters of the winning chunk, ellipsis-suffixed when
    /// truncated.
    pub snippet: String,
    pub metadata: Facets,
}

/// Errors surfaced by the ingestion and retrieval pipelines.
///
/// Every variant carries a human-readable message; [`PipelineError::kind`]
/// yields the stable machine-readable kind for callers that map errors onto
/// wire responses. Internal stack detail is never included.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request, rejected before any collaborator call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A pipeline stage received an empty input it cannot work with.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// The embedding collaborator returned the wrong number of vectors or a
    /// vector of unexpected dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// All supplied field weights summed to zero.
    #[error("field weights sum to zero")]
    ZeroWeight,

    /// Tokenization or window decoding failed.
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// The embedding collaborator call failed.
    #[error("embedding collaborator failed: {0}")]
    Embedding(String),

    /// The storage collaborator call failed.
    #[error("storage collaborator failed: {0}")]
    Storage(String),

    /// The lexical-ranking collaborator call failed. Non-fatal during search.
    #[error("lexical ranking failed: {0}")]
    Lexical(String),
}

impl PipelineError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EmptyInput(_) => "empty_input",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::ZeroWeight => "zero_weight",
            Self::Chunking(_) => "chunking_failed",
            Self::Embedding(_) => "embedding_failed",
            Self::Storage(_) => "storage_failed",
            Self::Lexical(_) => "lexical_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&DocType::CoachInfo).unwrap();
        assert_eq!(json, "\"coach_info\"");
        let parsed: DocType = serde_json::from_str("\"plan\"").unwrap();
        assert_eq!(parsed, DocType::Plan);
    }

    #[test]
    fn ingest_request_rejects_blank_source_id() {
        let request = IngestRequest {
            doc_type: DocType::Plan,
            source_id: "  ".into(),
            version: 1,
            title: None,
            description: None,
            to_embedding: BTreeMap::new(),
            metadata: Facets::new(),
        };
        let err = request.validate().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn ingest_request_rejects_zero_version() {
        let request = IngestRequest {
            doc_type: DocType::Video,
            source_id: "v1".into(),
            version: 0,
            title: None,
            description: None,
            to_embedding: BTreeMap::new(),
            metadata: Facets::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn search_request_bounds_k() {
        let mut request = SearchRequest::new("drills");
        assert!(request.validate(100).is_ok());

        request.k = 0;
        assert!(request.validate(100).is_err());

        request.k = 101;
        assert!(request.validate(100).is_err());
    }

    #[test]
    fn search_request_rejects_non_positive_weight_override() {
        let mut request = SearchRequest::new("drills");
        request.field_weights.insert("Title".into(), 0.0);
        let err = request.validate(100).unwrap_err();
        assert!(err.to_string().contains("Title"));
    }

    #[test]
    fn version_defaults_to_one() {
        let request: IngestRequest = serde_json::from_str(
            r#"{"type":"plan","source_id":"p1","to_embedding":{}}"#,
        )
        .unwrap();
        assert_eq!(request.version, 1);
    }
}
