//! In-memory reference backend.
//!
//! Backs the collaborator traits with `parking_lot`-guarded maps so the whole
//! pipeline can be exercised without a database. Useful for tests, demos, and
//! as a template when writing a real backend. The lexical scorer here is a
//! deliberately naive term-overlap count; a production backend would delegate
//! to its text-search engine instead.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::{
    ChunkRecord, DocType, DocumentId, DocumentKey, DocumentRecord, DocumentVectorRecord, Facets,
    PipelineError,
};

use super::{ContentStore, LexicalRanker};

#[derive(Default)]
struct Inner {
    documents: HashMap<DocumentId, DocumentRecord>,
    ids_by_key: HashMap<DocumentKey, DocumentId>,
    chunks: HashMap<DocumentId, Vec<ChunkRecord>>,
    vectors: HashMap<DocumentId, DocumentVectorRecord>,
    lexical_refreshes: u64,
}

/// Thread-safe in-memory [`ContentStore`] and [`LexicalRanker`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.inner.read().documents.len()
    }

    /// Number of stored chunks across all documents.
    pub fn chunk_count(&self) -> usize {
        self.inner.read().chunks.values().map(Vec::len).sum()
    }

    /// How many times the lexical index refresh has been triggered.
    pub fn lexical_refresh_count(&self) -> u64 {
        self.inner.read().lexical_refreshes
    }

    /// The stored composed vector for a document, if ingestion completed.
    pub fn document_vector(&self, id: DocumentId) -> Option<DocumentVectorRecord> {
        self.inner.read().vectors.get(&id).cloned()
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn facets_contain(facets: &Facets, filters: &Facets) -> bool {
    filters
        .iter()
        .all(|(key, value)| facets.get(key) == Some(value))
}

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_document(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<DocumentId>, PipelineError> {
        Ok(self.inner.read().ids_by_key.get(key).copied())
    }

    async fn insert_document(&self, document: DocumentRecord) -> Result<(), PipelineError> {
        let mut inner = self.inner.write();
        inner.ids_by_key.insert(document.key(), document.id);
        inner.documents.insert(document.id, document);
        Ok(())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), PipelineError> {
        let mut inner = self.inner.write();
        if let Some(document) = inner.documents.remove(&id) {
            // Only unlink the key if it still points at this document.
            if inner.ids_by_key.get(&document.key()) == Some(&id) {
                inner.ids_by_key.remove(&document.key());
            }
        }
        inner.chunks.remove(&id);
        inner.vectors.remove(&id);
        Ok(())
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), PipelineError> {
        let mut inner = self.inner.write();
        for chunk in chunks {
            inner.chunks.entry(chunk.document_id).or_default().push(chunk);
        }
        Ok(())
    }

    async fn upsert_document_vector(
        &self,
        vector: DocumentVectorRecord,
    ) -> Result<(), PipelineError> {
        self.inner.write().vectors.insert(vector.document_id, vector);
        Ok(())
    }

    async fn fetch_document_vector(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentVectorRecord>, PipelineError> {
        Ok(self.inner.read().vectors.get(&id).cloned())
    }

    async fn coarse_recall(
        &self,
        query: &[f32],
        doc_type: Option<DocType>,
        filters: &Facets,
        limit: usize,
    ) -> Result<Vec<DocumentId>, PipelineError> {
        let inner = self.inner.read();
        let mut scored: Vec<(DocumentId, f32)> = inner
            .vectors
            .values()
            .filter_map(|vector| {
                let document = inner.documents.get(&vector.document_id)?;
                if let Some(wanted) = doc_type {
                    if document.doc_type != wanted {
                        return None;
                    }
                }
                if !facets_contain(&document.facets, filters) {
                    return None;
                }
                Some((vector.document_id, l2_distance(&vector.embedding, query)))
            })
            .collect();

        // Tie-break on id so recall order is reproducible across runs.
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(scored.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    async fn chunks_for_documents(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ChunkRecord>, PipelineError> {
        let inner = self.inner.read();
        let mut result = Vec::new();
        for id in ids {
            if let Some(chunks) = inner.chunks.get(id) {
                result.extend(chunks.iter().cloned());
            }
        }
        Ok(result)
    }

    async fn fetch_documents(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<DocumentRecord>, PipelineError> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.documents.get(id).cloned())
            .collect())
    }

    async fn refresh_lexical_index(&self) -> Result<(), PipelineError> {
        self.inner.write().lexical_refreshes += 1;
        Ok(())
    }
}

#[async_trait]
impl LexicalRanker for MemoryStore {
    async fn rank(
        &self,
        query: &str,
        candidates: &[DocumentId],
    ) -> Result<Vec<(DocumentId, f32)>, PipelineError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let mut scored = Vec::new();
        for id in candidates {
            let Some(chunks) = inner.chunks.get(id) else {
                continue;
            };
            let mut doc_terms: Vec<String> = chunks.iter().flat_map(|c| terms(&c.text)).collect();
            if let Some(document) = inner.documents.get(id) {
                if let Some(title) = &document.title {
                    doc_terms.extend(terms(title));
                }
                if let Some(description) = &document.description {
                    doc_terms.extend(terms(description));
                }
            }
            let hits = doc_terms
                .iter()
                .filter(|term| query_terms.contains(term))
                .count();
            if hits > 0 {
                scored.push((*id, hits as f32));
            }
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn document(doc_type: DocType, source_id: &str, facets: Facets) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            id: Uuid::new_v4(),
            doc_type,
            source_id: source_id.to_string(),
            version: 1,
            title: None,
            description: None,
            facets,
            created_at: now,
            updated_at: now,
        }
    }

    fn vector(document_id: DocumentId, embedding: Vec<f32>) -> DocumentVectorRecord {
        DocumentVectorRecord {
            document_id,
            method: "weighted-mean".to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn coarse_recall_orders_by_distance() {
        let store = MemoryStore::new();
        let near = document(DocType::Plan, "near", Facets::new());
        let far = document(DocType::Plan, "far", Facets::new());
        let near_id = near.id;
        let far_id = far.id;

        store.insert_document(near).await.unwrap();
        store.insert_document(far).await.unwrap();
        store
            .upsert_document_vector(vector(near_id, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_document_vector(vector(far_id, vec![-1.0, 0.0]))
            .await
            .unwrap();

        let recalled = store
            .coarse_recall(&[0.9, 0.0], None, &Facets::new(), 10)
            .await
            .unwrap();
        assert_eq!(recalled, vec![near_id, far_id]);
    }

    #[tokio::test]
    async fn coarse_recall_applies_type_and_facet_filters() {
        let store = MemoryStore::new();
        let mut facets = Facets::new();
        facets.insert("sport".to_string(), serde_json::json!("hockey"));
        facets.insert("level".to_string(), serde_json::json!("u12"));

        let matching = document(DocType::Video, "v1", facets.clone());
        let wrong_type = document(DocType::Plan, "p1", facets);
        let wrong_facet = document(DocType::Video, "v2", Facets::new());
        let matching_id = matching.id;

        for doc in [matching, wrong_type, wrong_facet] {
            let id = doc.id;
            store.insert_document(doc).await.unwrap();
            store
                .upsert_document_vector(vector(id, vec![0.0, 0.0]))
                .await
                .unwrap();
        }

        let mut filters = Facets::new();
        filters.insert("sport".to_string(), serde_json::json!("hockey"));

        let recalled = store
            .coarse_recall(&[0.0, 0.0], Some(DocType::Video), &filters, 10)
            .await
            .unwrap();
        assert_eq!(recalled, vec![matching_id]);
    }

    #[tokio::test]
    async fn lexical_rank_returns_scored_subset() {
        let store = MemoryStore::new();
        let with_match = document(DocType::Plan, "p1", Facets::new());
        let without_match = document(DocType::Plan, "p2", Facets::new());
        let with_id = with_match.id;
        let without_id = without_match.id;

        store.insert_document(with_match).await.unwrap();
        store.insert_document(without_match).await.unwrap();
        store
            .insert_chunks(vec![ChunkRecord {
                id: Uuid::new_v4(),
                document_id: with_id,
                field: "Title".to_string(),
                chunk_index: 0,
                text: "Title: Passing drill under pressure".to_string(),
                char_count: 35,
                embedding: vec![0.0],
            }])
            .await
            .unwrap();

        let ranked = store
            .rank("passing drill", &[with_id, without_id])
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, with_id);
        assert!(ranked[0].1 > 0.0);
    }
}
