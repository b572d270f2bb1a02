//! In-memory store using exact cosine similarity.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreStats, VectorStore, active_filter, check_top_k};
use crate::error::StoreError;
use crate::models::{
    Chunk, ChunkEmbedding, Document, DocumentId, DocumentSummary, NewDocument, SimilarityResult,
};

/// Process-local store with the same ordering, filtering and cascade rules as
/// the PostgreSQL backend. Ids are assigned monotonically from 1.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<DocumentId, Document>,
    chunks: BTreeMap<i64, Chunk>,
    next_document_id: DocumentId,
    next_chunk_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    fn add_document(&mut self, document: NewDocument) -> DocumentId {
        self.next_document_id += 1;
        let id = self.next_document_id;
        self.documents.insert(
            id,
            Document {
                id,
                title: document.title,
                path: document.path,
                content: document.content,
                metadata: document.metadata,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn add_chunks(
        &mut self,
        document_id: DocumentId,
        chunks: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        if !self.documents.contains_key(&document_id) {
            return Err(StoreError::UnknownDocument(document_id));
        }
        if !chunks.is_empty() && self.chunks.values().any(|c| c.document_id == document_id) {
            return Err(StoreError::WriteError(format!(
                "document {document_id} already has chunks"
            )));
        }

        let created_at = Utc::now();
        for (index, chunk) in chunks.iter().enumerate() {
            self.next_chunk_id += 1;
            let id = self.next_chunk_id;
            self.chunks.insert(
                id,
                Chunk {
                    id,
                    document_id,
                    chunk_index: index as u32,
                    text: chunk.text.clone(),
                    embedding: chunk.embedding.clone(),
                    created_at,
                },
            );
        }
        Ok(())
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        Ok(self.state.write().await.add_document(document))
    }

    async fn insert_chunks(
        &self,
        document_id: DocumentId,
        chunks: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        self.state.write().await.add_chunks(document_id, chunks)
    }

    async fn insert_document_with_chunks(
        &self,
        document: NewDocument,
        chunks: &[ChunkEmbedding],
    ) -> Result<DocumentId, StoreError> {
        let mut state = self.state.write().await;
        let document_id = state.add_document(document);
        if let Err(e) = state.add_chunks(document_id, chunks) {
            state.documents.remove(&document_id);
            return Err(e);
        }
        Ok(document_id)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_titles: Option<&[String]>,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        check_top_k(top_k)?;
        let filter = active_filter(document_titles);
        let state = self.state.read().await;

        let mut scored: Vec<SimilarityResult> = state
            .chunks
            .values()
            .filter_map(|chunk| {
                let title = state.documents.get(&chunk.document_id)?.title.clone();
                if let Some(titles) = filter
                    && !title.as_ref().is_some_and(|t| titles.contains(t))
                {
                    return None;
                }
                Some(SimilarityResult {
                    chunk_id: chunk.id,
                    document_title: title,
                    chunk_text: chunk.text.clone(),
                    similarity: cosine_similarity(query, &chunk.embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_document(&self, document_id: DocumentId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.documents.remove(&document_id).is_none() {
            return Ok(false);
        }
        state.chunks.retain(|_, c| c.document_id != document_id);
        Ok(true)
    }

    async fn count_chunks(&self, document_id: DocumentId) -> Result<u64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .count() as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let state = self.state.read().await;
        Ok(StoreStats {
            documents: state.documents.len() as u64,
            chunks: state.chunks.len() as u64,
        })
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .map(|doc| DocumentSummary {
                id: doc.id,
                title: doc.title.clone(),
                path: doc.path.clone(),
                chunk_count: state
                    .chunks
                    .values()
                    .filter(|c| c.document_id == doc.id)
                    .count() as u64,
                created_at: doc.created_at,
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
