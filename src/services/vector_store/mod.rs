//! Vector store abstraction layer.
//!
//! This module provides a trait-based abstraction over the document and chunk
//! store (PostgreSQL/pgvector, or in-process memory) selected by configuration.

mod memory;
mod pgvector;

pub use memory::InMemoryStore;
pub use pgvector::PgVectorStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::models::{
    ChunkEmbedding, DocumentId, DocumentSummary, NewDocument, SimilarityResult, VectorDriver,
    VectorStoreConfig,
};

/// Document and chunk totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: u64,
    pub chunks: u64,
}

/// Abstract trait for document and chunk persistence with similarity search.
///
/// Implementations hold no cross-call locks; an ingestion spanning
/// `insert_document` and `insert_chunks` is coordinated by the caller.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Create tables and indexes if they do not exist.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert a document in one atomic write and return its new identifier.
    async fn insert_document(&self, document: NewDocument) -> Result<DocumentId, StoreError>;

    /// Insert all chunks of a document in one atomic write.
    ///
    /// A chunk's ordinal is its position in `chunks`.
    async fn insert_chunks(
        &self,
        document_id: DocumentId,
        chunks: &[ChunkEmbedding],
    ) -> Result<(), StoreError>;

    /// Insert a document together with all of its chunks.
    ///
    /// Either everything is stored or nothing is. This default writes the
    /// document first and deletes it again when the chunk write fails;
    /// backends that can write both in one transaction override it.
    async fn insert_document_with_chunks(
        &self,
        document: NewDocument,
        chunks: &[ChunkEmbedding],
    ) -> Result<DocumentId, StoreError> {
        let document_id = self.insert_document(document).await?;

        if let Err(e) = self.insert_chunks(document_id, chunks).await {
            error!(document_id, error = %e, "failed to insert chunks, rolling back document");
            if let Err(rollback) = self.delete_document(document_id).await {
                warn!(
                    document_id,
                    error = %rollback,
                    "rollback of partially ingested document failed"
                );
            }
            return Err(e);
        }

        Ok(document_id)
    }

    /// Return at most `top_k` chunks ordered by descending cosine similarity,
    /// ties broken by ascending chunk id.
    ///
    /// A non-empty `document_titles` restricts candidates to chunks whose
    /// document title is in the set. No matches is an empty result.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_titles: Option<&[String]>,
    ) -> Result<Vec<SimilarityResult>, StoreError>;

    /// Delete a document and, by cascade, its chunks.
    ///
    /// Returns `false` if no such document existed.
    async fn delete_document(&self, document_id: DocumentId) -> Result<bool, StoreError>;

    async fn count_chunks(&self, document_id: DocumentId) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// All documents, oldest first, with their chunk counts.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Backend name for status output.
    fn backend_name(&self) -> &'static str;
}

/// Create a vector store backend based on configuration.
///
/// The schema is ensured before the backend is returned.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: usize,
) -> Result<Arc<dyn VectorStore>, StoreError> {
    let store: Arc<dyn VectorStore> = match config.driver {
        VectorDriver::PostgreSQL => Arc::new(PgVectorStore::connect(config, embedding_dim).await?),
        VectorDriver::Memory => Arc::new(InMemoryStore::new()),
    };
    store.ensure_schema().await?;
    Ok(store)
}

fn check_top_k(top_k: usize) -> Result<(), StoreError> {
    if top_k == 0 {
        return Err(StoreError::InvalidTopK(top_k));
    }
    Ok(())
}

/// `None` when no title filter applies.
fn active_filter(document_titles: Option<&[String]>) -> Option<&[String]> {
    document_titles.filter(|titles| !titles.is_empty())
}
