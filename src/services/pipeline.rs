//! Ingestion, retrieval and answering entrypoints.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use super::chunker::TextChunker;
use super::context::ContextAssembler;
use super::embedding::EmbeddingGenerator;
use super::generation::GenerationInvoker;
use super::vector_store::VectorStore;
use crate::error::PipelineError;
use crate::models::{
    Answer, ChunkEmbedding, DEFAULT_TOP_K, DocumentId, IngestOutcome, NewDocument,
    SimilarityResult,
};

/// A document to ingest. `text` is already extracted plain text.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub title: Option<String>,
    pub path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub text: String,
}

impl IngestRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Composes the chunker, embedding generator, store, context assembler and
/// generation invoker. Every collaborator is injected.
pub struct RagPipeline {
    chunker: TextChunker,
    embeddings: EmbeddingGenerator,
    store: Arc<dyn VectorStore>,
    assembler: ContextAssembler,
    generator: GenerationInvoker,
    default_top_k: usize,
}

impl RagPipeline {
    pub fn new(
        chunker: TextChunker,
        embeddings: EmbeddingGenerator,
        store: Arc<dyn VectorStore>,
        assembler: ContextAssembler,
        generator: GenerationInvoker,
    ) -> Self {
        Self {
            chunker,
            embeddings,
            store,
            assembler,
            generator,
            default_top_k: DEFAULT_TOP_K as usize,
        }
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embeddings(&self) -> &EmbeddingGenerator {
        &self.embeddings
    }

    pub fn generator(&self) -> &GenerationInvoker {
        &self.generator
    }

    /// Chunk, embed and store a document.
    ///
    /// All embeddings are computed before the first write, and the document
    /// and its chunks are stored together, so a failed ingestion leaves
    /// nothing behind.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, PipelineError> {
        let start = Instant::now();

        let metadata = match request.metadata {
            None => serde_json::Value::Object(serde_json::Map::new()),
            Some(value @ serde_json::Value::Object(_)) => value,
            Some(_) => {
                return Err(PipelineError::Configuration(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        };

        let chunks = self.chunker.split(&request.text)?;
        debug!(chunks = chunks.len(), "split document");

        let vectors = self.embeddings.embed_many(&chunks).await.map_err(|e| {
            error!(error = %e, "failed to embed document chunks");
            PipelineError::EmbeddingUnavailable(e)
        })?;

        let records: Vec<ChunkEmbedding> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, embedding)| ChunkEmbedding::new(text, embedding))
            .collect();

        let path = request.path.unwrap_or_else(NewDocument::generate_path);
        let document = NewDocument::new(request.title, path, request.text).with_metadata(metadata);

        let document_id = self
            .store
            .insert_document_with_chunks(document, &records)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to store document");
                PipelineError::StorageWriteFailed(e)
            })?;

        info!(
            document_id,
            chunks = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ingested document"
        );
        Ok(IngestOutcome::success(document_id, records.len()))
    }

    /// Rank stored chunks against `query`.
    ///
    /// Scores are returned at full precision. A title filter that matches
    /// nothing gives an empty result.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        document_titles: Option<&[String]>,
    ) -> Result<Vec<SimilarityResult>, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::Configuration(
                "top_k must be at least 1".to_string(),
            ));
        }

        let query_vector = self.embeddings.embed_one(query).await.map_err(|e| {
            error!(error = %e, "failed to embed query");
            PipelineError::EmbeddingUnavailable(e)
        })?;

        let results = self
            .store
            .search(&query_vector, top_k, document_titles)
            .await
            .map_err(|e| {
                error!(error = %e, "similarity search failed");
                PipelineError::StorageReadFailed(e)
            })?;

        debug!(top_k, results = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Retrieve context for `query` and ask the language model.
    ///
    /// Generation runs even when nothing was retrieved.
    pub async fn answer(
        &self,
        query: &str,
        document_titles: Option<&[String]>,
    ) -> Result<Answer, PipelineError> {
        let results = self
            .retrieve(query, self.default_top_k, document_titles)
            .await?;
        let prompt = self.assembler.assemble(query, &results);

        let answer = self.generator.generate(&prompt).await?;
        Ok(Answer {
            query: query.to_string(),
            answer,
        })
    }

    /// Delete a document and its chunks. Returns `false` if it did not exist.
    pub async fn delete_document(&self, document_id: DocumentId) -> Result<bool, PipelineError> {
        let deleted = self
            .store
            .delete_document(document_id)
            .await
            .map_err(PipelineError::StorageWriteFailed)?;

        if deleted {
            info!(document_id, "deleted document");
        }
        Ok(deleted)
    }
}
