//! End-to-end pipeline behavior against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ragpipe::error::{EmbeddingError, GenerationError, PipelineError, StoreError};
use ragpipe::models::{ChunkEmbedding, DocumentId, DocumentSummary, NewDocument, SimilarityResult};
use ragpipe::services::{
    ContextAssembler, Embedder, EmbeddingGenerator, GenerationInvoker, InMemoryStore,
    IngestRequest, LanguageModel, RagPipeline, StoreStats, TextChunker, UNKNOWN_MARKER,
    VectorStore, WhitespaceTokenizer,
};

/// Embeds text as per-word counts over a fixed vocabulary, plus one slot
/// counting every other word.
struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordEmbedder {
    fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&["apple"])
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        let mut vector = vec![0.0; self.dimension()];
        for word in text.split_whitespace() {
            let slot = self
                .vocabulary
                .iter()
                .position(|v| *v == word)
                .unwrap_or(self.vocabulary.len());
            vector[slot] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

/// Records every prompt and answers with a fixed reply.
struct RecordingModel {
    reply: Result<&'static str, ()>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    fn replying(reply: &'static str) -> Self {
        Self {
            reply: Ok(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .map(str::to_string)
            .map_err(|_| GenerationError::Timeout)
    }
}

/// Delegates to an in-memory store but refuses every chunk write.
#[derive(Default)]
struct RejectingChunkStore {
    inner: InMemoryStore,
}

#[async_trait]
impl VectorStore for RejectingChunkStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.inner.ensure_schema().await
    }

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        self.inner.insert_document(document).await
    }

    async fn insert_chunks(
        &self,
        _document_id: DocumentId,
        _chunks: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        Err(StoreError::WriteError("disk full".to_string()))
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_titles: Option<&[String]>,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        self.inner.search(query, top_k, document_titles).await
    }

    async fn delete_document(&self, document_id: DocumentId) -> Result<bool, StoreError> {
        self.inner.delete_document(document_id).await
    }

    async fn count_chunks(&self, document_id: DocumentId) -> Result<u64, StoreError> {
        self.inner.count_chunks(document_id).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        self.inner.list_documents().await
    }

    fn backend_name(&self) -> &'static str {
        "rejecting"
    }
}

fn pipeline_with(
    chunk_size: usize,
    overlap: usize,
    embedder: Arc<KeywordEmbedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<RecordingModel>,
) -> RagPipeline {
    let chunker = TextChunker::new(Box::new(WhitespaceTokenizer::new()), chunk_size, overlap)
        .expect("valid chunker");
    RagPipeline::new(
        chunker,
        EmbeddingGenerator::with_capacity(embedder, 100),
        store,
        ContextAssembler::default(),
        GenerationInvoker::new(model),
    )
}

fn words(word: &str, n: usize) -> Vec<String> {
    vec![word.to_string(); n]
}

/// 512 "apple" tokens followed by 88 "zebra" tokens.
fn six_hundred_tokens() -> String {
    let mut tokens = words("apple", 512);
    tokens.extend(words("zebra", 88));
    tokens.join(" ")
}

#[tokio::test]
async fn test_600_tokens_ingest_two_chunks_and_retrieve_the_second() {
    let embedder = Arc::new(KeywordEmbedder::new(&["apple", "zebra"]));
    let pipeline = pipeline_with(
        512,
        50,
        embedder,
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingModel::replying("ok")),
    );

    let outcome = pipeline
        .ingest(IngestRequest::new(six_hundred_tokens()).with_title("Zoo"))
        .await
        .unwrap();
    assert_eq!(outcome.chunks_created, 2);
    assert_eq!(outcome.status, "success");

    let results = pipeline.retrieve("zebra", 1, None).await.unwrap();
    assert_eq!(results.len(), 1);
    let top = &results[0];
    assert!(top.similarity > 0.0);
    assert_eq!(top.document_title.as_deref(), Some("Zoo"));
    assert!(top.chunk_text.ends_with("zebra"));
    assert_eq!(top.chunk_text.split_whitespace().count(), 138);
}

#[tokio::test]
async fn test_unknown_document_filter_returns_empty() {
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple", "zebra"])),
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingModel::replying("ok")),
    );
    pipeline
        .ingest(IngestRequest::new(six_hundred_tokens()).with_title("Zoo"))
        .await
        .unwrap();

    let filter = vec!["Nonexistent".to_string()];
    let results = pipeline
        .retrieve("zebra", 3, Some(filter.as_slice()))
        .await
        .unwrap();
    assert!(results.is_empty());

    let filter = vec!["Zoo".to_string()];
    let results = pipeline
        .retrieve("zebra", 3, Some(filter.as_slice()))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].similarity >= results[1].similarity);
}

#[tokio::test]
async fn test_answer_without_matches_still_calls_the_model() {
    let model = Arc::new(RecordingModel::replying(UNKNOWN_MARKER));
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        Arc::new(InMemoryStore::new()),
        model.clone(),
    );

    let answer = pipeline.answer("Who painted it?", None).await.unwrap();
    assert_eq!(answer.query, "Who painted it?");
    assert_eq!(answer.answer, UNKNOWN_MARKER);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("---------------------\n\n---------------------"));
    assert!(prompts[0].contains("Who painted it?"));
}

#[tokio::test]
async fn test_answer_puts_ranked_chunks_in_the_prompt() {
    let model = Arc::new(RecordingModel::replying("Zebras are striped."));
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple", "zebra"])),
        Arc::new(InMemoryStore::new()),
        model.clone(),
    );
    pipeline
        .ingest(IngestRequest::new("zebra stripes").with_title("Zebras"))
        .await
        .unwrap();

    let answer = pipeline.answer("zebra", None).await.unwrap();
    assert_eq!(answer.answer, "Zebras are striped.");
    assert!(model.prompts()[0].contains("zebra stripes"));
}

#[tokio::test]
async fn test_delete_removes_all_chunks() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_with(
        10,
        2,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        store.clone(),
        Arc::new(RecordingModel::replying("ok")),
    );

    let outcome = pipeline
        .ingest(IngestRequest::new(words("apple", 40).join(" ")))
        .await
        .unwrap();
    assert_eq!(outcome.chunks_created, 5);
    assert_eq!(store.count_chunks(outcome.document_id).await.unwrap(), 5);

    assert!(pipeline.delete_document(outcome.document_id).await.unwrap());
    assert_eq!(store.count_chunks(outcome.document_id).await.unwrap(), 0);
    assert_eq!(store.stats().await.unwrap(), StoreStats::default());
}

#[tokio::test]
async fn test_chunk_write_failure_rolls_back_the_document() {
    let store = Arc::new(RejectingChunkStore::default());
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        store.clone(),
        Arc::new(RecordingModel::replying("ok")),
    );

    let err = pipeline
        .ingest(IngestRequest::new("apple pie recipe").with_title("Recipes"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::StorageWriteFailed(_)));
    assert_eq!(store.stats().await.unwrap().documents, 0);
}

#[tokio::test]
async fn test_embedding_failure_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::failing()),
        store.clone(),
        Arc::new(RecordingModel::replying("ok")),
    );

    let err = pipeline
        .ingest(IngestRequest::new("apple pie recipe"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmbeddingUnavailable(_)));
    let message = err.public_message();
    assert_eq!(message, "The embedding service is unavailable.");
    assert_eq!(store.stats().await.unwrap(), StoreStats::default());
}

#[tokio::test]
async fn test_empty_text_stores_document_without_chunks() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        store.clone(),
        Arc::new(RecordingModel::replying("ok")),
    );

    let outcome = pipeline.ingest(IngestRequest::new("   ")).await.unwrap();
    assert_eq!(outcome.chunks_created, 0);

    let documents = store.list_documents().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].chunk_count, 0);
    assert!(documents[0].path.starts_with("storage/"));
}

#[tokio::test]
async fn test_zero_top_k_is_a_configuration_error() {
    let embedder = Arc::new(KeywordEmbedder::new(&["apple"]));
    let pipeline = pipeline_with(
        512,
        50,
        embedder.clone(),
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingModel::replying("ok")),
    );

    let err = pipeline.retrieve("apple", 0, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn test_non_object_metadata_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        store.clone(),
        Arc::new(RecordingModel::replying("ok")),
    );

    let metadata = serde_json::json!(["not", "an", "object"]);
    let err = pipeline
        .ingest(IngestRequest::new("apple").with_metadata(metadata))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(store.stats().await.unwrap().documents, 0);
}

#[tokio::test]
async fn test_repeated_queries_hit_the_cache() {
    let embedder = Arc::new(KeywordEmbedder::new(&["apple", "zebra"]));
    let pipeline = pipeline_with(
        512,
        50,
        embedder.clone(),
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingModel::replying("ok")),
    );
    pipeline
        .ingest(IngestRequest::new("apple zebra"))
        .await
        .unwrap();
    let after_ingest = embedder.calls();

    let first = pipeline.retrieve("zebra", 2, None).await.unwrap();
    let second = pipeline.retrieve("zebra", 2, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(embedder.calls(), after_ingest + 1);
}

#[tokio::test]
async fn test_generation_failure_is_reported_generically() {
    let pipeline = pipeline_with(
        512,
        50,
        Arc::new(KeywordEmbedder::new(&["apple"])),
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingModel::failing()),
    );

    let err = pipeline.answer("apple?", None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::GenerationFailed(GenerationError::Timeout)
    ));
    assert_eq!(err.public_message(), "Failed to generate an answer.");
}
