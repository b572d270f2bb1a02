mod config;
mod document;
mod search;

pub use config::{
    ChunkingConfig, Config, DEFAULT_CACHE_CAPACITY, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_DATABASE_URL, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_MODEL,
    DEFAULT_TOP_K, EmbeddingApi, EmbeddingConfig, LlmConfig, OutputConfig, ResolvedConfig,
    RetrievalConfig, TokenizerKind, VectorDriver, VectorStoreConfig,
};
pub use document::{
    Chunk, ChunkEmbedding, Document, DocumentId, DocumentSummary, IngestOutcome, NewDocument,
};
pub use search::{
    Answer, OutputFormat, RetrievalResults, RetrievedChunk, SimilarityResult, round_similarity,
};
