mod chunker;
mod context;
mod embedding;
mod generation;
mod pipeline;
mod vector_store;

pub use chunker::{HfTokenizer, TextChunker, TextTokenizer, WhitespaceTokenizer};
pub use context::{ContextAssembler, QA_TEMPLATE, UNKNOWN_MARKER};
pub use embedding::{CacheStats, Embedder, EmbeddingCache, EmbeddingGenerator, HttpEmbedder};
pub use generation::{GenerationInvoker, LanguageModel, OllamaClient};
pub use pipeline::{IngestRequest, RagPipeline};
pub use vector_store::{InMemoryStore, PgVectorStore, StoreStats, VectorStore, create_backend};
