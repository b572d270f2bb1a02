//! Error types for the retrieval pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    #[error("tokenization failed: {0}")]
    Tokenize(String),
}

/// Errors related to embedding operations.
///
/// Every variant means the embedding capability is unavailable for the
/// calling operation. Nothing in this crate retries on them.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to connect to language model: {0}")]
    ConnectionError(String),

    #[error("language model server error: {0}")]
    ServerError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("generation timeout")]
    Timeout,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ConnectionError(_) | GenerationError::Timeout => true,
            GenerationError::ServerError(msg) => is_transient_status(msg),
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GenerationError::InvalidResponse(_) | GenerationError::EmptyResponse => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("pgvector extension error: {0}")]
    ExtensionError(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("write error: {0}")]
    WriteError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("document {0} does not exist")]
    UnknownDocument(i64),

    #[error("top_k must be at least 1, got {0}")]
    InvalidTopK(usize),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionError(_) => true,
            StoreError::WriteError(msg)
            | StoreError::QueryError(msg)
            | StoreError::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
            StoreError::ExtensionError(_)
            | StoreError::SchemaError(_)
            | StoreError::UnknownDocument(_)
            | StoreError::InvalidTopK(_) => false,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Failures surfaced by the ingestion and query entrypoints.
///
/// `Display` carries the operator-facing cause; [`PipelineError::public_message`]
/// is the summary that may be shown to end users.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    #[error("generation failed: {0}")]
    GenerationFailed(#[from] GenerationError),

    #[error("storage write failed: {0}")]
    StorageWriteFailed(StoreError),

    #[error("storage read failed: {0}")]
    StorageReadFailed(StoreError),
}

impl PipelineError {
    /// Fixed human-readable summary, free of internal error text.
    pub fn public_message(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "Invalid request configuration.",
            PipelineError::EmbeddingUnavailable(_) => "The embedding service is unavailable.",
            PipelineError::GenerationFailed(_) => "Failed to generate an answer.",
            PipelineError::StorageWriteFailed(_) => "Failed to store the document.",
            PipelineError::StorageReadFailed(_) => "Failed to retrieve similar document chunks.",
        }
    }
}

impl From<ChunkError> for PipelineError {
    fn from(err: ChunkError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Configuration(_) => false,
            PipelineError::EmbeddingUnavailable(e) => e.is_retryable(),
            PipelineError::GenerationFailed(e) => e.is_retryable(),
            PipelineError::StorageWriteFailed(e) | PipelineError::StorageReadFailed(e) => {
                e.is_retryable()
            }
        }
    }
}

fn is_transient_status(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.contains("429")
        || lower.contains("unavailable")
        || lower.contains("too many requests")
}
