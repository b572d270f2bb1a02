use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a document by the store.
pub type DocumentId = i64;

/// A stored source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: Option<String>,
    pub path: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Document fields supplied at insertion time; the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: Option<String>,
    pub path: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl NewDocument {
    pub fn new(title: Option<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title,
            path: path.into(),
            content: content.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Storage reference for documents ingested without an origin path.
    pub fn generate_path() -> String {
        format!("storage/{}.txt", uuid::Uuid::new_v4())
    }
}

/// A chunk text paired with its embedding, ready to be written.
///
/// The chunk's ordinal is its position in the batch handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEmbedding {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl ChunkEmbedding {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// A stored chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: DocumentId,
    pub chunk_index: u32,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Listing entry for a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: Option<String>,
    pub path: String,
    pub chunk_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub document_id: DocumentId,
    pub status: String,
    pub message: String,
    pub chunks_created: usize,
    pub timestamp: String,
}

impl IngestOutcome {
    pub fn success(document_id: DocumentId, chunks_created: usize) -> Self {
        Self {
            document_id,
            status: "success".to_string(),
            message: "Document successfully ingested.".to_string(),
            chunks_created,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
