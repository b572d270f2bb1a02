use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::debug;

use super::{StoreStats, VectorStore, active_filter, check_top_k};
use crate::error::StoreError;
use crate::models::{
    ChunkEmbedding, DocumentId, DocumentSummary, NewDocument, SimilarityResult, VectorStoreConfig,
};

/// Planner setting that forces an exact scan for filtered searches.
///
/// HNSW applies the title filter after the index scan, so a selective filter
/// can come back short of `top_k` even when eligible chunks exist.
const EXACT_SCAN: &str = "SET LOCAL enable_indexscan = off";

pub struct PgVectorStore {
    pool: PgPool,
    embedding_dim: usize,
}

impl PgVectorStore {
    pub async fn connect(
        config: &VectorStoreConfig,
        embedding_dim: usize,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        debug!(url = %config.redacted_url(), embedding_dim, "connected to postgres");
        Ok(Self::from_pool(pool, embedding_dim))
    }

    pub fn from_pool(pool: PgPool, embedding_dim: usize) -> Self {
        Self {
            pool,
            embedding_dim,
        }
    }

    async fn ensure_extension(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StoreError::ExtensionError(format!(
                    "pgvector extension is not available ({e}). Run: CREATE EXTENSION vector;"
                ))
            })?;
        Ok(())
    }

    fn check_chunks(&self, chunks: &[ChunkEmbedding]) -> Result<(), StoreError> {
        chunks
            .iter()
            .try_for_each(|chunk| self.check_dimension(&chunk.embedding))
            .map_err(StoreError::WriteError)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), String> {
        if vector.len() != self.embedding_dim {
            return Err(format!(
                "vector has dimension {}, expected {}",
                vector.len(),
                self.embedding_dim
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.ensure_extension().await?;

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                title VARCHAR(255),
                file_path TEXT NOT NULL,
                content TEXT NOT NULL,
                doc_metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
            .to_string(),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS document_embeddings (
                    id BIGSERIAL PRIMARY KEY,
                    document_id BIGINT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                    chunk_index INTEGER NOT NULL,
                    embedding vector({}) NOT NULL,
                    chunk_text TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    UNIQUE (document_id, chunk_index)
                )
                "#,
                self.embedding_dim
            ),
            "CREATE INDEX IF NOT EXISTS document_embeddings_embedding_idx \
             ON document_embeddings USING hnsw (embedding vector_cosine_ops)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS documents_title_idx ON documents (title)".to_string(),
        ];

        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::SchemaError(e.to_string()))?;
        }

        Ok(())
    }

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        let id = write_document(&mut conn, &document).await?;
        debug!(document_id = id, "inserted document");
        Ok(id)
    }

    async fn insert_chunks(
        &self,
        document_id: DocumentId,
        chunks: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.check_chunks(chunks)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        write_chunks(&mut tx, document_id, chunks).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        debug!(document_id, count = chunks.len(), "inserted chunks");
        Ok(())
    }

    async fn insert_document_with_chunks(
        &self,
        document: NewDocument,
        chunks: &[ChunkEmbedding],
    ) -> Result<DocumentId, StoreError> {
        self.check_chunks(chunks)?;

        // Dropping the transaction before commit rolls both writes back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        let document_id = write_document(&mut tx, &document).await?;
        write_chunks(&mut tx, document_id, chunks).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        debug!(
            document_id,
            count = chunks.len(),
            "inserted document with chunks"
        );
        Ok(document_id)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_titles: Option<&[String]>,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        check_top_k(top_k)?;
        self.check_dimension(query).map_err(StoreError::QueryError)?;

        let titles: Option<Vec<String>> = active_filter(document_titles).map(<[String]>::to_vec);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        if let Some(setting) = scan_setting(titles.as_deref()) {
            sqlx::query(setting)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryError(e.to_string()))?;
        }

        let rows = sqlx::query(
            r#"
            SELECT
                e.id AS chunk_id,
                d.title AS title,
                e.chunk_text AS chunk_text,
                1 - (e.embedding <=> $1) AS similarity
            FROM document_embeddings e
            JOIN documents d ON d.id = e.document_id
            WHERE $3::text[] IS NULL OR d.title = ANY($3)
            ORDER BY e.embedding <=> $1, e.id ASC
            LIMIT $2
            "#,
        )
        .bind(Vector::from(query.to_vec()))
        .bind(top_k as i64)
        .bind(titles)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryError(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row: PgRow| SimilarityResult {
                chunk_id: row.get("chunk_id"),
                document_title: row.get("title"),
                chunk_text: row.get("chunk_text"),
                similarity: row.get("similarity"),
            })
            .collect())
    }

    async fn delete_document(&self, document_id: DocumentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_chunks(&self, document_id: DocumentId) -> Result<u64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM document_embeddings WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(row.0 as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM documents), (SELECT COUNT(*) FROM document_embeddings)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(StoreStats {
            documents: row.0 as u64,
            chunks: row.1 as u64,
        })
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.title, d.file_path, d.created_at, COUNT(e.id) AS chunk_count
            FROM documents d
            LEFT JOIN document_embeddings e ON e.document_id = d.id
            GROUP BY d.id
            ORDER BY d.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row: PgRow| {
                let chunk_count: i64 = row.get("chunk_count");
                let created_at: DateTime<Utc> = row.get("created_at");
                DocumentSummary {
                    id: row.get("id"),
                    title: row.get("title"),
                    path: row.get("file_path"),
                    chunk_count: chunk_count as u64,
                    created_at,
                }
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}

/// Session setting needed before a search with `titles` as its filter.
fn scan_setting(titles: Option<&[String]>) -> Option<&'static str> {
    titles.map(|_| EXACT_SCAN)
}

async fn write_document(
    conn: &mut PgConnection,
    document: &NewDocument,
) -> Result<DocumentId, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO documents (title, file_path, content, doc_metadata)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&document.title)
    .bind(&document.path)
    .bind(&document.content)
    .bind(&document.metadata)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| StoreError::WriteError(e.to_string()))?;

    Ok(row.get("id"))
}

async fn write_chunks(
    conn: &mut PgConnection,
    document_id: DocumentId,
    chunks: &[ChunkEmbedding],
) -> Result<(), StoreError> {
    for (index, chunk) in chunks.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO document_embeddings (document_id, chunk_index, embedding, chunk_text)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(document_id)
        .bind(index as i32)
        .bind(Vector::from(chunk.embedding.clone()))
        .bind(&chunk.text)
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::WriteError(e.to_string()))?;
    }
    Ok(())
}
