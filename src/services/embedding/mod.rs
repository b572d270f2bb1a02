//! Embedding generation with concurrent fan-out and a query cache.

mod cache;
mod http;

pub use cache::{CacheStats, EmbeddingCache};
pub use http::HttpEmbedder;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::EmbeddingError;

/// Capability that turns one text into one embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimensionality of the vectors this provider produces.
    fn dimension(&self) -> usize;

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Validates provider output and memoizes single-text embeddings.
///
/// Every returned vector has exactly [`EmbeddingGenerator::dimension`] components.
pub struct EmbeddingGenerator {
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
    dimension: usize,
}

impl EmbeddingGenerator {
    pub fn new(embedder: Arc<dyn Embedder>, cache: EmbeddingCache) -> Self {
        let dimension = embedder.dimension();
        Self {
            embedder,
            cache,
            dimension,
        }
    }

    pub fn with_capacity(embedder: Arc<dyn Embedder>, cache_capacity: usize) -> Self {
        Self::new(embedder, EmbeddingCache::new(cache_capacity))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Embed one text, reading through the cache.
    ///
    /// Repeated calls with identical text return the cached vector without
    /// calling the provider again.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(hit) = self.cache.get(text) {
            debug!(chars = text.len(), "embedding cache hit");
            return Ok(hit.to_vec());
        }

        let vector = self.embed_checked(text).await?;
        let stored = self.cache.insert(text.to_string(), Arc::from(vector));
        Ok(stored.to_vec())
    }

    /// Embed all texts concurrently; output is positionally aligned with input.
    ///
    /// Fails as a whole if any single call fails. Batch results are not cached.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), "embedding batch");
        try_join_all(texts.iter().map(|text| self.embed_checked(text))).await
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Embeds text as `[len, first byte, index]`, sleeping longer for shorter
    /// texts so completions arrive out of order.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
        dimension: usize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                dimension: 3,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = 30u64.saturating_sub(text.len() as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.fail_on == Some(text) {
                return Err(EmbeddingError::ServerError("status 500: boom".to_string()));
            }
            let first = text.bytes().next().unwrap_or(0) as f32;
            let mut v = vec![text.len() as f32, first, 1.0];
            v.truncate(self.dimension);
            Ok(v)
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_embed_many_is_positionally_aligned() {
        let generator = EmbeddingGenerator::with_capacity(Arc::new(CountingEmbedder::new()), 10);
        let texts: Vec<String> = ["a", "bbbb", "cc", "ddddddddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let vectors = generator.embed_many(&texts).await.unwrap();
        assert_eq!(vectors.len(), texts.len());
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector.len(), 3);
            assert_eq!(vector[0], text.len() as f32);
        }
    }

    #[tokio::test]
    async fn test_embed_many_empty() {
        let generator = EmbeddingGenerator::with_capacity(Arc::new(CountingEmbedder::new()), 10);
        assert!(generator.embed_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_many_fails_as_a_unit() {
        let embedder = CountingEmbedder {
            fail_on: Some("bad"),
            ..CountingEmbedder::new()
        };
        let generator = EmbeddingGenerator::with_capacity(Arc::new(embedder), 10);
        let texts = vec!["good".to_string(), "bad".to_string(), "fine".to_string()];
        let result = generator.embed_many(&texts).await;
        assert!(matches!(result, Err(EmbeddingError::ServerError(_))));
    }

    #[tokio::test]
    async fn test_embed_one_uses_cache() {
        let embedder = Arc::new(CountingEmbedder::new());
        let generator = EmbeddingGenerator::with_capacity(embedder.clone(), 10);

        let first = generator.embed_one("what is rust").await.unwrap();
        let second = generator.embed_one("what is rust").await.unwrap();

        assert_eq!(first, second);
        assert!(
            first
                .iter()
                .zip(&second)
                .all(|(a, b)| a.to_bits() == b.to_bits())
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(generator.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let embedder = CountingEmbedder {
            dimension: 2,
            ..CountingEmbedder::new()
        };
        let generator = EmbeddingGenerator::with_capacity(Arc::new(embedder), 10);
        let result = generator.embed_one("short").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(generator.cache_stats().size, 0);
    }
}
