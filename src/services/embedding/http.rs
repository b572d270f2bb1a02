//! HTTP client for the embedding server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;
use crate::error::EmbeddingError;
use crate::models::{EmbeddingApi, EmbeddingConfig};

/// Request body for the TEI `/embed` endpoint.
#[derive(Debug, Serialize)]
struct TeiEmbedRequest<'a> {
    inputs: Vec<&'a str>,
    truncate: bool,
}

/// Response from the TEI `/embed` endpoint.
#[derive(Debug, Deserialize)]
struct TeiEmbedResponse(Vec<Vec<f32>>);

/// Request body for the Ollama `/api/embed` endpoint.
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

/// Response from the Ollama `/api/embed` endpoint.
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by a TEI or Ollama server.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api: EmbeddingApi,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api: config.api,
            model: config.model.clone(),
            dimension: config.dimension as usize,
        })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn embed_url(&self) -> String {
        match self.api {
            EmbeddingApi::Tei => format!("{}/embed", self.base_url),
            EmbeddingApi::Ollama => format!("{}/api/embed", self.base_url),
        }
    }

    fn health_url(&self) -> String {
        match self.api {
            EmbeddingApi::Tei => format!("{}/health", self.base_url),
            EmbeddingApi::Ollama => format!("{}/api/tags", self.base_url),
        }
    }

    async fn post_embed(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = match self.api {
            EmbeddingApi::Tei => {
                let body = TeiEmbedRequest {
                    inputs: vec![text],
                    truncate: true,
                };
                self.client.post(self.embed_url()).json(&body)
            }
            EmbeddingApi::Ollama => {
                let body = OllamaEmbedRequest {
                    model: &self.model,
                    input: vec![text],
                };
                self.client.post(self.embed_url()).json(&body)
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else if e.is_connect() {
                EmbeddingError::ConnectionError(e.to_string())
            } else {
                EmbeddingError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        match self.api {
            EmbeddingApi::Tei => response
                .json::<TeiEmbedResponse>()
                .await
                .map(|r| r.0)
                .map_err(|e| EmbeddingError::InvalidResponse(e.to_string())),
            EmbeddingApi::Ollama => response
                .json::<OllamaEmbedResponse>()
                .await
                .map(|r| r.embeddings)
                .map_err(|e| EmbeddingError::InvalidResponse(e.to_string())),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.post_embed(text)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        let response = self
            .client
            .get(self.health_url())
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ServerError(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
