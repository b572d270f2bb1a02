//! Language model invocation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::GenerationError;
use crate::models::LlmConfig;

/// Capability that completes a prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;

    async fn health_check(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Ollama `/api/generate` client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else if e.is_connect() {
                    GenerationError::ConnectionError(e.to_string())
                } else {
                    GenerationError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::InvalidResponse(e.to_string())
            }
        })?;

        body.response
            .ok_or_else(|| GenerationError::InvalidResponse("missing `response` field".to_string()))
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GenerationError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationError::ServerError(format!(
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

/// Sends a rendered prompt to the language model, once, and returns the answer.
pub struct GenerationInvoker {
    model: Arc<dyn LanguageModel>,
}

impl GenerationInvoker {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Complete `prompt`. Blank completions are reported as failures.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let start = Instant::now();
        let answer = self.model.complete(prompt).await.map_err(|e| {
            error!(model = self.model.model_name(), error = %e, "LLM query failed");
            e
        })?;

        if answer.trim().is_empty() {
            error!(
                model = self.model.model_name(),
                "LLM returned an empty response"
            );
            return Err(GenerationError::EmptyResponse);
        }

        debug!(
            model = self.model.model_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated answer"
        );
        Ok(answer)
    }
}
