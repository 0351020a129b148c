//! Embedding client for query vectorization

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::EmbeddingsConfig;
use crate::errors::EduragError;
use crate::errors::Result;

/// Turns query text into a dense vector for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// HTTP embedding client speaking the Ollama embeddings API.
pub struct EmbeddingClient {
    model: String,
    endpoint: String,
    dimension: usize,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| EduragError::Http(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            dimension: config.dimension,
            client,
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// Generate an embedding for a single text
    ///
    /// # Errors
    /// - API request failures (network errors, timeouts)
    /// - Invalid API responses (malformed JSON, wrong embedding dimension)
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling embeddings API: {}", url);

        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EduragError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EduragError::Embedding(format!(
                "Embedding API error ({status}): {error_text}"
            )));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EduragError::Embedding(format!("Failed to parse response: {e}")))?;

        if self.dimension > 0 && result.embedding.len() != self.dimension {
            return Err(EduragError::Embedding(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                result.embedding.len()
            )));
        }

        Ok(result.embedding)
    }
}
