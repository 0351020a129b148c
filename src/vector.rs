//! Vector search client
//!
//! Queries a Qdrant-style HTTP search endpoint. The hard timeout is short:
//! a slow vector service degrades the answer rather than stalling it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::VectorConfig;
use crate::errors::EduragError;
use crate::errors::Result;
use crate::models::Namespace;

/// A raw candidate returned by the vector service.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

impl SearchHit {
    /// Chunk text under any of the field names different ingestion
    /// pipelines have used. Empty when none is present.
    pub fn text(&self) -> &str {
        for key in ["text", "chunk_text", "content", "page_content"] {
            if let Some(text) = self.metadata.get(key).and_then(Value::as_str) {
                return text;
            }
        }
        ""
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }
}

/// Similarity search scoped to a namespace.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        namespace: Namespace,
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;
}

pub struct VectorClient {
    endpoint: String,
    api_key: Option<String>,
    index_name: String,
    client: Client,
}

impl VectorClient {
    /// Create a new vector search client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| EduragError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            index_name: config.index_name.clone(),
            client,
        })
    }
}

#[async_trait]
impl VectorSearch for VectorClient {
    /// Run a similarity search against the configured index
    ///
    /// # Errors
    /// - API request failures (network errors, timeouts)
    /// - Invalid API responses (malformed JSON)
    async fn search(
        &self,
        vector: &[f32],
        namespace: Namespace,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        #[derive(Serialize)]
        struct SearchRequest<'a> {
            vector: &'a [f32],
            namespace: &'a str,
            top_k: usize,
            with_metadata: bool,
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            hits: Vec<SearchHit>,
        }

        let url = format!("{}/indexes/{}/search", self.endpoint, self.index_name);
        debug!(
            "Vector search: {} (namespace={}, top_k={})",
            url,
            namespace.as_str(),
            top_k
        );

        let request = SearchRequest {
            vector,
            namespace: namespace.as_str(),
            top_k,
            with_metadata: true,
        };

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
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
            return Err(EduragError::VectorSearch(format!(
                "Vector API error ({status}): {error_text}"
            )));
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| EduragError::VectorSearch(format!("Failed to parse response: {e}")))?;

        Ok(result.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_field_alias_fallback() {
        let hit = SearchHit {
            id: "c1".to_string(),
            score: 0.5,
            metadata: json!({ "page_content": "aliased body" }),
        };
        assert_eq!(hit.text(), "aliased body");

        let hit = SearchHit {
            id: "c2".to_string(),
            score: 0.5,
            metadata: json!({ "text": "primary", "content": "shadowed" }),
        };
        assert_eq!(hit.text(), "primary");
    }

    #[test]
    fn test_missing_text_is_empty() {
        let hit = SearchHit {
            id: "c3".to_string(),
            score: 0.5,
            metadata: json!({ "source_filename": "doc.pdf" }),
        };
        assert_eq!(hit.text(), "");
    }
}
