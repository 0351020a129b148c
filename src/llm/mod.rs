//! Text generation client

pub mod prompts;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::errors::EduragError;
use crate::errors::Result;
use crate::llm::prompts::GenerationProfile;

/// Completion backend behind the synthesizer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, profile: &GenerationProfile) -> Result<String>;
}

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct GenerationClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GenerationClient {
    /// Create a new generation client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| EduragError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: config.llm_endpoint.clone(),
            api_key: config.llm_key.clone(),
            model: config.llm_model.clone(),
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for GenerationClient {
    /// Generate a completion for the given prompt
    ///
    /// # Errors
    /// - API request failures (network errors, timeouts, authentication failures)
    /// - Invalid API responses (malformed JSON, empty choices)
    async fn generate(&self, prompt: &str, profile: &GenerationProfile) -> Result<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!(
            "Calling generation API: {} (temperature={}, max_tokens={})",
            url, profile.temperature, profile.max_tokens
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            return Err(EduragError::Generation(format!(
                "Generation API error ({status}): {error_text}"
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| EduragError::Generation(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EduragError::Generation("No completion in response".to_string()))
    }
}
