use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::models::Namespace;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub index_name: String,
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

fn default_vector_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates requested from the vector service per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Primary similarity floor applied to all candidates.
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f32,
    /// Stricter relevance floor; relaxed back to the primary set when it
    /// would empty the result.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    /// Cap on attributable chunks in the final result.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Total character budget across chunk texts and neighbor expansions.
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
    #[serde(default)]
    pub default_namespace: Namespace,
}

fn default_top_k() -> usize {
    12
}

fn default_primary_threshold() -> f32 {
    0.15
}

fn default_relevance_threshold() -> f32 {
    0.25
}

fn default_max_sources() -> usize {
    8
}

fn default_context_char_budget() -> usize {
    6000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            primary_threshold: default_primary_threshold(),
            relevance_threshold: default_relevance_threshold(),
            max_sources: default_max_sources(),
            context_char_budget: default_context_char_budget(),
            default_namespace: Namespace::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gemma3:27b".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Entries kept per thread before the oldest is evicted.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Recent entries folded into a follow-up's augmented query.
    #[serde(default = "default_context_entries")]
    pub context_entries: usize,
}

fn default_history_window() -> usize {
    10
}

fn default_context_entries() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            context_entries: default_context_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector: VectorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::EduragError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Get embedding endpoint
    pub fn embedding_endpoint(&self) -> &str {
        &self.embeddings.endpoint
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get embedding dimension
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }

    /// Get vector search endpoint
    pub fn vector_endpoint(&self) -> &str {
        &self.vector.endpoint
    }

    /// Get vector search timeout in seconds
    pub fn vector_timeout_secs(&self) -> u64 {
        self.vector.timeout_secs
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    /// Get LLM key
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }

    /// Get generation timeout in seconds
    pub fn llm_timeout_secs(&self) -> u64 {
        self.llm.timeout_secs
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
            },
            embeddings: EmbeddingsConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "all-minilm".to_string(),
                dimension: 384,
                api_key: None,
            },
            vector: VectorConfig {
                endpoint: "http://localhost:6333".to_string(),
                api_key: None,
                index_name: "document-chunks".to_string(),
                timeout_secs: default_vector_timeout(),
            },
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig {
                llm_endpoint: "http://localhost:11434".to_string(),
                llm_key: "ollama".to_string(),
                llm_model: default_llm_model(),
                timeout_secs: default_llm_timeout(),
            },
            memory: MemoryConfig::default(),
        }
    }
}
