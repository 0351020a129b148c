pub mod pipeline_tests;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::AppConfig;
use crate::embeddings::Embedder;
use crate::errors::EduragError;
use crate::errors::Result;
use crate::llm::prompts::GenerationProfile;
use crate::llm::TextGenerator;
use crate::models::Namespace;
use crate::rag::ChatEngine;
use crate::vector::SearchHit;
use crate::vector::VectorSearch;

/// Stub embedding service that counts calls.
pub struct StubEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EduragError::Embedding("stub failure".to_string()));
        }
        Ok(vec![0.1; 8])
    }
}

/// Stub vector service returning a fixed hit set, counting calls and
/// remembering the namespace it was last searched in.
pub struct StubVectorSearch {
    pub calls: AtomicUsize,
    pub hits: Vec<SearchHit>,
    pub fail: bool,
    pub last_namespace: std::sync::Mutex<Option<Namespace>>,
}

impl StubVectorSearch {
    pub fn with_scores(scores: &[f32]) -> Self {
        let hits = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| SearchHit {
                id: format!("chunk-{i}"),
                score,
                metadata: json!({
                    "text": format!("Relevant passage number {i} about assessment practice."),
                    "source_filename": format!("doc-{}.pdf", i % 2),
                    "section_index": i,
                }),
            })
            .collect();
        Self {
            calls: AtomicUsize::new(0),
            hits,
            fail: false,
            last_namespace: std::sync::Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            hits: Vec::new(),
            fail: true,
            last_namespace: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl VectorSearch for StubVectorSearch {
    async fn search(
        &self,
        _vector: &[f32],
        namespace: Namespace,
        _top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_namespace
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(namespace);
        if self.fail {
            return Err(EduragError::VectorSearch("stub failure".to_string()));
        }
        Ok(self.hits.clone())
    }
}

/// Stub generator echoing a canned completion, counting calls and
/// capturing the last prompt.
pub struct StubGenerator {
    pub calls: AtomicUsize,
    pub response: String,
    pub fail: bool,
    pub last_prompt: std::sync::Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn with_response(response: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: response.to_string(),
            fail: false,
            last_prompt: std::sync::Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: String::new(),
            fail: true,
            last_prompt: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str, _profile: &GenerationProfile) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_prompt
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(prompt.to_string());
        if self.fail {
            return Err(EduragError::Generation("stub failure".to_string()));
        }
        Ok(self.response.clone())
    }
}

/// Assemble a chat engine over the given stubs with default configuration.
pub fn test_engine(
    embedder: Arc<StubEmbedder>,
    vector: Arc<StubVectorSearch>,
    generator: Arc<StubGenerator>,
) -> ChatEngine {
    let config = AppConfig::default();
    ChatEngine::from_services(&config, embedder, vector, generator)
}
