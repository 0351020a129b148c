//! Complete pipeline: classify -> route -> resolve -> retrieve -> synthesize
//!
//! `process_query` is total: every failure inside the pipeline collapses to
//! a valid fallback result, never an error or panic to the caller.

use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::classify::QueryClassifier;
use crate::config::AppConfig;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingClient;
use crate::errors::Result;
use crate::llm::prompts;
use crate::llm::prompts::GenerationProfile;
use crate::llm::GenerationClient;
use crate::llm::TextGenerator;
use crate::memory::ConversationMemory;
use crate::memory::Resolution;
use crate::models::Complexity;
use crate::models::RetrievalResult;
use crate::models::SynthesisResult;
use crate::rag::ContextAssembler;
use crate::rag::RetrievalEngine;
use crate::route::NamespaceRouter;
use crate::vector::VectorClient;
use crate::vector::VectorSearch;

const CLARIFICATION_RESPONSE: &str =
    "I didn't catch a question there. Could you tell me what you'd like to know?";

const GENERATION_FAILURE_RESPONSE: &str =
    "I wasn't able to produce an answer just now. Please try again in a moment.";

/// The full chat engine, one instance shared across threads.
pub struct ChatEngine {
    classifier: QueryClassifier,
    router: NamespaceRouter,
    memory: ConversationMemory,
    retriever: RetrievalEngine,
    assembler: ContextAssembler,
    generator: Arc<dyn TextGenerator>,
}

impl ChatEngine {
    /// Create a chat engine wired to live HTTP services
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(config: &AppConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(&config.embeddings)?);
        let vector: Arc<dyn VectorSearch> = Arc::new(VectorClient::new(&config.vector)?);
        let generator: Arc<dyn TextGenerator> = Arc::new(GenerationClient::new(&config.llm)?);
        Ok(Self::from_services(config, embedder, vector, generator))
    }

    /// Create a chat engine from existing service handles
    #[must_use]
    pub fn from_services(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorSearch>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            classifier: QueryClassifier::new(),
            router: NamespaceRouter::new(config.retrieval.default_namespace),
            memory: ConversationMemory::new(&config.memory),
            retriever: RetrievalEngine::new(embedder, vector, config.retrieval.clone()),
            assembler: ContextAssembler::new(config.retrieval.context_char_budget),
            generator,
        }
    }

    /// Process one user query end to end.
    ///
    /// Always returns a usable result; internal failures degrade the
    /// answer instead of propagating.
    pub async fn process_query(&self, thread_id: &str, query: &str) -> SynthesisResult {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            debug!(thread_id, "Empty query, asking for clarification");
            return SynthesisResult::fallback(CLARIFICATION_RESPONSE.to_string());
        }

        let classification = self.classifier.classify(trimmed);
        if classification.is_casual {
            // Casual turns never touch routing, memory, retrieval, or
            // generation.
            info!(
                thread_id,
                category = ?classification.casual_category,
                "Casual query, replying directly"
            );
            let response = classification
                .canned_response
                .unwrap_or_else(|| CLARIFICATION_RESPONSE.to_string());
            return SynthesisResult::canned(response);
        }

        let complexity = classification.complexity.unwrap_or(Complexity::Moderate);
        let namespace = self.router.route(trimmed);
        let resolution = self.memory.resolve(thread_id, trimmed).await;

        info!(
            thread_id,
            namespace = %namespace,
            complexity = ?complexity,
            is_follow_up = resolution.is_follow_up,
            "Processing informational query"
        );

        let retrieval = match self
            .retriever
            .retrieve(&resolution.augmented_query, namespace)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(thread_id, error = %e, "Retrieval failed, degrading");
                RetrievalResult::degraded(namespace, 0.0)
            }
        };

        let result = self
            .synthesize(trimmed, complexity, &retrieval, &resolution)
            .await;

        // Only evidence-backed turns extend the thread's memory; degraded
        // and failed turns would poison follow-up resolution.
        if result.confidence > 0.0 {
            self.memory.record(thread_id, trimmed, &result).await;
        }

        result
    }

    async fn synthesize(
        &self,
        query: &str,
        complexity: Complexity,
        retrieval: &RetrievalResult,
        resolution: &Resolution,
    ) -> SynthesisResult {
        let profile = GenerationProfile::for_complexity(complexity);

        let (prompt, grounded) = if retrieval.degraded || retrieval.is_empty() {
            (prompts::build_degraded_prompt(query), false)
        } else {
            let context = self.assembler.assemble(retrieval);
            let summary = resolution
                .follow_up_context
                .as_ref()
                .map(|c| c.previous_answer_summary.as_str());
            (
                prompts::build_context_prompt(query, &context, summary, &profile),
                true,
            )
        };

        let raw = match self.generator.generate(&prompt, &profile).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Generation failed");
                let mut fallback = SynthesisResult::fallback(GENERATION_FAILURE_RESPONSE.to_string());
                fallback.is_follow_up = resolution.is_follow_up;
                fallback.follow_up_context = resolution.follow_up_context.clone();
                return fallback;
            }
        };

        let (reasoning, answer) = prompts::split_reasoning(&raw);
        let answer = prompts::strip_leaked_sources(&answer);

        let (sources, confidence) = if grounded {
            (self.assembler.sources(retrieval), score_confidence(retrieval))
        } else {
            (Vec::new(), 0.0)
        };

        SynthesisResult {
            answer,
            reasoning: reasoning.unwrap_or_default(),
            sources,
            confidence,
            complexity_used: Some(complexity),
            is_follow_up: resolution.is_follow_up,
            follow_up_context: resolution.follow_up_context.clone(),
        }
    }
}

/// Evidence-support score in [0, 1]: mean of the top three chunk scores,
/// nudged up for candidate count and source diversity.
fn score_confidence(retrieval: &RetrievalResult) -> f32 {
    let chunks: Vec<_> = retrieval.attributable().collect();
    if chunks.is_empty() {
        return 0.0;
    }

    let top: Vec<f32> = chunks.iter().take(3).map(|c| c.score).collect();
    let mut confidence = top.iter().sum::<f32>() / top.len() as f32;

    if chunks.len() >= 3 {
        confidence += 0.05;
    }
    let distinct_files = chunks
        .iter()
        .map(|c| c.source_filename.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    if distinct_files >= 2 {
        confidence += 0.05;
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use crate::models::Namespace;

    fn chunk(score: f32, filename: &str) -> Chunk {
        Chunk {
            id: "c".to_string(),
            text: "body".to_string(),
            score,
            source_filename: filename.to_string(),
            section_index: 0,
            previous_preview: None,
            next_preview: None,
            is_expansion: false,
        }
    }

    #[test]
    fn test_confidence_mean_of_top_three() {
        let retrieval = RetrievalResult {
            chunks: vec![chunk(0.9, "a.pdf"), chunk(0.6, "a.pdf")],
            namespace: Namespace::K12,
            effective_threshold: 0.25,
            degraded: false,
        };
        // Mean 0.75, fewer than three chunks, single file: no bonuses.
        assert!((score_confidence(&retrieval) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_bonuses_and_clamp() {
        let retrieval = RetrievalResult {
            chunks: vec![
                chunk(0.98, "a.pdf"),
                chunk(0.97, "b.pdf"),
                chunk(0.96, "c.pdf"),
            ],
            namespace: Namespace::K12,
            effective_threshold: 0.25,
            degraded: false,
        };
        assert!((score_confidence(&retrieval) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_zero_when_empty() {
        let retrieval = RetrievalResult::degraded(Namespace::K12, 0.0);
        assert!(score_confidence(&retrieval).abs() < f32::EPSILON);
    }
}
