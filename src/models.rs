//! Shared data model for the retrieval-and-response pipeline

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Logical partition of the indexed corpus, queried independently.
///
/// Priority order matters for router tie-breaking: the most general
/// (administrative) partition is declared last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    #[default]
    K12,
    Preschool,
    Administrative,
}

impl Namespace {
    /// Wire name used when scoping vector-search queries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::K12 => "k12",
            Self::Preschool => "preschool",
            Self::Administrative => "administrative",
        }
    }

    /// All namespaces in router priority order (most general last).
    pub fn all() -> &'static [Namespace] {
        &[Self::K12, Self::Preschool, Self::Administrative]
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated reasoning/length budget for an informational query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Casual conversation category matched by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasualKind {
    Greeting,
    Goodbye,
    Thanks,
    SmallTalk,
    Identity,
}

/// Outcome of classifying a single query.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub is_casual: bool,
    pub casual_category: Option<CasualKind>,
    pub canned_response: Option<String>,
    pub complexity: Option<Complexity>,
}

impl ClassificationResult {
    pub fn casual(category: CasualKind, response: String) -> Self {
        Self {
            is_casual: true,
            casual_category: Some(category),
            canned_response: Some(response),
            complexity: None,
        }
    }

    pub fn informational(complexity: Complexity) -> Self {
        Self {
            is_casual: false,
            casual_category: None,
            canned_response: None,
            complexity: Some(complexity),
        }
    }
}

/// A retrieved candidate chunk, read-only within the pipeline.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub source_filename: String,
    pub section_index: u32,
    /// Text of the immediately preceding chunk in the source document.
    pub previous_preview: Option<String>,
    /// Text of the immediately following chunk in the source document.
    pub next_preview: Option<String>,
    /// True for chunks attached purely for neighbor-context coherence;
    /// these never appear in attributed sources.
    pub is_expansion: bool,
}

/// Ordered retrieval output (score descending) plus the namespace searched
/// and the similarity floor that was actually applied.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub namespace: Namespace,
    pub effective_threshold: f32,
    /// Set when the vector service was unreachable, timed out, or returned
    /// nothing usable; the synthesizer falls back to a context-free answer.
    pub degraded: bool,
}

impl RetrievalResult {
    pub fn degraded(namespace: Namespace, threshold: f32) -> Self {
        Self {
            chunks: Vec::new(),
            namespace,
            effective_threshold: threshold,
            degraded: true,
        }
    }

    /// Chunks eligible for source attribution (expansion chunks excluded).
    pub fn attributable(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| !c.is_expansion)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A cited source document attached to a synthesized answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub filename: String,
    pub score: f32,
    pub excerpt: String,
    pub download_available: bool,
}

/// Context handed back when a query was classified as a follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpContext {
    /// Phrases that triggered the follow-up classification.
    pub matched_phrases: Vec<String>,
    /// Topic keywords of the prior turn the query was resolved against.
    pub previous_topic: Vec<String>,
    /// Summary of the most recent recorded answer.
    pub previous_answer_summary: String,
}

/// Terminal output of one query through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub answer: String,
    pub reasoning: String,
    pub sources: Vec<Source>,
    /// How well-supported the answer is by retrieved evidence, in [0, 1].
    /// Zero marks a degraded or casual/fallback answer.
    pub confidence: f32,
    pub complexity_used: Option<Complexity>,
    pub is_follow_up: bool,
    pub follow_up_context: Option<FollowUpContext>,
}

impl SynthesisResult {
    /// A canned conversational reply; no retrieval or generation involved.
    pub fn canned(answer: String) -> Self {
        Self {
            answer,
            reasoning: String::new(),
            sources: Vec::new(),
            confidence: 1.0,
            complexity_used: None,
            is_follow_up: false,
            follow_up_context: None,
        }
    }

    /// Fixed fallback when generation fails or input is unusable.
    pub fn fallback(answer: String) -> Self {
        Self {
            answer,
            reasoning: String::new(),
            sources: Vec::new(),
            confidence: 0.0,
            complexity_used: None,
            is_follow_up: false,
            follow_up_context: None,
        }
    }
}

/// One recorded turn in a thread's short-term memory.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub query: String,
    pub answer_summary: String,
    pub topic_keywords: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
