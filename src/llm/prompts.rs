//! Prompt construction and response post-processing
//!
//! Generation parameters scale with query complexity so short factual
//! questions get short answers and multi-part questions get room to
//! develop.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Complexity;

/// Sampling and length parameters for one complexity tier.
#[derive(Debug, Clone, Copy)]
pub struct GenerationProfile {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Target answer length band, in words, stated in the prompt.
    pub word_band: (u32, u32),
    /// Register instruction for this tier.
    pub instruction: &'static str,
}

impl GenerationProfile {
    #[must_use]
    pub fn for_complexity(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Simple => Self {
                temperature: 0.2,
                max_tokens: 300,
                word_band: (50, 150),
                instruction: "Answer directly and concisely; no preamble.",
            },
            Complexity::Moderate => Self {
                temperature: 0.3,
                max_tokens: 600,
                word_band: (200, 400),
                instruction: "Give a clear, structured answer covering the main points.",
            },
            Complexity::Complex => Self {
                temperature: 0.4,
                max_tokens: 1200,
                word_band: (500, 800),
                instruction: "Give a comprehensive answer: cover the relevant aspects, \
trade-offs, and practical steps found in the context.",
            },
        }
    }
}

const PERSONA: &str = "You are a knowledgeable assistant for an educational \
institution, answering questions for teachers, staff, and parents. Ground \
every claim in the provided context. Do not list sources or file names in \
your answer; attribution is handled separately.";

/// Build the grounded prompt for a retrieval-backed answer.
#[must_use]
pub fn build_context_prompt(
    query: &str,
    context: &str,
    previous_answer_summary: Option<&str>,
    profile: &GenerationProfile,
) -> String {
    let mut prompt = String::with_capacity(context.len() + 512);
    prompt.push_str(PERSONA);
    prompt.push_str("\n\n=== CONTEXT ===\n");
    prompt.push_str(context);
    prompt.push_str("\n=== END CONTEXT ===\n");

    if let Some(summary) = previous_answer_summary {
        prompt.push_str("\nThe user is following up on an earlier answer. Earlier answer summary: ");
        prompt.push_str(summary);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nQuestion: {query}\n\n{} Answer in {}-{} words, based only on the \
context above. If the context does not cover the question, say so plainly.",
        profile.instruction, profile.word_band.0, profile.word_band.1
    ));
    prompt
}

/// Prompt used when retrieval produced nothing usable. No context is
/// attached; the instruction forbids invented facts.
#[must_use]
pub fn build_degraded_prompt(query: &str) -> String {
    format!(
        "{PERSONA}\n\nQuestion: {query}\n\nNo reference material is available \
for this question. Reply that you don't have enough information in the \
knowledge base to answer it reliably, and suggest the user rephrase or \
narrow the question. Do not invent facts."
    )
}

/// Split a raw completion into (reasoning, answer).
///
/// Reasoning arrives either in `<think>` blocks or ahead of an
/// `**Answer:**` marker, depending on the model. Neither belongs in the
/// user-facing answer.
#[must_use]
pub fn split_reasoning(raw: &str) -> (Option<String>, String) {
    static THINK: OnceLock<Regex> = OnceLock::new();
    let think = THINK.get_or_init(|| {
        Regex::new(r"(?s)<think>(.*?)</think>").expect("static pattern must compile")
    });

    if let Some(caps) = think.captures(raw) {
        let reasoning = caps[1].trim().to_string();
        let answer = think.replace_all(raw, "").trim().to_string();
        let reasoning = (!reasoning.is_empty()).then_some(reasoning);
        return (reasoning, answer);
    }

    if let Some(idx) = raw.find("**Answer:**") {
        let reasoning = raw[..idx].trim().to_string();
        let answer = raw[idx + "**Answer:**".len()..].trim().to_string();
        let reasoning = (!reasoning.is_empty()).then_some(reasoning);
        return (reasoning, answer);
    }

    (None, raw.trim().to_string())
}

/// Drop a trailing "Sources:" section the model emitted despite the
/// instruction not to. Attribution comes from retrieval metadata only.
#[must_use]
pub fn strip_leaked_sources(answer: &str) -> String {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = MARKER.get_or_init(|| {
        Regex::new(r"(?mi)^\s*(sources?|references?)\s*:").expect("static pattern must compile")
    });
    match marker.find(answer) {
        Some(m) => answer[..m.start()].trim_end().to_string(),
        None => answer.to_string(),
    }
}
