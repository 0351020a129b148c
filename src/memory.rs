//! Thread-scoped short-term conversation memory
//!
//! State is an explicit keyed store (thread id -> bounded history) with a
//! per-key lock, so unrelated conversations proceed concurrently. The
//! original single-slot behavior survives as the eviction policy: when the
//! inbound thread id differs from the previously served one, the previous
//! thread's history is discarded outright - state for thread A is never
//! visible to thread B.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use dashmap::DashMap;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::classify::compile_independent_question_patterns;
use crate::config::MemoryConfig;
use crate::models::FollowUpContext;
use crate::models::MemoryEntry;
use crate::models::SynthesisResult;

/// Outcome of resolving a query against a thread's memory.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The query to retrieve with; prepends prior topic keywords when the
    /// query was classified as a follow-up.
    pub augmented_query: String,
    pub is_follow_up: bool,
    pub follow_up_context: Option<FollowUpContext>,
}

#[derive(Debug, Default)]
struct ThreadHistory {
    entries: Vec<MemoryEntry>,
}

/// Short-term conversation memory keyed by thread id.
pub struct ConversationMemory {
    threads: DashMap<String, Arc<Mutex<ThreadHistory>>>,
    last_thread: StdMutex<Option<String>>,
    follow_up_patterns: Vec<Regex>,
    referential_pronoun: Regex,
    independent_question: Vec<Regex>,
    history_window: usize,
    context_entries: usize,
}

impl ConversationMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        let follow_up_patterns = [
            r"^(what|how)\s+about\b",
            r"\b(tell\s+me\s+)?more\s+(about|on|details?)\b",
            r"\b(elaborate|expand)\b",
            r"^(and|also|then|so)\b",
            r"^(more|go\s+on|continue)\b",
            r"\b(it|that|this|these|those|them)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static follow-up pattern must compile"))
        .collect();

        Self {
            threads: DashMap::new(),
            last_thread: StdMutex::new(None),
            follow_up_patterns,
            referential_pronoun: Regex::new(r"\b(it|that|this|these|those|them)\b")
                .expect("static pronoun pattern must compile"),
            independent_question: compile_independent_question_patterns(),
            history_window: config.history_window.max(1),
            context_entries: config.context_entries.max(1),
        }
    }

    /// Resolve a query against the thread's memory. Does not mutate the
    /// thread's history: calling twice without an intervening `record`
    /// yields the same stored history length.
    pub async fn resolve(&self, thread_id: &str, query: &str) -> Resolution {
        self.reset_on_thread_switch(thread_id);

        let handle = self.thread_handle(thread_id);
        let mut history = handle.lock().await;
        self.sanitize(thread_id, &mut history);

        let normalized = query.trim().to_lowercase();
        if history.entries.is_empty() || !self.is_follow_up(&normalized) {
            return Resolution {
                augmented_query: query.trim().to_string(),
                is_follow_up: false,
                follow_up_context: None,
            };
        }

        let matched_phrases = self.matched_phrases(&normalized);
        let recent: Vec<&MemoryEntry> = history
            .entries
            .iter()
            .rev()
            .take(self.context_entries)
            .collect();

        let mut topic_keywords: Vec<String> = Vec::new();
        for entry in &recent {
            for kw in &entry.topic_keywords {
                if !topic_keywords.contains(kw) {
                    topic_keywords.push(kw.clone());
                }
            }
        }

        let latest = recent[0];
        let context = FollowUpContext {
            matched_phrases,
            previous_topic: topic_keywords.clone(),
            previous_answer_summary: latest.answer_summary.clone(),
        };

        // Prepend prior topic terms so retrieval gets lexical signal the
        // bare follow-up lacks.
        let augmented_query = if topic_keywords.is_empty() {
            query.trim().to_string()
        } else {
            format!("{} {}", topic_keywords.join(" "), query.trim())
        };

        debug!(thread_id, %augmented_query, "Follow-up resolved against thread memory");

        Resolution {
            augmented_query,
            is_follow_up: true,
            follow_up_context: Some(context),
        }
    }

    /// Append a completed turn to the thread's history, evicting the
    /// oldest entry past the window.
    pub async fn record(&self, thread_id: &str, query: &str, result: &SynthesisResult) {
        let handle = self.thread_handle(thread_id);
        let mut history = handle.lock().await;

        let entry = MemoryEntry {
            query: query.trim().to_string(),
            answer_summary: summarize(&result.answer),
            topic_keywords: extract_topic_keywords(query, &result.answer),
            timestamp: Utc::now(),
        };

        history.entries.push(entry);
        while history.entries.len() > self.history_window {
            history.entries.remove(0);
        }
    }

    fn thread_handle(&self, thread_id: &str) -> Arc<Mutex<ThreadHistory>> {
        self.threads
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Single-slot reset semantics: switching threads discards the
    /// previously active thread's state entirely.
    fn reset_on_thread_switch(&self, thread_id: &str) {
        let mut last = self
            .last_thread
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = last.as_deref() {
            if previous != thread_id {
                info!(previous, current = thread_id, "Thread switch - resetting memory");
                self.threads.remove(previous);
            }
        }
        *last = Some(thread_id.to_string());
    }

    /// Malformed stored state is discarded rather than failing the query.
    fn sanitize(&self, thread_id: &str, history: &mut ThreadHistory) {
        let corrupt = history.entries.len() > self.history_window
            || history
                .entries
                .windows(2)
                .any(|w| w[0].timestamp > w[1].timestamp)
            || history.entries.iter().any(|e| e.query.is_empty());
        if corrupt {
            warn!(thread_id, "Discarding corrupt thread memory");
            history.entries.clear();
        }
    }

    fn is_follow_up(&self, normalized: &str) -> bool {
        let referential = self
            .follow_up_patterns
            .iter()
            .any(|p| p.is_match(normalized));
        if !referential {
            return false;
        }

        // An independent full question is not a follow-up - unless it
        // leans on a bare pronoun, which needs the prior turn to resolve.
        let independent = self
            .independent_question
            .iter()
            .any(|p| p.is_match(normalized));
        let has_pronoun = self.referential_pronoun.is_match(normalized);

        !(independent && !has_pronoun)
    }

    fn matched_phrases(&self, normalized: &str) -> Vec<String> {
        self.follow_up_patterns
            .iter()
            .filter_map(|p| p.find(normalized))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn summarize(answer: &str) -> String {
    const SUMMARY_LEN: usize = 200;
    if answer.len() <= SUMMARY_LEN {
        return answer.to_string();
    }
    let mut cut = SUMMARY_LEN;
    while !answer.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &answer[..cut])
}

/// Weighted domain-topic table; the highest-weight phrases present in the
/// turn become its topic keywords, falling back to significant query words.
fn extract_topic_keywords(query: &str, answer: &str) -> Vec<String> {
    const TOPIC_TABLE: &[(&str, u32)] = &[
        ("formative assessment", 5),
        ("summative assessment", 5),
        ("learning objectives", 4),
        ("curriculum design", 4),
        ("learning outcomes", 4),
        ("assessment", 3),
        ("evaluation", 3),
        ("curriculum", 3),
        ("pedagogy", 3),
        ("feedback", 3),
        ("grading", 3),
        ("admission", 3),
        ("holiday", 3),
        ("policy", 2),
        ("teaching", 2),
        ("learning", 2),
    ];

    let text = format!("{} {}", query.to_lowercase(), answer.to_lowercase());
    let mut found: Vec<(&str, u32)> = TOPIC_TABLE
        .iter()
        .filter(|(topic, _)| text.contains(topic))
        .copied()
        .collect();
    found.sort_by(|a, b| b.1.cmp(&a.1));

    let mut keywords: Vec<String> = found
        .into_iter()
        .take(5)
        .map(|(topic, _)| topic.to_string())
        .collect();

    if keywords.is_empty() {
        const STOP_WORDS: &[&str] = &[
            "what", "when", "where", "which", "that", "this", "with", "from", "about",
            "does", "have", "will", "their", "there", "them", "then",
        ];
        keywords = query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w))
            .take(4)
            .map(str::to_string)
            .collect();
    }

    keywords
}
