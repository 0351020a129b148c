//! Retrieval engine
//!
//! Embeds the (possibly augmented) query, searches the routed namespace,
//! applies the two-tier similarity floor, and attaches neighbor expansion
//! chunks for section coherence.

use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::models::Chunk;
use crate::models::Namespace;
use crate::models::RetrievalResult;
use crate::vector::SearchHit;
use crate::vector::VectorSearch;

pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorSearch>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorSearch>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vector,
            config,
        }
    }

    /// Retrieve context chunks for a query in the given namespace
    ///
    /// # Errors
    /// - Embedding failures (service unreachable, dimension mismatch)
    /// - Vector search failures (service unreachable, timeout)
    pub async fn retrieve(&self, query: &str, namespace: Namespace) -> Result<RetrievalResult> {
        let query = preprocess_query(query);
        let mut hits = self.search(&query, namespace).await?;

        // Nothing past the primary floor: retry once with the query
        // stripped to its core keywords. Long conversational phrasing
        // often buries the lexical signal.
        let mut primary = above_floor(&hits, self.config.primary_threshold);
        if primary.is_empty() {
            let core = extract_core_keywords(&query);
            if !core.is_empty() && core != query.trim().to_lowercase() {
                debug!(%core, "Primary set empty, retrying with core keywords");
                hits = self.search(&core, namespace).await?;
                primary = above_floor(&hits, self.config.primary_threshold);
            }
        }

        if primary.is_empty() {
            info!(namespace = %namespace, "No candidates above primary threshold");
            return Ok(RetrievalResult {
                chunks: Vec::new(),
                namespace,
                effective_threshold: self.config.primary_threshold,
                degraded: false,
            });
        }

        // The stricter relevance floor is relaxed back to the primary set
        // rather than returning nothing.
        let relevant = above_floor(&primary, self.config.relevance_threshold);
        let (selected, effective_threshold) = if relevant.is_empty() {
            warn!(
                namespace = %namespace,
                "Relevance floor emptied the result, relaxing to primary floor"
            );
            (primary, self.config.primary_threshold)
        } else {
            (relevant, self.config.relevance_threshold)
        };

        let mut chunks: Vec<Chunk> = selected.iter().map(hit_to_chunk).collect();
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(self.config.max_sources);

        debug!(
            namespace = %namespace,
            count = chunks.len(),
            effective_threshold,
            "Retrieval complete"
        );

        Ok(RetrievalResult {
            chunks,
            namespace,
            effective_threshold,
            degraded: false,
        })
    }

    async fn search(&self, query: &str, namespace: Namespace) -> Result<Vec<SearchHit>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .vector
            .search(&embedding, namespace, self.config.top_k)
            .await?;
        // Hits with no usable text cannot ground anything.
        Ok(hits.into_iter().filter(|h| !h.text().is_empty()).collect())
    }
}

fn above_floor(hits: &[SearchHit], floor: f32) -> Vec<SearchHit> {
    hits.iter().filter(|h| h.score >= floor).cloned().collect()
}

/// Normalize a query before embedding: strip question scaffolding, fix
/// frequent typos, and append domain synonyms so lexically sparse queries
/// still land near the right chunks.
fn preprocess_query(query: &str) -> String {
    const TYPO_MAP: &[(&str, &str)] = &[
        ("asessment", "assessment"),
        ("assesment", "assessment"),
        ("curiculum", "curriculum"),
        ("kindergarden", "kindergarten"),
        ("anual", "annual"),
        ("adress", "address"),
    ];
    const SYNONYMS: &[(&str, &str)] = &[
        ("exam", "examination"),
        ("marks", "grades"),
        ("holiday", "vacation"),
        ("fee", "fees payment"),
        ("sop", "standard operating procedure"),
    ];
    const SCAFFOLDS: &[&str] = &[
        "what is ",
        "what are ",
        "tell me about ",
        "can you tell me ",
        "could you explain ",
        "i want to know ",
    ];

    let mut text = query.trim().to_lowercase();
    text = text.trim_end_matches(['?', '!', '.']).to_string();

    for prefix in SCAFFOLDS {
        if let Some(rest) = text.strip_prefix(prefix) {
            if !rest.trim().is_empty() {
                text = rest.trim().to_string();
            }
            break;
        }
    }

    let mut words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            TYPO_MAP
                .iter()
                .find(|(typo, _)| *typo == w)
                .map_or_else(|| w.to_string(), |(_, fixed)| (*fixed).to_string())
        })
        .collect();

    let mut expansions: Vec<String> = Vec::new();
    for (term, expansion) in SYNONYMS {
        if words.iter().any(|w| w == term) {
            for extra in expansion.split_whitespace() {
                if !words.iter().any(|w| w == extra) {
                    expansions.push(extra.to_string());
                }
            }
        }
    }
    words.extend(expansions);

    words.join(" ")
}

fn hit_to_chunk(hit: &SearchHit) -> Chunk {
    Chunk {
        id: hit.id.clone(),
        text: hit.text().to_string(),
        score: hit.score,
        source_filename: hit
            .metadata_str("source_filename")
            .unwrap_or("unknown")
            .to_string(),
        section_index: hit.metadata_u64("section_index").unwrap_or(0) as u32,
        previous_preview: hit.metadata_str("previous_preview").map(str::to_string),
        next_preview: hit.metadata_str("next_preview").map(str::to_string),
        is_expansion: false,
    }
}

/// Reduce a conversational query to its content-bearing words.
fn extract_core_keywords(query: &str) -> String {
    const FILLER: &[&str] = &[
        "please", "could", "would", "should", "can", "you", "tell", "me", "about", "what", "is",
        "are", "the", "a", "an", "how", "do", "does", "i", "we", "our", "your", "for", "of", "in",
        "on", "to", "and", "or", "explain", "describe",
    ];

    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && !FILLER.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}
