//! Context assembly from retrieved chunks
//!
//! Expands top chunks with their neighboring sections for coherence, then
//! packs everything into a fixed character budget, dropping the
//! lowest-scoring material first.

use std::collections::HashMap;

use crate::models::Chunk;
use crate::models::RetrievalResult;
use crate::models::Source;

/// Assembler for building the generation context from retrieval output
pub struct ContextAssembler {
    char_budget: usize,
}

const EXCERPT_LEN: usize = 150;

/// File types the document store can serve back to the user.
const DOWNLOADABLE_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".doc", ".pptx", ".xlsx"];

impl ContextAssembler {
    #[must_use]
    pub const fn new(char_budget: usize) -> Self {
        Self { char_budget }
    }

    /// Assemble the context string for the generation prompt.
    ///
    /// Neighbor previews of retrieved chunks become expansion chunks,
    /// inheriting a slightly reduced score so they are the first to go
    /// when the budget is tight. Expansion chunks never reach the
    /// attributed sources.
    #[must_use]
    pub fn assemble(&self, retrieval: &RetrievalResult) -> String {
        let mut chunks = self.with_expansions(&retrieval.chunks);

        // Trim to budget, lowest score first. Sorting descending and
        // popping from the back keeps the best material.
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut total: usize = chunks.iter().map(|c| c.text.len()).sum();
        while total > self.char_budget && chunks.len() > 1 {
            if let Some(dropped) = chunks.pop() {
                total -= dropped.text.len();
            }
        }
        // A single oversized chunk gets truncated rather than dropped.
        if let [only] = chunks.as_mut_slice() {
            if only.text.len() > self.char_budget {
                let mut cut = self.char_budget;
                while !only.text.is_char_boundary(cut) {
                    cut -= 1;
                }
                only.text.truncate(cut);
            }
        }

        let mut context = String::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let label = if chunk.is_expansion {
                format!("[Context {} - adjacent section]", idx + 1)
            } else {
                format!("[Context {}]", idx + 1)
            };
            context.push_str(&format!("\n{}\n{}\n", label, chunk.text));
        }
        context
    }

    /// Build the attributed source list: one entry per distinct file,
    /// carrying the best score and an excerpt of its best chunk.
    #[must_use]
    pub fn sources(&self, retrieval: &RetrievalResult) -> Vec<Source> {
        let mut by_file: HashMap<&str, &Chunk> = HashMap::new();
        for chunk in retrieval.attributable() {
            match by_file.get(chunk.source_filename.as_str()) {
                Some(existing) if existing.score >= chunk.score => {}
                _ => {
                    by_file.insert(&chunk.source_filename, chunk);
                }
            }
        }

        let mut sources: Vec<Source> = by_file
            .into_values()
            .map(|chunk| Source {
                filename: chunk.source_filename.clone(),
                score: chunk.score,
                excerpt: excerpt(&chunk.text),
                download_available: is_downloadable(&chunk.source_filename),
            })
            .collect();
        sources.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sources
    }

    fn with_expansions(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len() * 2);
        for chunk in chunks {
            if let Some(prev) = chunk.previous_preview.as_deref() {
                out.push(expansion_of(chunk, prev, "prev"));
            }
            out.push(chunk.clone());
            if let Some(next) = chunk.next_preview.as_deref() {
                out.push(expansion_of(chunk, next, "next"));
            }
        }
        out
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(6000)
    }
}

fn expansion_of(chunk: &Chunk, text: &str, side: &str) -> Chunk {
    Chunk {
        id: format!("{}-{side}", chunk.id),
        text: text.to_string(),
        // Below its parent so budget trimming sheds expansions first.
        score: chunk.score * 0.9,
        source_filename: chunk.source_filename.clone(),
        section_index: chunk.section_index,
        previous_preview: None,
        next_preview: None,
        is_expansion: true,
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= EXCERPT_LEN {
        return text.to_string();
    }
    let mut cut = EXCERPT_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

fn is_downloadable(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    DOWNLOADABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
