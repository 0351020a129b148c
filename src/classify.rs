//! Query classification: casual-conversation detection and complexity estimation
//!
//! Casual turns short-circuit the pipeline entirely; no vector search or
//! generation call is made for them. Categories are ordered data, not
//! control flow: adding a category means adding a table row.

use rand::seq::SliceRandom;
use regex::Regex;
use tracing::debug;

use crate::models::CasualKind;
use crate::models::ClassificationResult;
use crate::models::Complexity;

/// One casual category: matchers plus the canned responses it can emit.
struct CasualCategory {
    kind: CasualKind,
    patterns: Vec<Regex>,
    responses: &'static [&'static str],
}

/// Pattern-table-driven query classifier. Pure: no state beyond the
/// compiled tables, safe to share across threads.
pub struct QueryClassifier {
    categories: Vec<CasualCategory>,
    independent_question: Vec<Regex>,
    simple_markers: Vec<Regex>,
    complex_markers: Vec<Regex>,
}

impl QueryClassifier {
    pub fn new() -> Self {
        let categories = vec![
            CasualCategory {
                kind: CasualKind::Greeting,
                patterns: compile(&[
                    r"^(hi|hello|hey|hiya|howdy)\b",
                    r"^good\s+(morning|afternoon|evening)\b",
                    r"^greetings\b",
                ]),
                responses: &[
                    "Hello! How can I help you with your school's policies and procedures today?",
                    "Hi there! Ask me anything about our educational documentation.",
                    "Hello! I'm here to help with questions about curriculum, assessment, and administration.",
                ],
            },
            CasualCategory {
                kind: CasualKind::Goodbye,
                patterns: compile(&[
                    r"^(bye|goodbye|see\s+you|farewell)\b",
                    r"^(good\s+night|take\s+care)\b",
                    r"^(i'?m\s+done|that'?s\s+all)\b",
                ]),
                responses: &[
                    "Goodbye! Feel free to come back whenever you have more questions.",
                    "Take care! I'm here whenever you need help with school documentation.",
                ],
            },
            CasualCategory {
                kind: CasualKind::Thanks,
                patterns: compile(&[
                    r"^(thanks|thank\s+you|thx|ty)\b",
                    r"^(much\s+appreciated|appreciate\s+it)\b",
                ]),
                responses: &[
                    "You're welcome! Happy to help with anything else.",
                    "Glad I could help! Let me know if you have more questions.",
                ],
            },
            CasualCategory {
                kind: CasualKind::SmallTalk,
                patterns: compile(&[
                    r"^how\s+are\s+you\b",
                    r"^what'?s\s+up\b",
                    r"^how'?s\s+it\s+going\b",
                ]),
                responses: &[
                    "I'm doing well, thanks for asking! What would you like to know about our schools?",
                    "All good here! Ready to help with any questions about policies or curriculum.",
                ],
            },
            CasualCategory {
                kind: CasualKind::Identity,
                patterns: compile(&[
                    r"^who\s+are\s+you\b",
                    r"^(what\s+can\s+you\s+do|what\s+do\s+you\s+do)\b",
                    r"^are\s+you\s+(a\s+)?(bot|robot|human|real)\b",
                ]),
                responses: &[
                    "I'm an assistant for our school network's documentation. I can answer questions about policies, curriculum, assessment, and administration.",
                    "I answer questions grounded in our institutional documents - ask me about anything from classroom practice to administrative procedures.",
                ],
            },
        ];

        // A casual-looking opener embedded in a real question must not be
        // misrouted to a canned response.
        let independent_question = compile_independent_question_patterns();

        let simple_markers = compile(&[
            r"^(is|are|was|were|do|does|did|can|will|has|have)\b",
            r"\b(when|what\s+date|what\s+time|what\s+day|which\s+day)\b",
            r"\b(how\s+many|how\s+much|what\s+number)\b",
            r"\b(yes\s+or\s+no)\b",
        ]);

        let complex_markers = compile(&[
            r"\b(analy[sz]e|analysis|evaluate|assess\s+the)\b",
            r"\b(compare|contrast|difference\s+between|versus|vs\.?)\b",
            r"\b(strategy|strategies|framework|approach(es)?)\b",
            r"\b(implement|implementation|design|plan\s+for)\b",
            r"\b(implications?|trade-?offs?|pros\s+and\s+cons)\b",
        ]);

        Self {
            categories,
            independent_question,
            simple_markers,
            complex_markers,
        }
    }

    /// Classify a query. Pure function of the input text and the static
    /// pattern tables (response choice aside, which is pseudo-random
    /// within the matched category).
    pub fn classify(&self, query: &str) -> ClassificationResult {
        let normalized = query.trim().to_lowercase();

        if let Some(category) = self.match_casual(&normalized) {
            if !self.is_independent_question(&normalized) {
                let response = pick_response(category.responses);
                debug!(category = ?category.kind, "Casual query short-circuit");
                return ClassificationResult::casual(category.kind, response);
            }
            debug!("Independent-question override defeated casual match");
        }

        ClassificationResult::informational(self.estimate_complexity(&normalized))
    }

    /// First matching category wins; ties resolve by declaration order.
    fn match_casual(&self, normalized: &str) -> Option<&CasualCategory> {
        self.categories
            .iter()
            .find(|category| category.patterns.iter().any(|p| p.is_match(normalized)))
    }

    fn is_independent_question(&self, normalized: &str) -> bool {
        self.independent_question.iter().any(|p| p.is_match(normalized))
    }

    /// SIMPLE and COMPLEX marker sets; both matching resolves to COMPLEX
    /// (more room beats truncation), neither resolves to MODERATE.
    fn estimate_complexity(&self, normalized: &str) -> Complexity {
        let simple = self.simple_markers.iter().any(|p| p.is_match(normalized));
        let complex = self.complex_markers.iter().any(|p| p.is_match(normalized));

        match (simple, complex) {
            (_, true) => Complexity::Complex,
            (true, false) => Complexity::Simple,
            (false, false) => Complexity::Moderate,
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A query that stands on its own (a full "what is"/"how do" question)
/// overrides both a casual match and a follow-up match. Shared with the
/// conversation memory so the two overrides cannot drift apart.
pub(crate) fn compile_independent_question_patterns() -> Vec<Regex> {
    compile(&[
        r"\bwhat\s+(is|are|was|were)\b",
        r"\bhow\s+(do|does|can|to|should)\b",
        r"\b(explain|describe|define|list|compare)\b",
        r"\btell\s+me\s+about\b",
        r"\bwhy\s+(is|are|do|does)\b",
    ])
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static classifier pattern must compile"))
        .collect()
}

fn pick_response(responses: &'static [&'static str]) -> String {
    let mut rng = rand::thread_rng();
    responses
        .choose(&mut rng)
        .copied()
        .unwrap_or(responses[0])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_casual() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("hi");
        assert!(result.is_casual);
        assert_eq!(result.casual_category, Some(CasualKind::Greeting));
        assert!(result.canned_response.is_some());
        assert!(result.complexity.is_none());
    }

    #[test]
    fn test_canned_response_comes_from_matched_category() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("thanks a lot");
        assert_eq!(result.casual_category, Some(CasualKind::Thanks));
        let response = result.canned_response.unwrap();
        assert!(response.contains("welcome") || response.contains("Glad"));
    }

    #[test]
    fn test_greeting_embedded_in_question_is_not_casual() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("hi, what is formative assessment?");
        assert!(!result.is_casual);
        assert!(result.complexity.is_some());
    }

    #[test]
    fn test_identity_question() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("who are you?");
        assert!(result.is_casual);
        assert_eq!(result.casual_category, Some(CasualKind::Identity));
    }

    #[test]
    fn test_simple_complexity_for_fact_queries() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("is second saturday a holiday?");
        assert_eq!(result.complexity, Some(Complexity::Simple));
    }

    #[test]
    fn test_complex_complexity_for_analysis_queries() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("compare formative and summative assessment strategies");
        assert_eq!(result.complexity, Some(Complexity::Complex));
    }

    #[test]
    fn test_tie_resolves_to_complex() {
        // Starts like a yes/no question but carries an analysis marker.
        let classifier = QueryClassifier::new();
        let result = classifier.classify("is the new framework an improvement over the old one?");
        assert_eq!(result.complexity, Some(Complexity::Complex));
    }

    #[test]
    fn test_default_moderate() {
        let classifier = QueryClassifier::new();
        let result = classifier.classify("formative assessment in primary classrooms");
        assert_eq!(result.complexity, Some(Complexity::Moderate));
    }
}
