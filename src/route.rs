//! Keyword-scored routing of queries to corpus namespaces

use tracing::debug;

use crate::models::Namespace;

/// Keyword table for one namespace. Additive data: a new partition is a
/// new row, not a new branch.
struct NamespaceKeywords {
    namespace: Namespace,
    keywords: &'static [&'static str],
}

/// Routes a query to the corpus partition whose keyword set it overlaps
/// most. Pure and stateless.
pub struct NamespaceRouter {
    table: Vec<NamespaceKeywords>,
    default_namespace: Namespace,
}

impl NamespaceRouter {
    pub fn new(default_namespace: Namespace) -> Self {
        // Declaration order is the tie-break priority; the most general
        // (administrative) partition goes last.
        let table = vec![
            NamespaceKeywords {
                namespace: Namespace::K12,
                keywords: &[
                    "k12", "k-12", "grade", "secondary", "high school", "middle school",
                    "exam", "board", "subject", "homework", "classroom", "teacher",
                    "student", "assessment", "formative", "summative", "curriculum",
                    "lesson", "syllabus", "pedagogy", "learning outcome",
                ],
            },
            NamespaceKeywords {
                namespace: Namespace::Preschool,
                keywords: &[
                    "preschool", "pre-school", "kindergarten", "nursery", "toddler",
                    "early years", "early childhood", "play-based", "montessori",
                    "daycare", "pre-primary", "playgroup",
                ],
            },
            NamespaceKeywords {
                namespace: Namespace::Administrative,
                keywords: &[
                    "policy", "sop", "procedure", "admin", "administration", "hr",
                    "leave", "holiday", "salary", "payroll", "recruitment", "staff",
                    "admission", "fee", "transport", "safety", "compliance",
                    "calendar", "circular",
                ],
            },
        ];

        Self {
            table,
            default_namespace,
        }
    }

    /// Score every namespace and pick the winner. Deterministic: the same
    /// query text always routes to the same namespace for a fixed table.
    pub fn route(&self, query: &str) -> Namespace {
        let lowered = query.to_lowercase();

        let mut best: Option<(Namespace, usize)> = None;
        for entry in &self.table {
            let score = entry
                .keywords
                .iter()
                .filter(|kw| lowered.contains(*kw))
                .count();
            // Strictly-greater keeps earlier (higher-priority) rows on ties.
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((entry.namespace, score));
            }
        }

        let chosen = best.map_or(self.default_namespace, |(ns, _)| ns);
        debug!(namespace = %chosen, "Routed query");
        chosen
    }
}
