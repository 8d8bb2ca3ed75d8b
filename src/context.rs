//! Context assembly.
//!
//! Turns a tenant's stored fragments into one bounded text block suitable
//! for a model prompt. Fragments are grouped by source file in first-seen
//! order, each group gets a `=== filename ===` header, and the result is
//! cut to a hard character budget. The truncation marker counts against the
//! budget, so the assembled text never exceeds it by even one character.

use crate::engine::RetrievalEngine;

/// Appended where a section or the whole context was cut.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// An assembled context block.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    pub context: String,
    /// Character (not byte) count of `context`.
    pub total_chars: usize,
    /// Source filenames that contributed, in order of appearance. A source
    /// only partially included still counts.
    pub sources: Vec<String>,
}

impl ContextBundle {
    pub fn empty() -> Self {
        ContextBundle {
            context: String::new(),
            total_chars: 0,
            sources: Vec::new(),
        }
    }
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Group `(source, text)` fragments and assemble them under a character
/// budget.
///
/// Each source's fragments are joined with newlines and capped at
/// `per_source_cap` characters before budgeting. When the budget runs out
/// mid-section, the section is cut so the marker still fits inside
/// `max_chars`; sources after that point are omitted entirely.
pub fn assemble(
    fragments: &[(String, String)],
    max_chars: usize,
    per_source_cap: usize,
) -> ContextBundle {
    let marker_chars = TRUNCATION_MARKER.chars().count();

    // Group by source, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut grouped: std::collections::HashMap<String, Vec<&str>> =
        std::collections::HashMap::new();
    for (source, text) in fragments {
        grouped
            .entry(source.clone())
            .or_insert_with(|| {
                order.push(source.clone());
                Vec::new()
            })
            .push(text);
    }

    let mut context = String::new();
    let mut total_chars = 0usize;
    let mut sources = Vec::new();

    for source in order {
        let body = grouped[&source].join("\n");
        let body = if body.chars().count() > per_source_cap {
            format!("{}{}", take_chars(&body, per_source_cap), TRUNCATION_MARKER)
        } else {
            body
        };

        let mut addition = String::new();
        if !context.is_empty() {
            addition.push_str("\n\n");
        }
        addition.push_str(&format!("=== {} ===\n{}", source, body));

        let addition_chars = addition.chars().count();
        if total_chars + addition_chars <= max_chars {
            context.push_str(&addition);
            total_chars += addition_chars;
            sources.push(source);
            continue;
        }

        // Budget exhausted inside this section. Cut it so the marker still
        // fits, or drop it when not even the marker would.
        let remaining = max_chars - total_chars;
        if remaining > marker_chars {
            context.push_str(&take_chars(&addition, remaining - marker_chars));
            context.push_str(TRUNCATION_MARKER);
            total_chars = max_chars;
            sources.push(source);
        }
        break;
    }

    ContextBundle {
        context,
        total_chars,
        sources,
    }
}

/// Assemble the full context for one tenant from everything it has stored.
pub async fn tenant_context(
    engine: &RetrievalEngine,
    tenant: &str,
    max_chars: usize,
    per_source_cap: usize,
) -> ContextBundle {
    let hits = engine.list_by_tenant(tenant, 100_000).await;
    if hits.is_empty() {
        return ContextBundle::empty();
    }

    let fragments: Vec<(String, String)> = hits
        .into_iter()
        .map(|hit| (hit.payload.filename, hit.payload.content))
        .collect();

    assemble(&fragments, max_chars, per_source_cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frag(source: &str, text: &str) -> (String, String) {
        (source.to_string(), text.to_string())
    }

    #[test]
    fn test_empty_fragments_yield_empty_bundle() {
        assert_eq!(assemble(&[], 1000, 500), ContextBundle::empty());
    }

    #[test]
    fn test_groups_by_source_in_first_seen_order() {
        let bundle = assemble(
            &[
                frag("a.txt", "one"),
                frag("b.txt", "two"),
                frag("a.txt", "three"),
            ],
            10_000,
            10_000,
        );

        assert_eq!(
            bundle.context,
            "=== a.txt ===\none\nthree\n\n=== b.txt ===\ntwo"
        );
        assert_eq!(bundle.sources, vec!["a.txt", "b.txt"]);
        assert_eq!(bundle.total_chars, bundle.context.chars().count());
    }

    #[test]
    fn test_per_source_cap_truncates_one_section() {
        let bundle = assemble(&[frag("a.txt", &"x".repeat(100))], 10_000, 40);
        let expected_body = format!("{}{}", "x".repeat(40), TRUNCATION_MARKER);
        assert_eq!(bundle.context, format!("=== a.txt ===\n{}", expected_body));
    }

    #[test]
    fn test_budget_cut_lands_exactly_on_max_chars() {
        // First section: 14 header chars + 40_000 body = 40_014.
        // Second would add 2 + 14 + 30_000 = 30_016, overshooting a 50_000
        // budget, so it is cut with the marker inside the budget.
        let bundle = assemble(
            &[
                frag("a.txt", &"a".repeat(40_000)),
                frag("b.txt", &"b".repeat(30_000)),
            ],
            50_000,
            50_000,
        );

        assert_eq!(bundle.total_chars, 50_000);
        assert_eq!(bundle.context.chars().count(), 50_000);
        assert!(bundle.context.ends_with(TRUNCATION_MARKER));
        assert_eq!(bundle.sources, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_sources_past_the_cut_are_omitted() {
        let bundle = assemble(
            &[
                frag("a.txt", &"a".repeat(100)),
                frag("b.txt", &"b".repeat(100)),
                frag("c.txt", &"c".repeat(100)),
            ],
            150,
            10_000,
        );

        assert_eq!(bundle.total_chars, 150);
        assert_eq!(bundle.sources, vec!["a.txt", "b.txt"]);
        assert!(!bundle.context.contains("c.txt"));
    }

    #[test]
    fn test_section_dropped_when_only_marker_would_fit() {
        // First section fills 14 + 90 = 104 of 110; the 6 remaining chars
        // cannot hold the 15-char marker, so the next source is dropped.
        let bundle = assemble(
            &[frag("a.txt", &"a".repeat(90)), frag("b.txt", "bbb")],
            110,
            10_000,
        );

        assert_eq!(bundle.total_chars, 104);
        assert_eq!(bundle.sources, vec!["a.txt"]);
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        // Multibyte characters each count once.
        let bundle = assemble(&[frag("a.txt", &"é".repeat(50))], 30, 10_000);
        assert_eq!(bundle.total_chars, 30);
        assert_eq!(bundle.context.chars().count(), 30);
    }

    proptest! {
        #[test]
        fn prop_assembled_context_never_exceeds_budget(
            texts in prop::collection::vec("[a-z ]{0,200}", 0..8),
            max_chars in 16usize..500,
            per_source_cap in 16usize..500,
        ) {
            let fragments: Vec<(String, String)> = texts
                .into_iter()
                .enumerate()
                .map(|(i, t)| (format!("f{}.txt", i % 3), t))
                .collect();

            let bundle = assemble(&fragments, max_chars, per_source_cap);
            prop_assert!(bundle.total_chars <= max_chars);
            prop_assert_eq!(bundle.total_chars, bundle.context.chars().count());
        }
    }
}
