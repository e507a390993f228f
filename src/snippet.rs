//! Query-time snippets, highlighting and page matching.
//!
//! Everything here works on text re-extracted from the live source file;
//! nothing is read back from the index.

use regex::Regex;

use crate::{config::SnippetConfig, document::DocumentRecord};

pub const ELLIPSIS: &str = "...";

/// Markers used when highlights are rendered without a terminal.
pub const MARK_OPEN: &str = "**";
pub const MARK_CLOSE: &str = "**";

/// At most this many highlighted excerpts per result.
pub const MAX_HIGHLIGHTS: usize = 5;

/// Split a query into lowercased search terms with punctuation removed.
/// Duplicates are dropped, first occurrence wins.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let term: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Lowercased view of a text that remembers which source character each
/// lowercased character came from.
struct Folded {
    lower: String,
    /// `origin[i]` is the source char index of the i-th char of `lower`.
    origin: Vec<usize>,
}

impl Folded {
    fn new(chars: &[char]) -> Self {
        let mut lower = String::with_capacity(chars.len());
        let mut origin = Vec::with_capacity(chars.len());
        for (idx, c) in chars.iter().enumerate() {
            for lc in c.to_lowercase() {
                lower.push(lc);
                origin.push(idx);
            }
        }
        Self { lower, origin }
    }

    /// Source char index of the first occurrence of `term`.
    fn find(&self, term: &str) -> Option<usize> {
        let byte = self.lower.find(term)?;
        let char_pos = self.lower[..byte].chars().count();
        self.origin.get(char_pos).copied()
    }

    /// Source char index of the earliest occurrence of any term.
    fn earliest(&self, terms: &[String]) -> Option<usize> {
        terms
            .iter()
            .filter(|t| !t.is_empty())
            .filter_map(|t| self.find(t))
            .min()
    }
}

/// Build a bounded preview of `content` around the earliest term match.
///
/// The window starts `context_before` characters ahead of the match and is
/// at most `snippet_max_length` characters long. Ellipses mark clipped ends
/// and whitespace runs are collapsed. Without a match the snippet is the
/// beginning of the document.
pub fn build_snippet(
    content: &str,
    terms: &[String],
    config: &SnippetConfig,
) -> String {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let max = config.snippet_max_length;

    let start = Folded::new(&chars)
        .earliest(terms)
        .map_or(0, |offset| offset.saturating_sub(config.context_before));
    let end = len.min(start + max);

    let window: String = chars[start..end].iter().collect();
    let mut snippet = collapse_whitespace(&window);
    if start > 0 {
        snippet.insert_str(0, ELLIPSIS);
    }
    if end < len {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap every case-insensitive occurrence of each term in `open`/`close`.
///
/// Terms are applied one after another over the already marked text, so a
/// term that occurs inside an earlier term's highlight is wrapped again
/// (`invoice` then `in` gives `**in**voice` inside the first markers).
pub fn highlight(text: &str, terms: &[String], open: &str, close: &str) -> String {
    let mut out = text.to_string();
    for term in terms.iter().filter(|t| !t.is_empty()) {
        let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(term))) else {
            continue;
        };
        out = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                format!("{open}{}{close}", &caps[0])
            })
            .into_owned();
    }
    out
}

/// Short highlighted excerpts, one per query term found in `content`, in
/// query order and capped at [`MAX_HIGHLIGHTS`].
pub fn highlight_excerpts(
    content: &str,
    terms: &[String],
    config: &SnippetConfig,
) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let folded = Folded::new(&chars);
    let radius = config.context_before;

    terms
        .iter()
        .filter_map(|term| folded.find(term).map(|at| (term, at)))
        .take(MAX_HIGHLIGHTS)
        .map(|(term, at)| {
            let start = at.saturating_sub(radius);
            let end = chars.len().min(at + term.chars().count() + radius);
            let window: String = chars[start..end].iter().collect();
            let mut excerpt = collapse_whitespace(&window);
            if start > 0 {
                excerpt.insert_str(0, ELLIPSIS);
            }
            if end < chars.len() {
                excerpt.push_str(ELLIPSIS);
            }
            highlight(&excerpt, std::slice::from_ref(term), MARK_OPEN, MARK_CLOSE)
        })
        .collect()
}

/// 1-based numbers of the pages containing any term, ascending and without
/// duplicates. A document without page structure is page 1.
pub fn matched_pages(record: &DocumentRecord, terms: &[String]) -> Vec<usize> {
    let terms: Vec<&String> = terms.iter().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return Vec::new();
    }
    let matches = |text: &str| {
        let lower = text.to_lowercase();
        terms.iter().any(|t| lower.contains(t.as_str()))
    };

    if record.pages.is_empty() {
        return if matches(&record.content) { vec![1] } else { Vec::new() };
    }
    record
        .pages
        .iter()
        .enumerate()
        .filter(|(_, page)| matches(page))
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// Compact page list for display: `p.3`, `p.1,4`, or
/// `p.1,2,3,4,5...(9 pages)` once more than `max_display` pages matched.
pub fn format_pages(pages: &[usize], max_display: usize) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let shown: Vec<String> = pages
        .iter()
        .take(max_display.max(1))
        .map(usize::to_string)
        .collect();
    let mut out = format!("p.{}", shown.join(","));
    if pages.len() > shown.len() {
        out.push_str(&format!("{ELLIPSIS}({} pages)", pages.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;

    use super::*;
    use crate::{doc_id::DocumentId, document::Metadata};

    fn config(max: usize) -> SnippetConfig {
        SnippetConfig {
            snippet_max_length: max,
            ..Default::default()
        }
    }

    fn record(content: &str, pages: &[&str]) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            id: DocumentId::from_path_str("/docs/a.pdf"),
            path: PathBuf::from("/docs/a.pdf"),
            file_name: "a.pdf".into(),
            content_type: "application/pdf".into(),
            byte_size: 0,
            last_modified: now,
            indexed_at: now,
            content: content.into(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn terms_are_normalized() {
        assert_eq!(
            query_terms("  Invoice, TOTAL! invoice?? -- "),
            vec!["invoice", "total"]
        );
        assert!(query_terms("?! ...").is_empty());
    }

    #[test]
    fn snippet_centers_on_first_match() {
        let content = format!("{}needle and more text", "x ".repeat(100));
        let snippet = build_snippet(&content, &query_terms("needle"), &config(80));
        assert!(snippet.starts_with(ELLIPSIS));
        assert!(snippet.contains("needle"));
    }

    #[test]
    fn snippet_without_match_is_document_head() {
        let content = "alpha beta gamma delta epsilon";
        let snippet = build_snippet(content, &query_terms("zeta"), &config(10));
        assert_eq!(snippet, "alpha beta...");

        let short = build_snippet("tiny", &query_terms("zeta"), &config(10));
        assert_eq!(short, "tiny");
    }

    #[test]
    fn snippet_collapses_whitespace() {
        let snippet = build_snippet("a\n\n  b\t\tc", &[], &config(50));
        assert_eq!(snippet, "a b c");
    }

    #[test]
    fn snippet_is_bounded_for_large_documents() {
        let content = "lorem ipsum ".repeat(20_000) + "target" + &" tail".repeat(5_000);
        let cfg = config(250);
        let snippet = build_snippet(&content, &query_terms("target"), &cfg);
        assert!(snippet.chars().count() <= cfg.snippet_max_length + 2 * ELLIPSIS.len());
        assert!(snippet.contains("target"));
    }

    #[test]
    fn snippet_match_is_case_insensitive() {
        let snippet = build_snippet("Intro. The INVOICE is due.", &query_terms("invoice"), &config(100));
        assert!(snippet.contains("INVOICE"));
    }

    #[test]
    fn highlight_wraps_every_occurrence() {
        let out = highlight("Rust and rust", &query_terms("rust"), "[", "]");
        assert_eq!(out, "[Rust] and [rust]");
    }

    #[test]
    fn highlight_handles_unicode_case() {
        let out = highlight("ÉTÉ en été", &query_terms("été"), "<", ">");
        assert_eq!(out, "<ÉTÉ> en <été>");
    }

    #[test]
    fn overlapping_terms_nest_markers() {
        let out = highlight("invoice", &query_terms("invoice in"), "[", "]");
        assert_eq!(out, "[[in]voice]");
    }

    #[test]
    fn excerpts_per_term_capped() {
        let content = "one two three four five six seven";
        let terms = query_terms("one two three four five six seven");
        let excerpts = highlight_excerpts(content, &terms, &SnippetConfig::default());
        assert_eq!(excerpts.len(), MAX_HIGHLIGHTS);
        assert!(excerpts[0].contains("**one**"));
    }

    #[test]
    fn excerpts_skip_missing_terms() {
        let excerpts = highlight_excerpts(
            "Budget review for March",
            &query_terms("zebra budget"),
            &SnippetConfig::default(),
        );
        assert_eq!(excerpts, vec!["**Budget** review for March"]);
    }

    #[test]
    fn matched_pages_are_ascending_and_unique() {
        let r = record(
            "",
            &["invoice one", "nothing", "Invoice total invoice", "INVOICE"],
        );
        assert_eq!(
            matched_pages(&r, &query_terms("invoice total")),
            vec![1, 3, 4]
        );
    }

    #[test]
    fn unpaged_document_is_page_one() {
        let r = record("a note about invoices", &[]);
        assert_eq!(matched_pages(&r, &query_terms("invoice")), vec![1]);
        assert!(matched_pages(&r, &query_terms("receipt")).is_empty());
        assert!(matched_pages(&r, &[]).is_empty());
    }

    #[test]
    fn page_display() {
        assert_eq!(format_pages(&[], 5), "");
        assert_eq!(format_pages(&[3], 5), "p.3");
        assert_eq!(format_pages(&[1, 4], 5), "p.1,4");
        assert_eq!(
            format_pages(&[1, 2, 3, 4, 5, 6, 7, 8, 9], 5),
            "p.1,2,3,4,5...(9 pages)"
        );
    }
}
