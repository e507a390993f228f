use owo_colors::OwoColorize;
use serde::Serialize;

use crate::{
    config::SnippetConfig,
    error::Result,
    snippet,
    tantivy_index::{IndexHit, SearchIndex},
};

/// Default number of hits requested from the index.
pub const DEFAULT_MAX_RESULTS: usize = 20;

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub max_results: usize,
    /// Hits scoring below this are dropped.
    pub min_score: f32,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            min_score: 0.0,
        }
    }
}

/// A ranked, enriched result as shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document_id: String,
    pub path: String,
    pub file_name: String,
    pub content_type: String,
    pub score: f32,
    pub snippet: String,
    pub highlights: Vec<String>,
    pub page_count: u64,
    /// Pages containing a query term, within the preview prefix of the file
    /// (`DOCSEEK_PREVIEW_LENGTH` characters). Matches past it are not listed.
    pub matched_pages: Vec<usize>,
    pub file_size: u64,
    pub last_modified: String,
    pub indexed_at: String,
}

/// The `search --json` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport<'a> {
    pub query: &'a str,
    pub min_score: f32,
    pub total_results: usize,
    pub results: &'a [SearchResult],
}

/// Run a BM25 query and drop hits below `min_score`.
///
/// The index returns the top `max_results` hits; the threshold is applied
/// afterwards, so raising it only ever removes results.
pub fn execute_search(
    params: &SearchParams,
    search_index: &SearchIndex,
) -> Result<Vec<IndexHit>> {
    let hits = search_index.search(&params.query, params.max_results)?;
    let total = hits.len();

    let filtered: Vec<IndexHit> = hits
        .into_iter()
        .filter(|hit| hit.score >= params.min_score)
        .collect();

    tracing::debug!(
        query = %params.query,
        hits = total,
        kept = filtered.len(),
        min_score = params.min_score,
        "search finished"
    );
    Ok(filtered)
}

/// Render results for a terminal. Colors and highlight escapes are only
/// emitted when `color` is set.
pub fn format_human(
    results: &[SearchResult],
    query: &str,
    config: &SnippetConfig,
    color: bool,
) -> String {
    use std::fmt::Write;

    if results.is_empty() {
        return format!("No results for \"{query}\".\n");
    }

    let terms = snippet::query_terms(query);
    let (open, close) = if color {
        ("\x1b[1;33m", "\x1b[0m")
    } else {
        (snippet::MARK_OPEN, snippet::MARK_CLOSE)
    };

    let mut out = String::new();
    for (rank, r) in results.iter().enumerate() {
        let pages = snippet::format_pages(&r.matched_pages, config.max_display_pages);
        let header = format!("{:>3}. {}", rank + 1, r.file_name);
        let score = format!("[{:.3}]", r.score);
        if color {
            let _ = write!(out, "{} {}", header.bold(), score.dimmed());
        } else {
            let _ = write!(out, "{header} {score}");
        }
        if !pages.is_empty() {
            let _ = write!(out, " {pages}");
        }
        out.push('\n');

        if color {
            let _ = writeln!(out, "     {}", r.path.cyan());
        } else {
            let _ = writeln!(out, "     {}", r.path);
        }
        let _ = writeln!(
            out,
            "     {} | {} bytes | modified {}",
            r.content_type, r.file_size, r.last_modified
        );
        if !r.snippet.is_empty() {
            let _ = writeln!(out, "     {}", snippet::highlight(&r.snippet, &terms, open, close));
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{} result(s)", results.len());
    out
}

/// Render results as the `search --json` document.
pub fn format_json(
    results: &[SearchResult],
    query: &str,
    min_score: f32,
) -> Result<String> {
    let report = SearchReport {
        query,
        min_score,
        total_results: results.len(),
        results,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
