//! Turns index hits into displayable results by re-reading the source files.

use std::path::Path;

use tracing::{debug, warn};

use crate::{
    config::{ExtractConfig, SnippetConfig},
    extract::{ExtractError, Extractor},
    search::SearchResult,
    snippet,
    tantivy_index::IndexHit,
};

pub const FILE_NOT_FOUND: &str = "[file not found]";
pub const UNREADABLE_FILE: &str = "[could not read file]";

/// An extractor that stops reading after `preview_max_length` characters.
pub fn preview_extractor(
    extract: &ExtractConfig,
    snippet: &SnippetConfig,
) -> Extractor {
    Extractor::new(extract.bounded(snippet.preview_max_length))
}

/// Build snippets, highlights and matched pages for each hit.
///
/// A file that disappeared or can no longer be read keeps its place in the
/// results with a sentinel snippet.
pub fn enrich_results(
    hits: Vec<IndexHit>,
    query: &str,
    extractor: &Extractor,
    config: &SnippetConfig,
) -> Vec<SearchResult> {
    let terms = snippet::query_terms(query);
    hits.into_iter()
        .map(|hit| enrich_hit(hit, &terms, extractor, config))
        .collect()
}

fn enrich_hit(
    hit: IndexHit,
    terms: &[String],
    extractor: &Extractor,
    config: &SnippetConfig,
) -> SearchResult {
    let (snippet, highlights, matched_pages) =
        match extractor.extract(Path::new(&hit.path)) {
            Ok(record) => (
                snippet::build_snippet(&record.content, terms, config),
                snippet::highlight_excerpts(&record.content, terms, config),
                snippet::matched_pages(&record, terms),
            ),
            Err(ExtractError::Io(e))
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %hit.path, "indexed file no longer exists");
                (FILE_NOT_FOUND.to_string(), Vec::new(), Vec::new())
            }
            Err(e) => {
                warn!(path = %hit.path, "could not re-read file: {e}");
                (UNREADABLE_FILE.to_string(), Vec::new(), Vec::new())
            }
        };

    SearchResult {
        document_id: hit.id,
        path: hit.path,
        file_name: hit.file_name,
        content_type: hit.content_type,
        score: hit.score,
        snippet,
        highlights,
        page_count: hit.page_count,
        matched_pages,
        file_size: hit.size,
        last_modified: hit.last_modified_display,
        indexed_at: hit.indexed_at_display,
    }
}
