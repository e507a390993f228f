use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::doc_id::DocumentId;

/// Marker separating pages in concatenated extractor output (form feed).
pub const PAGE_BREAK: char = '\x0C';

/// Joins page texts in the flattened document content.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Content type recorded for documents whose text could not be extracted.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Well-known metadata keys.
pub mod meta {
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const CREATED: &str = "created";
    pub const MODIFIED: &str = "modified";
    pub const PAGE_COUNT: &str = "pageCount";
    pub const WORD_COUNT: &str = "wordCount";
}

/// Document metadata. Blank values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key` unless it is blank after trimming.
    pub fn insert(&mut self, key: &str, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if value.is_empty() {
            self.0.remove(key);
        } else {
            self.0.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Copy every non-blank entry of `other` into `self`.
    pub fn merge(&mut self, other: Metadata) {
        for (key, value) in other.0 {
            self.insert(&key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse the flattened form written by [`Metadata::to_json`]. Invalid
    /// input yields an empty map.
    pub fn from_json(raw: &str) -> Self {
        let map: BTreeMap<String, String> =
            serde_json::from_str(raw).unwrap_or_default();
        let mut metadata = Self::new();
        for (key, value) in map {
            metadata.insert(&key, value);
        }
        metadata
    }
}

/// Text and metadata produced by an extraction strategy, before it is tied
/// to a file on disk.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub content: String,
    pub pages: Vec<String>,
    pub content_type: String,
    pub metadata: Metadata,
}

impl ExtractedContent {
    /// Build content from concatenated text, splitting on [`PAGE_BREAK`].
    pub fn from_text(text: String, content_type: impl Into<String>) -> Self {
        let pages = split_pages(&text);
        let content = if pages.is_empty() {
            text
        } else {
            pages.join(PAGE_SEPARATOR)
        };
        Self {
            content,
            pages,
            content_type: content_type.into(),
            metadata: Metadata::new(),
        }
    }

    /// Build content whose page boundaries are already known.
    pub fn from_pages(pages: Vec<String>, content_type: impl Into<String>) -> Self {
        Self {
            content: pages.join(PAGE_SEPARATOR),
            pages,
            content_type: content_type.into(),
            metadata: Metadata::new(),
        }
    }

    /// Empty content with the generic octet-stream type.
    pub fn empty() -> Self {
        Self {
            content_type: OCTET_STREAM.to_string(),
            ..Default::default()
        }
    }

    /// Truncate content (and pages) to at most `max_chars` characters.
    ///
    /// Paged content is cut page by page and `content` is rebuilt from the
    /// pages that remain, so both always hold the same text.
    pub fn truncate(&mut self, max_chars: usize) {
        if self.content.chars().count() <= max_chars {
            return;
        }
        if self.pages.is_empty() {
            truncate_chars(&mut self.content, max_chars);
            return;
        }

        let separator = PAGE_SEPARATOR.chars().count();
        let mut remaining = max_chars;
        let mut kept: Vec<String> = Vec::new();
        for mut page in std::mem::take(&mut self.pages) {
            if !kept.is_empty() {
                if remaining <= separator {
                    break;
                }
                remaining -= separator;
            }
            if remaining == 0 {
                break;
            }
            let len = page.chars().count();
            if len > remaining {
                truncate_chars(&mut page, remaining);
                kept.push(page);
                break;
            }
            remaining -= len;
            kept.push(page);
        }
        self.content = kept.join(PAGE_SEPARATOR);
        self.pages = kept;
    }
}

/// A fully extracted document, ready to be written to the index.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub byte_size: u64,
    pub last_modified: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub content: String,
    pub pages: Vec<String>,
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// Number of pages; a document without page structure is one page.
    pub fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Split concatenated text on [`PAGE_BREAK`].
///
/// Returns an empty vector when there is only a single segment: such content
/// is page 1 and carries no multi-page structure. A trailing break does not
/// create an extra page.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut segments: Vec<&str> = text.split(PAGE_BREAK).collect();
    if segments.len() > 1
        && segments.last().is_some_and(|s| s.trim().is_empty())
    {
        segments.pop();
    }
    if segments.len() <= 1 {
        return Vec::new();
    }
    segments.into_iter().map(|s| s.trim().to_string()).collect()
}

/// Truncate a string to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
}

/// Display form used for stored timestamps.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
