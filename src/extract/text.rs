//! Raw UTF-8 reads of text-like files.
//!
//! Last link of the extraction chain: source code, configuration and other
//! plain files that the parser rejected (usually because they are not valid
//! UTF-8) are still indexed with a lossy decode.

use super::{ExtractStrategy, SourceFile, StrategyError};
use crate::{config::ExtractConfig, document::ExtractedContent};

/// Extensions read as plain text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "log", "md", "markdown", "rst", "adoc", "org", "tex",
    "csv", "tsv", "rs", "py", "java", "js", "mjs", "ts", "tsx", "jsx", "go",
    "c", "cpp", "cc", "h", "hpp", "cs", "json", "jsonl", "xml", "css", "scss",
    "sass", "toml", "yaml", "yml", "ini", "cfg", "conf", "env", "sh", "bash",
    "zsh", "fish", "ps1", "sql", "rb", "php", "swift", "kt", "kts", "scala",
    "clj", "ex", "exs", "erl", "hs", "ml", "mli", "fs", "fsx", "lua", "vim",
    "el", "lisp", "scm", "rkt", "asm", "s", "dockerfile", "makefile", "cmake",
    "gradle", "sbt", "cabal", "nix", "tf", "hcl", "r", "pl", "dart", "zig",
];

/// Non-`text/*` types whose payload is still plain text.
const TEXT_MIMES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/x-sh",
    "application/x-csh",
    "application/toml",
    "application/yaml",
    "application/x-yaml",
    "application/sql",
    "application/x-tex",
    "application/x-latex",
    "application/rtf",
];

pub struct PlainTextStrategy;

impl ExtractStrategy for PlainTextStrategy {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn try_extract(
        &self,
        source: &SourceFile,
        _config: &ExtractConfig,
    ) -> Result<ExtractedContent, StrategyError> {
        if !source
            .extension
            .as_deref()
            .is_some_and(is_text_extension)
        {
            return Err(StrategyError::NotApplicable);
        }

        let text = String::from_utf8_lossy(&source.bytes).into_owned();
        let content_type = mime_guess::from_path(&source.path)
            .first()
            .map(|m| m.essence_str().to_string())
            .filter(|m| is_text_mime(m))
            .unwrap_or_else(|| "text/plain".to_string());

        // Single page: form feeds in source files are not page breaks.
        Ok(ExtractedContent {
            content: text,
            content_type,
            ..Default::default()
        })
    }
}

pub fn is_text_extension(extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Whether a MIME type denotes plain text. HTML is excluded: it has its own
/// conversion.
pub fn is_text_mime(mime: &str) -> bool {
    if mime == "text/html" {
        return false;
    }
    mime.starts_with("text/")
        || TEXT_MIMES.contains(&mime)
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}

pub fn is_markdown(mime: &str, extension: Option<&str>) -> bool {
    mime.contains("markdown")
        || extension.is_some_and(|ext| matches!(ext, "md" | "markdown"))
}

/// The first level-one ATX heading (`# Title`) of a markdown document.
pub fn markdown_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("# ")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn source(name: &str, bytes: &[u8]) -> SourceFile {
        SourceFile::from_parts(
            format!("/tmp/{name}").into(),
            bytes.to_vec(),
            Utc::now(),
        )
    }

    #[test]
    fn title_from_heading() {
        assert_eq!(
            markdown_title("# My Document\n\nSome body text.").as_deref(),
            Some("My Document")
        );
    }

    #[test]
    fn title_skips_empty_heading() {
        assert_eq!(
            markdown_title("# \n\ntext\n# Real").as_deref(),
            Some("Real")
        );
        assert_eq!(markdown_title("No heading here."), None);
        assert_eq!(markdown_title("## Only a subheading"), None);
    }

    #[test]
    fn text_mimes() {
        assert!(is_text_mime("text/plain"));
        assert!(is_text_mime("text/markdown"));
        assert!(is_text_mime("application/json"));
        assert!(is_text_mime("application/vnd.api+json"));
        assert!(!is_text_mime("text/html"));
        assert!(!is_text_mime("image/png"));
        assert!(!is_text_mime("application/octet-stream"));
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert!(is_text_extension("rs"));
        assert!(is_text_extension("TOML"));
        assert!(!is_text_extension("exe"));
    }

    #[test]
    fn lossy_read_of_invalid_utf8() {
        let content = PlainTextStrategy
            .try_extract(&source("old.txt", b"na\xefve"), &ExtractConfig::default())
            .unwrap();
        assert!(content.content.starts_with("na"));
        assert!(content.content.ends_with("ve"));
        assert_eq!(content.content_type, "text/plain");
        assert!(content.pages.is_empty());
    }

    #[test]
    fn form_feed_does_not_split_source_files() {
        let content = PlainTextStrategy
            .try_extract(&source("main.c", b"int a;\x0Cint b;"), &ExtractConfig::default())
            .unwrap();
        assert!(content.pages.is_empty());
        assert!(content.content.contains("int b;"));
    }

    #[test]
    fn binary_extension_is_not_applicable() {
        let result = PlainTextStrategy
            .try_extract(&source("tool.exe", b"MZ\0\0"), &ExtractConfig::default());
        assert!(matches!(result, Err(StrategyError::NotApplicable)));
    }
}
