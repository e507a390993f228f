//! Format-aware content extraction.
//!
//! A file is pushed through an ordered chain of [`ExtractStrategy`]
//! implementations. Each strategy either declines the file, produces
//! content, fails (handing the file to the next strategy), or stops the
//! chain with a terminal [`ExtractError`]:
//!
//! | Order | Strategy | Handles |
//! |-------|----------|---------|
//! | 1 | [`PdfStrategy`] | PDFs, page by page, OCR for scanned pages |
//! | 2 | [`ParserStrategy`] | MIME-detected text, HTML, office, images (OCR) |
//! | 3 | [`PlainTextStrategy`] | raw UTF-8 read of text-like extensions |
//!
//! When every strategy gives up the file is [`ExtractError::Unsupported`].

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    config::ExtractConfig,
    doc_id::DocumentId,
    document::{DocumentRecord, ExtractedContent, meta},
};

pub mod markup;
pub mod ocr;
pub mod office;
pub mod parser;
pub mod pdf;
pub mod scanned;
pub mod text;

pub use parser::{BuiltinParser, ContentParser, ParserStrategy};
pub use pdf::PdfStrategy;
pub use text::PlainTextStrategy;

/// Per-file extraction failure. Never fatal to a batch.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("file is empty")]
    EmptyFile,

    #[error("document is encrypted")]
    Encrypted,

    #[error("unsupported content type: {content_type}")]
    Unsupported { content_type: String },

    #[error("OCR timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Why a strategy did not produce content.
#[derive(Debug)]
pub enum StrategyError {
    /// The strategy does not handle this kind of file.
    NotApplicable,
    /// The strategy tried and failed; the next one gets a chance.
    Failed(String),
    /// The file's fate is decided; no further strategies run.
    Terminal(ExtractError),
}

/// A file loaded for extraction.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    pub file_name: String,
    /// Lowercased extension without the dot.
    pub extension: Option<String>,
    pub bytes: Vec<u8>,
    pub last_modified: DateTime<Utc>,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let path = path.canonicalize()?;
        let fs_meta = std::fs::metadata(&path)?;
        if !fs_meta.is_file() {
            return Err(ExtractError::Failed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(&path)?;
        let last_modified: DateTime<Utc> = fs_meta
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .into();

        Ok(Self::from_parts(path, bytes, last_modified))
    }

    pub fn from_parts(
        path: PathBuf,
        bytes: Vec<u8>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        Self {
            path,
            file_name,
            extension,
            bytes,
            last_modified,
        }
    }

    pub fn has_extension(&self, candidates: &[&str]) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|ext| candidates.contains(&ext))
    }
}

/// One link in the extraction chain.
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_extract(
        &self,
        source: &SourceFile,
        config: &ExtractConfig,
    ) -> Result<ExtractedContent, StrategyError>;
}

/// Runs the strategy chain and turns its output into [`DocumentRecord`]s.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
    config: ExtractConfig,
}

impl Extractor {
    /// The default chain: PDF, generic parser, plain-text fallback.
    pub fn new(config: ExtractConfig) -> Self {
        let parser = BuiltinParser::new(config.ocr.clone());
        let strategies: Vec<Box<dyn ExtractStrategy>> = vec![
            Box::new(PdfStrategy),
            Box::new(ParserStrategy::new(parser)),
            Box::new(PlainTextStrategy),
        ];
        Self::with_strategies(config, strategies)
    }

    pub fn with_strategies(
        config: ExtractConfig,
        strategies: Vec<Box<dyn ExtractStrategy>>,
    ) -> Self {
        Self { strategies, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extract a file, reporting empty, encrypted and unsupported files as
    /// errors.
    pub fn try_extract(
        &self,
        path: &Path,
    ) -> Result<DocumentRecord, ExtractError> {
        let source = SourceFile::load(path)?;
        let content = self.run_chain(&source)?;
        Ok(self.finish(&source, content))
    }

    /// Extract a file for indexing.
    ///
    /// Empty, encrypted and unsupported files produce a record with empty
    /// content and the `application/octet-stream` content type. Only I/O
    /// failures, OCR timeouts and unexpected errors are returned.
    pub fn extract(&self, path: &Path) -> Result<DocumentRecord, ExtractError> {
        let source = SourceFile::load(path)?;
        let content = match self.run_chain(&source) {
            Ok(content) => content,
            Err(
                err @ (ExtractError::EmptyFile
                | ExtractError::Encrypted
                | ExtractError::Unsupported { .. }),
            ) => {
                warn!(path = %source.path.display(), "{err}; indexing without content");
                ExtractedContent::empty()
            }
            Err(err) => return Err(err),
        };
        Ok(self.finish(&source, content))
    }

    fn run_chain(
        &self,
        source: &SourceFile,
    ) -> Result<ExtractedContent, ExtractError> {
        for strategy in &self.strategies {
            match strategy.try_extract(source, &self.config) {
                Ok(content) => {
                    debug!(
                        strategy = strategy.name(),
                        path = %source.path.display(),
                        chars = content.content.len(),
                        "extracted"
                    );
                    return Ok(content);
                }
                Err(StrategyError::NotApplicable) => {}
                Err(StrategyError::Failed(reason)) => {
                    debug!(
                        strategy = strategy.name(),
                        path = %source.path.display(),
                        "falling through: {reason}"
                    );
                }
                Err(StrategyError::Terminal(err)) => return Err(err),
            }
        }

        Err(ExtractError::Unsupported {
            content_type: mime_guess::from_path(&source.path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        })
    }

    fn finish(
        &self,
        source: &SourceFile,
        mut content: ExtractedContent,
    ) -> DocumentRecord {
        if let Some(max) = self.config.max_content_length {
            content.truncate(max);
        }

        let mut record = DocumentRecord {
            id: DocumentId::from_path(&source.path),
            path: source.path.clone(),
            file_name: source.file_name.clone(),
            content_type: content.content_type,
            byte_size: source.bytes.len() as u64,
            last_modified: source.last_modified,
            indexed_at: Utc::now(),
            content: content.content,
            pages: content.pages,
            metadata: content.metadata,
        };
        record
            .metadata
            .insert(meta::PAGE_COUNT, record.page_count().to_string());
        record
            .metadata
            .insert(meta::WORD_COUNT, record.word_count().to_string());
        record
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("Extractor")
            .field("strategies", &names)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OCTET_STREAM;

    fn extractor() -> Extractor {
        Extractor::new(ExtractConfig::default())
    }

    #[test]
    fn plain_text_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "Rust is a systems programming language.").unwrap();

        let record = extractor().extract(&path).unwrap();
        assert_eq!(record.content, "Rust is a systems programming language.");
        assert_eq!(record.file_name, "notes.txt");
        assert_eq!(record.content_type, "text/plain");
        assert!(record.pages.is_empty());
        assert_eq!(record.page_count(), 1);
        assert_eq!(record.metadata.get(meta::WORD_COUNT), Some("6"));
        assert_eq!(record.metadata.get(meta::PAGE_COUNT), Some("1"));
    }

    #[test]
    fn id_follows_absolute_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "# A\n\nbody").unwrap();

        let first = extractor().extract(&path).unwrap();
        std::fs::write(&path, "# A\n\nchanged body").unwrap();
        let second = extractor().extract(&path).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, DocumentId::from_path(&path.canonicalize().unwrap()));
    }

    #[test]
    fn zero_byte_file_is_an_empty_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let err = extractor().try_extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyFile));

        let record = extractor().extract(&path).unwrap();
        assert!(record.content.is_empty());
        assert_eq!(record.content_type, OCTET_STREAM);
        assert_eq!(record.page_count(), 1);
    }

    #[test]
    fn zero_byte_pdf_is_an_empty_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.pdf");
        std::fs::write(&path, "").unwrap();

        let record = extractor().extract(&path).unwrap();
        assert!(record.content.is_empty());
        assert_eq!(record.content_type, OCTET_STREAM);
    }

    #[test]
    fn encrypted_office_file_is_an_empty_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("secret.docx");
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, bytes).unwrap();

        let err = extractor().try_extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Encrypted));

        let record = extractor().extract(&path).unwrap();
        assert!(record.content.is_empty());
        assert_eq!(record.content_type, OCTET_STREAM);
    }

    #[test]
    fn unknown_binary_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 0, 0, 255]).unwrap();

        let err = extractor().try_extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported { .. }));

        let record = extractor().extract(&path).unwrap();
        assert_eq!(record.content_type, OCTET_STREAM);
    }

    #[test]
    fn invalid_utf8_source_falls_back_to_raw_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("legacy.txt");
        std::fs::write(&path, b"caf\xe9 menu").unwrap();

        let record = extractor().extract(&path).unwrap();
        assert!(record.content.starts_with("caf"));
        assert!(record.content.ends_with("menu"));
    }

    #[test]
    fn max_content_length_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("long.txt");
        std::fs::write(&path, "word ".repeat(1000)).unwrap();

        let config = ExtractConfig {
            max_content_length: Some(20),
            ..Default::default()
        };
        let record = Extractor::new(config).extract(&path).unwrap();
        assert_eq!(record.content.chars().count(), 20);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = extractor()
            .extract(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn terminal_strategy_error_stops_the_chain() {
        struct Refuse;
        impl ExtractStrategy for Refuse {
            fn name(&self) -> &'static str {
                "refuse"
            }
            fn try_extract(
                &self,
                _: &SourceFile,
                _: &ExtractConfig,
            ) -> Result<ExtractedContent, StrategyError> {
                Err(StrategyError::Terminal(ExtractError::Encrypted))
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let extractor = Extractor::with_strategies(
            ExtractConfig::default(),
            vec![Box::new(Refuse), Box::new(PlainTextStrategy)],
        );
        assert!(matches!(
            extractor.try_extract(&path).unwrap_err(),
            ExtractError::Encrypted
        ));
    }
}
