//! The general-purpose parsing pipeline.
//!
//! [`ContentParser`] is the seam between the extraction chain and whatever
//! engine turns bytes into text. [`BuiltinParser`] covers text, HTML, office
//! documents and images (OCR); a different engine can be slotted in through
//! [`ParserStrategy::new`].

use std::time::Duration;

use tracing::warn;

use super::{
    ExtractError,
    ExtractStrategy,
    SourceFile,
    StrategyError,
    markup,
    ocr::{Ocr, OcrError},
    office::{self, OfficeFormat},
    pdf::{PDF_MIME, has_pdf_header},
    text,
};
use crate::{
    config::{ExtractConfig, OcrConfig},
    document::{ExtractedContent, Metadata, meta},
};

/// Magic number of OLE compound files. Password-protected OOXML documents
/// are stored in this container instead of a zip archive.
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const OLE_MIME: &str = "application/x-ole-storage";
const ZIP_MIME: &str = "application/zip";

/// Bytes inspected when guessing whether an unknown file is text.
const SNIFF_LEN: usize = 8192;

/// Hints accompanying the bytes handed to a parser.
#[derive(Debug, Clone, Copy)]
pub struct ParseHints<'a> {
    pub file_name: &'a str,
    /// Lowercased extension without the dot.
    pub extension: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    pub text: String,
    pub content_type: String,
    pub metadata: Metadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,

    #[error("document is encrypted")]
    Encrypted,

    #[error("unsupported content type: {0}")]
    Unsupported(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

/// Turns file bytes into text and metadata.
pub trait ContentParser: Send + Sync {
    fn parse(
        &self,
        bytes: &[u8],
        hints: &ParseHints<'_>,
    ) -> Result<ParsedContent, ParseError>;
}

/// What the built-in parser does with a detected content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Html,
    Office(OfficeFormat),
    Image,
    Pdf,
    Ole,
    Other,
}

pub struct BuiltinParser {
    ocr: Ocr,
}

impl BuiltinParser {
    pub fn new(ocr: OcrConfig) -> Self {
        Self { ocr: Ocr::new(ocr) }
    }

    fn recognize(&self, bytes: &[u8], file_name: &str) -> Result<String, ParseError> {
        match self.ocr.recognize(bytes) {
            Ok(text) => Ok(text),
            Err(OcrError::Unavailable(binary)) => {
                warn!(
                    file = file_name,
                    "OCR engine {} not available, indexing image without text",
                    binary.display()
                );
                Ok(String::new())
            }
            Err(OcrError::Timeout(limit)) => Err(ParseError::Timeout(limit)),
            Err(e) => Err(ParseError::Failed(e.to_string())),
        }
    }
}

impl ContentParser for BuiltinParser {
    fn parse(
        &self,
        bytes: &[u8],
        hints: &ParseHints<'_>,
    ) -> Result<ParsedContent, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::Empty);
        }

        let content_type = detect_mime(bytes, hints);
        let mut metadata = Metadata::new();

        let text = match classify(&content_type, hints.extension) {
            Kind::Text => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    ParseError::Failed("content is not valid UTF-8".into())
                })?;
                if text::is_markdown(&content_type, hints.extension)
                    && let Some(title) = text::markdown_title(&text)
                {
                    metadata.insert(meta::TITLE, title);
                }
                text
            }
            Kind::Html => {
                let html = String::from_utf8_lossy(bytes);
                if let Some(title) = markup::html_title(&html) {
                    metadata.insert(meta::TITLE, title);
                }
                markup::html_to_text(&html)
            }
            Kind::Office(format) => {
                let out = office::extract(bytes, format)
                    .map_err(|e| ParseError::Failed(e.to_string()))?;
                metadata.merge(out.metadata);
                out.text
            }
            Kind::Image => self.recognize(bytes, hints.file_name)?,
            Kind::Pdf => {
                return Err(if contains(bytes, b"/Encrypt") {
                    ParseError::Encrypted
                } else {
                    ParseError::Failed("PDF has no readable text layer".into())
                });
            }
            Kind::Ole => {
                let ooxml = hints
                    .extension
                    .and_then(OfficeFormat::from_extension)
                    .is_some();
                return Err(if ooxml {
                    ParseError::Encrypted
                } else {
                    ParseError::Unsupported(content_type)
                });
            }
            Kind::Other => return Err(ParseError::Unsupported(content_type)),
        };

        Ok(ParsedContent {
            text,
            content_type,
            metadata,
        })
    }
}

/// Runs a [`ContentParser`] as a link of the extraction chain.
pub struct ParserStrategy {
    parser: Box<dyn ContentParser>,
}

impl ParserStrategy {
    pub fn new(parser: impl ContentParser + 'static) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }
}

impl ExtractStrategy for ParserStrategy {
    fn name(&self) -> &'static str {
        "parser"
    }

    fn try_extract(
        &self,
        source: &SourceFile,
        _config: &ExtractConfig,
    ) -> Result<ExtractedContent, StrategyError> {
        let hints = ParseHints {
            file_name: &source.file_name,
            extension: source.extension.as_deref(),
        };
        match self.parser.parse(&source.bytes, &hints) {
            Ok(parsed) => {
                let mut content =
                    ExtractedContent::from_text(parsed.text, parsed.content_type);
                content.metadata = parsed.metadata;
                Ok(content)
            }
            Err(ParseError::Empty) => {
                Err(StrategyError::Terminal(ExtractError::EmptyFile))
            }
            Err(ParseError::Encrypted) => {
                Err(StrategyError::Terminal(ExtractError::Encrypted))
            }
            Err(ParseError::Timeout(limit)) => {
                Err(StrategyError::Terminal(ExtractError::Timeout(limit)))
            }
            Err(e @ (ParseError::Unsupported(_) | ParseError::Failed(_))) => {
                Err(StrategyError::Failed(e.to_string()))
            }
        }
    }
}

/// Detect the MIME type from magic bytes, then from the file name, then by
/// sniffing for text.
pub fn detect_mime(bytes: &[u8], hints: &ParseHints<'_>) -> String {
    let by_name = || {
        mime_guess::from_path(hints.file_name)
            .first()
            .map(|m| m.essence_str().to_string())
    };

    let sniffed = if has_pdf_header(bytes) {
        Some(PDF_MIME)
    } else if bytes.starts_with(OLE_MAGIC) {
        Some(OLE_MIME)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") && bytes.len() > 14 && by_name().as_deref() == Some("image/bmp") {
        Some("image/bmp")
    } else {
        None
    };

    if let Some(mime) = sniffed {
        return mime.to_string();
    }
    if bytes.starts_with(b"PK\x03\x04") {
        // Office formats are zip archives told apart by their extension.
        return hints
            .extension
            .and_then(OfficeFormat::from_extension)
            .map_or_else(|| by_name().unwrap_or_else(|| ZIP_MIME.into()), |f| {
                f.mime().to_string()
            });
    }
    match by_name() {
        Some(mime) => mime,
        None if looks_like_text(bytes) => "text/plain".to_string(),
        None => crate::document::OCTET_STREAM.to_string(),
    }
}

fn classify(mime: &str, extension: Option<&str>) -> Kind {
    if let Some(format) = OfficeFormat::from_mime(mime) {
        return Kind::Office(format);
    }
    match mime {
        PDF_MIME => Kind::Pdf,
        OLE_MIME => Kind::Ole,
        "text/html" | "application/xhtml+xml" | "image/svg+xml" => Kind::Html,
        m if m.starts_with("image/") => Kind::Image,
        m if text::is_text_mime(m) => Kind::Text,
        _ if extension.is_some_and(text::is_text_extension) => Kind::Text,
        _ => Kind::Other,
    }
}

fn looks_like_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character may straddle the sniff boundary.
        Err(e) => e.error_len().is_none(),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
