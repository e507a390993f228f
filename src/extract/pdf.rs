//! Page-accurate PDF extraction via `pdf_oxide`.

use std::{
    panic::{self, AssertUnwindSafe},
    path::Path,
};

use pdf_oxide::PdfDocument;
use tracing::debug;

use super::{
    ExtractError,
    ExtractStrategy,
    SourceFile,
    StrategyError,
    ocr::{Ocr, OcrError},
    scanned,
};
use crate::{config::ExtractConfig, document::ExtractedContent};

pub const PDF_MIME: &str = "application/pdf";

/// The PDF header may be preceded by junk; readers accept it within the
/// first kilobyte.
const HEADER_WINDOW: usize = 1024;

/// Extracts text from each PDF page separately so page numbers stay exact.
///
/// Pages without a text layer are handed to OCR through their embedded
/// images.
pub struct PdfStrategy;

impl ExtractStrategy for PdfStrategy {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn try_extract(
        &self,
        source: &SourceFile,
        config: &ExtractConfig,
    ) -> Result<ExtractedContent, StrategyError> {
        let has_header = has_pdf_header(&source.bytes);
        if !has_header && !source.has_extension(&["pdf"]) {
            return Err(StrategyError::NotApplicable);
        }
        if !has_header {
            return Err(StrategyError::Failed("missing %PDF header".into()));
        }

        let limit = config.max_content_length;
        let mut pages = panic::catch_unwind(AssertUnwindSafe(|| {
            extract_pages(&source.path, limit)
        }))
        .map_err(|_| StrategyError::Failed("PDF parser panicked".into()))?
        .map_err(StrategyError::Failed)?;

        let ocr = Ocr::new(config.ocr.clone());
        let recognized = panic::catch_unwind(AssertUnwindSafe(|| {
            scanned::recognize_blank_pages(&source.bytes, &mut pages, &ocr)
        }));
        match recognized {
            Ok(Ok(0)) => {}
            Ok(Ok(filled)) => debug!(
                path = %source.path.display(),
                pages = filled,
                "recognized scanned pages"
            ),
            Ok(Err(OcrError::Timeout(limit))) => {
                return Err(StrategyError::Terminal(ExtractError::Timeout(limit)));
            }
            Ok(Err(e)) => debug!(path = %source.path.display(), "page OCR failed: {e}"),
            Err(_) => debug!(path = %source.path.display(), "page image reader panicked"),
        }

        Ok(ExtractedContent::from_pages(pages, PDF_MIME))
    }
}

pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Read the text of every page, stopping early once `limit` characters have
/// been collected. Empty pages are kept so numbering stays aligned.
fn extract_pages(
    path: &Path,
    limit: Option<usize>,
) -> Result<Vec<String>, String> {
    let doc = PdfDocument::open(path)
        .map_err(|e| format!("failed to open PDF: {e}"))?;
    let page_count = doc
        .page_count()
        .map_err(|e| format!("failed to read page count: {e}"))?;
    if page_count == 0 {
        return Err("document has no pages".into());
    }

    let mut pages = Vec::new();
    let mut collected = 0usize;
    for page_idx in 0..page_count {
        if limit.is_some_and(|max| collected >= max) {
            debug!(
                path = %path.display(),
                pages_read = pages.len(),
                "content limit reached, skipping remaining pages"
            );
            break;
        }

        // An unreadable page is kept blank so it can still be OCR'd.
        let text = match doc.extract_text(page_idx) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!(page = page_idx + 1, "failed to extract page text: {e}");
                String::new()
            }
        };
        collected += text.chars().count();
        pages.push(text);
    }

    debug!(
        path = %path.display(),
        pages = pages.len(),
        chars = collected,
        "pdf_oxide extracted"
    );
    Ok(pages)
}
