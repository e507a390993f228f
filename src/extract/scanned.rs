//! OCR for PDF pages without a text layer.
//!
//! Scanned documents carry each page as an embedded image. Those images are
//! pulled out with `lopdf`, re-encoded into something the OCR engine reads,
//! and the recognized text is written into the page's slot.

use std::io::{Cursor, Read};

use flate2::read::ZlibDecoder;
use lopdf::{Document, xobject::PdfImage};
use tracing::{debug, warn};

use super::ocr::{Ocr, OcrError};

/// Upper bound on images sent to the engine for one document.
const MAX_IMAGES: usize = 100;

/// Smaller images are icons and rules, not scanned text.
const MIN_DIMENSION: i64 = 50;

/// Fill every blank entry of `pages` with OCR text from the images on that
/// page. Returns how many pages received text.
///
/// A missing OCR engine or an unreadable document leaves the pages as they
/// are. Only a timeout is reported, since it has already cost the caller the
/// full OCR budget.
pub fn recognize_blank_pages(
    bytes: &[u8],
    pages: &mut [String],
    ocr: &Ocr,
) -> Result<usize, OcrError> {
    if !pages.iter().any(|p| p.trim().is_empty()) {
        return Ok(0);
    }

    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("cannot load PDF for page images: {e}");
            return Ok(0);
        }
    };

    let mut filled = 0;
    let mut sent = 0;
    for (page_num, page_id) in doc.get_pages() {
        let Some(slot) = (page_num as usize)
            .checked_sub(1)
            .and_then(|idx| pages.get_mut(idx))
        else {
            continue;
        };
        if !slot.trim().is_empty() {
            continue;
        }

        let images = match doc.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                debug!(page = page_num, "cannot list page images: {e}");
                continue;
            }
        };

        let mut texts = Vec::new();
        for image in &images {
            if sent >= MAX_IMAGES {
                debug!(limit = MAX_IMAGES, "image limit reached");
                break;
            }
            if image.width < MIN_DIMENSION || image.height < MIN_DIMENSION {
                continue;
            }
            let Some(encoded) = encode_for_ocr(image) else {
                continue;
            };
            sent += 1;

            match ocr.recognize(&encoded) {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {}
                Err(OcrError::Unavailable(binary)) => {
                    warn!(
                        "OCR engine {} not available, scanned pages stay empty",
                        binary.display()
                    );
                    return Ok(filled);
                }
                Err(e @ OcrError::Timeout(_)) => return Err(e),
                Err(e) => debug!(page = page_num, "page image not recognized: {e}"),
            }
        }

        if !texts.is_empty() {
            *slot = texts.join("\n");
            filled += 1;
        }
    }

    Ok(filled)
}

/// JPEG and JPEG 2000 streams pass through untouched; raw deflated samples
/// are rebuilt into a PNG.
fn encode_for_ocr(image: &PdfImage<'_>) -> Option<Vec<u8>> {
    let filters = image.filters.as_deref().unwrap_or_default();
    if filters.iter().any(|f| f == "DCTDecode" || f == "JPXDecode") {
        return Some(image.content.to_vec());
    }
    if filters.iter().any(|f| f == "FlateDecode") {
        return match flate_to_png(image) {
            Ok(png) => Some(png),
            Err(e) => {
                debug!(id = ?image.id, "cannot decode page image: {e}");
                None
            }
        };
    }
    debug!(id = ?image.id, ?filters, "unsupported image filter");
    None
}

fn flate_to_png(pdf_image: &PdfImage<'_>) -> Result<Vec<u8>, String> {
    if pdf_image.bits_per_component.is_some_and(|bpc| bpc != 8) {
        return Err("only 8-bit samples are supported".into());
    }
    let width = u32::try_from(pdf_image.width).map_err(|e| e.to_string())?;
    let height = u32::try_from(pdf_image.height).map_err(|e| e.to_string())?;

    let mut samples = Vec::new();
    ZlibDecoder::new(pdf_image.content)
        .read_to_end(&mut samples)
        .map_err(|e| format!("inflate failed: {e}"))?;

    let decoded = match pdf_image.color_space.as_deref() {
        Some("DeviceGray" | "CalGray") => {
            image::GrayImage::from_raw(width, height, samples)
                .map(image::DynamicImage::ImageLuma8)
        }
        Some("DeviceCMYK") => {
            image::RgbImage::from_raw(width, height, cmyk_to_rgb(&samples))
                .map(image::DynamicImage::ImageRgb8)
        }
        _ => image::RgbImage::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageRgb8),
    };
    let decoded =
        decoded.ok_or_else(|| "sample data does not match dimensions".to_string())?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;
    Ok(png)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use std::{io::Write, time::Duration};

    use flate2::{Compression, write::ZlibEncoder};

    use super::*;
    use crate::{
        config::OcrConfig,
        extract::{
            ocr::tests::script,
            pdf::tests::{PageSpec, build_pdf_with},
        },
    };

    fn fake_ocr(dir: &std::path::Path, output: &str) -> Ocr {
        let bin = script(dir, "fake-ocr", &format!("cat >/dev/null\necho '{output}'"));
        Ocr::new(OcrConfig {
            binary: bin,
            timeout: Duration::from_secs(10),
            ..Default::default()
        })
    }

    #[test]
    fn blank_scanned_page_gets_ocr_text() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = build_pdf_with(&[
            PageSpec::Text("Cover letter"),
            PageSpec::Scan(b"fake jpeg bytes"),
        ]);
        let mut pages = vec!["Cover letter".to_string(), String::new()];

        let filled =
            recognize_blank_pages(&pdf, &mut pages, &fake_ocr(tmp.path(), "scanned receipt"))
                .unwrap();

        assert_eq!(filled, 1);
        assert_eq!(pages, vec!["Cover letter", "scanned receipt"]);
    }

    #[test]
    fn pages_with_text_are_not_sent_to_ocr() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = build_pdf_with(&[PageSpec::Text("Typed page")]);
        let mut pages = vec!["Typed page".to_string()];

        let filled =
            recognize_blank_pages(&pdf, &mut pages, &fake_ocr(tmp.path(), "ignored")).unwrap();

        assert_eq!(filled, 0);
        assert_eq!(pages, vec!["Typed page"]);
    }

    #[test]
    fn missing_engine_leaves_pages_empty() {
        let pdf = build_pdf_with(&[PageSpec::Scan(b"fake jpeg bytes")]);
        let mut pages = vec![String::new()];
        let ocr = Ocr::new(OcrConfig {
            binary: "/nonexistent/tesseract-binary".into(),
            ..Default::default()
        });

        assert_eq!(recognize_blank_pages(&pdf, &mut pages, &ocr).unwrap(), 0);
        assert_eq!(pages, vec![String::new()]);
    }

    #[test]
    fn deflated_gray_samples_become_png() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[128u8; 64 * 64]).unwrap();
        let content = encoder.finish().unwrap();
        let dict = lopdf::Dictionary::new();
        let image = PdfImage {
            id: (1, 0),
            width: 64,
            height: 64,
            color_space: Some("DeviceGray".into()),
            filters: Some(vec!["FlateDecode".into()]),
            bits_per_component: Some(8),
            content: &content,
            origin_dict: &dict,
        };

        let png = encode_for_ocr(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 0, 0, 0, 255]), vec![255, 255, 255, 0, 0, 0]);
    }
}
