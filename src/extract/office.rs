//! Text and core metadata from zip-based office documents (OOXML and ODF).
//!
//! Page boundaries that the format records explicitly (hard page breaks in
//! word processing documents, slides, spreadsheet tables) are emitted as
//! [`PAGE_BREAK`](crate::document::PAGE_BREAK).

use std::io::{Cursor, Read};

use zip::{ZipArchive, result::ZipError};

use super::markup::{self, XmlTextRules};
use crate::document::{Metadata, PAGE_BREAK, meta};

/// Upper bound on the decompressed size of a single archive member.
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

const DOCX_RULES: XmlTextRules = XmlTextRules {
    text_elements: &["w:t"],
    paragraph_elements: &["w:p"],
    tab_elements: &["w:tab"],
    line_break_elements: &["w:br", "w:cr"],
    page_break_elements: &[("w:br", r#"w:type="page""#)],
    ..XmlTextRules::EMPTY
};

const PPTX_RULES: XmlTextRules = XmlTextRules {
    text_elements: &["a:t"],
    paragraph_elements: &["a:p"],
    line_break_elements: &["a:br"],
    ..XmlTextRules::EMPTY
};

const XLSX_RULES: XmlTextRules = XmlTextRules {
    text_elements: &["t"],
    paragraph_elements: &["si"],
    ..XmlTextRules::EMPTY
};

const ODF_TEXT_ELEMENTS: &[&str] = &["text:p", "text:h"];

const ODT_RULES: XmlTextRules = XmlTextRules {
    text_elements: ODF_TEXT_ELEMENTS,
    paragraph_elements: ODF_TEXT_ELEMENTS,
    tab_elements: &["text:tab"],
    space_elements: &["text:s"],
    line_break_elements: &["text:line-break"],
    ..XmlTextRules::EMPTY
};

const ODP_RULES: XmlTextRules = XmlTextRules {
    page_end_elements: &["draw:page"],
    ..ODT_RULES
};

const ODS_RULES: XmlTextRules = XmlTextRules {
    page_end_elements: &["table:table"],
    ..ODT_RULES
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFormat {
    Docx,
    Pptx,
    Xlsx,
    Odt,
    Odp,
    Ods,
}

impl OfficeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "docx" | "docm" | "dotx" => Some(Self::Docx),
            "pptx" | "pptm" => Some(Self::Pptx),
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "odt" => Some(Self::Odt),
            "odp" => Some(Self::Odp),
            "ods" => Some(Self::Ods),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Some(Self::Pptx)
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            "application/vnd.oasis.opendocument.text" => Some(Self::Odt),
            "application/vnd.oasis.opendocument.presentation" => Some(Self::Odp),
            "application/vnd.oasis.opendocument.spreadsheet" => Some(Self::Ods),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            Self::Odt => "application/vnd.oasis.opendocument.text",
            Self::Odp => "application/vnd.oasis.opendocument.presentation",
            Self::Ods => "application/vnd.oasis.opendocument.spreadsheet",
        }
    }

    fn is_ooxml(self) -> bool {
        matches!(self, Self::Docx | Self::Pptx | Self::Xlsx)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OfficeError {
    #[error("invalid archive: {0}")]
    Zip(#[from] ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive has no {0} part")]
    MissingPart(&'static str),
}

/// Text and metadata of an office document.
#[derive(Debug, Default)]
pub struct OfficeText {
    pub text: String,
    pub metadata: Metadata,
}

pub fn extract(
    bytes: &[u8],
    format: OfficeFormat,
) -> Result<OfficeText, OfficeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let text = match format {
        OfficeFormat::Docx => {
            let xml = read_part(&mut archive, "word/document.xml")?
                .ok_or(OfficeError::MissingPart("word/document.xml"))?;
            markup::xml_to_text(&xml, &DOCX_RULES)
        }
        OfficeFormat::Pptx => {
            let slides = slide_names(&archive);
            if slides.is_empty() {
                return Err(OfficeError::MissingPart("ppt/slides"));
            }
            let mut out = Vec::with_capacity(slides.len());
            for name in slides {
                if let Some(xml) = read_part(&mut archive, &name)? {
                    out.push(markup::xml_to_text(&xml, &PPTX_RULES));
                }
            }
            out.join(&PAGE_BREAK.to_string())
        }
        OfficeFormat::Xlsx => read_part(&mut archive, "xl/sharedStrings.xml")?
            .map(|xml| markup::xml_to_text(&xml, &XLSX_RULES))
            .unwrap_or_default(),
        OfficeFormat::Odt | OfficeFormat::Odp | OfficeFormat::Ods => {
            let xml = read_part(&mut archive, "content.xml")?
                .ok_or(OfficeError::MissingPart("content.xml"))?;
            let rules = match format {
                OfficeFormat::Odp => &ODP_RULES,
                OfficeFormat::Ods => &ODS_RULES,
                _ => &ODT_RULES,
            };
            markup::xml_to_text(&xml, rules)
        }
    };

    let metadata = if format.is_ooxml() {
        read_part(&mut archive, "docProps/core.xml")?
            .map(|xml| ooxml_metadata(&xml))
            .unwrap_or_default()
    } else {
        read_part(&mut archive, "meta.xml")?
            .map(|xml| odf_metadata(&xml))
            .unwrap_or_default()
    };

    Ok(OfficeText { text, metadata })
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, OfficeError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut raw = Vec::new();
    file.take(MAX_PART_BYTES).read_to_end(&mut raw)?;
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Slide parts in presentation order (`slide2` before `slide10`).
fn slide_names(archive: &ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

fn ooxml_metadata(xml: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let fields = [
        (meta::TITLE, "dc:title"),
        (meta::AUTHOR, "dc:creator"),
        (meta::CREATED, "dcterms:created"),
        (meta::MODIFIED, "dcterms:modified"),
    ];
    for (key, element) in fields {
        if let Some(value) = markup::element_text(xml, element) {
            metadata.insert(key, value);
        }
    }
    metadata
}

fn odf_metadata(xml: &str) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(title) = markup::element_text(xml, "dc:title") {
        metadata.insert(meta::TITLE, title);
    }
    if let Some(author) = markup::element_text(xml, "meta:initial-creator")
        .or_else(|| markup::element_text(xml, "dc:creator"))
    {
        metadata.insert(meta::AUTHOR, author);
    }
    if let Some(created) = markup::element_text(xml, "meta:creation-date") {
        metadata.insert(meta::CREATED, created);
    }
    if let Some(modified) = markup::element_text(xml, "dc:date") {
        metadata.insert(meta::MODIFIED, modified);
    }
    metadata
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

    use super::*;
    use crate::document::split_pages;

    pub(crate) fn build_zip(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub(crate) fn docx(body: &str) -> Vec<u8> {
        build_zip(&[
            (
                "word/document.xml",
                &format!(
                    r#"<?xml version="1.0"?><w:document><w:body>{body}</w:body></w:document>"#
                ),
            ),
            (
                "docProps/core.xml",
                r#"<cp:coreProperties><dc:title>Budget 2024</dc:title><dc:creator>Grace</dc:creator><dcterms:created>2024-01-02T03:04:05Z</dcterms:created><dc:subject></dc:subject></cp:coreProperties>"#,
            ),
        ])
    }

    #[test]
    fn docx_text_and_metadata() {
        let bytes = docx(
            "<w:p><w:r><w:t>Travel budget</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Hotel and meals</w:t></w:r></w:p>",
        );
        let out = extract(&bytes, OfficeFormat::Docx).unwrap();

        assert_eq!(out.text, "Travel budget\nHotel and meals\n");
        assert_eq!(out.metadata.get(meta::TITLE), Some("Budget 2024"));
        assert_eq!(out.metadata.get(meta::AUTHOR), Some("Grace"));
        assert_eq!(
            out.metadata.get(meta::CREATED),
            Some("2024-01-02T03:04:05Z")
        );
        assert_eq!(out.metadata.get(meta::MODIFIED), None);
    }

    #[test]
    fn docx_page_breaks_split_pages() {
        let bytes = docx(
            r#"<w:p><w:r><w:t>One</w:t></w:r></w:p><w:p><w:r><w:br w:type="page"/><w:t>Two</w:t></w:r></w:p>"#,
        );
        let out = extract(&bytes, OfficeFormat::Docx).unwrap();
        assert_eq!(split_pages(&out.text), vec!["One", "Two"]);
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!("<p:sld><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:sld>")
        };
        let s1 = slide("Intro");
        let s2 = slide("Roadmap");
        let s10 = slide("Questions");
        let bytes = build_zip(&[
            ("ppt/slides/slide10.xml", &s10),
            ("ppt/slides/slide2.xml", &s2),
            ("ppt/slides/slide1.xml", &s1),
        ]);

        let out = extract(&bytes, OfficeFormat::Pptx).unwrap();
        assert_eq!(split_pages(&out.text), vec!["Intro", "Roadmap", "Questions"]);
    }

    #[test]
    fn odt_text_and_metadata() {
        let bytes = build_zip(&[
            (
                "content.xml",
                "<office:text><text:h>Minutes</text:h><text:p>Attendees<text:s/>present</text:p></office:text>",
            ),
            (
                "meta.xml",
                "<office:meta><dc:title>Board meeting</dc:title><meta:initial-creator>Lin</meta:initial-creator></office:meta>",
            ),
        ]);

        let out = extract(&bytes, OfficeFormat::Odt).unwrap();
        assert_eq!(out.text, "Minutes\nAttendees present\n");
        assert_eq!(out.metadata.get(meta::TITLE), Some("Board meeting"));
        assert_eq!(out.metadata.get(meta::AUTHOR), Some("Lin"));
    }

    #[test]
    fn missing_main_part_is_an_error() {
        let bytes = build_zip(&[("unrelated.txt", "hello")]);
        let err = extract(&bytes, OfficeFormat::Docx).unwrap_err();
        assert!(matches!(err, OfficeError::MissingPart(_)));
    }

    #[test]
    fn garbage_is_a_zip_error() {
        let err = extract(b"not a zip", OfficeFormat::Docx).unwrap_err();
        assert!(matches!(err, OfficeError::Zip(_)));
    }

    #[test]
    fn format_lookup() {
        assert_eq!(OfficeFormat::from_extension("docx"), Some(OfficeFormat::Docx));
        assert_eq!(OfficeFormat::from_extension("doc"), None);
        let mime = OfficeFormat::Ods.mime();
        assert_eq!(OfficeFormat::from_mime(mime), Some(OfficeFormat::Ods));
    }
}
