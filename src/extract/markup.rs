//! Text recovery from HTML and XML markup.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::PAGE_BREAK;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid regex")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|tr|table|section|article|h[1-6]|pre|blockquote)\b[^>]*>")
        .expect("valid regex")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static HTML_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex")
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("valid regex"));

static XML_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z_][\w:.-]*)([^>]*?)(/?)>|<[!?][^>]*>|([^<]+)")
        .expect("valid regex")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex")
});

/// Decode the predefined XML entities, a few common HTML ones, and numeric
/// character references. Unknown entities are left as-is.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| {
                        name.strip_prefix('#').and_then(|d| d.parse().ok())
                    })
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Visible text of an HTML document.
pub fn html_to_text(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, " ");
    let with_breaks = BLOCK_TAG.replace_all(&without_code, "\n");
    let stripped = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let compact = BLANK_LINES.replace_all(&decoded, "\n\n");
    compact.trim().to_string()
}

/// Contents of the `<title>` element, if any.
pub fn html_title(html: &str) -> Option<String> {
    HTML_TITLE
        .captures(html)
        .map(|caps| decode_entities(caps[1].trim()))
        .filter(|t| !t.is_empty())
}

/// Describes how an XML vocabulary maps onto plain text.
#[derive(Debug, Clone, Copy)]
pub struct XmlTextRules {
    /// Character data is kept only inside these elements.
    pub text_elements: &'static [&'static str],
    /// A newline is emitted when one of these closes.
    pub paragraph_elements: &'static [&'static str],
    /// Emit a tab when one of these opens or closes (self-closing form).
    pub tab_elements: &'static [&'static str],
    /// Emit a single space.
    pub space_elements: &'static [&'static str],
    /// Emit a newline.
    pub line_break_elements: &'static [&'static str],
    /// Emit a page break for these elements when their attributes contain
    /// the given fragment.
    pub page_break_elements: &'static [(&'static str, &'static str)],
    /// Emit a page break when one of these closes.
    pub page_end_elements: &'static [&'static str],
}

impl XmlTextRules {
    pub const EMPTY: Self = Self {
        text_elements: &[],
        paragraph_elements: &[],
        tab_elements: &[],
        space_elements: &[],
        line_break_elements: &[],
        page_break_elements: &[],
        page_end_elements: &[],
    };
}

/// Walk an XML document and collect its text according to `rules`.
pub fn xml_to_text(xml: &str, rules: &XmlTextRules) -> String {
    let mut out = String::new();
    let mut text_depth = 0usize;

    for caps in XML_TOKEN.captures_iter(xml) {
        if let Some(chars) = caps.get(5) {
            if text_depth > 0 {
                out.push_str(&decode_entities(chars.as_str()));
            }
            continue;
        }
        let Some(name) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());
        let attrs = caps.get(3).map_or("", |m| m.as_str());

        if closing {
            if rules.text_elements.contains(&name) {
                text_depth = text_depth.saturating_sub(1);
            }
            if rules.paragraph_elements.contains(&name) {
                out.push('\n');
            }
            if rules.page_end_elements.contains(&name) {
                out.push(PAGE_BREAK);
            }
            continue;
        }

        if rules.tab_elements.contains(&name) {
            out.push('\t');
        } else if rules.space_elements.contains(&name) {
            out.push(' ');
        } else if rules
            .page_break_elements
            .iter()
            .any(|(el, attr)| *el == name && attrs.contains(attr))
        {
            out.push(PAGE_BREAK);
        } else if rules.line_break_elements.contains(&name) {
            out.push('\n');
        }

        if !self_closing && rules.text_elements.contains(&name) {
            text_depth += 1;
        }
        if self_closing && rules.paragraph_elements.contains(&name) {
            out.push('\n');
        }
    }

    out
}

/// Text content of the first `<name>` element in `xml`.
pub fn element_text(xml: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}\s*>",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .map(|caps| decode_entities(caps[1].trim()))
        .filter(|t| !t.is_empty())
}
