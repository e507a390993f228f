use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::error::{Error, Result};

/// Default OCR language set passed to tesseract (`-l`).
pub const DEFAULT_OCR_LANGUAGES: &str = "eng";

/// Default wall-clock limit for a single OCR invocation.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of characters in a result snippet.
pub const DEFAULT_SNIPPET_MAX_LENGTH: usize = 250;

/// Characters of leading context kept before the first match.
pub const DEFAULT_SNIPPET_CONTEXT: usize = 50;

/// Characters read back from a source file when building a preview.
/// Snippets, highlights and matched pages only see this prefix.
pub const DEFAULT_PREVIEW_MAX_LENGTH: usize = 100_000;

/// Matched page numbers shown before the list is abbreviated.
pub const DEFAULT_MAX_DISPLAY_PAGES: usize = 5;

/// Default admission limit for files fed to the extractor, in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;

#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language list, e.g. `eng` or `eng+deu`.
    pub languages: String,
    pub timeout: Duration,
    pub binary: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_OCR_LANGUAGES.to_string(),
            timeout: DEFAULT_OCR_TIMEOUT,
            binary: PathBuf::from("tesseract"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    /// Stop extracting once this many characters have been collected.
    pub max_content_length: Option<usize>,
    pub ocr: OcrConfig,
}

impl ExtractConfig {
    /// Same settings, capped at `limit` characters.
    pub fn bounded(&self, limit: usize) -> Self {
        let max_content_length = Some(
            self.max_content_length
                .map_or(limit, |current| current.min(limit)),
        );
        Self {
            max_content_length,
            ocr: self.ocr.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnippetConfig {
    pub snippet_max_length: usize,
    pub context_before: usize,
    pub preview_max_length: usize,
    pub max_display_pages: usize,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            snippet_max_length: DEFAULT_SNIPPET_MAX_LENGTH,
            context_before: DEFAULT_SNIPPET_CONTEXT,
            preview_max_length: DEFAULT_PREVIEW_MAX_LENGTH,
            max_display_pages: DEFAULT_MAX_DISPLAY_PAGES,
        }
    }
}

/// Runtime configuration: defaults, then environment overrides.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub snippet: SnippetConfig,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(langs) = lookup("DOCSEEK_OCR_LANG") {
            let langs = langs.trim();
            if langs.is_empty() {
                return Err(Error::Config(
                    "DOCSEEK_OCR_LANG must not be empty".into(),
                ));
            }
            config.extract.ocr.languages = langs.to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "DOCSEEK_OCR_TIMEOUT_SECS")? {
            config.extract.ocr.timeout = Duration::from_secs(secs);
        }
        if let Some(binary) = lookup("DOCSEEK_TESSERACT") {
            config.extract.ocr.binary = PathBuf::from(binary);
        }
        if let Some(max) =
            parse_var::<usize>(&lookup, "DOCSEEK_MAX_CONTENT_LENGTH")?
        {
            config.extract.max_content_length = (max > 0).then_some(max);
        }
        if let Some(len) = parse_var::<usize>(&lookup, "DOCSEEK_SNIPPET_LENGTH")? {
            if len == 0 {
                return Err(Error::Config(
                    "DOCSEEK_SNIPPET_LENGTH must be positive".into(),
                ));
            }
            config.snippet.snippet_max_length = len;
        }
        if let Some(len) = parse_var::<usize>(&lookup, "DOCSEEK_PREVIEW_LENGTH")? {
            if len == 0 {
                return Err(Error::Config(
                    "DOCSEEK_PREVIEW_LENGTH must be positive".into(),
                ));
            }
            config.snippet.preview_max_length = len;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key}: invalid value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.extract.ocr.languages, "eng");
        assert_eq!(config.extract.ocr.timeout, DEFAULT_OCR_TIMEOUT);
        assert_eq!(config.extract.max_content_length, None);
        assert_eq!(config.snippet.snippet_max_length, 250);
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DOCSEEK_OCR_LANG", "eng+deu"),
            ("DOCSEEK_OCR_TIMEOUT_SECS", "5"),
            ("DOCSEEK_MAX_CONTENT_LENGTH", "1000"),
            ("DOCSEEK_SNIPPET_LENGTH", "80"),
            ("DOCSEEK_PREVIEW_LENGTH", "500000"),
        ]))
        .unwrap();

        assert_eq!(config.extract.ocr.languages, "eng+deu");
        assert_eq!(config.extract.ocr.timeout, Duration::from_secs(5));
        assert_eq!(config.extract.max_content_length, Some(1000));
        assert_eq!(config.snippet.snippet_max_length, 80);
        assert_eq!(config.snippet.preview_max_length, 500_000);
    }

    #[test]
    fn invalid_number_is_config_error() {
        let err = Config::from_lookup(lookup(&[(
            "DOCSEEK_OCR_TIMEOUT_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_snippet_length_rejected() {
        let err =
            Config::from_lookup(lookup(&[("DOCSEEK_SNIPPET_LENGTH", "0")]))
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bounded_takes_the_smaller_limit() {
        let unbounded = ExtractConfig::default();
        assert_eq!(unbounded.bounded(10).max_content_length, Some(10));

        let tight = ExtractConfig {
            max_content_length: Some(5),
            ..Default::default()
        };
        assert_eq!(tight.bounded(10).max_content_length, Some(5));
    }
}
