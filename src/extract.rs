//! Bounded text extraction for content classification.
//!
//! Each format is a [`TextExtractor`] strategy; an [`ExtractorRegistry`] picks
//! the strategy by file extension. Extractors only ever read a bounded prefix
//! of a document: at most `char_limit` characters and, for paginated formats,
//! at most `page_limit` pages.

use crate::file_category::normalize_extension;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bounds on how much text an extractor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub char_limit: usize,
    pub page_limit: usize,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not text (detected {mime})", path.display())]
    NotText { path: PathBuf, mime: String },

    #[error("No text extractor for extension '{0}'")]
    Unsupported(String),

    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

/// A text extraction strategy for one family of formats.
pub trait TextExtractor {
    /// Lowercase extensions (without dot) this extractor handles.
    fn extensions(&self) -> &'static [&'static str];

    fn extract(&self, path: &Path, limits: ExtractLimits) -> Result<String, ExtractError>;
}

/// Plain UTF-8 text formats.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "md", "markdown", "csv", "log", "rst"]
    }

    fn extract(&self, path: &Path, limits: ExtractLimits) -> Result<String, ExtractError> {
        let to_error = |source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        };

        // A UTF-8 char is at most 4 bytes, so this prefix always holds `char_limit` chars.
        let byte_limit = limits.char_limit.saturating_mul(4) as u64;
        let mut prefix = Vec::new();
        File::open(path)
            .map_err(to_error)?
            .take(byte_limit)
            .read_to_end(&mut prefix)
            .map_err(to_error)?;

        if let Some(kind) = infer::get(&prefix)
            && kind.matcher_type() != infer::MatcherType::Text
        {
            return Err(ExtractError::NotText {
                path: path.to_path_buf(),
                mime: kind.mime_type().to_string(),
            });
        }

        Ok(truncate_chars(
            &String::from_utf8_lossy(&prefix),
            limits.char_limit,
        ))
    }
}

/// PDF documents, read page by page up to the page limit.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    #[cfg(feature = "pdf")]
    fn extract(&self, path: &Path, limits: ExtractLimits) -> Result<String, ExtractError> {
        let to_error = |e: lopdf::Error| ExtractError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let document = lopdf::Document::load(path).map_err(to_error)?;
        let mut text = String::new();
        for page in document.get_pages().keys().take(limits.page_limit) {
            text.push_str(&document.extract_text(&[*page]).map_err(to_error)?);
            text.push('\n');
            if text.chars().count() >= limits.char_limit {
                break;
            }
        }

        Ok(truncate_chars(&text, limits.char_limit))
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, _path: &Path, _limits: ExtractLimits) -> Result<String, ExtractError> {
        Err(ExtractError::Unsupported("pdf".to_string()))
    }
}

/// Extraction strategies keyed by extension. The first registration of an extension wins.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn TextExtractor + Send + Sync>>,
    by_extension: HashMap<String, usize>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
            by_extension: HashMap::new(),
        }
    }

    pub fn register(&mut self, extractor: impl TextExtractor + Send + Sync + 'static) {
        let index = self.extractors.len();
        for ext in extractor.extensions() {
            self.by_extension
                .entry(normalize_extension(ext))
                .or_insert(index);
        }
        self.extractors.push(Box::new(extractor));
    }

    pub fn supports(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&normalize_extension(ext))
    }

    /// Extract a bounded text prefix using the strategy registered for `ext`.
    pub fn extract(
        &self,
        path: &Path,
        ext: &str,
        limits: ExtractLimits,
    ) -> Result<String, ExtractError> {
        let ext = normalize_extension(ext);
        let index = self
            .by_extension
            .get(&ext)
            .ok_or_else(|| ExtractError::Unsupported(ext.clone()))?;
        self.extractors[*index].extract(path, limits)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PlainTextExtractor);
        registry.register(PdfExtractor);
        registry
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LIMITS: ExtractLimits = ExtractLimits {
        char_limit: 10,
        page_limit: 1,
    };

    #[test]
    fn test_plain_text_is_truncated_to_char_limit() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "0123456789abcdef").unwrap();

        let text = PlainTextExtractor.extract(&path, LIMITS).unwrap();
        assert_eq!(text, "0123456789");
    }

    #[test]
    fn test_plain_text_counts_chars_not_bytes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "ééééééééééééééé").unwrap();

        let text = PlainTextExtractor.extract(&path, LIMITS).unwrap();
        assert_eq!(text, "éééééééééé");
    }

    #[test]
    fn test_binary_content_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("fake.txt");
        fs::write(
            &path,
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00],
        )
        .unwrap();

        let result = PlainTextExtractor.extract(&path, LIMITS);
        assert!(matches!(result, Err(ExtractError::NotText { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = PlainTextExtractor.extract(Path::new("/non/existent.txt"), LIMITS);
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }

    #[test]
    fn test_registry_dispatches_by_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("README.MD");
        fs::write(&path, "# Title").unwrap();

        let registry = ExtractorRegistry::default();
        assert!(registry.supports("md"));
        assert!(registry.supports("PDF"));
        assert!(!registry.supports("jpg"));
        assert_eq!(registry.extract(&path, "MD", LIMITS).unwrap(), "# Title");
    }

    #[test]
    fn test_registry_unknown_extension() {
        let registry = ExtractorRegistry::default();
        let result = registry.extract(Path::new("photo.jpg"), "jpg", LIMITS);
        assert!(matches!(result, Err(ExtractError::Unsupported(ext)) if ext == "jpg"));
    }

    #[test]
    fn test_first_registration_wins() {
        struct Fixed;
        impl TextExtractor for Fixed {
            fn extensions(&self) -> &'static [&'static str] {
                &["txt"]
            }
            fn extract(&self, _: &Path, _: ExtractLimits) -> Result<String, ExtractError> {
                Ok("fixed".to_string())
            }
        }

        let mut registry = ExtractorRegistry::empty();
        registry.register(Fixed);
        registry.register(PlainTextExtractor);

        let text = registry
            .extract(Path::new("/non/existent.txt"), "txt", LIMITS)
            .unwrap();
        assert_eq!(text, "fixed");
        assert!(registry.supports("csv"));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn test_pdf_unsupported_without_feature() {
        let result = PdfExtractor.extract(Path::new("doc.pdf"), LIMITS);
        assert!(matches!(result, Err(ExtractError::Unsupported(_))));
    }
}
