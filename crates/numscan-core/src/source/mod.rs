//! Document text sources.
//!
//! A [`TextSource`] turns document bytes plus a type hint into raw text. The
//! number pipeline only ever sees that text, whether it came from an embedded
//! PDF text layer or from OCR.

mod document;

pub use document::{DocumentExtractor, DocumentTextSource};

use std::path::Path;

use serde::Serialize;

use crate::error::SourceError;

/// File extensions accepted as input, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "txt",
];

/// What a text source can do, decided once when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceCapabilities {
    /// Embedded PDF text layers can be read.
    pub embedded_pdf_text: bool,
    /// Images and scanned pages can be recognized.
    pub ocr: bool,
}

/// Kind of input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
}

impl DocumentKind {
    /// Kind for a file extension (without the dot), case-insensitive.
    pub fn from_extension(ext: &str) -> Result<Self, SourceError> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" => Ok(DocumentKind::Image),
            "txt" => Ok(DocumentKind::Text),
            other => Err(SourceError::UnsupportedType(other.to_string())),
        }
    }

    /// Kind for a file path, by extension.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SourceError::UnsupportedType(path.display().to_string()))?;
        Self::from_extension(ext)
    }
}

/// Anything that can turn document bytes into text.
pub trait TextSource {
    /// What this source supports.
    fn capabilities(&self) -> SourceCapabilities;

    /// Recover the text of a document.
    fn extract_text(&self, data: &[u8], kind: DocumentKind) -> Result<String, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_extension("jpeg").unwrap(), DocumentKind::Image);
        assert_eq!(DocumentKind::from_extension("txt").unwrap(), DocumentKind::Text);
        assert!(matches!(
            DocumentKind::from_extension("docx"),
            Err(SourceError::UnsupportedType(ext)) if ext == "docx"
        ));

        for ext in SUPPORTED_EXTENSIONS {
            assert!(DocumentKind::from_extension(ext).is_ok());
        }
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            DocumentKind::from_path(Path::new("scans/Plate.TIF")).unwrap(),
            DocumentKind::Image
        );
        assert!(DocumentKind::from_path(Path::new("README")).is_err());
    }
}
