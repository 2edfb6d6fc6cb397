//! PDF reading for the document text source.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Below this many characters of embedded text a PDF counts as scanned.
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 16;

/// Kind of content a PDF carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

impl PdfType {
    /// Classify by embedded text length and image count.
    pub fn classify(text_len: usize, image_count: usize, min_text_length: usize) -> Self {
        match (text_len >= min_text_length && text_len > 0, image_count > 0) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        }
    }

    /// Whether the embedded text layer is usable on its own.
    pub fn has_text(self) -> bool {
        matches!(self, PdfType::Text | PdfType::Hybrid)
    }
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Classify the loaded document.
    fn analyze(&self) -> PdfType;

    /// Extract the embedded text of the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Images placed on a page (1-indexed).
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use lopdf::{dictionary, Document, Object, Stream};

    /// A one-page PDF showing `text` in Helvetica.
    pub fn text_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(PdfType::classify(200, 0, 16), PdfType::Text);
        assert_eq!(PdfType::classify(3, 2, 16), PdfType::Image);
        assert_eq!(PdfType::classify(200, 1, 16), PdfType::Hybrid);
        assert_eq!(PdfType::classify(0, 0, 0), PdfType::Empty);
        assert!(PdfType::Hybrid.has_text());
        assert!(!PdfType::Image.has_text());
    }
}
