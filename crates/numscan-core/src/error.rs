//! Error types for the numscan-core library.

use thiserror::Error;

/// Main error type for the numscan library.
#[derive(Error, Debug)]
pub enum NumscanError {
    /// The number template could not be compiled.
    #[error("template error: {0}")]
    Compile(#[from] CompileError),

    /// The document text could not be obtained.
    #[error("text source error: {0}")]
    Source(#[from] SourceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while compiling a number template.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Template contains no digit placeholder (or is empty).
    #[error("template contains no digit placeholder")]
    NoPlaceholder,

    /// Group-length template is malformed.
    #[error("invalid group spec: {0}")]
    InvalidGroupSpec(String),

    /// The generated pattern was refused by the regex engine.
    #[error("failed to build pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors reported by a text source when a document cannot be read.
#[derive(Error, Debug)]
pub enum SourceError {
    /// File type is not one of the accepted document kinds.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    /// PDF processing failed.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR engine failed.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Document needs OCR but no engine was loaded.
    #[error("OCR engine is not available")]
    OcrUnavailable,

    /// Image could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Text payload is not valid UTF-8.
    #[error("failed to decode text: {0}")]
    Decode(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Result type for the numscan library.
pub type Result<T> = std::result::Result<T, NumscanError>;
