//! Core library for template-driven number extraction from OCR text.
//!
//! This crate provides:
//! - a template compiler for placeholder (`###-##-####`) and group-length
//!   (`6-3-4`) number templates
//! - an OCR-noise text normalizer with an opt-in confusable remap
//! - structural validation of identifiers and near-duplicate filtering
//! - document text sources: PDF text layers with OCR fallback for scans and images

pub mod error;
pub mod models;
pub mod number;
pub mod ocr;
pub mod pdf;
pub mod source;

pub use error::{CompileError, NumscanError, Result, SourceError};
pub use models::NumscanConfig;
pub use number::rules::{
    compile_template, dedupe, normalize, validate_identifier, CompiledMatcher, ConfusableMap,
    DigitGrouping, NormalizationPolicy, Rejected, TemplateMode, TemplateSpec, ValidatedMatch,
    WhitespaceMode,
};
pub use number::{
    extract, extract_matches, Extraction, ExtractionPipeline, ExtractionPolicy, PipelineConfig,
    ResultSet,
};
pub use ocr::{OcrEngine, OcrResult, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfProcessor, PdfType};
pub use source::{
    DocumentExtractor, DocumentKind, DocumentTextSource, SourceCapabilities, TextSource,
};
