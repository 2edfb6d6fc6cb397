//! Configuration models.

pub mod config;

pub use config::{
    ExtractionConfig, ModelConfig, NormalizationConfig, NumscanConfig, OcrConfig, PdfConfig,
    TemplateConfig,
};
