//! Rule-based building blocks for number extraction.

pub mod confusables;
pub mod dedupe;
pub mod grammar;
pub mod normalize;
pub mod patterns;
pub mod template;

pub use confusables::ConfusableMap;
pub use dedupe::{
    dedupe, similarity_ratio, DuplicateFilter, DEFAULT_DUPLICATE_THRESHOLD,
    LENIENT_DUPLICATE_THRESHOLD,
};
pub use grammar::{
    validate_identifier, IdentifierGrammar, RejectReason, Rejected, ValidatedMatch,
    DEFAULT_GROUP_SEPARATOR, PLATE_GRAMMAR,
};
pub use normalize::{normalize, DigitGrouping, NormalizationPolicy};
pub use template::{
    compile_template, CompiledMatcher, GroupRange, Template, TemplateCompiler, TemplateMode,
    TemplateSpec, TemplateToken, WhitespaceMode, DEFAULT_PLACEHOLDER, MAX_GROUP_LEN,
};

use serde::{Deserialize, Serialize};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first occurrence of the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A substring matched by a compiled template, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Matched text.
    pub text: String,
    /// Byte offset of the match start in the searched text.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
}

impl Candidate {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Digits of the match with every separator removed.
    pub fn digits(&self) -> String {
        self.text.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl AsRef<str> for Candidate {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
