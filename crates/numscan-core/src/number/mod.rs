//! Number extraction module.

mod pipeline;
pub mod rules;

pub use pipeline::{Extraction, ExtractionPipeline, PipelineConfig, ResultSet};

use serde::{Deserialize, Serialize};

use rules::{Candidate, CompiledMatcher, FieldExtractor};

/// How many matches an extraction returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// At most one match, the earliest.
    FirstOnly,
    /// Every non-overlapping match, left to right.
    #[default]
    All,
}

/// Run `matcher` over already normalized text.
///
/// Finding nothing is a normal outcome and yields an empty vector.
pub fn extract(matcher: &CompiledMatcher, text: &str, policy: ExtractionPolicy) -> Vec<Candidate> {
    match policy {
        ExtractionPolicy::FirstOnly => matcher.extract(text).into_iter().collect(),
        ExtractionPolicy::All => matcher.extract_all(text),
    }
}

/// Like [`extract`], returning only the matched text.
pub fn extract_matches(
    matcher: &CompiledMatcher,
    text: &str,
    policy: ExtractionPolicy,
) -> Vec<String> {
    extract(matcher, text, policy)
        .into_iter()
        .map(|c| c.text)
        .collect()
}
