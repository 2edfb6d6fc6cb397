//! Parameterized extraction pipeline: normalize, match, validate, dedupe.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CompileError, NumscanError};

use super::rules::{
    normalize, CompiledMatcher, DuplicateFilter, IdentifierGrammar, NormalizationPolicy,
    Rejected, TemplateCompiler, TemplateSpec, ValidatedMatch, WhitespaceMode,
    DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_GROUP_SEPARATOR, DEFAULT_PLACEHOLDER, PLATE_GRAMMAR,
};
use super::{extract, ExtractionPolicy};

/// Every policy knob of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Digit placeholder for placeholder templates and group specs.
    pub placeholder: char,
    /// Whitespace strictness of compiled templates.
    pub whitespace: WhitespaceMode,
    /// Text cleanup applied before matching.
    pub normalization: NormalizationPolicy,
    /// First match only, or all matches.
    pub policy: ExtractionPolicy,
    /// Validate candidates against `grammar`.
    pub validate: bool,
    /// Group spec of the identifier grammar, e.g. `5..6-2..3-2`.
    pub grammar: String,
    /// Separator used when rendering validated identifiers.
    pub separator: String,
    /// Drop near-duplicate matches.
    pub dedupe: bool,
    /// Similarity at or above which a match is a near-duplicate.
    pub duplicate_threshold: f64,
}

impl PipelineConfig {
    /// Free-form numbers: tight digit grouping, first match, no validation.
    pub fn free_form() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER,
            whitespace: WhitespaceMode::Lenient,
            normalization: NormalizationPolicy::free_form(),
            policy: ExtractionPolicy::FirstOnly,
            validate: false,
            grammar: PLATE_GRAMMAR.to_string(),
            separator: DEFAULT_GROUP_SEPARATOR.to_string(),
            dedupe: false,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    /// Plate identifiers: preserved grouping, all matches, validated and deduplicated.
    pub fn plate() -> Self {
        Self {
            normalization: NormalizationPolicy::grouped(),
            policy: ExtractionPolicy::All,
            validate: true,
            dedupe: true,
            ..Self::free_form()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::free_form()
    }
}

/// One accepted match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    /// Display text: the canonical form when validated, the raw match otherwise.
    pub text: String,
    /// Text as matched in the normalized input.
    pub raw: String,
    /// Byte offset of the match in the normalized text.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
    /// Validation details when the grammar ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated: Option<ValidatedMatch>,
}

impl AsRef<str> for Extraction {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Outcome of one extraction run.
///
/// An empty `matches` list means the text was read and nothing matched.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    /// Template the run used.
    pub template: TemplateSpec,
    /// Text the matcher ran over.
    pub normalized_text: String,
    /// Accepted matches in order of first appearance.
    pub matches: Vec<Extraction>,
    /// Candidates dropped by the validator.
    pub rejected: Vec<Rejected>,
    /// Number of matches dropped as near-duplicates.
    pub duplicates_removed: usize,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn first(&self) -> Option<&Extraction> {
        self.matches.first()
    }

    /// Display text of every match.
    pub fn values(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.text.as_str()).collect()
    }
}

/// Runs the normalizer, matcher, validator and duplicate filter in order.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    config: PipelineConfig,
    compiler: TemplateCompiler,
    grammar: Option<IdentifierGrammar>,
    filter: Option<DuplicateFilter>,
}

impl ExtractionPipeline {
    /// Build a pipeline, checking the grammar, remap table and threshold up front.
    pub fn new(config: PipelineConfig) -> Result<Self, NumscanError> {
        let compiler = TemplateCompiler::new()
            .with_placeholder(config.placeholder)
            .with_whitespace(config.whitespace);

        let grammar = if config.validate {
            let grammar = IdentifierGrammar::parse(&config.grammar)?;
            Some(grammar.with_separator(config.separator.clone()))
        } else {
            None
        };

        if let Some(table) = &config.normalization.confusables {
            table.validate()?;
        }

        let filter = if config.dedupe {
            if !(0.0..=1.0).contains(&config.duplicate_threshold) {
                return Err(NumscanError::Config(format!(
                    "duplicate threshold {} is outside 0..=1",
                    config.duplicate_threshold
                )));
            }
            Some(DuplicateFilter::new().with_threshold(config.duplicate_threshold))
        } else {
            None
        };

        Ok(Self {
            config,
            compiler,
            grammar,
            filter,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compile a template with this pipeline's placeholder and whitespace mode.
    pub fn compile(&self, spec: &TemplateSpec) -> Result<CompiledMatcher, CompileError> {
        self.compiler.compile(spec)
    }

    /// Compile `spec` and run the pipeline over `raw`.
    ///
    /// Only compilation can fail. Rejected candidates and duplicates are
    /// reported in the result set.
    pub fn run(&self, spec: &TemplateSpec, raw: &str) -> Result<ResultSet, CompileError> {
        let matcher = self.compile(spec)?;
        Ok(self.run_with(&matcher, raw))
    }

    /// Run the pipeline with an already compiled matcher.
    pub fn run_with(&self, matcher: &CompiledMatcher, raw: &str) -> ResultSet {
        let start = Instant::now();

        let normalized = normalize(raw, &self.config.normalization);
        // With a grammar, the first match is the first candidate that validates.
        let scan = match self.grammar {
            Some(_) => ExtractionPolicy::All,
            None => self.config.policy,
        };
        let candidates = extract(matcher, &normalized, scan);
        debug!(
            "Template '{}' matched {} candidate(s) in {} characters",
            matcher.template(),
            candidates.len(),
            normalized.len()
        );

        let mut rejected = Vec::new();
        let mut matches = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match &self.grammar {
                Some(grammar) => match grammar.validate_and_format(&candidate.text) {
                    Ok(validated) => {
                        matches.push(Extraction {
                            text: validated.formatted.clone(),
                            raw: candidate.text,
                            start: candidate.start,
                            end: candidate.end,
                            validated: Some(validated),
                        });
                        if self.config.policy == ExtractionPolicy::FirstOnly {
                            break;
                        }
                    }
                    Err(rejection) => {
                        debug!("{}", rejection);
                        rejected.push(rejection);
                    }
                },
                None => matches.push(Extraction {
                    text: candidate.text.clone(),
                    raw: candidate.text,
                    start: candidate.start,
                    end: candidate.end,
                    validated: None,
                }),
            }
        }

        let before = matches.len();
        let matches = match &self.filter {
            Some(filter) => filter.filter(matches),
            None => matches,
        };
        let duplicates_removed = before - matches.len();

        info!(
            "Extracted {} match(es), {} rejected, {} duplicate(s) removed",
            matches.len(),
            rejected.len(),
            duplicates_removed
        );

        ResultSet {
            template: TemplateSpec {
                mode: matcher.mode(),
                text: matcher.template().to_string(),
            },
            normalized_text: normalized,
            matches,
            rejected,
            duplicates_removed,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}
