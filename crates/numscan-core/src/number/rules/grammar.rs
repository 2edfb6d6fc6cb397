//! Structural validation and canonical formatting of matched identifiers.
//!
//! A grammar is a list of digit-group ranges. Candidates are stripped of every
//! separator and the remaining digits are split into groups, earlier groups
//! taking as many digits as they can. The canonical rendering therefore depends
//! on the digit sequence alone.

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::patterns::{NON_DIGIT, PLATE_IDENTIFIER};
use super::template::{parse_group_spec, GroupRange, DEFAULT_PLACEHOLDER};
use crate::error::CompileError;

/// Separator placed between groups in the canonical form.
pub const DEFAULT_GROUP_SEPARATOR: &str = " ";

/// Group layout of the default plate identifier.
pub const PLATE_GRAMMAR: &str = "5..6-2..3-2";

/// A digit-group grammar for identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierGrammar {
    groups: Vec<GroupRange>,
    separator: String,
    regex: Regex,
}

impl IdentifierGrammar {
    /// Build a grammar from explicit group ranges.
    pub fn new(groups: Vec<GroupRange>) -> Result<Self, CompileError> {
        if groups.is_empty() {
            return Err(CompileError::InvalidGroupSpec(
                "grammar needs at least one group".to_string(),
            ));
        }

        let body: String = groups
            .iter()
            .map(|g| format!("([0-9]{})", g.quantifier()))
            .collect();
        let regex = Regex::new(&format!("^{}$", body))?;

        Ok(Self {
            groups,
            separator: DEFAULT_GROUP_SEPARATOR.to_string(),
            regex,
        })
    }

    /// Parse a grammar written as a group spec, e.g. `5..6-2..3-2`.
    pub fn parse(spec: &str) -> Result<Self, CompileError> {
        Self::new(parse_group_spec(spec, DEFAULT_PLACEHOLDER)?)
    }

    /// Three groups of 5-6, 2-3 and exactly 2 digits.
    pub fn plate() -> Self {
        Self {
            groups: vec![
                GroupRange { min: 5, max: 6 },
                GroupRange { min: 2, max: 3 },
                GroupRange::exact(2),
            ],
            separator: DEFAULT_GROUP_SEPARATOR.to_string(),
            regex: PLATE_IDENTIFIER.clone(),
        }
    }

    /// Set the separator used in the canonical form.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn groups(&self) -> &[GroupRange] {
        &self.groups
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Fewest digits an identifier can have.
    pub fn min_len(&self) -> usize {
        self.groups.iter().map(|g| g.min).sum()
    }

    /// Most digits an identifier can have.
    pub fn max_len(&self) -> usize {
        self.groups.iter().map(|g| g.max).sum()
    }

    /// Check a candidate against the grammar and render its canonical form.
    pub fn validate_and_format(&self, candidate: &str) -> Result<ValidatedMatch, Rejected> {
        let reject = |reason| Rejected {
            candidate: candidate.to_string(),
            reason,
        };

        let digits = NON_DIGIT.replace_all(candidate, "").into_owned();
        let len = digits.len();

        if len == 0 {
            return Err(reject(RejectReason::NoDigits));
        }
        if len < self.min_len() {
            return Err(reject(RejectReason::TooShort {
                len,
                min: self.min_len(),
            }));
        }
        if len > self.max_len() {
            return Err(reject(RejectReason::TooLong {
                len,
                max: self.max_len(),
            }));
        }

        let caps = self
            .regex
            .captures(&digits)
            .ok_or_else(|| reject(RejectReason::Ungroupable { len }))?;

        let groups: Vec<String> = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();
        let formatted = groups.join(&self.separator);

        Ok(ValidatedMatch {
            digits,
            groups,
            formatted,
            source: candidate.to_string(),
        })
    }
}

impl Default for IdentifierGrammar {
    fn default() -> Self {
        Self::plate()
    }
}

/// A candidate confirmed by a grammar, with its canonical rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedMatch {
    /// Digits with separators removed.
    pub digits: String,
    /// Digit groups as split by the grammar.
    pub groups: Vec<String>,
    /// Canonical display form.
    pub formatted: String,
    /// Candidate text the match was built from.
    pub source: String,
}

impl AsRef<str> for ValidatedMatch {
    fn as_ref(&self) -> &str {
        &self.formatted
    }
}

impl std::fmt::Display for ValidatedMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted)
    }
}

/// Why a candidate failed validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("no digits")]
    NoDigits,

    #[error("{len} digits, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("{len} digits, allow at most {max}")]
    TooLong { len: usize, max: usize },

    #[error("{len} digits cannot be split into the required groups")]
    Ungroupable { len: usize },
}

/// A candidate dropped by the validator. Never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("rejected '{candidate}': {reason}")]
pub struct Rejected {
    pub candidate: String,
    pub reason: RejectReason,
}

/// Validate a candidate against the default plate grammar.
pub fn validate_identifier(candidate: &str) -> Result<ValidatedMatch, Rejected> {
    IdentifierGrammar::plate().validate_and_format(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_formats_concatenated_digits() {
        let m = validate_identifier("1234561234 56").unwrap();
        assert_eq!(m.formatted, "123456 123 56");
        assert_eq!(m.digits, "12345612356");
        assert_eq!(m.groups, vec!["123456", "123", "56"]);
        assert_eq!(m.source, "1234561234 56");
    }

    #[test]
    fn test_rejects_long_second_group() {
        let err = validate_identifier("123456 1234 56").unwrap_err();
        assert_eq!(err.reason, RejectReason::TooLong { len: 12, max: 11 });
        assert_eq!(err.candidate, "123456 1234 56");
    }

    #[test]
    fn test_rejects_short_and_empty() {
        assert_eq!(
            validate_identifier("1234 12 12").unwrap_err().reason,
            RejectReason::TooShort { len: 8, min: 9 }
        );
        assert_eq!(
            validate_identifier("---").unwrap_err().reason,
            RejectReason::NoDigits
        );
    }

    #[test]
    fn test_rendering_depends_only_on_digits() {
        let a = validate_identifier("12345-123-45").unwrap();
        let b = validate_identifier("1234512345").unwrap();
        let c = validate_identifier("12 34 51 23 45").unwrap();
        assert_eq!(a.formatted, b.formatted);
        assert_eq!(b.formatted, c.formatted);
        assert_eq!(a.formatted, "123451 23 45");
    }

    #[test]
    fn test_shortest_identifier() {
        assert_eq!(validate_identifier("12345 12 12").unwrap().formatted, "12345 12 12");
    }

    #[test]
    fn test_parsed_grammar_matches_plate() {
        let parsed = IdentifierGrammar::parse(PLATE_GRAMMAR).unwrap();
        assert_eq!(parsed.groups(), IdentifierGrammar::plate().groups());
        assert_eq!(
            parsed.validate_and_format("123456 123 56").unwrap(),
            IdentifierGrammar::plate().validate_and_format("123456 123 56").unwrap()
        );
    }

    #[test]
    fn test_custom_grammar_and_separator() {
        let grammar = IdentifierGrammar::parse("3-2-4").unwrap().with_separator("-");
        assert_eq!(grammar.min_len(), 9);
        assert_eq!(grammar.max_len(), 9);
        assert_eq!(
            grammar.validate_and_format("123 45 6789").unwrap().formatted,
            "123-45-6789"
        );
        assert!(IdentifierGrammar::new(Vec::new()).is_err());
    }

    #[test]
    fn test_reject_display() {
        let err = validate_identifier("12").unwrap_err();
        assert_eq!(err.to_string(), "rejected '12': 2 digits, need at least 9");
    }
}
