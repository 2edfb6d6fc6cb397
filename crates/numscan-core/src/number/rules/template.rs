//! Number templates and the compiler that turns them into matchers.
//!
//! Two template conventions are supported:
//! - placeholder templates, e.g. `###-##-####`, where `#` stands for one digit
//!   and every other character is a literal separator;
//! - group-length templates, e.g. `6-3-4` or `5..6-3-4`, listing the digit
//!   count of each hyphen-separated group.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Candidate, FieldExtractor};
use crate::error::CompileError;

/// Default symbol standing for "one digit" in placeholder templates.
pub const DEFAULT_PLACEHOLDER: char = '#';

/// Upper bound for a single digit group.
pub const MAX_GROUP_LEN: usize = 64;

const DIGIT: &str = "[0-9]";

/// How template whitespace (and group separators) are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitespaceMode {
    /// Whitespace in the template matches zero or more whitespace characters.
    #[default]
    Lenient,
    /// Whitespace in the template matches one or more whitespace characters.
    Strict,
}

impl WhitespaceMode {
    fn whitespace_pattern(self) -> &'static str {
        match self {
            WhitespaceMode::Lenient => r"\s*",
            WhitespaceMode::Strict => r"\s+",
        }
    }

    fn group_separator_pattern(self) -> &'static str {
        match self {
            WhitespaceMode::Lenient => r"\s*-?\s*",
            WhitespaceMode::Strict => r"(?:\s*-\s*|\s+)",
        }
    }
}

/// Template convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateMode {
    /// `###-##-####` style.
    #[default]
    Placeholder,
    /// `6-3-4` style.
    GroupLengths,
}

impl fmt::Display for TemplateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateMode::Placeholder => write!(f, "placeholder"),
            TemplateMode::GroupLengths => write!(f, "group-lengths"),
        }
    }
}

/// A template string together with the convention it is written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub mode: TemplateMode,
    pub text: String,
}

impl TemplateSpec {
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            mode: TemplateMode::Placeholder,
            text: text.into(),
        }
    }

    pub fn group_lengths(text: impl Into<String>) -> Self {
        Self {
            mode: TemplateMode::GroupLengths,
            text: text.into(),
        }
    }
}

/// One element of a parsed placeholder template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToken {
    /// Exactly one decimal digit.
    Digit,
    /// A literal separator, tolerant to surrounding whitespace.
    Literal(char),
    /// A run of template whitespace.
    Whitespace,
}

/// A parsed placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<TemplateToken>,
}

impl Template {
    /// Parse a placeholder template.
    ///
    /// Whitespace runs collapse into a single [`TemplateToken::Whitespace`] and
    /// leading/trailing whitespace is ignored.
    pub fn parse(template: &str, placeholder: char) -> Result<Self, CompileError> {
        let mut tokens: Vec<TemplateToken> = Vec::new();

        for c in template.trim().chars() {
            let token = if c == placeholder {
                TemplateToken::Digit
            } else if c.is_whitespace() {
                TemplateToken::Whitespace
            } else {
                TemplateToken::Literal(c)
            };

            if token == TemplateToken::Whitespace
                && tokens.last() == Some(&TemplateToken::Whitespace)
            {
                continue;
            }
            tokens.push(token);
        }

        if !tokens.contains(&TemplateToken::Digit) {
            return Err(CompileError::NoPlaceholder);
        }

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[TemplateToken] {
        &self.tokens
    }

    /// Number of digits a match of this template contains.
    pub fn digit_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| **t == TemplateToken::Digit)
            .count()
    }

    fn to_pattern(&self, whitespace: WhitespaceMode) -> String {
        let last = self.tokens.len().saturating_sub(1);
        let mut pattern = String::new();
        for (i, token) in self.tokens.iter().enumerate() {
            match token {
                TemplateToken::Digit => pattern.push_str(DIGIT),
                TemplateToken::Whitespace => pattern.push_str(whitespace.whitespace_pattern()),
                TemplateToken::Literal(c) => {
                    // Edge literals must not pull surrounding whitespace into the match.
                    if i > 0 {
                        pattern.push_str(r"\s*");
                    }
                    pattern.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
                    if i < last {
                        pattern.push_str(r"\s*");
                    }
                }
            }
        }
        pattern
    }
}

/// Inclusive digit-count range of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRange {
    pub min: usize,
    pub max: usize,
}

impl GroupRange {
    /// A group of exactly `len` digits.
    pub fn exact(len: usize) -> Self {
        Self { min: len, max: len }
    }

    /// A group of `min..=max` digits.
    pub fn new(min: usize, max: usize) -> Result<Self, CompileError> {
        if min == 0 {
            return Err(CompileError::InvalidGroupSpec(
                "group length must be at least 1".to_string(),
            ));
        }
        if min > max {
            return Err(CompileError::InvalidGroupSpec(format!(
                "group range {}..{} is empty",
                min, max
            )));
        }
        if max > MAX_GROUP_LEN {
            return Err(CompileError::InvalidGroupSpec(format!(
                "group length {} exceeds {}",
                max, MAX_GROUP_LEN
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }

    /// Parse one group: `6`, `5..6`, or a run of placeholders (`######`).
    pub fn parse(part: &str, placeholder: char) -> Result<Self, CompileError> {
        let part = part.trim();
        if part.is_empty() {
            return Err(CompileError::InvalidGroupSpec("empty group".to_string()));
        }

        if part.chars().all(|c| c == placeholder) {
            return Self::new(part.chars().count(), part.chars().count());
        }

        let parse_len = |s: &str| {
            s.trim().parse::<usize>().map_err(|_| {
                CompileError::InvalidGroupSpec(format!("'{}' is not a group length", part))
            })
        };

        match part.split_once("..") {
            Some((min, max)) => Self::new(parse_len(min)?, parse_len(max)?),
            None => {
                let len = parse_len(part)?;
                Self::new(len, len)
            }
        }
    }

    pub(crate) fn quantifier(&self) -> String {
        if self.min == self.max {
            format!("{{{}}}", self.min)
        } else {
            format!("{{{},{}}}", self.min, self.max)
        }
    }
}

impl fmt::Display for GroupRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

/// Parse a hyphen-delimited list of group ranges, e.g. `5..6-3-4`.
pub fn parse_group_spec(spec: &str, placeholder: char) -> Result<Vec<GroupRange>, CompileError> {
    if spec.trim().is_empty() {
        return Err(CompileError::InvalidGroupSpec("no groups given".to_string()));
    }

    spec.split('-')
        .enumerate()
        .map(|(i, part)| {
            GroupRange::parse(part, placeholder).map_err(|e| match e {
                CompileError::InvalidGroupSpec(reason) => {
                    CompileError::InvalidGroupSpec(format!("group {}: {}", i + 1, reason))
                }
                other => other,
            })
        })
        .collect()
}

/// An immutable matcher compiled from a template.
///
/// Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    template: String,
    mode: TemplateMode,
}

impl CompiledMatcher {
    /// All non-overlapping matches, left to right.
    pub fn find_all(&self, text: &str) -> Vec<Candidate> {
        self.regex
            .find_iter(text)
            .map(|m| Candidate::new(m.as_str(), m.start(), m.end()))
            .collect()
    }

    /// The leftmost match, if any.
    pub fn find_first(&self, text: &str) -> Option<Candidate> {
        self.regex
            .find(text)
            .map(|m| Candidate::new(m.as_str(), m.start(), m.end()))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Generated regular expression source.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Template the matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn mode(&self) -> TemplateMode {
        self.mode
    }
}

impl FieldExtractor for CompiledMatcher {
    type Output = Candidate;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.find_first(text)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.find_all(text)
    }
}

/// Compiles templates into [`CompiledMatcher`]s.
#[derive(Debug, Clone, Copy)]
pub struct TemplateCompiler {
    placeholder: char,
    whitespace: WhitespaceMode,
}

impl TemplateCompiler {
    /// Create a compiler with `#` placeholders and lenient whitespace.
    pub fn new() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER,
            whitespace: WhitespaceMode::Lenient,
        }
    }

    /// Set the digit placeholder symbol.
    pub fn with_placeholder(mut self, placeholder: char) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Set whitespace strictness.
    pub fn with_whitespace(mut self, whitespace: WhitespaceMode) -> Self {
        self.whitespace = whitespace;
        self
    }

    /// Compile a template in the convention named by `spec.mode`.
    pub fn compile(&self, spec: &TemplateSpec) -> Result<CompiledMatcher, CompileError> {
        match spec.mode {
            TemplateMode::Placeholder => self.compile_placeholder(&spec.text),
            TemplateMode::GroupLengths => self.compile_group_lengths(&spec.text),
        }
    }

    /// Compile a placeholder template such as `###-##-####`.
    pub fn compile_placeholder(&self, template: &str) -> Result<CompiledMatcher, CompileError> {
        let parsed = Template::parse(template, self.placeholder)?;
        let pattern = parsed.to_pattern(self.whitespace);
        self.build(pattern, template, TemplateMode::Placeholder)
    }

    /// Compile a group-length template such as `6-3-4` or `5..6-3-4`.
    ///
    /// Group lengths bound each group, not the whole match: the pattern is
    /// not anchored at digit boundaries, so `6-3-4` also finds
    /// `234567 123 4567` inside `1234567 123 4567`. Add a grammar when the
    /// surrounding digits matter.
    pub fn compile_group_lengths(&self, spec: &str) -> Result<CompiledMatcher, CompileError> {
        let groups = parse_group_spec(spec, self.placeholder)?;
        let pattern = groups
            .iter()
            .map(|g| format!("{}{}", DIGIT, g.quantifier()))
            .collect::<Vec<_>>()
            .join(self.whitespace.group_separator_pattern());
        self.build(pattern, spec, TemplateMode::GroupLengths)
    }

    fn build(
        &self,
        pattern: String,
        template: &str,
        mode: TemplateMode,
    ) -> Result<CompiledMatcher, CompileError> {
        let regex = Regex::new(&pattern)?;
        debug!("Compiled {} template '{}' -> {}", mode, template, pattern);
        Ok(CompiledMatcher {
            regex,
            template: template.to_string(),
            mode,
        })
    }
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a template with the default compiler settings.
pub fn compile_template(spec: &str, mode: TemplateMode) -> Result<CompiledMatcher, CompileError> {
    TemplateCompiler::new().compile(&TemplateSpec {
        mode,
        text: spec.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_parse_tokens() {
        let template = Template::parse("##-#  #", '#').unwrap();
        assert_eq!(
            template.tokens(),
            &[
                TemplateToken::Digit,
                TemplateToken::Digit,
                TemplateToken::Literal('-'),
                TemplateToken::Digit,
                TemplateToken::Whitespace,
                TemplateToken::Digit,
            ]
        );
        assert_eq!(template.digit_count(), 4);
    }

    #[test]
    fn test_no_placeholder() {
        for template in ["", "   ", "ABC-/", "----"] {
            assert!(matches!(
                compile_template(template, TemplateMode::Placeholder),
                Err(CompileError::NoPlaceholder)
            ));
        }
    }

    #[test]
    fn test_placeholder_tolerates_spaced_separators() {
        let matcher = compile_template("###-##-####", TemplateMode::Placeholder).unwrap();
        assert_eq!(
            matcher.find_first("SSN: 123 - 45 - 6789").unwrap().text,
            "123 - 45 - 6789"
        );
        assert_eq!(matcher.find_first("123-45-6789").unwrap().text, "123-45-6789");
        assert!(matcher.find_first("123-4-56789").is_none());
    }

    #[test]
    fn test_literals_are_escaped() {
        let matcher = compile_template("##.##", TemplateMode::Placeholder).unwrap();
        assert!(matcher.is_match("12.34"));
        assert!(!matcher.is_match("12a34"));

        let matcher = compile_template("(###)", TemplateMode::Placeholder).unwrap();
        assert_eq!(matcher.find_first("tel (123) x").unwrap().text, "(123)");
    }

    #[test]
    fn test_whitespace_modes() {
        let lenient = TemplateCompiler::new().compile_placeholder("### ###").unwrap();
        assert!(lenient.is_match("123 456"));
        assert!(lenient.is_match("123456"));

        let strict = TemplateCompiler::new()
            .with_whitespace(WhitespaceMode::Strict)
            .compile_placeholder("### ###")
            .unwrap();
        assert!(strict.is_match("123   456"));
        assert!(!strict.is_match("123456"));
    }

    #[test]
    fn test_custom_placeholder() {
        let matcher = TemplateCompiler::new()
            .with_placeholder('X')
            .compile_placeholder("XX/XX")
            .unwrap();
        assert_eq!(matcher.find_first("date 12 / 34").unwrap().text, "12 / 34");
        assert!(matches!(
            TemplateCompiler::new().with_placeholder('X').compile_placeholder("##/##"),
            Err(CompileError::NoPlaceholder)
        ));
    }

    #[test]
    fn test_find_all_order_and_spans() {
        let matcher = compile_template("##-##", TemplateMode::Placeholder).unwrap();
        let text = "a 12-34 b 56-78";
        let found = matcher.find_all(text);
        assert_eq!(texts(&found), vec!["12-34", "56-78"]);
        assert_eq!((found[0].start, found[0].end), (2, 7));
        assert_eq!(&text[found[1].start..found[1].end], "56-78");
        assert_eq!(matcher.extract(text), Some(found[0].clone()));
        assert_eq!(matcher.extract_all(text), found);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let a = compile_template("###-## ##", TemplateMode::Placeholder).unwrap();
        let b = compile_template("###-## ##", TemplateMode::Placeholder).unwrap();
        assert_eq!(a.pattern(), b.pattern());

        let text = "x 123-45 67 y 123 - 4567 z 999-99-99";
        assert_eq!(a.find_all(text), b.find_all(text));
    }

    #[test]
    fn test_group_lengths_exact() {
        let matcher = compile_template("6-3-4", TemplateMode::GroupLengths).unwrap();
        assert_eq!(
            matcher.find_first("plate 123456 123 4567").unwrap().text,
            "123456 123 4567"
        );
        assert!(matcher.is_match("123456-123-4567"));
        assert!(matcher.is_match("1234561234567"));
        assert!(!matcher.is_match("12345 123 4567"));
    }

    #[test]
    fn test_group_lengths_not_digit_bounded() {
        let matcher = compile_template("6-3-4", TemplateMode::GroupLengths).unwrap();
        let found = matcher.find_first("1234567 123 4567").unwrap();
        assert_eq!(found.text, "234567 123 4567");
        assert_eq!(found.start, 1);
    }

    #[test]
    fn test_group_lengths_range() {
        let matcher = compile_template("5..6-3-4", TemplateMode::GroupLengths).unwrap();
        assert_eq!(
            matcher.find_first("12345 123 4567").unwrap().text,
            "12345 123 4567"
        );
        assert_eq!(
            matcher.find_first("123456 123 4567").unwrap().text,
            "123456 123 4567"
        );
    }

    #[test]
    fn test_group_lengths_from_placeholders() {
        let a = compile_template("######-###-####", TemplateMode::GroupLengths).unwrap();
        let b = compile_template("6-3-4", TemplateMode::GroupLengths).unwrap();
        assert_eq!(a.pattern(), b.pattern());
    }

    #[test]
    fn test_group_lengths_strict_requires_separator() {
        let strict = TemplateCompiler::new()
            .with_whitespace(WhitespaceMode::Strict)
            .compile_group_lengths("3-2")
            .unwrap();
        assert!(strict.is_match("123 45"));
        assert!(strict.is_match("123 - 45"));
        assert!(!strict.is_match("12345"));
    }

    #[test]
    fn test_invalid_group_specs() {
        for spec in ["", "6--4", "a-3", "0-3", "6..5", "6-", "65-3"] {
            let result = compile_template(spec, TemplateMode::GroupLengths);
            assert!(
                matches!(result, Err(CompileError::InvalidGroupSpec(_))),
                "spec {:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_group_range_display() {
        assert_eq!(GroupRange::exact(4).to_string(), "4");
        assert_eq!(GroupRange::new(5, 6).unwrap().to_string(), "5..6");
        assert!(GroupRange::new(2, 3).unwrap().contains(3));
        assert!(!GroupRange::new(2, 3).unwrap().contains(4));
    }
}
