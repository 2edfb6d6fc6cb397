//! Cleanup of raw OCR/PDF text before matching.
//!
//! Normalization is a pure function of the input and the policy, and it is
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use serde::{Deserialize, Serialize};
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

use super::confusables::ConfusableMap;
use super::patterns::{DASH_VARIANTS, HYPHEN_RUN, SPACE_RUN};

/// What to do with whitespace between two digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitGrouping {
    /// Join digits split by whitespace ("12 34" -> "1234"). Used for free-form numbers.
    #[default]
    Tight,
    /// Keep inter-digit spacing. Used when a grammar relies on the grouping.
    Preserve,
}

/// Normalization settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationPolicy {
    /// Inter-digit whitespace policy.
    pub digit_grouping: DigitGrouping,

    /// Opt-in letter to digit remap table.
    pub confusables: Option<ConfusableMap>,
}

impl NormalizationPolicy {
    /// Tight digit grouping, no remap.
    pub fn free_form() -> Self {
        Self {
            digit_grouping: DigitGrouping::Tight,
            confusables: None,
        }
    }

    /// Preserved digit grouping, no remap.
    pub fn grouped() -> Self {
        Self {
            digit_grouping: DigitGrouping::Preserve,
            confusables: None,
        }
    }

    /// Enable confusable remapping with the given table.
    pub fn with_confusables(mut self, table: ConfusableMap) -> Self {
        self.confusables = Some(table);
        self
    }

    /// Normalize `raw` under this policy.
    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw, self)
    }
}

/// Normalize raw recognized text.
pub fn normalize(raw: &str, policy: &NormalizationPolicy) -> String {
    let stripped = strip_unprintable(raw);

    // Remap before any whitespace collapsing, otherwise a digit produced by the
    // remap could open a new digit gap on the next pass.
    let remapped = match &policy.confusables {
        Some(table) => table.apply(&stripped),
        None => stripped,
    };

    let tidy = tidy_lines(&remapped);

    let collapsed = match policy.digit_grouping {
        DigitGrouping::Tight => collapse_digit_gaps(&tidy),
        DigitGrouping::Preserve => tidy,
    };

    HYPHEN_RUN.replace_all(&collapsed, "-").trim().to_string()
}

/// Drop control/format characters, unify line breaks, whitespace and dashes.
fn strip_unprintable(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\n' => out.push('\n'),
            c if DASH_VARIANTS.contains(&c) => out.push('-'),
            c if c.is_whitespace() => out.push(' '),
            c if is_unprintable(c) => {}
            c => out.push(c),
        }
    }

    out
}

/// Control, format (`Cf`) and private-use characters.
fn is_unprintable(c: char) -> bool {
    matches!(
        c.general_category(),
        GeneralCategory::Control | GeneralCategory::Format | GeneralCategory::PrivateUse
    )
}

/// Collapse space runs, trim lines and drop blank ones.
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(|line| SPACE_RUN.replace_all(line, " "))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove every whitespace run that has a digit on both sides.
fn collapse_digit_gaps(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_whitespace() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }

        let digit_before = out.chars().last().is_some_and(|c| c.is_ascii_digit());
        let digit_after = chars.get(i).is_some_and(|c| c.is_ascii_digit());
        if !(digit_before && digit_after) {
            out.extend(&chars[start..i]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::number::rules::{compile_template, TemplateMode};
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "123 - 45 - 6789",
        "ID:\t12 34\r\n\r\n  56 -- 78  ",
        "Plate 123456 123 45\nPlate 123456 123 45",
        "O1Z3 and  S0S\u{00a0}B8",
        "a\u{0000}b\u{200b}c\u{feff}\u{0007}d",
        "12\u{200e}34 \u{202a}56\u{202c}\u{e000}",
        "12\u{2013}34 \u{2212} 56",
        "- 12 -\n- 34",
        "1 2 3 4 5 6",
        "O 1 Z 3",
    ];

    fn policies() -> Vec<NormalizationPolicy> {
        vec![
            NormalizationPolicy::free_form(),
            NormalizationPolicy::grouped(),
            NormalizationPolicy::free_form().with_confusables(ConfusableMap::numeric()),
            NormalizationPolicy::grouped().with_confusables(ConfusableMap::numeric()),
        ]
    }

    #[test]
    fn test_idempotent() {
        for policy in policies() {
            for sample in SAMPLES {
                let once = normalize(sample, &policy);
                let twice = normalize(&once, &policy);
                assert_eq!(once, twice, "policy {:?}, sample {:?}", policy, sample);
            }
        }
    }

    #[test]
    fn test_hyphen_canonicalization() {
        let policy = NormalizationPolicy::free_form();
        assert_eq!(normalize("123 - 45 - 6789", &policy), "123-45-6789");
        assert_eq!(normalize("12 -- 34", &policy), "12-34");
        assert_eq!(normalize("12\u{2013}34 \u{2212} 56", &policy), "12-34-56");
    }

    #[test]
    fn test_digit_grouping() {
        assert_eq!(
            normalize("No. 12 34  56", &NormalizationPolicy::free_form()),
            "No. 123456"
        );
        assert_eq!(
            normalize("No. 12 34  56", &NormalizationPolicy::grouped()),
            "No. 12 34 56"
        );
        assert_eq!(normalize("1 2 3", &NormalizationPolicy::free_form()), "123");
        assert_eq!(normalize("12\n34", &NormalizationPolicy::free_form()), "1234");
        assert_eq!(normalize("12\n34", &NormalizationPolicy::grouped()), "12\n34");
    }

    #[test]
    fn test_strips_unprintable() {
        let policy = NormalizationPolicy::grouped();
        assert_eq!(normalize("a\u{0000}b\u{200b}c\u{feff}\u{0007}d", &policy), "abcd");
        assert_eq!(normalize("x\tq\r\ny", &policy), "x q\ny");
        assert!(
            normalize("ID:\u{0001} 12 \u{000b} 3", &policy)
                .chars()
                .all(|c| c == '\n' || !c.is_control())
        );
    }

    #[test]
    fn test_strips_format_marks_between_digits() {
        let marks = [
            '\u{200E}', // left-to-right mark
            '\u{200F}', // right-to-left mark
            '\u{202A}', // left-to-right embedding
            '\u{202E}', // right-to-left override
            '\u{2066}', // left-to-right isolate
            '\u{2069}', // pop directional isolate
            '\u{061C}', // arabic letter mark
            '\u{E000}', // private use
            '\u{F0001}', // supplementary private use
        ];
        let matcher = compile_template("####", TemplateMode::Placeholder).unwrap();

        for mark in marks {
            let raw = format!("12{}34", mark);
            for policy in policies() {
                let normalized = normalize(&raw, &policy);
                assert_eq!(normalized, "1234", "mark {:?}", mark);
                assert!(matcher.is_match(&normalized), "mark {:?}", mark);
            }
        }
    }

    #[test]
    fn test_tidy_lines() {
        assert_eq!(
            normalize("  first   line  \n\n\n second\n", &NormalizationPolicy::grouped()),
            "first line\nsecond"
        );
    }

    #[test]
    fn test_confusable_remap_is_opt_in() {
        let plain = NormalizationPolicy::free_form();
        assert_eq!(normalize("O1Z3", &plain), "O1Z3");

        let remap = NormalizationPolicy::free_form().with_confusables(ConfusableMap::numeric());
        assert_eq!(normalize("O1Z3", &remap), "0123");
        assert_eq!(normalize("O 1 Z 3", &remap), "0123");
    }

    #[test]
    fn test_empty_input() {
        for policy in policies() {
            assert_eq!(normalize("", &policy), "");
            assert_eq!(normalize("\u{0000}\u{0001}", &policy), "");
        }
    }
}
