//! Common regex patterns used by the normalizer and validator.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A hyphen together with any whitespace/hyphen run around it ("12 - 34", "12--34")
    pub static ref HYPHEN_RUN: Regex = Regex::new(r"[\s\-]*-[\s\-]*").unwrap();

    // Horizontal whitespace runs inside a line
    pub static ref SPACE_RUN: Regex = Regex::new(r" {2,}").unwrap();

    // Anything that is not an ASCII digit
    pub static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]+").unwrap();

    // Three-group plate identifier: 5-6, 2-3 and 2 digits
    pub static ref PLATE_IDENTIFIER: Regex = Regex::new(
        r"^([0-9]{5,6})([0-9]{2,3})([0-9]{2})$"
    ).unwrap();
}

/// Dash look-alikes that OCR and PDF text layers emit in place of `-`.
pub const DASH_VARIANTS: &[char] = &[
    '\u{2010}', // hyphen
    '\u{2011}', // non-breaking hyphen
    '\u{2012}', // figure dash
    '\u{2013}', // en dash
    '\u{2014}', // em dash
    '\u{2212}', // minus sign
    '\u{FE63}', // small hyphen-minus
    '\u{FF0D}', // fullwidth hyphen-minus
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphen_run() {
        assert_eq!(HYPHEN_RUN.replace_all("12 - 34", "-"), "12-34");
        assert_eq!(HYPHEN_RUN.replace_all("12 -- 34", "-"), "12-34");
        assert_eq!(HYPHEN_RUN.replace_all("12 34", "-"), "12 34");
    }

    #[test]
    fn test_non_digit() {
        assert_eq!(NON_DIGIT.replace_all("12a 3-4", ""), "1234");
    }
}
