//! Letter/digit look-alike remapping for purely numeric identifiers.
//!
//! The remap is destructive ("STOP" becomes "5T0P") so it is never applied
//! implicitly; callers opt in by putting a table on the normalization policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::NumscanError;

/// Case-insensitive character substitution table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<char, char>", into = "BTreeMap<char, char>")]
pub struct ConfusableMap {
    map: BTreeMap<char, char>,
}

impl ConfusableMap {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Common OCR misreads of digits.
    pub fn numeric() -> Self {
        Self::new()
            .with('O', '0')
            .with('Q', '0')
            .with('I', '1')
            .with('L', '1')
            .with('|', '1')
            .with('Z', '2')
            .with('S', '5')
            .with('G', '6')
            .with('B', '8')
    }

    /// Add a substitution. Matching on `from` ignores case.
    pub fn with(mut self, from: char, to: char) -> Self {
        self.map.insert(fold(from), to);
        self
    }

    /// Replacement for `c`, if any.
    pub fn get(&self, c: char) -> Option<char> {
        self.map.get(&fold(c)).copied()
    }

    /// Apply the table character by character.
    pub fn apply(&self, text: &str) -> String {
        text.chars().map(|c| self.get(c).unwrap_or(c)).collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Reject tables whose output would be remapped again on a second pass.
    pub fn validate(&self) -> Result<(), NumscanError> {
        for (from, to) in &self.map {
            if self.get(*to).is_some() {
                return Err(NumscanError::Config(format!(
                    "confusable '{}' maps to '{}', which is itself remapped",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

impl From<BTreeMap<char, char>> for ConfusableMap {
    fn from(map: BTreeMap<char, char>) -> Self {
        map.into_iter()
            .fold(Self::new(), |table, (from, to)| table.with(from, to))
    }
}

impl From<ConfusableMap> for BTreeMap<char, char> {
    fn from(table: ConfusableMap) -> Self {
        table.map
    }
}

fn fold(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_table() {
        let table = ConfusableMap::numeric();
        assert_eq!(table.apply("O1Z3"), "0123");
        assert_eq!(table.apply("o1z3"), "0123");
        assert_eq!(table.apply("B5-l|"), "85-11");
        assert_eq!(table.apply("123"), "123");
    }

    #[test]
    fn test_empty_table_is_identity() {
        assert_eq!(ConfusableMap::new().apply("O1Z3"), "O1Z3");
        assert!(ConfusableMap::new().is_empty());
    }

    #[test]
    fn test_validate_rejects_chains() {
        assert!(ConfusableMap::numeric().validate().is_ok());
        let chained = ConfusableMap::new().with('O', '0').with('0', 'X');
        assert!(chained.validate().is_err());
    }

    #[test]
    fn test_deserialize_folds_case() {
        let table: ConfusableMap = serde_json::from_str(r#"{"o": "0", "s": "5"}"#).unwrap();
        assert_eq!(table.apply("SOS"), "505");
        assert_eq!(table.len(), 2);
    }
}
