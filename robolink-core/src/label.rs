//! Canonical class labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// A classifier label in canonical form: trimmed and uppercased.
///
/// Two raw outputs that differ only in case or surrounding whitespace
/// normalize to the same `Label`, so the gate never treats them as a class
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    /// Normalize a raw classifier label.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

impl From<String> for Label {
    fn from(raw: String) -> Self {
        Self::normalize(&raw)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(Label::normalize("  forward \n").as_str(), "FORWARD");
        assert_eq!(Label::normalize("Stop").as_str(), "STOP");
    }

    #[test]
    fn test_normalize_keeps_inner_whitespace() {
        assert_eq!(Label::normalize(" turn left ").as_str(), "TURN LEFT");
    }

    #[test]
    fn test_normalize_empty() {
        assert!(Label::normalize("   ").is_empty());
        assert!(Label::normalize("").is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent_for_samples() {
        for raw in ["forward", " Back ", "ß-strasse", "ǆ", "\tleft\t"] {
            let once = Label::normalize(raw);
            let twice = Label::normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_from_conversions_normalize() {
        let a: Label = "stop".into();
        let b: Label = String::from(" STOP").into();
        assert_eq!(a, b);
    }
}
