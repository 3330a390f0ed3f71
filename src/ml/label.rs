//! Sentiment labels.
//!
//! The classifier's probability vector, the confusion matrix and the
//! persisted class order all index classes through [`Sentiment::index`], so
//! the discriminant order below is part of the artifact format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolarityError, Result};

/// Number of sentiment classes.
pub const NUM_CLASSES: usize = 3;

/// Sentiment of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Negative sentiment (class 0).
    Negative,
    /// Neutral sentiment (class 1).
    Neutral,
    /// Positive sentiment (class 2).
    Positive,
}

impl Sentiment {
    /// All labels in class order.
    pub const ALL: [Sentiment; NUM_CLASSES] =
        [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    /// Class index of this label.
    pub fn index(self) -> usize {
        match self {
            Sentiment::Negative => 0,
            Sentiment::Neutral => 1,
            Sentiment::Positive => 2,
        }
    }

    /// Label for a class index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lowercase name, as used in corpora and manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    /// Capitalised name for display to operators.
    pub fn display_name(self) -> &'static str {
        match self {
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::Positive => "Positive",
        }
    }

    /// Parse a corpus label, ignoring case and surrounding whitespace.
    ///
    /// Returns `None` for anything outside the three known labels.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            "positive" => Some(Sentiment::Positive),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Sentiment {
    type Err = PolarityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_label(s).ok_or_else(|| PolarityError::data(format!("unknown label '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for (i, label) in Sentiment::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(Sentiment::from_index(i), Some(*label));
        }
        assert_eq!(Sentiment::from_index(3), None);
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(Sentiment::parse_label(" Positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse_label("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse_label("mixed"), None);
        assert!("".parse::<Sentiment>().is_err());
        assert_eq!("neutral".parse::<Sentiment>().unwrap(), Sentiment::Neutral);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Sentiment::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
        let back: Sentiment = serde_json::from_str("\"positive\"").unwrap();
        assert_eq!(back, Sentiment::Positive);
        assert_eq!(Sentiment::Positive.to_string(), "Positive");
    }
}
