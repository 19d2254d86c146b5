//! Interview language tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language an interview is conducted in.
///
/// Lexicons (impact words, emotion words, offer phrases) are keyed by this.
/// Unknown tags fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    It,
    Es,
    Fr,
    De,
}

impl Language {
    /// Parses a BCP-47-ish tag (`it`, `it-IT`, `EN_us`), falling back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match primary.as_str() {
            "it" => Self::It,
            "es" => Self::Es,
            "fr" => Self::Fr,
            "de" => Self::De,
            _ => Self::En,
        }
    }

    /// Two-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::It => "it",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_tags() {
        assert_eq!(Language::from_tag("it-IT"), Language::It);
        assert_eq!(Language::from_tag("de_AT"), Language::De);
        assert_eq!(Language::from_tag("ES"), Language::Es);
    }

    #[test]
    fn unknown_tags_fall_back_to_english() {
        assert_eq!(Language::from_tag("pt-BR"), Language::En);
        assert_eq!(Language::from_tag(""), Language::En);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Language::Fr).unwrap(), "\"fr\"");
    }
}
