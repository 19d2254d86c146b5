//! Extension negotiation vocabulary.
//!
//! The DEEP_OFFER reducer lives in the engine; this module holds the intent
//! type it consumes and the recognizer for "was the last question an offer".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::Language;

/// Classified intent of a reply to an extension or consent question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionIntent {
    Accept,
    Refuse,
    /// Ambiguous or unclassifiable. Never treated as consent.
    #[default]
    Neutral,
}

impl ExtensionIntent {
    /// Parses a classifier label; anything unrecognized is neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().trim_matches(|c: char| !c.is_alphabetic()).to_ascii_uppercase().as_str() {
            "ACCEPT" | "YES" => Self::Accept,
            "REFUSE" | "REJECT" | "NO" => Self::Refuse,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for ExtensionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accept => "ACCEPT",
            Self::Refuse => "REFUSE",
            Self::Neutral => "NEUTRAL",
        };
        write!(f, "{s}")
    }
}

/// Which question a classified reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    /// "Shall we continue for a few more minutes?"
    Extension,
    /// "May we keep your contact details?"
    Consent,
}

/// Context handed to an intent classifier alongside the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentContext {
    pub kind: OfferKind,
    pub language: Language,
    /// True if the previous assistant turn was recognizably the question.
    pub was_offer: bool,
}

static OFFER_PATTERNS: Lazy<HashMap<Language, Regex>> = Lazy::new(|| {
    let build = |alternatives: &[&str]| {
        Regex::new(&format!(r"(?i)(?:{})", alternatives.join("|")))
            .expect("static offer pattern is valid")
    };
    HashMap::from([
        (
            Language::En,
            build(&[
                r"(?:few|couple of|\d+) (?:more|extra) minutes",
                r"\bmore time\b",
                r"\bcontinue\b",
                r"\bkeep going\b",
                r"\bextend\b",
                r"\bgo a bit (?:longer|deeper)\b",
            ]),
        ),
        (
            Language::It,
            build(&[
                r"qualche minuto",
                r"(?:altri|ancora) (?:\d+|un paio di|pochi|qualche) minut",
                r"\bcontinuare\b",
                r"\bproseguire\b",
                r"andare avanti",
                r"\bestendere\b",
                r"approfondire",
            ]),
        ),
        (
            Language::Es,
            build(&[
                r"(?:unos|algunos|\d+) minutos m[aá]s",
                r"m[aá]s tiempo",
                r"\bcontinuar\b",
                r"\bseguir\b",
                r"\bextender\b",
            ]),
        ),
        (
            Language::Fr,
            build(&[
                r"quelques minutes",
                r"plus de temps",
                r"\bcontinuer\b",
                r"\bpoursuivre\b",
                r"\bprolonger\b",
            ]),
        ),
        (
            Language::De,
            build(&[
                r"(?:ein paar|einige|\d+) (?:weitere )?minuten",
                r"mehr zeit",
                r"\bweitermachen\b",
                r"\bfortfahren\b",
                r"\bverlängern\b",
            ]),
        ),
    ])
});

/// Returns true if `text` reads like an offer to extend the interview.
///
/// Requires a question and a match in the session language or in English.
pub fn looks_like_extension_offer(text: &str, language: Language) -> bool {
    if !text.contains('?') {
        return false;
    }
    [language, Language::En]
        .iter()
        .filter_map(|lang| OFFER_PATTERNS.get(lang))
        .any(|re| re.is_match(text))
}
