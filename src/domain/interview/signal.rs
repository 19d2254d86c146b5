//! Engagement signal scoring.
//!
//! A pure heuristic over the user's latest reply: how long it is, whether it
//! carries concrete detail (names, numbers), whether it talks about impact,
//! and whether it shows emotion. The allocator and the micro-planner use the
//! same scorer with different weight tables (see [`ScoringProfile`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::Language;

use super::text::{sentences, truncate_words, word_count};

/// Upper bound (exclusive) of the LOW band.
pub const LOW_BAND_CEILING: f64 = 0.3;
/// Upper bound (inclusive) of the MEDIUM band.
pub const MEDIUM_BAND_CEILING: f64 = 0.6;
/// Maximum words in a salient snippet.
pub const SNIPPET_MAX_WORDS: usize = 20;

/// Coarse engagement band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalBand {
    Low,
    Medium,
    High,
}

impl SignalBand {
    /// LOW below 0.3, HIGH above 0.6, MEDIUM in between (both bounds inclusive).
    pub fn from_score(score: f64) -> Self {
        if score < LOW_BAND_CEILING {
            Self::Low
        } else if score > MEDIUM_BAND_CEILING {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// Scored reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    /// Engagement in `[0, 1]`, rounded to three decimals.
    pub score: f64,
    pub band: SignalBand,
    /// Longest sentence of the reply, at most 20 words.
    pub snippet: String,
}

impl SignalResult {
    /// Result for an empty reply.
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            band: SignalBand::Low,
            snippet: String::new(),
        }
    }
}

/// Weight table for the scorer. Weights should sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight of the length signal.
    pub length: f64,
    /// Word count at which the length signal saturates.
    pub length_saturation_words: usize,
    /// Weight of the "concrete example" proxy (capitalized names, digits).
    pub example: f64,
    /// Weight of impact vocabulary.
    pub impact: f64,
    /// Weight of emotion vocabulary.
    pub emotion: f64,
    /// Weight of the detailed-answer flag.
    pub detail: f64,
    /// Word count from which an answer counts as detailed.
    pub detail_threshold_words: usize,
}

/// Named weight tables.
///
/// The two tables diverge on purpose: the allocator leans on length because
/// it decides how many turns a topic earns, the planner leans on content
/// (examples, impact) because it decides what to probe next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringProfile {
    /// Elastic turn allocation in EXPLORE/DEEPEN.
    Allocation,
    /// Per-turn question strategy selection.
    Planner,
}

impl ScoringProfile {
    /// Returns the weight table for this profile.
    pub fn weights(&self) -> ScoringWeights {
        match self {
            Self::Allocation => ScoringWeights {
                length: 0.35,
                length_saturation_words: 60,
                example: 0.2,
                impact: 0.15,
                emotion: 0.15,
                detail: 0.15,
                detail_threshold_words: 40,
            },
            Self::Planner => ScoringWeights {
                length: 0.2,
                length_saturation_words: 40,
                example: 0.25,
                impact: 0.25,
                emotion: 0.15,
                detail: 0.15,
                detail_threshold_words: 30,
            },
        }
    }
}

fn lexicon_pattern(stems: &[&str]) -> Regex {
    let alternation = stems.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\w*")).expect("static lexicon pattern is valid")
}

static IMPACT_PATTERNS: Lazy<HashMap<Language, Regex>> = Lazy::new(|| {
    HashMap::from([
        (
            Language::En,
            lexicon_pattern(&[
                "impact", "result", "outcome", "improv", "increas", "reduc", "saved", "saving",
                "grow", "revenue", "cost", "efficien", "benefit", "achiev", "decid",
            ]),
        ),
        (
            Language::It,
            lexicon_pattern(&[
                "impatt", "risultat", "miglior", "aument", "riduz", "ridott", "risparm", "cresc",
                "fatturat", "cost", "benefic", "efficien", "ottenut", "decis",
            ]),
        ),
        (
            Language::Es,
            lexicon_pattern(&[
                "impact", "resultad", "mejor", "aument", "reduc", "ahorr", "crec", "ingreso",
                "cost", "benefici", "eficien", "logr", "decidi",
            ]),
        ),
        (
            Language::Fr,
            lexicon_pattern(&[
                "impact", "résultat", "amélior", "augment", "rédu", "économ", "croiss",
                "chiffre", "coût", "bénéfic", "efficac", "obten", "décid",
            ]),
        ),
        (
            Language::De,
            lexicon_pattern(&[
                "auswirk", "ergebnis", "verbesser", "erhöh", "reduz", "spar", "wachs", "umsatz",
                "kost", "nutzen", "effizien", "erreich", "entschied",
            ]),
        ),
    ])
});

static EMOTION_PATTERNS: Lazy<HashMap<Language, Regex>> = Lazy::new(|| {
    HashMap::from([
        (
            Language::En,
            lexicon_pattern(&[
                "love", "hate", "frustrat", "excit", "worr", "happy", "angry", "annoy", "afraid",
                "fear", "proud", "disappoint", "stress", "amazing", "terribl",
            ]),
        ),
        (
            Language::It,
            lexicon_pattern(&[
                "adoro", "odio", "frustr", "entusias", "preoccup", "felic", "arrabbi", "paura",
                "orgogli", "delus", "stress", "fantastic", "terribil", "incredibil",
            ]),
        ),
        (
            Language::Es,
            lexicon_pattern(&[
                "encant", "odio", "frustr", "emocion", "preocup", "feliz", "enfad", "miedo",
                "orgull", "decepcion", "estr[eé]s", "incre[ií]ble", "terribl",
            ]),
        ),
        (
            Language::Fr,
            lexicon_pattern(&[
                "ador", "déteste", "frustr", "excit", "inquiet", "heureu", "fâch", "peur", "fier",
                "déçu", "stress", "incroyabl", "terribl",
            ]),
        ),
        (
            Language::De,
            lexicon_pattern(&[
                "liebe", "hasse", "frustr", "begeister", "sorge", "glücklich", "wütend", "angst",
                "stolz", "enttäusch", "stress", "toll", "schrecklich",
            ]),
        ),
    ])
});

/// Returns true if a token looks like a proper noun or a figure.
fn is_concrete_token(token: &str, position_in_sentence: usize) -> bool {
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    if position_in_sentence == 0 || trimmed == "I" {
        return false;
    }
    trimmed
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() && c.is_uppercase())
}

/// Returns true if the reply names something concrete (a proper noun or a figure).
pub fn mentions_concrete_detail(text: &str) -> bool {
    sentences(text).iter().any(|sentence| {
        sentence
            .split_whitespace()
            .enumerate()
            .any(|(i, token)| is_concrete_token(token, i))
    })
}

/// Longest sentence by word count (first wins ties), truncated to 20 words.
pub fn salient_snippet(text: &str) -> String {
    let mut best: Option<(&str, usize)> = None;
    for sentence in sentences(text) {
        let words = word_count(sentence);
        if best.map_or(true, |(_, w)| words > w) {
            best = Some((sentence, words));
        }
    }
    best.map(|(s, _)| truncate_words(s, SNIPPET_MAX_WORDS))
        .unwrap_or_default()
}

/// Deterministic engagement scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalScorer {
    weights: ScoringWeights,
}

impl SignalScorer {
    /// Creates a scorer with a custom weight table.
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Creates a scorer for a named profile.
    pub fn for_profile(profile: ScoringProfile) -> Self {
        Self::new(profile.weights())
    }

    /// Returns the weight table.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores a reply. Never fails; empty input scores 0.
    pub fn score(&self, text: &str, language: Language) -> SignalResult {
        let words = word_count(text);
        if words == 0 {
            return SignalResult::empty();
        }

        let w = &self.weights;
        let saturation = w.length_saturation_words.max(1) as f64;
        let length_signal = (words as f64 / saturation).min(1.0);

        let mut score = w.length * length_signal;
        if mentions_concrete_detail(text) {
            score += w.example;
        }
        if IMPACT_PATTERNS
            .get(&language)
            .is_some_and(|re| re.is_match(text))
        {
            score += w.impact;
        }
        if EMOTION_PATTERNS
            .get(&language)
            .is_some_and(|re| re.is_match(text))
        {
            score += w.emotion;
        }
        if words >= w.detail_threshold_words {
            score += w.detail;
        }

        let score = (score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
        SignalResult {
            score,
            band: SignalBand::from_score(score),
            snippet: salient_snippet(text),
        }
    }
}

impl Default for SignalScorer {
    fn default() -> Self {
        Self::for_profile(ScoringProfile::Allocation)
    }
}
