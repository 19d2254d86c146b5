//! Small text utilities shared by the scorer, planner and knowledge matching.

use std::collections::BTreeSet;

/// Words that never count as topical vocabulary.
const STOPWORDS: &[&str] = &[
    // en
    "the", "and", "for", "with", "that", "this", "from", "your", "you", "are", "how", "what",
    "why", "when", "which", "about", "have", "has", "was", "were", "their", "they", "its",
    // it
    "che", "per", "con", "una", "uno", "del", "della", "delle", "dei", "gli", "come", "sono",
    "nel", "nella", "alla", "questo", "questa", "quali", "quale", "cosa",
    // es / fr / de
    "los", "las", "para", "por", "como", "des", "les", "pour", "avec", "une", "est", "der",
    "die", "das", "und", "mit", "für", "wie", "ist",
];

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Splits text into trimmed, non-empty sentences.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keeps at most `max_words` words of `text`, joined by single spaces.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased content tokens (length ≥ 3, stopwords removed).
pub fn content_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Number of tokens of `text` that appear in `vocabulary`.
pub fn overlap(text: &str, vocabulary: &BTreeSet<String>) -> usize {
    content_tokens(text).intersection(vocabulary).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_split_on_terminators() {
        let s = sentences("First one. Second!  Third?\nFourth");
        assert_eq!(s, vec!["First one", "Second", "Third", "Fourth"]);
    }

    #[test]
    fn truncate_words_normalizes_spacing() {
        assert_eq!(truncate_words("a  b   c d", 3), "a b c");
    }

    #[test]
    fn content_tokens_drop_stopwords_and_short_words() {
        let tokens = content_tokens("How the onboarding flow is for new users");
        assert!(tokens.contains("onboarding"));
        assert!(tokens.contains("users"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
    }

    #[test]
    fn overlap_counts_shared_tokens() {
        let vocab = content_tokens("Pricing and billing");
        assert_eq!(overlap("billing surprises and pricing pages", &vocab), 2);
    }
}
