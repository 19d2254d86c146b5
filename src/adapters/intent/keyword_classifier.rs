//! Keyword-based intent classifier.
//!
//! Counts accept and refuse markers in the session language and in English.
//! Multi-word phrases are matched (and blanked out) before single words so
//! that "va bene così" counts as a refusal rather than as the "va bene" it
//! contains. The side with more hits wins; a tie is NEUTRAL.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::domain::foundation::Language;
use crate::domain::interview::{ExtensionIntent, IntentContext};
use crate::ports::ExtensionIntentClassifier;

struct Lexicon {
    refuse_phrases: Regex,
    accept_phrases: Regex,
    accept_words: HashSet<&'static str>,
    refuse_words: HashSet<&'static str>,
}

impl Lexicon {
    fn new(
        refuse_phrases: &[&str],
        accept_phrases: &[&str],
        accept_words: &[&'static str],
        refuse_words: &[&'static str],
    ) -> Self {
        Self {
            refuse_phrases: phrase_regex(refuse_phrases),
            accept_phrases: phrase_regex(accept_phrases),
            accept_words: accept_words.iter().copied().collect(),
            refuse_words: refuse_words.iter().copied().collect(),
        }
    }
}

fn phrase_regex(phrases: &[&str]) -> Regex {
    let alternatives: Vec<String> = phrases.iter().map(|p| regex::escape(p)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .expect("static intent phrase pattern is valid")
}

static LEXICONS: Lazy<HashMap<Language, Lexicon>> = Lazy::new(|| {
    HashMap::from([
        (
            Language::En,
            Lexicon::new(
                &[
                    "no thanks", "no thank you", "not now", "i'm good", "i am good",
                    "that's enough", "that is enough", "i'd rather not", "i would rather not",
                    "let's stop", "let's wrap up", "i have to go", "i need to go",
                ],
                &[
                    "no problem", "go ahead", "of course", "why not", "sounds good",
                    "let's continue", "keep going", "happy to",
                ],
                &["yes", "yeah", "yep", "sure", "ok", "okay", "fine", "absolutely", "definitely", "continue", "gladly"],
                &["no", "nope", "nah", "stop", "enough", "decline", "later"],
            ),
        ),
        (
            Language::It,
            Lexicon::new(
                &[
                    "va bene così", "va bene cosi", "basta così", "basta cosi", "no grazie",
                    "per ora no", "meglio di no", "preferisco di no", "possiamo chiudere",
                    "devo andare", "non ho tempo",
                ],
                &[
                    "va bene", "d'accordo", "nessun problema", "perché no", "perche no",
                    "andiamo avanti", "con piacere",
                ],
                &["sì", "si", "certo", "certamente", "ok", "volentieri", "continuiamo", "proseguiamo", "dai", "assolutamente"],
                &["no", "basta", "stop", "chiudiamo", "fermiamoci"],
            ),
        ),
        (
            Language::Es,
            Lexicon::new(
                &["no gracias", "ahora no", "es suficiente", "prefiero no", "tengo que irme"],
                &["de acuerdo", "claro que sí", "por qué no", "sin problema", "vamos a seguir"],
                &["sí", "si", "claro", "vale", "ok", "sigamos", "continuemos", "perfecto"],
                &["no", "basta", "suficiente", "paremos"],
            ),
        ),
        (
            Language::Fr,
            Lexicon::new(
                &["non merci", "pas maintenant", "ça suffit", "ca suffit", "je préfère pas", "je dois partir"],
                &["d'accord", "pas de problème", "pourquoi pas", "avec plaisir", "on continue"],
                &["oui", "ok", "volontiers", "bien", "continuons", "absolument"],
                &["non", "stop", "assez", "arrêtons"],
            ),
        ),
        (
            Language::De,
            Lexicon::new(
                &["nein danke", "jetzt nicht", "das reicht", "lieber nicht", "ich muss los"],
                &["kein problem", "gerne doch", "warum nicht", "machen wir weiter"],
                &["ja", "gerne", "klar", "ok", "okay", "sicher", "weiter", "natürlich"],
                &["nein", "stopp", "genug", "aufhören"],
            ),
        ),
    ])
});

/// Scores a message against the lexicons of `languages`.
fn tally(message: &str, languages: &[Language]) -> (usize, usize) {
    let mut text = message.to_lowercase();
    let mut accept = 0;
    let mut refuse = 0;

    let lexicons: Vec<&Lexicon> = languages.iter().filter_map(|l| LEXICONS.get(l)).collect();

    for lexicon in &lexicons {
        refuse += lexicon.refuse_phrases.find_iter(&text).count();
        text = lexicon.refuse_phrases.replace_all(&text, " ").into_owned();
    }
    for lexicon in &lexicons {
        accept += lexicon.accept_phrases.find_iter(&text).count();
        text = lexicon.accept_phrases.replace_all(&text, " ").into_owned();
    }

    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        if lexicons.iter().any(|l| l.accept_words.contains(word)) {
            accept += 1;
        } else if lexicons.iter().any(|l| l.refuse_words.contains(word)) {
            refuse += 1;
        }
    }
    (accept, refuse)
}

/// Classifies a reply from keyword counts alone.
pub fn classify_by_keywords(message: &str, language: Language) -> ExtensionIntent {
    let languages: &[Language] = if language == Language::En {
        &[Language::En]
    } else {
        &[language, Language::En]
    };
    let (accept, refuse) = tally(message, languages);
    match accept.cmp(&refuse) {
        std::cmp::Ordering::Greater => ExtensionIntent::Accept,
        std::cmp::Ordering::Less => ExtensionIntent::Refuse,
        std::cmp::Ordering::Equal => ExtensionIntent::Neutral,
    }
}

/// Intent classifier backed by multilingual keyword lexicons.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtensionIntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, message: &str, context: IntentContext) -> ExtensionIntent {
        let intent = classify_by_keywords(message, context.language);
        tracing::debug!(
            kind = ?context.kind,
            language = context.language.code(),
            %intent,
            "classified reply by keywords"
        );
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::OfferKind;

    fn context(language: Language) -> IntentContext {
        IntentContext {
            kind: OfferKind::Extension,
            language,
            was_offer: true,
        }
    }

    mod italian {
        use super::*;

        #[test]
        fn closing_phrase_is_a_refusal() {
            assert_eq!(
                classify_by_keywords("No, basta, va bene così", Language::It),
                ExtensionIntent::Refuse
            );
        }

        #[test]
        fn va_bene_alone_is_an_acceptance() {
            assert_eq!(classify_by_keywords("Sì, va bene", Language::It), ExtensionIntent::Accept);
        }

        #[test]
        fn plain_yes_is_an_acceptance() {
            assert_eq!(classify_by_keywords("Certo!", Language::It), ExtensionIntent::Accept);
        }

        #[test]
        fn polite_decline_is_a_refusal() {
            assert_eq!(classify_by_keywords("No grazie, devo andare", Language::It), ExtensionIntent::Refuse);
        }
    }

    mod english {
        use super::*;

        #[test]
        fn yes_is_accept() {
            assert_eq!(classify_by_keywords("Yes, sure", Language::En), ExtensionIntent::Accept);
        }

        #[test]
        fn no_problem_is_accept_not_refuse() {
            assert_eq!(
                classify_by_keywords("No problem, go ahead", Language::En),
                ExtensionIntent::Accept
            );
        }

        #[test]
        fn no_thanks_is_refuse() {
            assert_eq!(classify_by_keywords("No thanks, I'm good", Language::En), ExtensionIntent::Refuse);
        }

        #[test]
        fn english_markers_count_in_other_languages() {
            assert_eq!(classify_by_keywords("ok", Language::De), ExtensionIntent::Accept);
            assert_eq!(classify_by_keywords("nope", Language::Fr), ExtensionIntent::Refuse);
        }
    }

    mod ambiguous {
        use super::*;

        #[test]
        fn unrelated_text_is_neutral() {
            assert_eq!(
                classify_by_keywords("We mostly use spreadsheets for that", Language::En),
                ExtensionIntent::Neutral
            );
        }

        #[test]
        fn conflicting_markers_are_neutral() {
            assert_eq!(classify_by_keywords("yes... no", Language::En), ExtensionIntent::Neutral);
        }

        #[test]
        fn empty_reply_is_neutral() {
            assert_eq!(classify_by_keywords("   ", Language::It), ExtensionIntent::Neutral);
        }
    }

    #[tokio::test]
    async fn classifier_uses_context_language() {
        let classifier = KeywordIntentClassifier::new();

        assert_eq!(
            classifier.classify("Ja, gerne", context(Language::De)).await,
            ExtensionIntent::Accept
        );
        assert_eq!(
            classifier.classify("Non merci", context(Language::Fr)).await,
            ExtensionIntent::Refuse
        );
    }
}
