//! Runtime knowledge cues.
//!
//! Per-topic cue triples the micro-planner draws follow-up hints from. Cues
//! come from the text model when it answers in time with a valid document,
//! otherwise from deterministic templates over the topic label and its first
//! two sub-goals.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::foundation::{Language, TopicId};

use super::text::truncate_words;
use super::topic::{ordered_topics, Topic};

/// Maximum items kept in any cue list.
pub const MAX_CUES_PER_LIST: usize = 3;
/// Maximum words kept per cue.
pub const MAX_CUE_WORDS: usize = 16;
/// Sub-goals the fallback templates draw from.
const FALLBACK_SUB_GOALS: usize = 2;

/// Cue triple for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCues {
    pub topic_id: TopicId,
    /// How to read what the user says about the topic.
    #[serde(default)]
    pub interpretation_cues: Vec<String>,
    /// What makes an answer significant.
    #[serde(default)]
    pub significance_signals: Vec<String>,
    /// Angles worth probing next.
    #[serde(default)]
    pub probe_angles: Vec<String>,
}

impl TopicCues {
    /// Trims, de-duplicates (case-insensitive), shortens and caps every list.
    pub fn normalized(self) -> Self {
        Self {
            topic_id: self.topic_id,
            interpretation_cues: normalize_cues(self.interpretation_cues),
            significance_signals: normalize_cues(self.significance_signals),
            probe_angles: normalize_cues(self.probe_angles),
        }
    }

    /// True if no list carries anything.
    pub fn is_empty(&self) -> bool {
        self.interpretation_cues.is_empty()
            && self.significance_signals.is_empty()
            && self.probe_angles.is_empty()
    }
}

/// Cleans one cue list.
pub fn normalize_cues<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| truncate_words(item.as_ref().trim(), MAX_CUE_WORDS))
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .take(MAX_CUES_PER_LIST)
        .collect()
}

/// Why fallback cues were used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    GenerationFailed,
    InvalidShape,
    Disabled,
}

/// Where a knowledge bundle came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgeSource {
    Generated { model: String },
    Fallback { reason: FallbackReason },
}

/// Inputs that identify a knowledge bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeContext {
    pub language: Language,
    /// What the interview is trying to learn.
    pub goal: String,
    /// Who is being interviewed.
    pub audience: String,
    /// Plan signature of the topic configuration.
    pub signature: String,
}

/// Shape problems in a generated knowledge document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KnowledgeShapeError {
    #[error("knowledge document is not valid: {0}")]
    Malformed(String),

    #[error("knowledge signature mismatch: expected {expected}, got {actual}")]
    SignatureMismatch { expected: String, actual: String },

    #[error("knowledge document has no usable topic entries")]
    NoTopics,
}

/// Cue bundle for every topic of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeKnowledge {
    pub signature: String,
    pub language: Language,
    pub source: KnowledgeSource,
    pub topics: Vec<TopicCues>,
}

#[derive(Deserialize)]
struct GeneratedDocument {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    topics: Vec<GeneratedTopic>,
}

#[derive(Deserialize)]
struct GeneratedTopic {
    topic_id: String,
    #[serde(default)]
    interpretation_cues: Vec<String>,
    #[serde(default)]
    significance_signals: Vec<String>,
    #[serde(default)]
    probe_angles: Vec<String>,
}

impl RuntimeKnowledge {
    /// Validates a generated document.
    ///
    /// Requires a matching signature and at least one usable entry for a known
    /// topic. Unknown topics are dropped; known topics the model skipped get
    /// fallback cues.
    pub fn from_generated(
        document: &Value,
        topics: &[Topic],
        context: &KnowledgeContext,
        model: impl Into<String>,
    ) -> Result<Self, KnowledgeShapeError> {
        let parsed: GeneratedDocument = serde_json::from_value(document.clone())
            .map_err(|e| KnowledgeShapeError::Malformed(e.to_string()))?;

        let actual = parsed.signature.unwrap_or_default();
        if actual.trim() != context.signature {
            return Err(KnowledgeShapeError::SignatureMismatch {
                expected: context.signature.clone(),
                actual,
            });
        }

        let mut generated: Vec<TopicCues> = Vec::new();
        for entry in parsed.topics {
            let Ok(topic_id) = TopicId::new(entry.topic_id) else {
                continue;
            };
            if !topics.iter().any(|t| t.id == topic_id)
                || generated.iter().any(|c| c.topic_id == topic_id)
            {
                continue;
            }
            let cues = TopicCues {
                topic_id,
                interpretation_cues: entry.interpretation_cues,
                significance_signals: entry.significance_signals,
                probe_angles: entry.probe_angles,
            }
            .normalized();
            if !cues.is_empty() {
                generated.push(cues);
            }
        }
        if generated.is_empty() {
            return Err(KnowledgeShapeError::NoTopics);
        }

        let cues = ordered_topics(topics)
            .into_iter()
            .map(|topic| {
                generated
                    .iter()
                    .find(|c| c.topic_id == topic.id)
                    .cloned()
                    .unwrap_or_else(|| fallback_cues(topic, context.language))
            })
            .collect();

        Ok(Self {
            signature: context.signature.clone(),
            language: context.language,
            source: KnowledgeSource::Generated {
                model: model.into(),
            },
            topics: cues,
        })
    }

    /// Deterministic bundle built from templates.
    pub fn fallback(topics: &[Topic], context: &KnowledgeContext, reason: FallbackReason) -> Self {
        Self {
            signature: context.signature.clone(),
            language: context.language,
            source: KnowledgeSource::Fallback { reason },
            topics: ordered_topics(topics)
                .into_iter()
                .map(|t| fallback_cues(t, context.language))
                .collect(),
        }
    }

    pub fn cues_for(&self, topic: &TopicId) -> Option<&TopicCues> {
        self.topics.iter().find(|c| &c.topic_id == topic)
    }

    /// True if the cues came from the text model.
    pub fn is_generated(&self) -> bool {
        matches!(self.source, KnowledgeSource::Generated { .. })
    }
}

/// Template cues for one topic. Never fails.
pub fn fallback_cues(topic: &Topic, language: Language) -> TopicCues {
    let label = topic.label.trim();
    let goals: Vec<&str> = topic
        .sub_goals
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .take(FALLBACK_SUB_GOALS)
        .collect();

    let (interpretation, significance, probes) = match language {
        Language::It => (
            std::iter::once(format!("Cosa significa \"{label}\" nel contesto dell'utente"))
                .chain(goals.iter().map(|g| format!("Come si manifesta {g} nella pratica")))
                .collect::<Vec<_>>(),
            std::iter::once(format!("Un episodio concreto o un numero su {label}"))
                .chain(goals.iter().map(|g| format!("Conseguenze legate a {g}")))
                .collect::<Vec<_>>(),
            goals
                .iter()
                .map(|g| format!("Chiedi un esempio recente su {g}"))
                .chain(std::iter::once(format!("Chiedi cosa cambierebbe in {label}")))
                .collect::<Vec<_>>(),
        ),
        _ => (
            std::iter::once(format!("What \"{label}\" means in the user's own context"))
                .chain(goals.iter().map(|g| format!("How {g} shows up day to day")))
                .collect::<Vec<_>>(),
            std::iter::once(format!("A concrete episode or number about {label}"))
                .chain(goals.iter().map(|g| format!("Consequences tied to {g}")))
                .collect::<Vec<_>>(),
            goals
                .iter()
                .map(|g| format!("Ask for a recent example of {g}"))
                .chain(std::iter::once(format!("Ask what they would change about {label}")))
                .collect::<Vec<_>>(),
        ),
    };

    TopicCues {
        topic_id: topic.id.clone(),
        interpretation_cues: interpretation,
        significance_signals: significance,
        probe_angles: probes,
    }
    .normalized()
}
