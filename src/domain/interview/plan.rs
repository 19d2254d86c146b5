//! Interview plan: per-topic turn budgets derived from the time budget,
//! plus author overrides that survive regeneration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::foundation::{Timestamp, TopicId};

use super::topic::{ordered_topics, Topic};

/// Seconds one question/answer exchange is assumed to take.
pub const DEFAULT_SECONDS_PER_TURN: u32 = 45;
/// Version of the planning rules; bumping it invalidates stored plans.
pub const PLAN_LOGIC_VERSION: u32 = 2;
/// Smallest base budget any topic gets.
pub const MIN_BASE_TURNS: u32 = 2;
/// Headroom above base reserved for bonus turns.
pub const BONUS_HEADROOM: u32 = 2;
/// Upper bound accepted for authored turn overrides.
pub const MAX_OVERRIDE_TURNS: u32 = 12;
/// Default DEEPEN allowance per topic.
pub const DEFAULT_DEEPEN_TURNS_PER_TOPIC: u32 = 2;
/// Upper bound accepted for the authored DEEPEN allowance.
pub const MAX_DEEPEN_TURNS_PER_TOPIC: u32 = 5;

/// Plan metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub generated_at: Timestamp,
    pub logic_version: u32,
    pub total_seconds: u32,
    pub per_topic_seconds: u32,
    pub time_based_max_turns: u32,
    /// Pace the turn counts were derived from; zero in records that predate it.
    #[serde(default)]
    pub seconds_per_turn: u32,
    /// Hash of the topic configuration the plan was built from.
    pub signature: String,
}

/// Plan entry for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTopic {
    pub topic_id: TopicId,
    pub base_turns: u32,
    pub min_turns: u32,
    pub max_turns: u32,
    pub sub_goals: Vec<String>,
}

/// Global DEEPEN limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepenPolicy {
    pub max_turns_per_topic: u32,
    /// Maximum number of topics revisited; all when `None`.
    pub max_topics: Option<u32>,
}

impl Default for DeepenPolicy {
    fn default() -> Self {
        Self {
            max_turns_per_topic: DEFAULT_DEEPEN_TURNS_PER_TOPIC,
            max_topics: None,
        }
    }
}

/// Versioned interview plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewPlan {
    pub metadata: PlanMetadata,
    pub topics: Vec<PlanTopic>,
    #[serde(default)]
    pub deepen: DeepenPolicy,
}

#[derive(Serialize)]
struct SignatureEntry<'a> {
    id: &'a str,
    order: u32,
    max_turns: Option<u32>,
    label: &'a str,
    sub_goals: &'a [String],
}

/// Hash over (id, order, configured max, label, sub-goals) of every topic.
pub fn topic_signature(topics: &[Topic]) -> String {
    let entries: Vec<SignatureEntry<'_>> = ordered_topics(topics)
        .into_iter()
        .map(|t| SignatureEntry {
            id: t.id.as_str(),
            order: t.order,
            max_turns: t.max_turns,
            label: t.label.trim(),
            sub_goals: &t.sub_goals,
        })
        .collect();

    // Serializing plain structs of strings and integers cannot fail.
    let canonical = serde_json::to_string(&entries).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl InterviewPlan {
    /// Builds the base plan for `topics` and a session of `duration_minutes`.
    pub fn build(topics: &[Topic], duration_minutes: u32, seconds_per_turn: u32) -> Self {
        Self::build_at(topics, duration_minutes, seconds_per_turn, Timestamp::now())
    }

    /// Builds the base plan with an explicit generation time.
    pub fn build_at(
        topics: &[Topic],
        duration_minutes: u32,
        seconds_per_turn: u32,
        generated_at: Timestamp,
    ) -> Self {
        let seconds_per_turn = seconds_per_turn.max(1);
        let total_seconds = duration_minutes.saturating_mul(60);
        let topic_count = topics.len().max(1) as u32;
        let per_topic_seconds = total_seconds / topic_count;
        let time_based_max_turns = per_topic_seconds / seconds_per_turn;
        let base_turns = time_based_max_turns.max(MIN_BASE_TURNS);

        let entries = ordered_topics(topics)
            .into_iter()
            .map(|t| {
                let headroom_max = base_turns + BONUS_HEADROOM;
                // An authored ceiling trims the bonus headroom but never the base.
                let max_turns = match t.max_turns {
                    Some(configured) if configured > 0 => configured.clamp(base_turns, headroom_max),
                    _ => headroom_max,
                };
                PlanTopic {
                    topic_id: t.id.clone(),
                    base_turns,
                    min_turns: 1,
                    max_turns,
                    sub_goals: t.sub_goals.clone(),
                }
            })
            .collect();

        Self {
            metadata: PlanMetadata {
                generated_at,
                logic_version: PLAN_LOGIC_VERSION,
                total_seconds,
                per_topic_seconds,
                time_based_max_turns,
                seconds_per_turn,
                signature: topic_signature(topics),
            },
            topics: entries,
            deepen: DeepenPolicy::default(),
        }
    }

    /// Returns the entry for a topic.
    pub fn topic(&self, id: &TopicId) -> Option<&PlanTopic> {
        self.topics.iter().find(|t| &t.topic_id == id)
    }

    /// True if the plan no longer matches the topics, the timing or the rules.
    pub fn is_stale(&self, topics: &[Topic], duration_minutes: u32, seconds_per_turn: u32) -> bool {
        self.metadata.logic_version != PLAN_LOGIC_VERSION
            || self.metadata.total_seconds != duration_minutes.saturating_mul(60)
            || self.metadata.seconds_per_turn != seconds_per_turn.max(1)
            || self.metadata.signature != topic_signature(topics)
    }

    /// Returns the plan with (already sanitized) overrides applied.
    pub fn with_overrides(&self, overrides: &PlanOverrides) -> Self {
        let mut plan = self.clone();
        for entry in &mut plan.topics {
            let Some(ov) = overrides.topics.get(&entry.topic_id) else {
                continue;
            };
            let max_turns = ov.max_turns.unwrap_or(entry.max_turns).max(1);
            let min_turns = ov.min_turns.unwrap_or(entry.min_turns).clamp(1, max_turns);
            entry.max_turns = max_turns;
            entry.min_turns = min_turns;
            entry.base_turns = entry.base_turns.clamp(min_turns, max_turns);
        }
        if let Some(per_topic) = overrides.deepen.max_turns_per_topic {
            plan.deepen.max_turns_per_topic = per_topic;
        }
        if let Some(max_topics) = overrides.deepen.max_topics {
            plan.deepen.max_topics = Some(max_topics);
        }
        plan
    }
}

/// Authored turn bounds for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

impl TopicOverride {
    fn is_empty(&self) -> bool {
        self.min_turns.is_none() && self.max_turns.is_none()
    }
}

/// Authored DEEPEN limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepenOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns_per_topic: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_topics: Option<u32>,
}

/// User overrides layered on top of the base plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOverrides {
    #[serde(default)]
    pub topics: BTreeMap<TopicId, TopicOverride>,
    #[serde(default)]
    pub deepen: DeepenOverrides,
}

/// Reads a strictly positive integer; anything else is dropped.
fn positive_int(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    let n = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (n > 0).then(|| n.min(u32::MAX as u64) as u32)
}

impl PlanOverrides {
    /// Reads overrides from an untyped JSON document.
    ///
    /// Unknown keys, non-positive numbers and malformed entries are dropped;
    /// the result still needs [`PlanOverrides::sanitized`] against a plan.
    pub fn from_json(value: &Value) -> Self {
        let mut overrides = PlanOverrides::default();

        if let Some(topics) = value.get("topics").and_then(Value::as_object) {
            for (raw_id, entry) in topics {
                let Ok(id) = TopicId::new(raw_id.as_str()) else {
                    tracing::debug!(topic_id = %raw_id, "dropping override with empty topic id");
                    continue;
                };
                let ov = TopicOverride {
                    min_turns: positive_int(entry.get("min_turns")),
                    max_turns: positive_int(entry.get("max_turns")),
                };
                if !ov.is_empty() {
                    overrides.topics.insert(id, ov);
                }
            }
        }

        if let Some(deepen) = value.get("deepen") {
            overrides.deepen = DeepenOverrides {
                max_turns_per_topic: positive_int(deepen.get("max_turns_per_topic")),
                max_topics: positive_int(deepen.get("max_topics")),
            };
        }

        overrides
    }

    /// Keeps only overrides that make sense for `plan`.
    ///
    /// Drops unknown topic ids and zero values, clamps to accepted ranges and
    /// lowers `min_turns` to `max_turns` when they cross.
    pub fn sanitized(&self, plan: &InterviewPlan) -> Self {
        let mut topics = BTreeMap::new();
        for (id, ov) in &self.topics {
            if plan.topic(id).is_none() {
                tracing::debug!(topic_id = %id, "dropping override for unknown topic");
                continue;
            }
            let clamp = |v: Option<u32>| {
                v.filter(|n| *n > 0).map(|n| n.min(MAX_OVERRIDE_TURNS))
            };
            let max_turns = clamp(ov.max_turns);
            let mut min_turns = clamp(ov.min_turns);
            if let (Some(min), Some(max)) = (min_turns, max_turns) {
                if min > max {
                    min_turns = Some(max);
                }
            }
            let cleaned = TopicOverride {
                min_turns,
                max_turns,
            };
            if !cleaned.is_empty() {
                topics.insert(id.clone(), cleaned);
            }
        }

        let topic_count = plan.topics.len() as u32;
        let deepen = DeepenOverrides {
            max_turns_per_topic: self
                .deepen
                .max_turns_per_topic
                .filter(|n| *n > 0)
                .map(|n| n.min(MAX_DEEPEN_TURNS_PER_TOPIC)),
            max_topics: self
                .deepen
                .max_topics
                .filter(|n| *n > 0 && topic_count > 0)
                .map(|n| n.min(topic_count)),
        };

        Self { topics, deepen }
    }
}

/// How a stored plan was brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRefresh {
    Created,
    Regenerated,
    Unchanged,
}

/// Stored plan: base, overrides and a version bumped on every regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub base: InterviewPlan,
    #[serde(default)]
    pub overrides: PlanOverrides,
    pub version: u32,
}

impl PlanRecord {
    /// Creates a record for a freshly built base plan.
    pub fn new(base: InterviewPlan) -> Self {
        Self {
            base,
            overrides: PlanOverrides::default(),
            version: 1,
        }
    }

    /// The plan the engine runs on: base with overrides applied.
    pub fn effective(&self) -> InterviewPlan {
        self.base.with_overrides(&self.overrides)
    }

    /// Replaces the overrides after sanitizing them against the base.
    pub fn set_overrides(&mut self, overrides: &PlanOverrides) {
        self.overrides = overrides.sanitized(&self.base);
    }

    /// Loads-or-creates and regenerates when stale.
    ///
    /// An unchanged signature, duration and pace returns the stored record as is.
    /// On regeneration the overrides are re-sanitized against the new base.
    pub fn refresh(
        stored: Option<PlanRecord>,
        topics: &[Topic],
        duration_minutes: u32,
        seconds_per_turn: u32,
    ) -> (PlanRecord, PlanRefresh) {
        match stored {
            None => (
                PlanRecord::new(InterviewPlan::build(topics, duration_minutes, seconds_per_turn)),
                PlanRefresh::Created,
            ),
            Some(record) if !record.base.is_stale(topics, duration_minutes, seconds_per_turn) => {
                (record, PlanRefresh::Unchanged)
            }
            Some(record) => {
                let base = InterviewPlan::build(topics, duration_minutes, seconds_per_turn);
                let overrides = record.overrides.sanitized(&base);
                tracing::info!(
                    version = record.version + 1,
                    signature = %base.metadata.signature,
                    "regenerated interview plan"
                );
                (
                    PlanRecord {
                        base,
                        overrides,
                        version: record.version + 1,
                    },
                    PlanRefresh::Regenerated,
                )
            }
        }
    }
}
