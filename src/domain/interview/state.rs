//! Session state threaded through turns.
//!
//! Owned by exactly one session. The engine never mutates a caller's state in
//! place: it clones, applies one turn, and hands the new value back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::TopicId;

use super::budget::TopicBudget;
use super::phase::InterviewPhase;
use super::plan::InterviewPlan;
use super::signal::SignalResult;

/// Budget used for a topic missing from the plan.
const UNPLANNED_TOPIC_BUDGET: (u32, u32, u32) = (1, 2, 4);

/// Where to resume once an extension is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPosition {
    /// Either `Explore` or `Deepen`.
    pub phase: InterviewPhase,
    pub topic_index: usize,
    pub turn_in_topic: u32,
    pub deep_cursor: usize,
}

/// Extension offer bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionState {
    /// The user agreed to continue past the time budget.
    pub deep_accepted: bool,
    /// An offer was issued and is awaiting an answer.
    pub offer_pending: bool,
    /// Unresolved answers so far; never above the configured maximum.
    pub attempts: u32,
    pub return_to: Option<ReturnPosition>,
}

/// Consent and contact collection bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCollectionState {
    pub consent_requested: bool,
    pub consent_granted: bool,
    pub completed: bool,
}

/// Mutable state of one interview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: InterviewPhase,
    /// Index into the topics sorted by order.
    pub topic_index: usize,
    /// Questions asked about the current topic in the current visit.
    pub turn_in_topic: u32,
    pub turns_used_total: u32,
    #[serde(default)]
    pub budgets: BTreeMap<TopicId, TopicBudget>,
    /// Highest engagement score seen per topic.
    #[serde(default)]
    pub engagement: BTreeMap<TopicId, f64>,
    /// Best snippet per topic (only from replies scoring at least the insight threshold).
    #[serde(default)]
    pub key_insights: BTreeMap<TopicId, String>,
    #[serde(default)]
    pub used_sub_goals: BTreeMap<TopicId, Vec<String>>,
    /// Under-covered topics at the end of EXPLORE, engagement descending.
    #[serde(default)]
    pub uncovered_topics: Vec<TopicId>,
    /// Topics DEEPEN walks, possibly truncated or rebuilt after an extension.
    #[serde(default)]
    pub deep_topic_order: Vec<TopicId>,
    #[serde(default)]
    pub deep_cursor: usize,
    #[serde(default)]
    pub extension: ExtensionState,
    #[serde(default)]
    pub data_collection: DataCollectionState,
    /// Deep-dive focus recomputed when an extension resumes questioning.
    #[serde(default)]
    pub focus_point: Option<String>,
}

impl SessionState {
    /// Fresh state at the start of EXPLORE.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn budget(&self, topic: &TopicId) -> Option<&TopicBudget> {
        self.budgets.get(topic)
    }

    /// Returns the topic's budget, creating it from the plan on first use.
    pub fn budget_or_init(&mut self, topic: &TopicId, plan: &InterviewPlan) -> &mut TopicBudget {
        self.budgets.entry(topic.clone()).or_insert_with(|| {
            plan.topic(topic).map(TopicBudget::from_plan).unwrap_or_else(|| {
                tracing::warn!(topic_id = %topic, "topic missing from plan, using default budget");
                let (min, base, max) = UNPLANNED_TOPIC_BUDGET;
                TopicBudget::new(min, base, max)
            })
        })
    }

    /// Highest engagement seen for a topic, 0 if none.
    pub fn engagement_of(&self, topic: &TopicId) -> f64 {
        self.engagement.get(topic).copied().unwrap_or(0.0)
    }

    /// Folds a scored reply into the topic's aggregates.
    ///
    /// Engagement keeps the maximum. The snippet becomes the key insight when
    /// the score reaches `insight_threshold` and is not below the previous best.
    pub fn record_signal(&mut self, topic: &TopicId, signal: &SignalResult, insight_threshold: f64) {
        let previous = self.engagement.get(topic).copied();
        if previous.map_or(true, |p| signal.score > p) {
            self.engagement.insert(topic.clone(), signal.score);
        }
        let beats_previous = previous.map_or(true, |p| signal.score >= p);
        if signal.score >= insight_threshold && beats_previous && !signal.snippet.is_empty() {
            self.key_insights.insert(topic.clone(), signal.snippet.clone());
        }
    }

    pub fn used_sub_goals(&self, topic: &TopicId) -> &[String] {
        self.used_sub_goals.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records a sub-goal as covered; duplicates (case-insensitive) are ignored.
    pub fn mark_sub_goal_used(&mut self, topic: &TopicId, sub_goal: &str) {
        let used = self.used_sub_goals.entry(topic.clone()).or_default();
        if !used.iter().any(|u| u.eq_ignore_ascii_case(sub_goal)) {
            used.push(sub_goal.to_string());
        }
    }

    /// Moves to `to`, logging real transitions.
    pub(crate) fn enter_phase(&mut self, to: InterviewPhase) {
        debug_assert!(
            self.phase.can_transition_to(&to),
            "invalid phase transition {:?} -> {:?}",
            self.phase,
            to
        );
        if self.phase != to {
            tracing::info!(from = self.phase.label(), to = to.label(), "interview phase transition");
        }
        self.phase = to;
    }

    /// True if every stored budget satisfies its invariants.
    pub fn budgets_consistent(&self) -> bool {
        self.budgets.values().all(TopicBudget::is_consistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::signal::SignalBand;

    fn id(s: &str) -> TopicId {
        TopicId::new(s).unwrap()
    }

    fn signal(score: f64, snippet: &str) -> SignalResult {
        SignalResult {
            score,
            band: SignalBand::from_score(score),
            snippet: snippet.to_string(),
        }
    }

    #[test]
    fn engagement_keeps_maximum() {
        let mut state = SessionState::new();
        state.record_signal(&id("a"), &signal(0.7, "great"), 0.5);
        state.record_signal(&id("a"), &signal(0.2, "meh"), 0.5);
        assert_eq!(state.engagement_of(&id("a")), 0.7);
        assert_eq!(state.key_insights[&id("a")], "great");
    }

    #[test]
    fn low_scores_never_become_insights() {
        let mut state = SessionState::new();
        state.record_signal(&id("a"), &signal(0.4, "fine"), 0.5);
        assert!(!state.key_insights.contains_key(&id("a")));
        assert_eq!(state.engagement_of(&id("a")), 0.4);
    }

    #[test]
    fn better_snippet_replaces_insight() {
        let mut state = SessionState::new();
        state.record_signal(&id("a"), &signal(0.55, "first"), 0.5);
        state.record_signal(&id("a"), &signal(0.8, "second"), 0.5);
        assert_eq!(state.key_insights[&id("a")], "second");
    }

    #[test]
    fn sub_goals_are_deduplicated() {
        let mut state = SessionState::new();
        state.mark_sub_goal_used(&id("a"), "Pricing");
        state.mark_sub_goal_used(&id("a"), "pricing");
        assert_eq!(state.used_sub_goals(&id("a")), &["Pricing".to_string()]);
        assert!(state.used_sub_goals(&id("b")).is_empty());
    }

    #[test]
    fn serde_round_trip_preserves_state() {
        let mut state = SessionState::new();
        state.record_signal(&id("a"), &signal(0.65, "snippet"), 0.5);
        state.budgets.insert(id("a"), TopicBudget::new(1, 4, 6));
        state.extension.return_to = Some(ReturnPosition {
            phase: InterviewPhase::Deepen,
            topic_index: 1,
            turn_in_topic: 2,
            deep_cursor: 1,
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn minimal_document_deserializes() {
        let state: SessionState = serde_json::from_str(
            r#"{"phase":"EXPLORE","topic_index":0,"turn_in_topic":0,"turns_used_total":0}"#,
        )
        .unwrap();
        assert_eq!(state, SessionState::new());
    }
}
