//! Per-turn question strategy.
//!
//! Decides how the next question is phrased, never whether the interview moves
//! on; that is the engine's call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::domain::foundation::Language;

use super::guide::KnowledgeGuide;
use super::knowledge::{fallback_cues, RuntimeKnowledge, TopicCues};
use super::phase::InterviewPhase;
use super::signal::{ScoringProfile, SignalScorer};
use super::text::{content_tokens, overlap, word_count};
use super::topic::Topic;

/// Score from which EXPLORE probes for impact.
pub const EXPLORE_IMPACT_THRESHOLD: f64 = 0.42;
/// Score from which DEEPEN probes for impact.
pub const DEEPEN_IMPACT_THRESHOLD: f64 = 0.34;
/// Score from which the planner asks for a concrete example.
pub const EXAMPLE_THRESHOLD: f64 = 0.28;
/// Score from which the opening reflects the user's evidence back.
pub const EVIDENCE_TONE_THRESHOLD: f64 = 0.2;
/// Short questions are read as clarification requests.
const CLARIFICATION_MAX_WORDS: usize = 8;
/// Guide cues considered per topic.
const GUIDE_CUE_LIMIT: usize = 3;

/// How the next question should move the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStrategy {
    CoverSubGoal,
    ProbeImpact,
    ProbeExample,
}

impl QuestionStrategy {
    fn instruction(&self) -> &'static str {
        match self {
            Self::CoverSubGoal => "Cover the focus sub-goal with one open question.",
            Self::ProbeImpact => "Probe the impact of what the user just described: what changed, for whom, how much.",
            Self::ProbeExample => "Ask for one concrete, recent example of what the user just said.",
        }
    }
}

/// How the next question opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningTone {
    DirectClarification,
    EvidenceReflection,
    NeutralBridge,
}

impl OpeningTone {
    fn instruction(&self) -> &'static str {
        match self {
            Self::DirectClarification => "Answer the user's question plainly before asking yours.",
            Self::EvidenceReflection => "Briefly reflect the concrete detail the user gave.",
            Self::NeutralBridge => "Use a short neutral bridge.",
        }
    }
}

/// Which knowledge source produced the follow-up hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueSource {
    Runtime,
    Guide,
    Fallback,
}

/// Everything the planner looks at.
#[derive(Debug, Clone, Copy)]
pub struct MicroPlanInput<'a> {
    pub phase: InterviewPhase,
    pub topic: &'a Topic,
    pub used_sub_goals: &'a [String],
    pub turns_used: u32,
    /// Questions left in the topic, the one being planned included.
    pub turns_left: u32,
    pub user_message: Option<&'a str>,
    pub language: Language,
    pub knowledge: Option<&'a RuntimeKnowledge>,
    pub guide: Option<&'a KnowledgeGuide>,
}

/// Planned shape of the next question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroPlanDecision {
    pub strategy: QuestionStrategy,
    pub tone: OpeningTone,
    pub focus_sub_goal: Option<String>,
    pub follow_up_hint: String,
    pub cue_source: CueSource,
    pub signal_score: f64,
    pub clarification_requested: bool,
    pub prioritize_coverage: bool,
    pub sub_goals_total: usize,
    pub sub_goals_remaining: usize,
    pub turns_used: u32,
    pub turns_left: u32,
}

impl MicroPlanDecision {
    /// Renders the decision as a directive block for the question generator.
    pub fn render_directive(&self) -> String {
        let mut out = String::from("NEXT QUESTION PLAN\n");
        let _ = writeln!(out, "- Opening: {}", self.tone.instruction());
        let _ = writeln!(out, "- Strategy: {}", self.strategy.instruction());
        if let Some(goal) = &self.focus_sub_goal {
            let _ = writeln!(out, "- Focus sub-goal: {goal}");
        }
        if !self.follow_up_hint.is_empty() {
            let _ = writeln!(out, "- Hint: {}", self.follow_up_hint);
        }
        let covered = self.sub_goals_total - self.sub_goals_remaining;
        let _ = writeln!(
            out,
            "- Coverage: {covered}/{} sub-goals, {} turn(s) used, {} left",
            self.sub_goals_total, self.turns_used, self.turns_left
        );
        if self.prioritize_coverage {
            out.push_str("- Remaining turns are needed for uncovered sub-goals; do not dwell.\n");
        }
        out.push_str("Ask exactly one question.");
        out
    }
}

static CLARIFICATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:what do you mean|can you clarify|could you explain|not sure what you|i don't understand|cosa intendi|in che senso|non ho capito|puoi spiegare|qu[eé] quieres decir|no entiendo|que voulez-vous dire|je ne comprends pas|was meinen sie|was meinst du|verstehe nicht)",
    )
    .expect("static clarification pattern is valid")
});

/// True if the reply asks the interviewer for clarification.
pub fn is_clarification_request(text: &str) -> bool {
    CLARIFICATION_PATTERN.is_match(text)
        || (text.trim_end().ends_with('?') && word_count(text) <= CLARIFICATION_MAX_WORDS)
}

/// Picks the cue most related to the focus, first on ties.
fn pick_cue(cues: &[String], focus: Option<&str>) -> Option<String> {
    let Some(focus) = focus else {
        return cues.first().cloned();
    };
    let vocabulary = content_tokens(focus);
    let mut best: Option<(&String, usize)> = None;
    for cue in cues {
        let score = overlap(cue, &vocabulary);
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((cue, score));
        }
    }
    best.map(|(c, _)| c.clone())
}

fn cue_list(cues: &TopicCues, strategy: QuestionStrategy) -> &[String] {
    match strategy {
        QuestionStrategy::ProbeImpact => &cues.significance_signals,
        QuestionStrategy::ProbeExample => &cues.interpretation_cues,
        QuestionStrategy::CoverSubGoal => &cues.probe_angles,
    }
}

/// Per-turn planner.
#[derive(Debug, Clone, Copy)]
pub struct MicroPlanner {
    scorer: SignalScorer,
}

impl Default for MicroPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroPlanner {
    pub fn new() -> Self {
        Self {
            scorer: SignalScorer::for_profile(ScoringProfile::Planner),
        }
    }

    /// Plans the next question. Total: always returns a decision.
    pub fn plan(&self, input: &MicroPlanInput<'_>) -> MicroPlanDecision {
        let message = input.user_message.map(str::trim).filter(|m| !m.is_empty());
        let signal_score = message
            .map(|m| self.scorer.score(m, input.language).score)
            .unwrap_or(0.0);
        let clarification_requested = message.is_some_and(is_clarification_request);

        let unused = input.topic.unused_sub_goals(input.used_sub_goals);
        let prioritize_coverage = input.phase == InterviewPhase::Explore
            && !unused.is_empty()
            && input.turns_left as usize <= unused.len();

        let impact_threshold = match input.phase {
            InterviewPhase::Deepen => DEEPEN_IMPACT_THRESHOLD,
            _ => EXPLORE_IMPACT_THRESHOLD,
        };
        let strategy = if clarification_requested || prioritize_coverage {
            QuestionStrategy::CoverSubGoal
        } else if signal_score >= impact_threshold {
            QuestionStrategy::ProbeImpact
        } else if signal_score >= EXAMPLE_THRESHOLD {
            QuestionStrategy::ProbeExample
        } else {
            QuestionStrategy::CoverSubGoal
        };

        let tone = if clarification_requested {
            OpeningTone::DirectClarification
        } else if signal_score >= EVIDENCE_TONE_THRESHOLD {
            OpeningTone::EvidenceReflection
        } else {
            OpeningTone::NeutralBridge
        };

        let focus_sub_goal = match strategy {
            QuestionStrategy::CoverSubGoal => unused.first().map(|g| g.to_string()),
            _ => None,
        };
        let (follow_up_hint, cue_source) =
            self.resolve_hint(input, strategy, focus_sub_goal.as_deref());

        MicroPlanDecision {
            strategy,
            tone,
            focus_sub_goal,
            follow_up_hint,
            cue_source,
            signal_score,
            clarification_requested,
            prioritize_coverage,
            sub_goals_total: input.topic.sub_goals.len(),
            sub_goals_remaining: unused.len(),
            turns_used: input.turns_used,
            turns_left: input.turns_left,
        }
    }

    /// Runtime cues first, then the manual guide, then templates.
    fn resolve_hint(
        &self,
        input: &MicroPlanInput<'_>,
        strategy: QuestionStrategy,
        focus: Option<&str>,
    ) -> (String, CueSource) {
        let runtime = input
            .knowledge
            .filter(|k| k.is_generated())
            .and_then(|k| k.cues_for(&input.topic.id))
            .and_then(|cues| pick_cue(cue_list(cues, strategy), focus));
        if let Some(hint) = runtime {
            return (hint, CueSource::Runtime);
        }

        let guided = input
            .guide
            .and_then(|g| g.cues_for(input.topic, GUIDE_CUE_LIMIT))
            .and_then(|m| pick_cue(&m.cues, focus));
        if let Some(hint) = guided {
            return (hint, CueSource::Guide);
        }

        let fallback = input
            .knowledge
            .filter(|k| !k.is_generated())
            .and_then(|k| k.cues_for(&input.topic.id))
            .cloned()
            .unwrap_or_else(|| fallback_cues(input.topic, input.language));
        let hint = pick_cue(cue_list(&fallback, strategy), focus)
            .unwrap_or_else(|| input.topic.label.clone());
        (hint, CueSource::Fallback)
    }
}
