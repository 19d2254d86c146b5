//! Phase engine.
//!
//! [`PhaseEngine::process_turn`] is a reducer: it takes a state snapshot and
//! the latest reply and returns the next state plus the supervisor insight
//! for the next assistant message. It never touches the caller's value.
//!
//! Accounting: every assistant question in EXPLORE or DEEPEN counts one turn
//! against the current topic's budget at the moment it is planned.

use std::cmp::Ordering;

use crate::domain::foundation::{Language, TopicId};

use super::budget::TopicBudget;
use super::guide::KnowledgeGuide;
use super::insight::{InsightStatus, StopReason, SupervisorInsight};
use super::knowledge::RuntimeKnowledge;
use super::micro_planner::{MicroPlanDecision, MicroPlanInput, MicroPlanner, QuestionStrategy};
use super::negotiation::{looks_like_extension_offer, ExtensionIntent};
use super::phase::InterviewPhase;
use super::plan::InterviewPlan;
use super::signal::{ScoringProfile, SignalBand, SignalResult, SignalScorer};
use super::state::{ReturnPosition, SessionState};
use super::topic::{ordered_topics, Topic};

/// Labels shown in an extension preview.
const PREVIEW_TOPICS: usize = 2;

/// Hard ceiling on bonus turns granted to one topic.
pub const MAX_BONUS_TURNS_PER_TOPIC: u32 = 2;

/// Hard ceiling on extension offer round-trips.
pub const MAX_OFFER_ATTEMPTS: u32 = 2;

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Bonus turns any single topic may receive.
    pub max_bonus_turns: u32,
    /// Unresolved offer answers before the engine moves on.
    pub max_offer_attempts: u32,
    /// Score from which a reply's snippet becomes the topic's key insight.
    pub insight_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bonus_turns: MAX_BONUS_TURNS_PER_TOPIC,
            max_offer_attempts: MAX_OFFER_ATTEMPTS,
            insight_threshold: 0.5,
        }
    }
}

/// Everything one turn needs besides the state.
#[derive(Debug, Clone, Copy)]
pub struct TurnInput<'a> {
    pub topics: &'a [Topic],
    /// Effective plan (overrides applied).
    pub plan: &'a InterviewPlan,
    pub user_message: Option<&'a str>,
    /// Previous assistant message, used to recognize extension offers.
    pub last_assistant_message: Option<&'a str>,
    pub language: Language,
    pub max_duration_minutes: u32,
    pub elapsed_secs: u64,
    /// Classified intent of the reply in DEEP_OFFER or during consent.
    pub intent: Option<ExtensionIntent>,
    /// Whether policy asks for consent and contact data before closing.
    pub collect_data: bool,
    pub knowledge: Option<&'a RuntimeKnowledge>,
    pub guide: Option<&'a KnowledgeGuide>,
}

impl<'a> TurnInput<'a> {
    pub fn new(topics: &'a [Topic], plan: &'a InterviewPlan) -> Self {
        Self {
            topics,
            plan,
            user_message: None,
            last_assistant_message: None,
            language: Language::default(),
            max_duration_minutes: plan.metadata.total_seconds / 60,
            elapsed_secs: 0,
            intent: None,
            collect_data: false,
            knowledge: None,
            guide: None,
        }
    }

    pub fn with_reply(mut self, message: &'a str) -> Self {
        self.user_message = Some(message);
        self
    }

    pub fn with_last_assistant_message(mut self, message: &'a str) -> Self {
        self.last_assistant_message = Some(message);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_timing(mut self, max_duration_minutes: u32, elapsed_secs: u64) -> Self {
        self.max_duration_minutes = max_duration_minutes;
        self.elapsed_secs = elapsed_secs;
        self
    }

    pub fn with_intent(mut self, intent: ExtensionIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn collecting_data(mut self, collect_data: bool) -> Self {
        self.collect_data = collect_data;
        self
    }

    pub fn with_knowledge(mut self, knowledge: &'a RuntimeKnowledge) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_guide(mut self, guide: &'a KnowledgeGuide) -> Self {
        self.guide = Some(guide);
        self
    }

    /// Seconds left in the session; negative once over time.
    pub fn remaining_secs(&self) -> i64 {
        i64::from(self.max_duration_minutes) * 60 - self.elapsed_secs.min(i64::MAX as u64) as i64
    }
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub state: SessionState,
    pub insight: SupervisorInsight,
    /// Topic the next question is about, while questioning.
    pub next_topic_id: Option<TopicId>,
    /// Allocation score of the reply, if there was one.
    pub signal: Option<SignalResult>,
    pub micro_plan: Option<MicroPlanDecision>,
}

/// EXPLORE decision for a scored reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationAction {
    Continue,
    Bonus { donor: TopicId },
    Advance,
}

struct Turn<'i, 'a> {
    input: &'i TurnInput<'a>,
    ordered: Vec<&'a Topic>,
    remaining_secs: i64,
}

impl<'i, 'a> Turn<'i, 'a> {
    fn new(input: &'i TurnInput<'a>) -> Self {
        Self {
            input,
            ordered: ordered_topics(input.topics),
            remaining_secs: input.remaining_secs(),
        }
    }

    fn topic(&self, index: usize) -> Option<&'a Topic> {
        self.ordered.get(index).copied()
    }

    fn index_of(&self, id: &TopicId) -> Option<usize> {
        self.ordered.iter().position(|t| &t.id == id)
    }

    /// Over time with no extension agreed.
    fn time_up(&self, state: &SessionState) -> bool {
        self.remaining_secs <= 0 && !state.extension.deep_accepted
    }

    /// Topic ids sorted by engagement descending, stable for ties.
    fn by_engagement(&self, state: &SessionState, topics: Vec<&'a Topic>) -> Vec<TopicId> {
        let mut topics = topics;
        topics.sort_by(|a, b| {
            state
                .engagement_of(&b.id)
                .partial_cmp(&state.engagement_of(&a.id))
                .unwrap_or(Ordering::Equal)
        });
        topics.into_iter().map(|t| t.id.clone()).collect()
    }

    fn deep_order(&self, ids: Vec<TopicId>) -> Vec<TopicId> {
        let mut ids = ids;
        if let Some(max_topics) = self.input.plan.deepen.max_topics {
            ids.truncate(max_topics as usize);
        }
        ids
    }
}

/// The interview state machine.
#[derive(Debug, Clone)]
pub struct PhaseEngine {
    config: EngineConfig,
    scorer: SignalScorer,
    planner: MicroPlanner,
}

impl Default for PhaseEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PhaseEngine {
    /// Creates an engine; bonus and offer limits are clamped to their ceilings.
    pub fn new(config: EngineConfig) -> Self {
        let config = EngineConfig {
            max_bonus_turns: config.max_bonus_turns.min(MAX_BONUS_TURNS_PER_TOPIC),
            max_offer_attempts: config.max_offer_attempts.clamp(1, MAX_OFFER_ATTEMPTS),
            ..config
        };
        Self {
            config,
            scorer: SignalScorer::for_profile(ScoringProfile::Allocation),
            planner: MicroPlanner::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies one turn to a copy of `state`.
    pub fn process_turn(&self, state: &SessionState, input: &TurnInput<'_>) -> TurnOutcome {
        let turn = Turn::new(input);
        let mut next = state.clone();
        let reply = input.user_message.map(str::trim).filter(|m| !m.is_empty());
        let signal = reply.map(|r| self.scorer.score(r, input.language));

        let phase_before = next.phase;
        let topic_before = turn.topic(next.topic_index).map(|t| t.id.clone());

        let insight = match next.phase {
            InterviewPhase::Explore => self.explore_turn(&mut next, &turn, signal.as_ref()),
            InterviewPhase::Deepen => self.deepen_turn(&mut next, &turn, signal.as_ref()),
            InterviewPhase::DeepOffer => self.deep_offer_turn(&mut next, &turn, reply),
            InterviewPhase::DataCollection => self.data_collection_turn(&mut next, &turn, reply),
        };
        debug_assert!(next.budgets_consistent());

        let mut insight = insight;
        let current = if next.phase.is_questioning() {
            turn.topic(next.topic_index)
        } else {
            None
        };

        let mut micro_plan = None;
        if let Some(topic) = current {
            let same_topic = phase_before == next.phase
                && topic_before.as_ref() == Some(&topic.id)
                && next.turn_in_topic > 1;
            let decision = self.plan_question(&next, &turn, topic, if same_topic { reply } else { None });
            if decision.strategy == QuestionStrategy::CoverSubGoal {
                if let Some(goal) = &decision.focus_sub_goal {
                    next.mark_sub_goal_used(&topic.id, goal);
                }
            }

            insight.topic_id = Some(topic.id.clone());
            insight.topic_label = Some(topic.label.clone());
            insight.engaging_snippet = next.key_insights.get(&topic.id).cloned();
            insight.next_sub_goal = decision
                .focus_sub_goal
                .clone()
                .or_else(|| next.focus_point.clone());
            insight.micro_plan_directive = Some(decision.render_directive());
            micro_plan = Some(decision);
        }

        tracing::debug!(
            phase = next.phase.label(),
            status = ?insight.status,
            topic_index = next.topic_index,
            turns_used_total = next.turns_used_total,
            score = signal.as_ref().map(|s| s.score),
            "turn processed"
        );

        TurnOutcome {
            next_topic_id: current.map(|t| t.id.clone()),
            state: next,
            insight,
            signal,
            micro_plan,
        }
    }

    fn plan_question(
        &self,
        state: &SessionState,
        turn: &Turn<'_, '_>,
        topic: &Topic,
        reply: Option<&str>,
    ) -> MicroPlanDecision {
        let (turns_used, turns_left) = match state.budget(&topic.id) {
            Some(b) if state.phase == InterviewPhase::Deepen => (
                b.deep_turns_used,
                b.deep_turn_cap.saturating_sub(b.deep_turns_used) + 1,
            ),
            Some(b) => (b.turns_used, b.base_turns.saturating_sub(b.turns_used) + 1),
            None => (0, 1),
        };
        self.planner.plan(&MicroPlanInput {
            phase: state.phase,
            topic,
            used_sub_goals: state.used_sub_goals(&topic.id),
            turns_used,
            turns_left,
            user_message: reply,
            language: turn.input.language,
            knowledge: turn.input.knowledge,
            guide: turn.input.guide,
        })
    }

    // EXPLORE

    fn explore_turn(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        signal: Option<&SignalResult>,
    ) -> SupervisorInsight {
        let Some(topic) = turn.topic(state.topic_index) else {
            return self.close_explore(state, turn);
        };
        if state.turn_in_topic == 0 {
            return self.open_explore_topic(state, turn);
        }
        let Some(signal) = signal else {
            return SupervisorInsight::new(InsightStatus::Exploring, InterviewPhase::Explore);
        };

        state.record_signal(&topic.id, signal, self.config.insight_threshold);
        let action = self.decide_allocation(state, turn, &topic.id, signal.band);

        if action == AllocationAction::Advance {
            return self.advance_explore(state, turn);
        }
        if turn.time_up(state) {
            let position = ReturnPosition {
                phase: InterviewPhase::Explore,
                topic_index: state.topic_index,
                turn_in_topic: state.turn_in_topic,
                deep_cursor: 0,
            };
            return self.raise_offer(state, turn, position);
        }

        match action {
            AllocationAction::Bonus { donor } => {
                let donated = state.budget_or_init(&donor, turn.input.plan).donate_turn();
                debug_assert!(donated);
                state.budget_or_init(&topic.id, turn.input.plan).grant_bonus();
                tracing::info!(topic_id = %topic.id, donor = %donor, "bonus turn granted");
            }
            _ => state.budget_or_init(&topic.id, turn.input.plan).record_turn(),
        }
        state.turn_in_topic += 1;
        state.turns_used_total += 1;
        SupervisorInsight::new(InsightStatus::Exploring, InterviewPhase::Explore)
    }

    /// Chooses continue / bonus / advance for the current topic.
    fn decide_allocation(
        &self,
        state: &SessionState,
        turn: &Turn<'_, '_>,
        topic: &TopicId,
        band: SignalBand,
    ) -> AllocationAction {
        let Some(budget) = state.budget(topic) else {
            return AllocationAction::Continue;
        };

        if band == SignalBand::High && budget.can_take_bonus(self.config.max_bonus_turns) {
            if let Some(donor) = self.find_donor(state, turn, topic) {
                return AllocationAction::Bonus { donor };
            }
            tracing::debug!(topic_id = %topic, "no donor for bonus turn");
        }

        let keep_going = if band == SignalBand::Low {
            budget.turns_used < budget.min_turns
        } else {
            budget.turns_used < budget.base_turns
        };
        if keep_going {
            AllocationAction::Continue
        } else {
            AllocationAction::Advance
        }
    }

    /// Untouched topic with the largest ceiling above 1 (first on ties).
    fn find_donor(&self, state: &SessionState, turn: &Turn<'_, '_>, current: &TopicId) -> Option<TopicId> {
        let mut best: Option<(&TopicId, u32)> = None;
        for topic in &turn.ordered {
            if &topic.id == current {
                continue;
            }
            let max_turns = match state.budget(&topic.id) {
                Some(b) if !b.is_untouched() => continue,
                Some(b) => b.max_turns,
                None => match turn.input.plan.topic(&topic.id) {
                    Some(entry) => TopicBudget::from_plan(entry).max_turns,
                    None => continue,
                },
            };
            if max_turns > 1 && best.map_or(true, |(_, m)| max_turns > m) {
                best = Some((&topic.id, max_turns));
            }
        }
        best.map(|(id, _)| id.clone())
    }

    fn open_explore_topic(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        let Some(topic) = turn.topic(state.topic_index) else {
            return self.close_explore(state, turn);
        };
        state.budget_or_init(&topic.id, turn.input.plan).record_turn();
        state.turn_in_topic = 1;
        state.turns_used_total += 1;
        state.focus_point = None;

        let status = if state.turns_used_total == 1 {
            InsightStatus::Exploring
        } else {
            InsightStatus::Transition
        };
        SupervisorInsight::new(status, InterviewPhase::Explore)
    }

    fn advance_explore(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        state.topic_index += 1;
        state.turn_in_topic = 0;
        if state.topic_index >= turn.ordered.len() {
            return self.close_explore(state, turn);
        }
        if turn.time_up(state) {
            let position = ReturnPosition {
                phase: InterviewPhase::Explore,
                topic_index: state.topic_index,
                turn_in_topic: 0,
                deep_cursor: 0,
            };
            return self.raise_offer(state, turn, position);
        }
        self.open_explore_topic(state, turn)
    }

    /// Continues EXPLORE after an accepted extension.
    fn resume_explore(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        let Some(topic) = turn.topic(state.topic_index) else {
            return self.close_explore(state, turn);
        };
        if state.turn_in_topic == 0 {
            return self.open_explore_topic(state, turn);
        }
        let budget = state.budget_or_init(&topic.id, turn.input.plan);
        if budget.turns_used >= budget.max_turns {
            return self.advance_explore(state, turn);
        }
        budget.record_turn();
        state.turn_in_topic += 1;
        state.turns_used_total += 1;
        SupervisorInsight::new(InsightStatus::Exploring, InterviewPhase::Explore)
    }

    fn close_explore(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        for topic in &turn.ordered {
            state.budget_or_init(&topic.id, turn.input.plan);
        }
        let uncovered: Vec<&Topic> = turn
            .ordered
            .iter()
            .copied()
            .filter(|t| state.budget(&t.id).is_some_and(|b| !b.is_covered()))
            .collect();
        state.uncovered_topics = turn.by_engagement(state, uncovered);
        state.deep_topic_order = turn.deep_order(state.uncovered_topics.clone());
        state.deep_cursor = 0;
        state.turn_in_topic = 0;

        tracing::info!(
            uncovered = state.uncovered_topics.len(),
            remaining_secs = turn.remaining_secs,
            "explore closed"
        );

        if turn.time_up(state) {
            let position = ReturnPosition {
                phase: InterviewPhase::Deepen,
                topic_index: state.topic_index,
                turn_in_topic: 0,
                deep_cursor: 0,
            };
            return self.raise_offer(state, turn, position);
        }
        if state.deep_topic_order.is_empty() {
            return self.enter_data_collection(state, turn, StopReason::CoverageComplete);
        }
        state.enter_phase(InterviewPhase::Deepen);
        self.enter_deep_topic(state, turn)
    }

    // DEEPEN

    fn deepen_turn(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        signal: Option<&SignalResult>,
    ) -> SupervisorInsight {
        let Some(id) = state.deep_topic_order.get(state.deep_cursor).cloned() else {
            return self.finish_deepen(state, turn);
        };
        if state.turn_in_topic == 0 {
            return self.enter_deep_topic(state, turn);
        }
        let Some(signal) = signal else {
            return SupervisorInsight::new(InsightStatus::Deepening, InterviewPhase::Deepen);
        };
        state.record_signal(&id, signal, self.config.insight_threshold);
        self.next_deep_question(state, turn, &id)
    }

    /// Asks again on the current deep topic if its allowance permits, else moves on.
    fn next_deep_question(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        id: &TopicId,
    ) -> SupervisorInsight {
        let has_turns_left = state.budget(id).is_some_and(TopicBudget::has_deep_turns_left);
        if has_turns_left {
            if turn.time_up(state) {
                let position = ReturnPosition {
                    phase: InterviewPhase::Deepen,
                    topic_index: state.topic_index,
                    turn_in_topic: state.turn_in_topic,
                    deep_cursor: state.deep_cursor,
                };
                return self.raise_offer(state, turn, position);
            }
            state.budget_or_init(id, turn.input.plan).record_deep_turn();
            state.turn_in_topic += 1;
            state.turns_used_total += 1;
            return SupervisorInsight::new(InsightStatus::Deepening, InterviewPhase::Deepen);
        }

        state.deep_cursor += 1;
        state.turn_in_topic = 0;
        state.focus_point = None;
        if state.deep_cursor >= state.deep_topic_order.len() {
            return self.finish_deepen(state, turn);
        }
        if turn.time_up(state) {
            let position = ReturnPosition {
                phase: InterviewPhase::Deepen,
                topic_index: state.topic_index,
                turn_in_topic: 0,
                deep_cursor: state.deep_cursor,
            };
            return self.raise_offer(state, turn, position);
        }
        self.enter_deep_topic(state, turn)
    }

    /// Starts the topic under the deep cursor, skipping ids no longer configured.
    fn enter_deep_topic(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        while let Some(id) = state.deep_topic_order.get(state.deep_cursor).cloned() {
            let Some(index) = turn.index_of(&id) else {
                tracing::debug!(topic_id = %id, "skipping deep topic no longer configured");
                state.deep_cursor += 1;
                continue;
            };
            state.topic_index = index;
            state.turn_in_topic = 1;
            state.turns_used_total += 1;
            let cap = turn.input.plan.deepen.max_turns_per_topic;
            state.budget_or_init(&id, turn.input.plan).enter_deepen(cap);
            return SupervisorInsight::new(InsightStatus::Deepening, InterviewPhase::Deepen);
        }
        self.finish_deepen(state, turn)
    }

    fn resume_deepen(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        match state.deep_topic_order.get(state.deep_cursor).cloned() {
            Some(id) if state.turn_in_topic > 0 => self.next_deep_question(state, turn, &id),
            _ => self.enter_deep_topic(state, turn),
        }
    }

    /// Rebuilds the deep order from every topic, engagement descending.
    fn build_fresh_deep_plan(&self, state: &mut SessionState, turn: &Turn<'_, '_>) {
        let order = turn.deep_order(turn.by_engagement(state, turn.ordered.clone()));
        for id in &order {
            if let Some(budget) = state.budgets.get_mut(id) {
                budget.reset_deepen();
            }
        }
        tracing::info!(topics = order.len(), "built fresh deep plan for extension");
        state.deep_topic_order = order;
        state.deep_cursor = 0;
        state.turn_in_topic = 0;
    }

    fn finish_deepen(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        self.enter_data_collection(state, turn, StopReason::CoverageComplete)
    }

    // DEEP_OFFER

    fn raise_offer(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        position: ReturnPosition,
    ) -> SupervisorInsight {
        state.enter_phase(InterviewPhase::DeepOffer);
        state.extension.offer_pending = true;
        state.extension.attempts = 0;
        state.extension.return_to = Some(position);
        tracing::info!(
            resume_phase = position.phase.label(),
            remaining_secs = turn.remaining_secs,
            "time budget exhausted, offering extension"
        );
        self.offer_insight(state, turn)
    }

    fn offer_insight(&self, state: &SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        let insight = SupervisorInsight::new(InsightStatus::DeepOfferAsk, InterviewPhase::DeepOffer);
        let labels: Vec<&str> = match state.extension.return_to {
            Some(pos) if pos.phase == InterviewPhase::Explore => turn
                .ordered
                .iter()
                .skip(pos.topic_index)
                .map(|t| t.label.as_str())
                .take(PREVIEW_TOPICS)
                .collect(),
            _ => {
                let pending: Vec<&TopicId> = state.deep_topic_order.iter().skip(state.deep_cursor).collect();
                let ids: Vec<TopicId> = if pending.is_empty() {
                    turn.by_engagement(state, turn.ordered.clone())
                } else {
                    pending.into_iter().cloned().collect()
                };
                ids.iter()
                    .filter_map(|id| turn.index_of(id).and_then(|i| turn.topic(i)))
                    .map(|t| t.label.as_str())
                    .take(PREVIEW_TOPICS)
                    .collect()
            }
        };
        if labels.is_empty() {
            insight
        } else {
            insight.with_extension_preview(labels.join(", "))
        }
    }

    fn deep_offer_turn(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        reply: Option<&str>,
    ) -> SupervisorInsight {
        if reply.is_none() {
            state.extension.offer_pending = true;
            return self.offer_insight(state, turn);
        }

        let max_attempts = self.config.max_offer_attempts.max(1);
        let was_offer = turn
            .input
            .last_assistant_message
            .is_some_and(|m| looks_like_extension_offer(m, turn.input.language));
        let intent = turn.input.intent.unwrap_or_default();

        // An answer we were not waiting for still costs an attempt.
        let counted = !state.extension.offer_pending || !was_offer;
        if counted {
            state.extension.attempts = (state.extension.attempts + 1).min(max_attempts);
        }
        tracing::debug!(%intent, attempts = state.extension.attempts, was_offer, "extension reply");

        match intent {
            ExtensionIntent::Accept => self.accept_extension(state, turn),
            ExtensionIntent::Refuse => self.decline_extension(state, turn, StopReason::ExtensionDeclined),
            ExtensionIntent::Neutral => {
                if !counted {
                    state.extension.attempts = (state.extension.attempts + 1).min(max_attempts);
                }
                if state.extension.attempts >= max_attempts {
                    self.decline_extension(state, turn, StopReason::NegotiationExhausted)
                } else {
                    state.extension.offer_pending = true;
                    self.offer_insight(state, turn)
                }
            }
        }
    }

    fn accept_extension(&self, state: &mut SessionState, turn: &Turn<'_, '_>) -> SupervisorInsight {
        let position = state.extension.return_to.take();
        state.extension.deep_accepted = true;
        state.extension.offer_pending = false;
        state.extension.attempts = 0;
        tracing::info!(
            resume_phase = position.map(|p| p.phase.label()),
            "extension accepted"
        );

        let insight = match position {
            Some(pos) if pos.phase == InterviewPhase::Explore => {
                state.enter_phase(InterviewPhase::Explore);
                state.topic_index = pos.topic_index;
                state.turn_in_topic = pos.turn_in_topic;
                self.resume_explore(state, turn)
            }
            other => {
                state.enter_phase(InterviewPhase::Deepen);
                state.deep_cursor = other.map_or(0, |p| p.deep_cursor);
                state.turn_in_topic = other.map_or(0, |p| p.turn_in_topic);
                if state.deep_cursor >= state.deep_topic_order.len() {
                    self.build_fresh_deep_plan(state, turn);
                }
                self.resume_deepen(state, turn)
            }
        };

        if state.phase.is_questioning() {
            state.focus_point = turn.topic(state.topic_index).map(|topic| {
                topic
                    .unused_sub_goals(state.used_sub_goals(&topic.id))
                    .first()
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| topic.label.clone())
            });
        }
        insight
    }

    fn decline_extension(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        reason: StopReason,
    ) -> SupervisorInsight {
        state.extension.offer_pending = false;
        state.extension.return_to = None;
        tracing::info!(?reason, "extension declined");
        self.enter_data_collection(state, turn, reason)
    }

    // DATA_COLLECTION

    fn enter_data_collection(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        reason: StopReason,
    ) -> SupervisorInsight {
        state.enter_phase(InterviewPhase::DataCollection);
        state.focus_point = None;
        if turn.input.collect_data {
            state.data_collection.consent_requested = true;
            SupervisorInsight::new(InsightStatus::DataCollection, InterviewPhase::DataCollection)
                .with_stop_reason(reason)
                .forcing_consent()
        } else {
            state.data_collection.completed = true;
            SupervisorInsight::new(InsightStatus::CompleteWithoutData, InterviewPhase::DataCollection)
                .with_stop_reason(reason)
        }
    }

    fn data_collection_turn(
        &self,
        state: &mut SessionState,
        turn: &Turn<'_, '_>,
        reply: Option<&str>,
    ) -> SupervisorInsight {
        let phase = InterviewPhase::DataCollection;
        let dc = state.data_collection.clone();

        if dc.completed {
            let status = if dc.consent_granted {
                InsightStatus::Complete
            } else {
                InsightStatus::CompleteWithoutData
            };
            return SupervisorInsight::new(status, phase);
        }
        if !dc.consent_requested {
            return self.enter_data_collection(state, turn, StopReason::CoverageComplete);
        }
        if dc.consent_granted {
            return match reply {
                Some(_) => {
                    state.data_collection.completed = true;
                    tracing::info!("contact details collected");
                    SupervisorInsight::new(InsightStatus::Complete, phase)
                }
                None => SupervisorInsight::new(InsightStatus::DataCollection, phase),
            };
        }
        if reply.is_none() {
            return SupervisorInsight::new(InsightStatus::DataCollection, phase).forcing_consent();
        }

        match turn.input.intent.unwrap_or_default() {
            ExtensionIntent::Accept => {
                state.data_collection.consent_granted = true;
                SupervisorInsight::new(InsightStatus::DataCollection, phase)
            }
            ExtensionIntent::Refuse => {
                state.data_collection.completed = true;
                SupervisorInsight::new(InsightStatus::CompleteWithoutData, phase)
                    .with_stop_reason(StopReason::ConsentDeclined)
            }
            ExtensionIntent::Neutral => {
                SupervisorInsight::new(InsightStatus::DataCollection, phase).forcing_consent()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::plan::DEFAULT_SECONDS_PER_TURN;

    /// 64 words, a proper noun, impact and emotion vocabulary: HIGH for allocation.
    const HIGH: &str = "Last spring our team in Milan moved every customer invoice from spreadsheets \
        into Stripe and the result was dramatic because we reduced late payments by almost half \
        within three months, which made me really proud of the people involved since the old process \
        was frustrating, slow and full of manual copy paste errors that nobody enjoyed fixing at the \
        end of each long month.";
    /// Medium: 31 words with a figure.
    const MEDIUM: &str = "We usually handle it with a shared checklist that covers 12 steps and it \
        mostly works fine although some steps get skipped when people are busy or when new folks join.";
    const LOW: &str = "not much";

    fn id(s: &str) -> TopicId {
        TopicId::new(s).unwrap()
    }

    fn topics() -> Vec<Topic> {
        vec![
            Topic::new(id("a"), "Alpha", 0).with_sub_goals(["a one", "a two"]),
            Topic::new(id("b"), "Beta", 1).with_sub_goals(["b one"]),
            Topic::new(id("c"), "Gamma", 2),
        ]
    }

    fn plan(topics: &[Topic]) -> InterviewPlan {
        InterviewPlan::build(topics, 10, DEFAULT_SECONDS_PER_TURN)
    }

    fn engine() -> PhaseEngine {
        PhaseEngine::default()
    }

    /// State right after the opening question of the first topic.
    fn started(topics: &[Topic], plan: &InterviewPlan) -> SessionState {
        engine()
            .process_turn(&SessionState::new(), &TurnInput::new(topics, plan))
            .state
    }

    #[test]
    fn sample_replies_land_in_expected_bands() {
        let scorer = SignalScorer::for_profile(ScoringProfile::Allocation);
        assert_eq!(scorer.score(HIGH, Language::En).band, SignalBand::High);
        assert_eq!(scorer.score(MEDIUM, Language::En).band, SignalBand::Medium);
        assert_eq!(scorer.score(LOW, Language::En).band, SignalBand::Low);
    }

    mod explore {
        use super::*;

        #[test]
        fn first_turn_opens_first_topic() {
            let t = topics();
            let p = plan(&t);
            let out = engine().process_turn(&SessionState::new(), &TurnInput::new(&t, &p));
            assert_eq!(out.state.phase, InterviewPhase::Explore);
            assert_eq!(out.state.turn_in_topic, 1);
            assert_eq!(out.state.turns_used_total, 1);
            assert_eq!(out.state.budget(&id("a")).unwrap().turns_used, 1);
            assert_eq!(out.next_topic_id, Some(id("a")));
            assert_eq!(out.insight.status, InsightStatus::Exploring);
            assert!(out.insight.micro_plan_directive.is_some());
            assert_eq!(out.insight.next_sub_goal.as_deref(), Some("a one"));
        }

        #[test]
        fn caller_state_is_not_mutated() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let before = state.clone();
            let _ = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM));
            assert_eq!(state, before);
        }

        #[test]
        fn medium_reply_below_base_continues() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM));
            assert_eq!(out.state.topic_index, 0);
            assert_eq!(out.state.budget(&id("a")).unwrap().turns_used, 2);
            assert_eq!(out.insight.status, InsightStatus::Exploring);
        }

        #[test]
        fn low_reply_at_min_advances() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(LOW));
            assert_eq!(out.state.topic_index, 1);
            assert_eq!(out.next_topic_id, Some(id("b")));
            assert_eq!(out.insight.status, InsightStatus::Transition);
            assert_eq!(out.state.budget(&id("b")).unwrap().turns_used, 1);
        }

        #[test]
        fn high_reply_steals_from_largest_untouched_topic() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(HIGH));
            let a = out.state.budget(&id("a")).unwrap();
            assert_eq!(a.bonus_turns_granted, 1);
            assert_eq!(a.turns_used, 2);
            // first untouched topic wins the tie
            assert_eq!(out.state.budget(&id("b")).unwrap().max_turns, 5);
            assert!(out.state.budget(&id("c")).is_none());
            assert_eq!(out.state.key_insights.get(&id("a")).map(|s| s.is_empty()), Some(false));
        }

        #[test]
        fn high_reply_without_donor_degrades_to_continue() {
            let t = topics();
            let p = plan(&t);
            let mut state = started(&t, &p);
            for other in ["b", "c"] {
                let mut b = TopicBudget::new(1, 4, 6);
                b.turns_used = 1;
                state.budgets.insert(id(other), b);
            }
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(HIGH));
            let a = out.state.budget(&id("a")).unwrap();
            assert_eq!(a.bonus_turns_granted, 0);
            assert_eq!(a.turns_used, 2);
            assert_eq!(out.state.topic_index, 0);
        }

        #[test]
        fn bonus_quota_is_two_per_topic() {
            let t = topics();
            let p = plan(&t);
            let mut state = started(&t, &p);
            for _ in 0..6 {
                state = engine()
                    .process_turn(&state, &TurnInput::new(&t, &p).with_reply(HIGH))
                    .state;
                assert!(state.budget(&id("a")).map_or(true, |b| b.bonus_turns_granted <= 2));
            }
            assert_eq!(state.budget(&id("a")).unwrap().bonus_turns_granted, 2);
        }

        #[test]
        fn oversized_limits_are_clamped_to_two() {
            let engine = PhaseEngine::new(EngineConfig {
                max_bonus_turns: 4,
                max_offer_attempts: 5,
                ..EngineConfig::default()
            });
            assert_eq!(engine.config().max_bonus_turns, MAX_BONUS_TURNS_PER_TOPIC);
            assert_eq!(engine.config().max_offer_attempts, MAX_OFFER_ATTEMPTS);

            let t = topics();
            let p = plan(&t);
            let mut state = started(&t, &p);
            for _ in 0..8 {
                state = engine
                    .process_turn(&state, &TurnInput::new(&t, &p).with_reply(HIGH))
                    .state;
            }
            assert_eq!(state.budget(&id("a")).unwrap().bonus_turns_granted, 2);
        }

        #[test]
        fn donors_never_drop_below_one() {
            let t = vec![
                Topic::new(id("a"), "Alpha", 0),
                Topic::new(id("b"), "Beta", 1).with_max_turns(1),
            ];
            let p = plan(&t);
            let mut state = started(&t, &p);
            state.budgets.insert(id("b"), TopicBudget::new(1, 1, 1));
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(HIGH));
            assert_eq!(out.state.budget(&id("b")).unwrap().max_turns, 1);
            assert_eq!(out.state.budget(&id("a")).unwrap().bonus_turns_granted, 0);
        }

        #[test]
        fn missing_reply_repeats_without_consuming_turns() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply("   "));
            assert_eq!(out.state.budgets, state.budgets);
            assert_eq!(out.state.turns_used_total, state.turns_used_total);
        }

        #[test]
        fn time_out_mid_explore_raises_offer_with_explore_return() {
            let t = topics();
            let p = plan(&t);
            let state = started(&t, &p);
            let out = engine().process_turn(
                &state,
                &TurnInput::new(&t, &p).with_reply(LOW).with_timing(10, 600),
            );
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
            let ret = out.state.extension.return_to.unwrap();
            assert_eq!(ret.phase, InterviewPhase::Explore);
            assert_eq!(ret.topic_index, 1);
            assert_eq!(out.insight.status, InsightStatus::DeepOfferAsk);
            assert_eq!(out.insight.extension_preview.as_deref(), Some("Beta, Gamma"));
            assert!(out.next_topic_id.is_none());
        }
    }

    mod closing_explore {
        use super::*;

        fn last_topic_state(t: &[Topic], p: &InterviewPlan, used: [u32; 3]) -> SessionState {
            let mut state = SessionState::new();
            for (topic, used) in t.iter().zip(used) {
                let mut b = TopicBudget::from_plan(p.topic(&topic.id).unwrap());
                b.turns_used = used;
                state.budgets.insert(topic.id.clone(), b);
            }
            state.topic_index = 2;
            state.turn_in_topic = used[2];
            state.turns_used_total = used.iter().sum();
            state
        }

        #[test]
        fn covered_topics_with_no_time_left_go_to_deep_offer() {
            let t = topics();
            let p = plan(&t);
            let state = last_topic_state(&t, &p, [4, 4, 4]);
            let out = engine().process_turn(
                &state,
                &TurnInput::new(&t, &p).with_reply(MEDIUM).with_timing(10, 600),
            );
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
            assert!(!out.state.extension.deep_accepted);
            assert!(out.state.uncovered_topics.is_empty());
        }

        #[test]
        fn uncovered_topics_are_sorted_by_engagement() {
            let t = topics();
            let p = plan(&t);
            let mut state = last_topic_state(&t, &p, [1, 2, 4]);
            state.engagement.insert(id("a"), 0.2);
            state.engagement.insert(id("b"), 0.7);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM));
            assert_eq!(out.state.uncovered_topics, vec![id("b"), id("a")]);
            assert_eq!(out.state.phase, InterviewPhase::Deepen);
            assert_eq!(out.next_topic_id, Some(id("b")));
            let b = out.state.budget(&id("b")).unwrap();
            assert_eq!((b.deep_turn_cap, b.deep_turns_used), (2, 1));
            assert_eq!(out.insight.status, InsightStatus::Deepening);
        }

        #[test]
        fn full_coverage_with_time_left_collects_data() {
            let t = topics();
            let p = plan(&t);
            let state = last_topic_state(&t, &p, [4, 4, 4]);
            let out = engine().process_turn(
                &state,
                &TurnInput::new(&t, &p).with_reply(MEDIUM).collecting_data(true),
            );
            assert_eq!(out.state.phase, InterviewPhase::DataCollection);
            assert_eq!(out.insight.status, InsightStatus::DataCollection);
            assert!(out.insight.force_consent_question);
            assert_eq!(out.insight.stop_reason, Some(StopReason::CoverageComplete));
        }

        #[test]
        fn deepen_max_topics_truncates_order() {
            let t = topics();
            let mut p = plan(&t);
            p.deepen.max_topics = Some(1);
            let state = last_topic_state(&t, &p, [1, 1, 4]);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM));
            assert_eq!(out.state.uncovered_topics.len(), 2);
            assert_eq!(out.state.deep_topic_order.len(), 1);
        }
    }

    mod deepen {
        use super::*;

        fn deepening(t: &[Topic], p: &InterviewPlan) -> SessionState {
            // a and b under-covered, c (last) at its base
            let mut state = SessionState::new();
            for topic in t {
                let mut b = TopicBudget::from_plan(p.topic(&topic.id).unwrap());
                b.turns_used = if topic.id == id("c") { 4 } else { 1 };
                state.budgets.insert(topic.id.clone(), b);
            }
            state.topic_index = 2;
            state.turn_in_topic = 4;
            engine()
                .process_turn(&state, &TurnInput::new(t, p).with_reply(MEDIUM))
                .state
        }

        #[test]
        fn walks_uncovered_topics_up_to_their_cap_then_completes() {
            let t = topics();
            let p = plan(&t);
            let mut state = deepening(&t, &p);
            assert_eq!(state.phase, InterviewPhase::Deepen);
            let mut visited = vec![state.deep_topic_order[state.deep_cursor].clone()];
            for _ in 0..10 {
                let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM));
                state = out.state;
                if state.phase != InterviewPhase::Deepen {
                    assert_eq!(out.insight.status, InsightStatus::CompleteWithoutData);
                    break;
                }
                let current = state.deep_topic_order[state.deep_cursor].clone();
                if visited.last() != Some(&current) {
                    visited.push(current);
                }
            }
            assert_eq!(state.phase, InterviewPhase::DataCollection);
            assert_eq!(visited, vec![id("a"), id("b")]);
            for topic in &t {
                assert!(state.budget(&topic.id).unwrap().deep_turns_used <= 2);
            }
        }

        #[test]
        fn time_out_mid_deepen_raises_offer() {
            let t = topics();
            let p = plan(&t);
            let state = deepening(&t, &p);
            let cursor = state.deep_cursor;
            let out = engine().process_turn(
                &state,
                &TurnInput::new(&t, &p).with_reply(MEDIUM).with_timing(10, 700),
            );
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
            let ret = out.state.extension.return_to.unwrap();
            assert_eq!(ret.phase, InterviewPhase::Deepen);
            assert_eq!(ret.deep_cursor, cursor);
        }
    }

    mod negotiation {
        use super::*;

        const OFFER: &str = "We're out of time. Would you like to continue for a few more minutes?";

        fn offering(t: &[Topic], p: &InterviewPlan) -> SessionState {
            let state = started(t, p);
            engine()
                .process_turn(&state, &TurnInput::new(t, p).with_reply(LOW).with_timing(10, 600))
                .state
        }

        fn answer<'a>(t: &'a [Topic], p: &'a InterviewPlan, reply: &'a str, intent: ExtensionIntent) -> TurnInput<'a> {
            TurnInput::new(t, p)
                .with_reply(reply)
                .with_last_assistant_message(OFFER)
                .with_timing(10, 620)
                .with_intent(intent)
        }

        #[test]
        fn accept_resumes_explore_at_saved_position() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let out = engine().process_turn(&state, &answer(&t, &p, "sure", ExtensionIntent::Accept));
            assert_eq!(out.state.phase, InterviewPhase::Explore);
            assert!(out.state.extension.deep_accepted);
            assert!(out.state.extension.return_to.is_none());
            assert_eq!(out.next_topic_id, Some(id("b")));
            assert_eq!(out.state.focus_point.as_deref(), Some("b one"));
        }

        #[test]
        fn accepted_extension_is_not_offered_again() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let state = engine()
                .process_turn(&state, &answer(&t, &p, "sure", ExtensionIntent::Accept))
                .state;
            let out = engine().process_turn(
                &state,
                &TurnInput::new(&t, &p).with_reply(LOW).with_timing(10, 700),
            );
            assert_eq!(out.state.phase, InterviewPhase::Explore);
            assert_eq!(out.next_topic_id, Some(id("c")));
        }

        #[test]
        fn refuse_without_data_policy_completes() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let out = engine().process_turn(
                &state,
                &answer(&t, &p, "No, basta, va bene così", ExtensionIntent::Refuse),
            );
            assert_eq!(out.state.phase, InterviewPhase::DataCollection);
            assert_eq!(out.insight.status, InsightStatus::CompleteWithoutData);
            assert_eq!(out.insight.stop_reason, Some(StopReason::ExtensionDeclined));
        }

        #[test]
        fn refuse_with_data_policy_requests_consent() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let out = engine().process_turn(
                &state,
                &answer(&t, &p, "no thanks", ExtensionIntent::Refuse).collecting_data(true),
            );
            assert_eq!(out.insight.status, InsightStatus::DataCollection);
            assert!(out.insight.force_consent_question);
            assert!(out.state.data_collection.consent_requested);
        }

        #[test]
        fn neutral_answers_are_bounded_by_two_attempts() {
            let t = topics();
            let p = plan(&t);
            let mut state = offering(&t, &p);

            let out = engine().process_turn(&state, &answer(&t, &p, "hmm", ExtensionIntent::Neutral));
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
            assert_eq!(out.state.extension.attempts, 1);
            state = out.state;

            let out = engine().process_turn(&state, &answer(&t, &p, "dunno", ExtensionIntent::Neutral));
            assert_eq!(out.state.phase, InterviewPhase::DataCollection);
            assert_eq!(out.state.extension.attempts, 2);
            assert_eq!(out.insight.stop_reason, Some(StopReason::NegotiationExhausted));
        }

        #[test]
        fn no_reply_reissues_offer_without_attempt() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_timing(10, 620));
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
            assert_eq!(out.state.extension.attempts, 0);
            assert_eq!(out.insight.status, InsightStatus::DeepOfferAsk);
        }

        #[test]
        fn reply_to_unrecognized_question_costs_an_attempt() {
            let t = topics();
            let p = plan(&t);
            let state = offering(&t, &p);
            let input = TurnInput::new(&t, &p)
                .with_reply("ok")
                .with_last_assistant_message("Tell me more about your team.")
                .with_timing(10, 620)
                .with_intent(ExtensionIntent::Neutral);
            let out = engine().process_turn(&state, &input);
            assert_eq!(out.state.extension.attempts, 1);
            assert_eq!(out.state.phase, InterviewPhase::DeepOffer);
        }

        #[test]
        fn accept_with_exhausted_deep_order_builds_fresh_plan() {
            let t = topics();
            let p = plan(&t);
            let mut state = SessionState::new();
            for topic in &t {
                let mut b = TopicBudget::from_plan(p.topic(&topic.id).unwrap());
                b.turns_used = 4;
                state.budgets.insert(topic.id.clone(), b);
            }
            state.engagement.insert(id("c"), 0.9);
            state.topic_index = 2;
            state.turn_in_topic = 4;
            let state = engine()
                .process_turn(&state, &TurnInput::new(&t, &p).with_reply(MEDIUM).with_timing(10, 600))
                .state;
            assert_eq!(state.phase, InterviewPhase::DeepOffer);

            let out = engine().process_turn(&state, &answer(&t, &p, "yes", ExtensionIntent::Accept));
            assert_eq!(out.state.phase, InterviewPhase::Deepen);
            assert_eq!(out.state.deep_topic_order.len(), 3);
            assert_eq!(out.next_topic_id, Some(id("c")));
        }
    }

    mod data_collection {
        use super::*;

        fn consent_requested() -> SessionState {
            let mut state = SessionState::new();
            state.phase = InterviewPhase::DataCollection;
            state.data_collection.consent_requested = true;
            state
        }

        #[test]
        fn consent_then_contact_completes() {
            let t = topics();
            let p = plan(&t);
            let out = engine().process_turn(
                &consent_requested(),
                &TurnInput::new(&t, &p).with_reply("yes").with_intent(ExtensionIntent::Accept),
            );
            assert!(out.state.data_collection.consent_granted);
            assert_eq!(out.insight.status, InsightStatus::DataCollection);
            assert!(!out.insight.force_consent_question);

            let out = engine().process_turn(
                &out.state,
                &TurnInput::new(&t, &p).with_reply("jane@example.com"),
            );
            assert_eq!(out.insight.status, InsightStatus::Complete);
            assert!(out.state.data_collection.completed);
        }

        #[test]
        fn declined_consent_completes_without_data() {
            let t = topics();
            let p = plan(&t);
            let out = engine().process_turn(
                &consent_requested(),
                &TurnInput::new(&t, &p).with_reply("no").with_intent(ExtensionIntent::Refuse),
            );
            assert_eq!(out.insight.status, InsightStatus::CompleteWithoutData);
            assert_eq!(out.insight.stop_reason, Some(StopReason::ConsentDeclined));
        }

        #[test]
        fn unclear_consent_is_asked_again() {
            let t = topics();
            let p = plan(&t);
            let out = engine().process_turn(
                &consent_requested(),
                &TurnInput::new(&t, &p).with_reply("why?"),
            );
            assert_eq!(out.insight.status, InsightStatus::DataCollection);
            assert!(out.insight.force_consent_question);
            assert!(!out.state.data_collection.consent_granted);
        }

        #[test]
        fn completed_session_stays_complete() {
            let t = topics();
            let p = plan(&t);
            let mut state = consent_requested();
            state.data_collection.completed = true;
            let out = engine().process_turn(&state, &TurnInput::new(&t, &p).with_reply("bye"));
            assert_eq!(out.insight.status, InsightStatus::CompleteWithoutData);
            assert_eq!(out.state, state);
        }
    }

    mod invariants {
        use super::*;
        use proptest::prelude::*;

        const OFFER: &str = "We're out of time. Would you like to continue for a few more minutes?";

        fn reply(choice: u8) -> &'static str {
            match choice {
                0 => HIGH,
                1 => MEDIUM,
                2 => LOW,
                _ => "",
            }
        }

        fn intent(choice: u8) -> ExtensionIntent {
            match choice {
                0 => ExtensionIntent::Accept,
                1 => ExtensionIntent::Refuse,
                _ => ExtensionIntent::Neutral,
            }
        }

        proptest! {
            #[test]
            fn random_sessions_keep_budgets_consistent(
                max_bonus_turns in 0u32..6,
                collect_data in any::<bool>(),
                steps in proptest::collection::vec((0u8..4, 0u8..3, 0u64..180), 1..40),
            ) {
                let engine = PhaseEngine::new(EngineConfig {
                    max_bonus_turns,
                    ..EngineConfig::default()
                });
                let t = topics();
                let p = plan(&t);
                let mut state = engine
                    .process_turn(&SessionState::new(), &TurnInput::new(&t, &p))
                    .state;
                let mut elapsed = 0u64;

                for (reply_choice, intent_choice, wait) in steps {
                    elapsed += wait;
                    let mut input = TurnInput::new(&t, &p)
                        .with_reply(reply(reply_choice))
                        .with_timing(10, elapsed)
                        .collecting_data(collect_data);
                    if state.phase == InterviewPhase::DeepOffer
                        || state.phase == InterviewPhase::DataCollection
                    {
                        input = input
                            .with_last_assistant_message(OFFER)
                            .with_intent(intent(intent_choice));
                    }
                    let out = engine.process_turn(&state, &input);
                    state = out.state;

                    prop_assert!(state.budgets_consistent());
                    prop_assert!(state.extension.attempts <= MAX_OFFER_ATTEMPTS);
                    for budget in state.budgets.values() {
                        prop_assert!(budget.bonus_turns_granted <= MAX_BONUS_TURNS_PER_TOPIC);
                        prop_assert!(budget.turns_used <= budget.max_turns);
                    }
                }
            }
        }
    }
}
