//! ProcessTurnHandler - Command handler for one interview turn.
//!
//! Orchestrates the collaborators around the pure phase engine:
//! 1. Load (or create / regenerate) the bot's plan
//! 2. Classify the reply when it answers an extension offer or consent question
//! 3. Resolve runtime knowledge for the plan (cached, time-bounded)
//! 4. Run the engine, which also plans the next question
//!
//! Callers serialize turns per session; the handler keeps no session state.

use std::sync::Arc;

use crate::domain::foundation::{BotId, Language, SessionId, TopicId};
use crate::domain::interview::{
    looks_like_extension_offer, ExtensionIntent, InsightStatus, IntentContext, InterviewPhase,
    KnowledgeContext, KnowledgeGuide, KnowledgeSource, MicroPlanDecision, OfferKind, PhaseEngine,
    PlanRefresh, SessionState, SupervisorInsight, Topic, TurnInput,
};
use crate::application::{PlanService, RuntimeKnowledgeBuilder};
use crate::ports::{ExtensionIntentClassifier, PlanStorageError};

/// Command to process one turn.
#[derive(Debug, Clone)]
pub struct ProcessTurnCommand {
    pub bot_id: BotId,
    pub session_id: SessionId,
    /// State returned by the previous turn (default for a new session).
    pub state: SessionState,
    pub topics: Vec<Topic>,
    /// Latest participant message; `None` to open the interview.
    pub user_message: Option<String>,
    /// The question the participant is answering.
    pub last_assistant_message: Option<String>,
    pub language: Language,
    /// Session length; the handler's default when `None`.
    pub max_duration_minutes: Option<u32>,
    pub elapsed_secs: u64,
}

impl ProcessTurnCommand {
    /// Opening turn of a new session.
    pub fn opening(bot_id: BotId, topics: Vec<Topic>) -> Self {
        Self {
            bot_id,
            session_id: SessionId::new(),
            state: SessionState::new(),
            topics,
            user_message: None,
            last_assistant_message: None,
            language: Language::default(),
            max_duration_minutes: None,
            elapsed_secs: 0,
        }
    }
}

/// Result of a processed turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub state: SessionState,
    pub insight: SupervisorInsight,
    pub next_topic_id: Option<TopicId>,
    pub micro_plan: Option<MicroPlanDecision>,
    /// Intent the reply was classified as, if it was classified.
    pub intent: Option<ExtensionIntent>,
    pub plan_version: u32,
    pub plan_refresh: PlanRefresh,
    /// Where this turn's cues came from, if knowledge was resolved.
    pub knowledge_source: Option<KnowledgeSource>,
}

impl TurnResult {
    /// True once the interview has nothing left to ask.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.insight.status,
            InsightStatus::Complete | InsightStatus::CompleteWithoutData
        )
    }
}

/// Errors surfaced by turn processing. Everything else degrades in place.
#[derive(Debug, thiserror::Error)]
pub enum ProcessTurnError {
    #[error("plan storage failed: {0}")]
    Storage(#[from] PlanStorageError),
}

/// Interview-wide settings the handler applies to every turn.
#[derive(Debug, Clone, Default)]
pub struct TurnPolicy {
    pub collect_data: bool,
    pub default_duration_minutes: u32,
    pub goal: String,
    pub audience: String,
}

/// Handler for processing turns.
pub struct ProcessTurnHandler {
    engine: PhaseEngine,
    plans: Arc<PlanService>,
    knowledge: Arc<RuntimeKnowledgeBuilder>,
    classifier: Arc<dyn ExtensionIntentClassifier>,
    guide: Option<Arc<KnowledgeGuide>>,
    policy: TurnPolicy,
}

impl ProcessTurnHandler {
    pub fn new(
        engine: PhaseEngine,
        plans: Arc<PlanService>,
        knowledge: Arc<RuntimeKnowledgeBuilder>,
        classifier: Arc<dyn ExtensionIntentClassifier>,
        policy: TurnPolicy,
    ) -> Self {
        Self {
            engine,
            plans,
            knowledge,
            classifier,
            guide: None,
            policy,
        }
    }

    /// Adds a hand-written guide as a secondary cue source.
    pub fn with_guide(mut self, guide: KnowledgeGuide) -> Self {
        self.guide = (!guide.is_empty()).then(|| Arc::new(guide));
        self
    }

    pub async fn handle(&self, cmd: ProcessTurnCommand) -> Result<TurnResult, ProcessTurnError> {
        let duration = cmd
            .max_duration_minutes
            .unwrap_or(self.policy.default_duration_minutes)
            .max(1);

        // 1. Plan
        let (record, plan_refresh) = self
            .plans
            .load_or_refresh(cmd.bot_id, &cmd.topics, duration)
            .await?;
        let plan = record.effective();

        let reply = cmd
            .user_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        // 2. Intent
        let intent = match (reply, self.pending_question(&cmd.state)) {
            (Some(message), Some(kind)) => {
                let context = IntentContext {
                    kind,
                    language: cmd.language,
                    was_offer: match kind {
                        OfferKind::Extension => cmd
                            .last_assistant_message
                            .as_deref()
                            .is_some_and(|m| looks_like_extension_offer(m, cmd.language)),
                        OfferKind::Consent => true,
                    },
                };
                Some(self.classifier.classify(message, context).await)
            }
            _ => None,
        };

        // 3. Knowledge; DATA_COLLECTION never asks topic questions again.
        let knowledge = if cmd.state.phase == InterviewPhase::DataCollection {
            None
        } else {
            let context = KnowledgeContext {
                language: cmd.language,
                goal: self.policy.goal.clone(),
                audience: self.policy.audience.clone(),
                signature: plan.metadata.signature.clone(),
            };
            Some(self.knowledge.build(&cmd.topics, &context).await)
        };

        // 4. Engine
        let mut input = TurnInput::new(&cmd.topics, &plan)
            .with_language(cmd.language)
            .with_timing(duration, cmd.elapsed_secs)
            .collecting_data(self.policy.collect_data);
        if let Some(message) = reply {
            input = input.with_reply(message);
        }
        if let Some(last) = cmd.last_assistant_message.as_deref() {
            input = input.with_last_assistant_message(last);
        }
        if let Some(intent) = intent {
            input = input.with_intent(intent);
        }
        if let Some(knowledge) = knowledge.as_deref() {
            input = input.with_knowledge(knowledge);
        }
        if let Some(guide) = self.guide.as_deref() {
            input = input.with_guide(guide);
        }

        let outcome = self.engine.process_turn(&cmd.state, &input);

        tracing::info!(
            bot_id = %cmd.bot_id,
            session_id = %cmd.session_id,
            phase = outcome.state.phase.label(),
            status = ?outcome.insight.status,
            next_topic = outcome.next_topic_id.as_ref().map(|t| t.as_str()),
            "turn handled"
        );

        Ok(TurnResult {
            state: outcome.state,
            insight: outcome.insight,
            next_topic_id: outcome.next_topic_id,
            micro_plan: outcome.micro_plan,
            intent,
            plan_version: record.version,
            plan_refresh,
            knowledge_source: knowledge.map(|k| k.source.clone()),
        })
    }

    /// Which yes/no question the reply answers, if any.
    fn pending_question(&self, state: &SessionState) -> Option<OfferKind> {
        match state.phase {
            InterviewPhase::DeepOffer => Some(OfferKind::Extension),
            InterviewPhase::DataCollection => {
                let dc = &state.data_collection;
                (dc.consent_requested && !dc.consent_granted && !dc.completed)
                    .then_some(OfferKind::Consent)
            }
            _ => None,
        }
    }
}
