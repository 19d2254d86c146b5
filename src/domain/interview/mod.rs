//! Interview domain - the turn-by-turn conductor.
//!
//! Leaf first: text utilities and the signal scorer, topic budgets and the
//! plan, knowledge cues and the micro-planner, then the phase engine that
//! ties them together.

mod budget;
mod engine;
mod guide;
mod insight;
mod knowledge;
mod micro_planner;
mod negotiation;
mod phase;
mod plan;
mod signal;
mod state;
mod text;
mod topic;

pub use budget::TopicBudget;
pub use engine::{
    AllocationAction, EngineConfig, PhaseEngine, TurnInput, TurnOutcome, MAX_BONUS_TURNS_PER_TOPIC,
    MAX_OFFER_ATTEMPTS,
};
pub use guide::{GuideMatch, GuideSection, KnowledgeGuide};
pub use insight::{InsightStatus, StopReason, SupervisorInsight};
pub use knowledge::{
    fallback_cues, normalize_cues, FallbackReason, KnowledgeContext, KnowledgeShapeError,
    KnowledgeSource, RuntimeKnowledge, TopicCues, MAX_CUES_PER_LIST, MAX_CUE_WORDS,
};
pub use micro_planner::{
    is_clarification_request, CueSource, MicroPlanDecision, MicroPlanInput, MicroPlanner,
    OpeningTone, QuestionStrategy,
};
pub use negotiation::{looks_like_extension_offer, ExtensionIntent, IntentContext, OfferKind};
pub use phase::InterviewPhase;
pub use plan::{
    topic_signature, DeepenOverrides, DeepenPolicy, InterviewPlan, PlanMetadata, PlanOverrides,
    PlanRecord, PlanRefresh, PlanTopic, TopicOverride, DEFAULT_DEEPEN_TURNS_PER_TOPIC,
    DEFAULT_SECONDS_PER_TURN, MAX_DEEPEN_TURNS_PER_TOPIC, MAX_OVERRIDE_TURNS, PLAN_LOGIC_VERSION,
};
pub use signal::{
    mentions_concrete_detail, salient_snippet, ScoringProfile, ScoringWeights, SignalBand,
    SignalResult, SignalScorer,
};
pub use state::{DataCollectionState, ExtensionState, ReturnPosition, SessionState};
pub use topic::{ordered_topics, Topic};
