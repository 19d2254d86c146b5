//! Supervisor insight handed to question generation after each turn.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::TopicId;

use super::phase::InterviewPhase;

/// What the next assistant message should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightStatus {
    /// Keep questioning the current EXPLORE topic.
    Exploring,
    /// Bridge to a new topic.
    Transition,
    /// Ask whether the user wants to extend.
    DeepOfferAsk,
    /// Residual question on an under-covered topic.
    Deepening,
    /// Ask for consent, or for contact details once consent is granted.
    DataCollection,
    /// Close the interview after collecting data.
    Complete,
    /// Close the interview without collecting data.
    CompleteWithoutData,
}

impl InsightStatus {
    /// True if the interview is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::CompleteWithoutData)
    }
}

/// Why questioning stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// The user declined the extension.
    ExtensionDeclined,
    /// Two offers went unanswered.
    NegotiationExhausted,
    /// Every planned topic was covered.
    CoverageComplete,
    /// The user declined data collection.
    ConsentDeclined,
}

/// Output of one turn, consumed by the question generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorInsight {
    pub status: InsightStatus,
    pub phase: InterviewPhase,
    /// Primary instruction for the phase.
    pub phase_directive: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<TopicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_sub_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engaging_snippet: Option<String>,
    /// What an accepted extension would cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub force_consent_question: bool,
    /// Rendered micro-plan, present while questioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro_plan_directive: Option<String>,
}

impl SupervisorInsight {
    pub fn new(status: InsightStatus, phase: InterviewPhase) -> Self {
        Self {
            status,
            phase,
            phase_directive: phase.directive().to_string(),
            topic_id: None,
            topic_label: None,
            next_sub_goal: None,
            engaging_snippet: None,
            extension_preview: None,
            stop_reason: None,
            force_consent_question: false,
            micro_plan_directive: None,
        }
    }

    pub fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = Some(reason);
        self
    }

    pub fn with_extension_preview(mut self, preview: impl Into<String>) -> Self {
        self.extension_preview = Some(preview.into());
        self
    }

    pub fn forcing_consent(mut self) -> Self {
        self.force_consent_question = true;
        self
    }
}
