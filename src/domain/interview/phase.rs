//! Interview phases.
//!
//! The conductor walks EXPLORE → DEEPEN → DATA_COLLECTION, detouring through
//! DEEP_OFFER whenever the time budget runs out before an extension was agreed.

use serde::{Deserialize, Serialize};

/// The current phase of the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewPhase {
    /// Breadth-first pass across all topics with elastic turn budgets.
    #[default]
    Explore,

    /// Residual pass over topics left under-covered by EXPLORE.
    Deepen,

    /// Negotiating a voluntary extension with the user.
    DeepOffer,

    /// Collecting consent and contact data before closing.
    DataCollection,
}

impl InterviewPhase {
    /// Returns the question generator's primary directive in this phase.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Explore => "Cover the current topic breadth-first. Ask one focused question at a time.",
            Self::Deepen => "Return to an under-covered topic. Fill the gap without repeating earlier questions.",
            Self::DeepOffer => "Time is up. Ask whether the user wants to continue for a few more minutes.",
            Self::DataCollection => "Close the interview. Ask for consent before collecting any contact data.",
        }
    }

    /// Returns a shorter label for the phase, suitable for logs and UI display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Explore => "Exploring",
            Self::Deepen => "Deepening",
            Self::DeepOffer => "Offering extension",
            Self::DataCollection => "Collecting data",
        }
    }

    /// Returns true if the micro-planner runs in this phase.
    pub fn is_questioning(&self) -> bool {
        matches!(self, Self::Explore | Self::Deepen)
    }

    /// Returns all valid next phases from this phase (including staying put).
    pub fn valid_next_phases(&self) -> Vec<Self> {
        match self {
            Self::Explore => vec![Self::Explore, Self::Deepen, Self::DeepOffer, Self::DataCollection],
            Self::Deepen => vec![Self::Deepen, Self::DeepOffer, Self::DataCollection],
            Self::DeepOffer => vec![Self::DeepOffer, Self::Explore, Self::Deepen, Self::DataCollection],
            Self::DataCollection => vec![Self::DataCollection],
        }
    }

    /// Returns true if transition to target phase is valid.
    pub fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_next_phases().contains(target)
    }
}
