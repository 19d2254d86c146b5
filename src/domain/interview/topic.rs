//! Interview topics as configured on a bot.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::TopicId;

/// A topic the interview must cover.
///
/// Read-only to the conductor: topics are authored elsewhere and handed in
/// with every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub label: String,
    /// Position in the interview; ties keep input order.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub sub_goals: Vec<String>,
    /// Authored ceiling on questions for this topic.
    #[serde(default)]
    pub max_turns: Option<u32>,
}

impl Topic {
    /// Creates a topic with no sub-goals and no authored ceiling.
    pub fn new(id: TopicId, label: impl Into<String>, order: u32) -> Self {
        Self {
            id,
            label: label.into(),
            order,
            sub_goals: Vec::new(),
            max_turns: None,
        }
    }

    /// Sets the sub-goals.
    pub fn with_sub_goals<I, S>(mut self, sub_goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_goals = sub_goals.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the authored turn ceiling.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Sub-goals not contained in `used` (case-insensitive), in authored order.
    pub fn unused_sub_goals<'a>(&'a self, used: &[String]) -> Vec<&'a str> {
        self.sub_goals
            .iter()
            .filter(|goal| {
                !used
                    .iter()
                    .any(|u| u.trim().eq_ignore_ascii_case(goal.trim()))
            })
            .map(String::as_str)
            .collect()
    }
}

/// Returns topics sorted by their order index (stable for ties).
pub fn ordered_topics(topics: &[Topic]) -> Vec<&Topic> {
    let mut ordered: Vec<&Topic> = topics.iter().collect();
    ordered.sort_by_key(|t| t.order);
    ordered
}
