//! Per-topic turn budgets.

use serde::{Deserialize, Serialize};

use super::plan::PlanTopic;

/// Turn budget of one topic.
///
/// Created lazily from the plan on first visit. Keeps
/// `1 ≤ min_turns ≤ base_turns ≤ max_turns` and `turns_used ≤ max_turns`
/// through every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBudget {
    /// Target number of questions.
    pub base_turns: u32,
    /// Floor before an early advance is allowed.
    pub min_turns: u32,
    /// Ceiling, bonus turns included.
    pub max_turns: u32,
    pub turns_used: u32,
    pub bonus_turns_granted: u32,
    /// Questions asked about this topic during DEEPEN.
    #[serde(default)]
    pub deep_turns_used: u32,
    /// DEEPEN allowance fixed when the topic is entered in DEEPEN; 0 until then.
    #[serde(default)]
    pub deep_turn_cap: u32,
}

impl TopicBudget {
    /// Creates a budget, normalising the bounds so the ordering invariant holds.
    pub fn new(min_turns: u32, base_turns: u32, max_turns: u32) -> Self {
        let min_turns = min_turns.max(1);
        let base_turns = base_turns.max(min_turns);
        let max_turns = max_turns.max(base_turns);
        Self {
            base_turns,
            min_turns,
            max_turns,
            turns_used: 0,
            bonus_turns_granted: 0,
            deep_turns_used: 0,
            deep_turn_cap: 0,
        }
    }

    /// Creates a fresh budget from a plan entry.
    pub fn from_plan(entry: &PlanTopic) -> Self {
        Self::new(entry.min_turns, entry.base_turns, entry.max_turns)
    }

    /// True until the first question about the topic is asked.
    pub fn is_untouched(&self) -> bool {
        self.turns_used == 0
    }

    /// True once the base target has been reached.
    pub fn is_covered(&self) -> bool {
        self.turns_used >= self.base_turns
    }

    /// Turns left before the ceiling.
    pub fn slack(&self) -> u32 {
        self.max_turns.saturating_sub(self.turns_used)
    }

    /// Counts one more question, never past the ceiling.
    pub fn record_turn(&mut self) {
        self.turns_used = (self.turns_used + 1).min(self.max_turns);
    }

    /// True if a bonus turn may be granted.
    pub fn can_take_bonus(&self, max_bonus_turns: u32) -> bool {
        self.turns_used < self.max_turns && self.bonus_turns_granted < max_bonus_turns
    }

    /// Counts a bonus question.
    pub fn grant_bonus(&mut self) {
        self.record_turn();
        self.bonus_turns_granted += 1;
    }

    /// Gives up one turn of ceiling to another topic.
    ///
    /// Returns false (and changes nothing) when the ceiling is already 1.
    /// Base and min follow the ceiling down so the ordering invariant holds.
    pub fn donate_turn(&mut self) -> bool {
        if self.max_turns <= 1 {
            return false;
        }
        self.max_turns -= 1;
        self.base_turns = self.base_turns.min(self.max_turns);
        self.min_turns = self.min_turns.min(self.base_turns);
        self.turns_used = self.turns_used.min(self.max_turns);
        true
    }

    /// Enters the topic in DEEPEN, fixing its allowance.
    ///
    /// The allowance is `min(deepen_cap, slack)` floored at 1, so a topic that
    /// used its whole EXPLORE ceiling still gets one residual question.
    pub fn enter_deepen(&mut self, deepen_cap: u32) {
        self.deep_turn_cap = deepen_cap.min(self.slack()).max(1);
        self.deep_turns_used = 0;
        self.record_deep_turn();
    }

    /// True if another DEEPEN question fits in the allowance.
    pub fn has_deep_turns_left(&self) -> bool {
        self.deep_turns_used < self.deep_turn_cap
    }

    /// Counts a DEEPEN question.
    pub fn record_deep_turn(&mut self) {
        self.deep_turns_used += 1;
        self.record_turn();
    }

    /// Forgets DEEPEN bookkeeping so the topic can be deepened again.
    pub fn reset_deepen(&mut self) {
        self.deep_turns_used = 0;
        self.deep_turn_cap = 0;
    }

    /// Checks the ordering and usage invariants.
    pub fn is_consistent(&self) -> bool {
        1 <= self.min_turns
            && self.min_turns <= self.base_turns
            && self.base_turns <= self.max_turns
            && self.turns_used <= self.max_turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_normalizes_bounds() {
        let b = TopicBudget::new(0, 5, 3);
        assert_eq!((b.min_turns, b.base_turns, b.max_turns), (1, 5, 5));
        assert!(b.is_consistent());
    }

    #[test]
    fn record_turn_saturates_at_ceiling() {
        let mut b = TopicBudget::new(1, 1, 2);
        b.record_turn();
        b.record_turn();
        b.record_turn();
        assert_eq!(b.turns_used, 2);
    }

    #[test]
    fn donate_turn_lowers_ceiling_and_keeps_order() {
        let mut b = TopicBudget::new(1, 4, 4);
        assert!(b.donate_turn());
        assert_eq!((b.min_turns, b.base_turns, b.max_turns), (1, 3, 3));
    }

    #[test]
    fn donate_turn_refuses_below_one() {
        let mut b = TopicBudget::new(1, 1, 1);
        assert!(!b.donate_turn());
        assert_eq!(b.max_turns, 1);
    }

    #[test]
    fn bonus_requires_room_and_quota() {
        let mut b = TopicBudget::new(1, 2, 4);
        b.turns_used = 2;
        assert!(b.can_take_bonus(2));
        b.grant_bonus();
        b.grant_bonus();
        assert_eq!(b.turns_used, 4);
        assert!(!b.can_take_bonus(2));
    }

    #[test]
    fn deepen_allowance_is_floored_at_one() {
        let mut b = TopicBudget::new(1, 2, 3);
        b.turns_used = 3;
        b.enter_deepen(2);
        assert_eq!(b.deep_turn_cap, 1);
        assert_eq!(b.deep_turns_used, 1);
        assert_eq!(b.turns_used, 3);
        assert!(!b.has_deep_turns_left());
    }

    #[test]
    fn deepen_allowance_is_capped_by_slack() {
        let mut b = TopicBudget::new(1, 4, 6);
        b.turns_used = 1;
        b.enter_deepen(2);
        assert_eq!(b.deep_turn_cap, 2);
        assert_eq!(b.turns_used, 2);
        assert!(b.has_deep_turns_left());
    }

    proptest! {
        #[test]
        fn mutations_preserve_invariants(
            min in 0u32..5,
            base in 0u32..8,
            max in 0u32..10,
            ops in proptest::collection::vec(0u8..4, 0..40),
        ) {
            let mut b = TopicBudget::new(min, base, max);
            for op in ops {
                match op {
                    0 => b.record_turn(),
                    1 => if b.can_take_bonus(2) { b.grant_bonus() },
                    2 => { b.donate_turn(); },
                    _ => b.enter_deepen(2),
                }
                prop_assert!(b.is_consistent());
                prop_assert!(b.bonus_turns_granted <= 2);
            }
        }
    }
}
