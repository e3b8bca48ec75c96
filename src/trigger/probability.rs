// One control line that sweeps 5%..100% probability and then every named
// condition: indices 0..20 are probabilities, 20.. are condition entries 1...

use super::condition::{Condition, CONDITION_COUNT};

pub const PROB_COUNT: usize = 20;

// The sentinel at condition index 0 has no slot on the line.
pub const UNIFIED_INDEX_MAX: usize = PROB_COUNT + CONDITION_COUNT - 2;
pub const UNIFIED_INDEX_COUNT: usize = UNIFIED_INDEX_MAX + 1;

/// A consistent (probability, condition) pair: a condition always forces 100%.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbCondition {
    pub probability: u8,
    pub condition: Condition,
}

impl ProbCondition {
    pub fn from_unified_index(index: i64) -> Self {
        let index = index.clamp(0, UNIFIED_INDEX_MAX as i64) as usize;
        if index < PROB_COUNT {
            ProbCondition {
                probability: ((index + 1) * 5) as u8,
                condition: Condition::NONE,
            }
        } else {
            ProbCondition {
                probability: 100,
                condition: Condition::clamped((index - PROB_COUNT + 1) as i64),
            }
        }
    }

    /// Probabilities that are not multiples of 5 snap to the nearest slot.
    pub fn unified_index(self) -> usize {
        if !self.condition.is_none() {
            return PROB_COUNT + self.condition.index() - 1;
        }
        let slot = (self.probability as usize + 2) / 5;
        slot.clamp(1, PROB_COUNT) - 1
    }

    pub fn label(self) -> String {
        if self.condition.is_none() {
            format!("{}%", self.probability)
        } else {
            self.condition.name()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_matches_table() {
        assert_eq!(CONDITION_COUNT, 57);
        assert_eq!(UNIFIED_INDEX_MAX, 75);
    }

    #[test]
    fn nineteen_is_full_probability_without_condition() {
        let pc = ProbCondition::from_unified_index(19);
        assert_eq!(pc.probability, 100);
        assert!(pc.condition.is_none());
    }

    #[test]
    fn twenty_is_first_condition_at_full_probability() {
        let pc = ProbCondition::from_unified_index(20);
        assert_eq!(pc.probability, 100);
        assert_eq!(pc.condition.index(), 1);
        assert_eq!(pc.label(), "1:2");
    }

    #[test]
    fn bijection_over_valid_range() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..UNIFIED_INDEX_COUNT {
            let pc = ProbCondition::from_unified_index(i as i64);
            assert_eq!(pc.unified_index(), i);
            assert!(seen.insert((pc.probability, pc.condition)));
        }
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(ProbCondition::from_unified_index(-4).probability, 5);
        let top = ProbCondition::from_unified_index(1000);
        assert_eq!(top.condition.index(), CONDITION_COUNT - 1);
        assert_eq!(top.unified_index(), UNIFIED_INDEX_MAX);
    }

    #[test]
    fn odd_probabilities_snap() {
        let pc = ProbCondition { probability: 1, condition: Condition::NONE };
        assert_eq!(pc.unified_index(), 0);
        let pc = ProbCondition { probability: 73, condition: Condition::NONE };
        assert_eq!(pc.unified_index(), 14); // 75%
    }
}
