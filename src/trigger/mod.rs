// Trigger codec: the compact integers a step stores for "when and how does it
// fire", and their meaning. Pure functions only, nothing here holds state.

mod condition;
mod probability;
mod ratchet;

pub use condition::{Condition, Cycle, CONDITION_COUNT};
pub use probability::{ProbCondition, PROB_COUNT, UNIFIED_INDEX_COUNT, UNIFIED_INDEX_MAX};
pub use ratchet::{Ratchet, RatchetMode, RATCHET_VALUES};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("ratchet value {0} is outside the regular/ramp-up/ramp-down bands")]
    RatchetOutOfRange(i64),

    #[error("ratchet count {count} is invalid for {mode:?}")]
    RatchetCount { mode: RatchetMode, count: u8 },

    #[error("ratchet index {0} is outside the ratchet table")]
    RatchetIndex(i64),

    #[error("condition index {0} is outside the condition table")]
    ConditionOutOfRange(i64),
}
