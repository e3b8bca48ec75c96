use super::TriggerError;

/// Table size including the "no condition" sentinel at index 0.
pub const CONDITION_COUNT: usize = 57;

const CYCLE_LENGTHS: [u8; 6] = [2, 3, 4, 5, 6, 8];

/// "Fire on loop `m` of every `n` loops", or on every loop except `m` when inverted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cycle {
    pub n: u8,
    pub m: u8, // 1-indexed
    pub invert: bool,
}

impl Cycle {
    /// `iteration` is the 0-based count of completed loops.
    pub fn fires_on(self, iteration: u32) -> bool {
        let hit = iteration % self.n as u32 == (self.m - 1) as u32;
        hit != self.invert
    }
}

// Non-inverted entries for every cycle length, then the inverted copies.
const fn build_table() -> [Cycle; CONDITION_COUNT - 1] {
    let mut table = [Cycle { n: 1, m: 1, invert: false }; CONDITION_COUNT - 1];
    let mut i = 0;
    let mut pass = 0;
    while pass < 2 {
        let mut c = 0;
        while c < CYCLE_LENGTHS.len() {
            let n = CYCLE_LENGTHS[c];
            let mut m = 1;
            while m <= n {
                table[i] = Cycle { n, m, invert: pass == 1 };
                i += 1;
                m += 1;
            }
            c += 1;
        }
        pass += 1;
    }
    table
}

static CYCLES: [Cycle; CONDITION_COUNT - 1] = build_table();

/// A validated index into the condition table. Index 0 means "no condition".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Condition(u8);

impl Condition {
    pub const NONE: Condition = Condition(0);

    pub fn from_index(index: i64) -> Result<Self, TriggerError> {
        if (0..CONDITION_COUNT as i64).contains(&index) {
            Ok(Condition(index as u8))
        } else {
            Err(TriggerError::ConditionOutOfRange(index))
        }
    }

    pub fn clamped(index: i64) -> Self {
        Condition(index.clamp(0, CONDITION_COUNT as i64 - 1) as u8)
    }

    pub fn from_cycle(cycle: Cycle) -> Option<Self> {
        CYCLES
            .iter()
            .position(|c| *c == cycle)
            .map(|i| Condition(i as u8 + 1))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn cycle(self) -> Option<Cycle> {
        match self.0 {
            0 => None,
            i => Some(CYCLES[i as usize - 1]),
        }
    }

    /// Unconditional steps are eligible on every loop.
    pub fn fires_on(self, iteration: u32) -> bool {
        self.cycle().is_none_or(|c| c.fires_on(iteration))
    }

    pub fn name(self) -> String {
        match self.cycle() {
            None => "---".to_string(),
            Some(c) if c.invert => format!("!{}:{}", c.m, c.n),
            Some(c) => format!("{}:{}", c.m, c.n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_layout_is_stable() {
        assert!(Condition::NONE.cycle().is_none());
        assert_eq!(Condition(1).cycle(), Some(Cycle { n: 2, m: 1, invert: false }));
        assert_eq!(Condition(2).cycle(), Some(Cycle { n: 2, m: 2, invert: false }));
        assert_eq!(Condition(3).cycle(), Some(Cycle { n: 3, m: 1, invert: false }));
        assert_eq!(Condition(28).cycle(), Some(Cycle { n: 8, m: 8, invert: false }));
        assert_eq!(Condition(29).cycle(), Some(Cycle { n: 2, m: 1, invert: true }));
        assert_eq!(Condition(56).cycle(), Some(Cycle { n: 8, m: 8, invert: true }));
    }

    #[test]
    fn names() {
        assert_eq!(Condition::NONE.name(), "---");
        assert_eq!(Condition(4).name(), "2:3");
        assert_eq!(Condition(29).name(), "!1:2");
    }

    #[test]
    fn out_of_range_is_rejected_or_clamped() {
        assert!(Condition::from_index(57).is_err());
        assert!(Condition::from_index(-1).is_err());
        assert_eq!(Condition::clamped(500).index(), 56);
        assert_eq!(Condition::clamped(-3), Condition::NONE);
    }

    #[test]
    fn cycle_eligibility() {
        let second_of_three = Condition::from_cycle(Cycle { n: 3, m: 2, invert: false }).unwrap();
        let fired: Vec<bool> = (0..6).map(|i| second_of_three.fires_on(i)).collect();
        assert_eq!(fired, vec![false, true, false, false, true, false]);

        let not_first_of_two = Condition::from_cycle(Cycle { n: 2, m: 1, invert: true }).unwrap();
        assert!(!not_first_of_two.fires_on(0));
        assert!(not_first_of_two.fires_on(1));
        assert!(Condition::NONE.fires_on(7));
    }

    #[test]
    fn from_cycle_round_trips() {
        for i in 1..CONDITION_COUNT {
            let c = Condition(i as u8);
            assert_eq!(Condition::from_cycle(c.cycle().unwrap()), Some(c));
        }
    }
}
