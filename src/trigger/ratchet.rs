use super::TriggerError;

/// Wire values sent to the engine, in the order steps store them.
/// Regular 1x-8x, ramp-up 2x-8x, ramp-down 2x-8x.
pub const RATCHET_VALUES: [u8; 22] = [
    1, 2, 3, 4, 5, 6, 7, 8, //
    10, 11, 12, 13, 14, 15, 16, //
    20, 21, 22, 23, 24, 25, 26,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RatchetMode {
    Regular,
    RampUp,
    RampDown,
}

/// Intra-step note repetition. `Regular(1)` is a single hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ratchet {
    Regular(u8),
    RampUp(u8),
    RampDown(u8),
}

impl Default for Ratchet {
    fn default() -> Self {
        Ratchet::Regular(1)
    }
}

impl Ratchet {
    pub fn new(mode: RatchetMode, count: u8) -> Result<Self, TriggerError> {
        let ratchet = match mode {
            RatchetMode::Regular => Ratchet::Regular(count),
            RatchetMode::RampUp => Ratchet::RampUp(count),
            RatchetMode::RampDown => Ratchet::RampDown(count),
        };
        ratchet.validate()?;
        Ok(ratchet)
    }

    pub fn mode(self) -> RatchetMode {
        match self {
            Ratchet::Regular(_) => RatchetMode::Regular,
            Ratchet::RampUp(_) => RatchetMode::RampUp,
            Ratchet::RampDown(_) => RatchetMode::RampDown,
        }
    }

    pub fn count(self) -> u8 {
        match self {
            Ratchet::Regular(c) | Ratchet::RampUp(c) | Ratchet::RampDown(c) => c,
        }
    }

    pub fn is_single(self) -> bool {
        self == Ratchet::Regular(1)
    }

    fn validate(self) -> Result<(), TriggerError> {
        let count = self.count();
        let ok = match self.mode() {
            RatchetMode::Regular => (1..=8).contains(&count),
            RatchetMode::RampUp | RatchetMode::RampDown => (2..=8).contains(&count),
        };
        if ok {
            Ok(())
        } else {
            Err(TriggerError::RatchetCount { mode: self.mode(), count })
        }
    }

    /// Flat wire value: 1..=8 regular, 10..=16 ramp up, 20..=26 ramp down.
    pub fn encode(self) -> Result<u8, TriggerError> {
        self.validate()?;
        Ok(match self {
            Ratchet::Regular(c) => c,
            Ratchet::RampUp(c) => c + 8,
            Ratchet::RampDown(c) => c + 18,
        })
    }

    pub fn decode(value: i64) -> Result<Self, TriggerError> {
        match value {
            1..=8 => Ok(Ratchet::Regular(value as u8)),
            10..=16 => Ok(Ratchet::RampUp((value - 8) as u8)),
            20..=26 => Ok(Ratchet::RampDown((value - 18) as u8)),
            _ => Err(TriggerError::RatchetOutOfRange(value)),
        }
    }

    /// Position in `RATCHET_VALUES`, the integer persisted per step.
    pub fn index(self) -> usize {
        let value = self.encode().unwrap_or(1);
        RATCHET_VALUES.iter().position(|&v| v == value).unwrap_or(0)
    }

    pub fn from_index(index: i64) -> Result<Self, TriggerError> {
        let value = usize::try_from(index)
            .ok()
            .and_then(|i| RATCHET_VALUES.get(i))
            .ok_or(TriggerError::RatchetIndex(index))?;
        Self::decode(*value as i64)
    }

    pub fn display_name(self) -> String {
        match self {
            Ratchet::Regular(c) => format!("Ratchet: {c}x"),
            Ratchet::RampUp(c) => format!("Ramp Up: {c}x"),
            Ratchet::RampDown(c) => format!("Ramp Dn: {c}x"),
        }
    }
}
