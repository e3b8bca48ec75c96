// Sizes, defaults and the small lookup tables every layer agrees on.
//
// The host only ever sees indices into these tables (the "stored integers"),
// so the order of every table here is part of the file format. Append only.

pub const NUM_TRACKS: usize = 16;
pub const NUM_PATTERNS: usize = 16;
pub const NUM_STEPS: usize = 64; // steps per pattern
pub const NUM_SETS: usize = 32; // songs on disk
pub const NUM_SNAPSHOTS: usize = 16;
pub const MAX_TRANSPOSE_STEPS: usize = 16;
pub const MAX_NOTES_PER_STEP: usize = 7;

pub const TICKS_PER_STEP: i32 = 48;
pub const MAX_OFFSET: i8 = 24; // +/- half a step
pub const MAX_STEP_LENGTH: u8 = 64;

pub const DEFAULT_BPM: u16 = 120;
pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 300;

pub const DEFAULT_VELOCITY: u8 = 100;
pub const DEFAULT_SWING: u8 = 50;
pub const DEFAULT_TRACK_LENGTH: u8 = 16;
pub const DEFAULT_GATE: u8 = 95;
pub const DEFAULT_CC: u8 = 64;
pub const MAX_RESET_LENGTH: u16 = 256; // 0 = never reset
pub const DRUM_CHANNEL: u8 = 9;

/// Tracks 0-7 map to channels 0-7, the rest share the drum channel.
pub fn default_channel(track: usize) -> u8 {
    if track < 8 { track as u8 } else { DRUM_CHANNEL }
}

// Track speed multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Speed {
    Quarter,
    Third,
    Half,
    TwoThirds,
    #[default]
    Normal,
    ThreeHalves,
    Double,
    Triple,
    Quadruple,
}

impl Speed {
    pub const ALL: [Speed; 9] = [
        Speed::Quarter,
        Speed::Third,
        Speed::Half,
        Speed::TwoThirds,
        Speed::Normal,
        Speed::ThreeHalves,
        Speed::Double,
        Speed::Triple,
        Speed::Quadruple,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Speed::Quarter => 0.25,
            Speed::Third => 1.0 / 3.0,
            Speed::Half => 0.5,
            Speed::TwoThirds => 2.0 / 3.0,
            Speed::Normal => 1.0,
            Speed::ThreeHalves => 1.5,
            Speed::Double => 2.0,
            Speed::Triple => 3.0,
            Speed::Quadruple => 4.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Speed::Quarter => "1/4x",
            Speed::Third => "1/3x",
            Speed::Half => "1/2x",
            Speed::TwoThirds => "2/3x",
            Speed::Normal => "1x",
            Speed::ThreeHalves => "3/2x",
            Speed::Double => "2x",
            Speed::Triple => "3x",
            Speed::Quadruple => "4x",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArpMode {
    #[default]
    Off,
    Up,
    Down,
    UpDown,
    DownUp,
    UpAndDown,
    DownAndUp,
    Random,
    Chord,
    OutsideIn,
    InsideOut,
    Converge,
    Diverge,
    Thumb,
    Pinky,
}

impl ArpMode {
    pub const ALL: [ArpMode; 15] = [
        ArpMode::Off,
        ArpMode::Up,
        ArpMode::Down,
        ArpMode::UpDown,
        ArpMode::DownUp,
        ArpMode::UpAndDown,
        ArpMode::DownAndUp,
        ArpMode::Random,
        ArpMode::Chord,
        ArpMode::OutsideIn,
        ArpMode::InsideOut,
        ArpMode::Converge,
        ArpMode::Diverge,
        ArpMode::Thumb,
        ArpMode::Pinky,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

// Musical note values, 16 steps = 1 bar. Order matches the engine's rate table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArpSpeed {
    ThirtySecond,
    TripletSixteenth,
    #[default]
    Sixteenth,
    TripletEighth,
    Eighth,
    TripletQuarter,
    Quarter,
    TripletHalf,
    Half,
    Whole,
}

impl ArpSpeed {
    pub const ALL: [ArpSpeed; 10] = [
        ArpSpeed::ThirtySecond,
        ArpSpeed::TripletSixteenth,
        ArpSpeed::Sixteenth,
        ArpSpeed::TripletEighth,
        ArpSpeed::Eighth,
        ArpSpeed::TripletQuarter,
        ArpSpeed::Quarter,
        ArpSpeed::TripletHalf,
        ArpSpeed::Half,
        ArpSpeed::Whole,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArpOctave {
    #[default]
    Zero,
    Up1,
    Up2,
    Down1,
    Down2,
    Both1,
    Both2,
}

impl ArpOctave {
    pub const ALL: [ArpOctave; 7] = [
        ArpOctave::Zero,
        ArpOctave::Up1,
        ArpOctave::Up2,
        ArpOctave::Down1,
        ArpOctave::Down2,
        ArpOctave::Both1,
        ArpOctave::Both2,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

// Step-only arp behaviour, there is no track-level default to inherit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArpLayer {
    #[default]
    Layer, // arps play over each other
    Cut,   // a new step kills the previous arp notes
}

impl ArpLayer {
    pub const ALL: [ArpLayer; 2] = [ArpLayer::Layer, ArpLayer::Cut];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

/// "C4" style name for a MIDI note.
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", pitch_class_name(note), octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_follow_track_layout() {
        assert_eq!(default_channel(0), 0);
        assert_eq!(default_channel(7), 7);
        assert_eq!(default_channel(8), DRUM_CHANNEL);
        assert_eq!(default_channel(15), DRUM_CHANNEL);
    }

    #[test]
    fn table_indices_are_stable() {
        assert_eq!(Speed::default().index(), 4);
        assert_eq!(ArpSpeed::default().index(), 2);
        assert_eq!(ArpMode::from_index(14), Some(ArpMode::Pinky));
        assert_eq!(ArpMode::from_index(15), None);
        assert_eq!(ArpOctave::from_index(6), Some(ArpOctave::Both2));
        assert_eq!(ArpLayer::from_index(2), None);
    }

    #[test]
    fn note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
    }
}
