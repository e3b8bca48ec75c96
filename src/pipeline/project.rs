// The song model: tracks own patterns, patterns own steps. Everything is plain
// owned data, so copy/paste and set switching are just `clone()`.
//
// Sizes are fixed: 16 tracks x 16 patterns x 64 steps. Constructors fill every
// field with its default; nothing is ever "missing" once a value exists.

use std::collections::BTreeMap;

use crate::shared::{
    default_channel, ArpLayer, ArpMode, ArpOctave, ArpSpeed, Speed, DEFAULT_BPM, DEFAULT_CC,
    DEFAULT_GATE, DEFAULT_SWING, DEFAULT_TRACK_LENGTH, MAX_BPM, MAX_NOTES_PER_STEP, MAX_OFFSET,
    MIN_BPM, NUM_PATTERNS, NUM_SNAPSHOTS, NUM_STEPS, NUM_TRACKS,
};
use crate::trigger::{Condition, ProbCondition, Ratchet};

use super::transpose::TransposeSequence;

/// One slot of a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    // chord notes in playback order, velocities parallel to them
    notes: Vec<u8>,
    velocities: Vec<u8>,

    pub gate: u8, // 0 = use the track gate, else 1-100%
    pub cc1: Option<u8>,
    pub cc2: Option<u8>,
    pub probability: u8, // 1-100, only used while `condition` is none
    pub condition: Condition,
    pub ratchet: Ratchet,
    pub length: u8, // sustain in steps
    pub param_spark: Condition, // when cc locks apply
    pub comp_spark: Condition,  // when ratchet/jump apply
    pub jump: Option<u8>,
    pub offset: i8, // ticks, 48 per step

    // None = inherit from the track
    pub arp_mode: Option<ArpMode>,
    pub arp_speed: Option<ArpSpeed>,
    pub arp_octave: Option<ArpOctave>,
    pub arp_layer: ArpLayer,
    pub arp_play_steps: Option<u8>,
    pub arp_play_start: Option<u8>,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            velocities: Vec::new(),
            gate: 0,
            cc1: None,
            cc2: None,
            probability: 100,
            condition: Condition::NONE,
            ratchet: Ratchet::default(),
            length: 1,
            param_spark: Condition::NONE,
            comp_spark: Condition::NONE,
            jump: None,
            offset: 0,
            arp_mode: None,
            arp_speed: None,
            arp_octave: None,
            arp_layer: ArpLayer::Layer,
            arp_play_steps: None,
            arp_play_start: None,
        }
    }
}

impl Step {
    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn velocities(&self) -> &[u8] {
        &self.velocities
    }

    /// Appends a chord note. Returns false when the note is already present
    /// or the step is full.
    pub fn add_note(&mut self, note: u8, velocity: u8) -> bool {
        if note > 127 || self.notes.contains(&note) || self.notes.len() >= MAX_NOTES_PER_STEP {
            return false;
        }
        self.notes.push(note);
        self.velocities.push(velocity.clamp(1, 127));
        true
    }

    pub fn remove_note(&mut self, note: u8) -> bool {
        match self.notes.iter().position(|&n| n == note) {
            Some(i) => {
                self.notes.remove(i);
                self.velocities.remove(i);
                true
            }
            None => false,
        }
    }

    /// Adds the note if absent, removes it otherwise.
    pub fn toggle_note(&mut self, note: u8, velocity: u8) -> bool {
        self.remove_note(note) || self.add_note(note, velocity)
    }

    /// Replaces the chord. Velocities missing at the end are filled with
    /// `fallback`, extra ones are dropped.
    pub fn set_chord(&mut self, notes: &[u8], velocities: &[u8], fallback: u8) {
        self.clear_notes();
        for (i, &note) in notes.iter().enumerate() {
            let vel = velocities.get(i).copied().unwrap_or(fallback);
            self.add_note(note, vel);
        }
    }

    pub fn set_velocity(&mut self, index: usize, velocity: u8) {
        if let Some(v) = self.velocities.get_mut(index) {
            *v = velocity.clamp(1, 127);
        }
    }

    pub fn clear_notes(&mut self) {
        self.notes.clear();
        self.velocities.clear();
    }

    pub fn set_offset(&mut self, ticks: i32) {
        self.offset = ticks.clamp(-(MAX_OFFSET as i32), MAX_OFFSET as i32) as i8;
    }

    pub fn prob_condition(&self) -> ProbCondition {
        ProbCondition {
            probability: self.probability,
            condition: self.condition,
        }
    }

    /// Applies one position of the probability/condition line; both fields
    /// always change together.
    pub fn set_unified_index(&mut self, index: i64) {
        let pc = ProbCondition::from_unified_index(index);
        self.probability = pc.probability;
        self.condition = pc.condition;
    }

    pub fn unified_index(&self) -> usize {
        self.prob_condition().unified_index()
    }

    /// Notes or controller locks, the things that make a song worth keeping.
    pub fn has_content(&self) -> bool {
        !self.notes.is_empty() || self.cc1.is_some() || self.cc2.is_some()
    }

    /// True when every field holds its default.
    pub fn is_empty(&self) -> bool {
        *self == Step::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    steps: Vec<Step>, // always NUM_STEPS long
    loop_start: u8,
    loop_end: u8, // inclusive
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            steps: vec![Step::default(); NUM_STEPS],
            loop_start: 0,
            loop_end: (NUM_STEPS - 1) as u8,
        }
    }
}

impl Pattern {
    /// Builds a pattern from any number of steps: short input is padded with
    /// empty steps, anything past `NUM_STEPS` is ignored.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        let mut pattern = Pattern::default();
        pattern.replace_steps(steps);
        pattern
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn step_mut(&mut self, index: usize) -> Option<&mut Step> {
        self.steps.get_mut(index)
    }

    pub fn steps_mut(&mut self) -> impl Iterator<Item = &mut Step> {
        self.steps.iter_mut()
    }

    pub fn replace_steps(&mut self, steps: Vec<Step>) {
        self.steps = steps;
        self.steps.truncate(NUM_STEPS);
        self.steps.resize_with(NUM_STEPS, Step::default);
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start as usize
    }

    pub fn loop_end(&self) -> usize {
        self.loop_end as usize
    }

    /// Sets the inclusive loop window. Out-of-order or out-of-range bounds
    /// are rejected and leave the window untouched.
    pub fn set_loop(&mut self, start: usize, end: usize) -> bool {
        if start > end || end >= NUM_STEPS {
            return false;
        }
        self.loop_start = start as u8;
        self.loop_end = end as u8;
        true
    }

    pub fn has_content(&self) -> bool {
        self.steps.iter().any(Step::has_content)
    }

    pub fn is_empty(&self) -> bool {
        *self == Pattern::default()
    }

    pub fn clear(&mut self) {
        *self = Pattern::default();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub patterns: [Pattern; NUM_PATTERNS],
    pub current_pattern: Option<u8>, // None = track off
    pub channel: u8,
    pub muted: bool,
    pub speed: Speed,
    pub swing: u8,
    pub track_length: u8,
    pub reset_length: u16, // 0 = never
    pub gate: u8,
    pub arp_mode: ArpMode,
    pub arp_speed: ArpSpeed,
    pub arp_octave: ArpOctave,
    pub arp_continuous: bool,
    pub arp_play_steps: u8, // bit pattern of arp sub-steps that sound
    pub arp_play_start: u8,
    pub cc1_default: u8,
    pub cc2_default: u8,
}

impl Track {
    pub fn new(channel: u8) -> Self {
        Self {
            patterns: std::array::from_fn(|_| Pattern::default()),
            current_pattern: Some(0),
            channel: channel.min(15),
            muted: false,
            speed: Speed::default(),
            swing: DEFAULT_SWING,
            track_length: DEFAULT_TRACK_LENGTH,
            reset_length: 0,
            gate: DEFAULT_GATE,
            arp_mode: ArpMode::Off,
            arp_speed: ArpSpeed::default(),
            arp_octave: ArpOctave::Zero,
            arp_continuous: false,
            arp_play_steps: 1,
            arp_play_start: 0,
            cc1_default: DEFAULT_CC,
            cc2_default: DEFAULT_CC,
        }
    }

    /// The pattern the engine plays; an "off" track still edits pattern 0,
    /// and so does an index past the pattern bank.
    pub fn playing_pattern_index(&self) -> usize {
        self.current_pattern
            .map(usize::from)
            .filter(|&p| p < NUM_PATTERNS)
            .unwrap_or(0)
    }

    pub fn playing_pattern(&self) -> &Pattern {
        &self.patterns[self.playing_pattern_index()]
    }

    pub fn playing_pattern_mut(&mut self) -> &mut Pattern {
        let index = self.playing_pattern_index();
        &mut self.patterns[index]
    }

    pub fn has_content(&self) -> bool {
        self.patterns.iter().any(Pattern::has_content)
    }
}

pub fn create_empty_tracks() -> [Track; NUM_TRACKS] {
    std::array::from_fn(|t| Track::new(default_channel(t)))
}

/// One `current_pattern` per track, recalled as a unit.
pub type PatternSnapshot = [Option<u8>; NUM_TRACKS];

/// Tracks 0-7 follow the chord, the drum tracks don't.
pub fn default_chord_follow() -> [bool; NUM_TRACKS] {
    std::array::from_fn(|t| t < 8)
}

/// A whole song ("set"), the unit that is saved to one file.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub tracks: [Track; NUM_TRACKS],
    bpm: u16,
    pub transpose_sequence: TransposeSequence,
    pub chord_follow: [bool; NUM_TRACKS],
    pub sequencer_type: u8,
    pub pattern_snapshots: BTreeMap<usize, PatternSnapshot>,
    pub active_pattern_snapshot: Option<usize>,
    pub master_reset: u16, // 0 = never
    pub color: Option<u8>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            tracks: create_empty_tracks(),
            bpm: DEFAULT_BPM,
            transpose_sequence: TransposeSequence::default(),
            chord_follow: default_chord_follow(),
            sequencer_type: 0,
            pattern_snapshots: BTreeMap::new(),
            active_pattern_snapshot: None,
            master_reset: 0,
            color: None,
        }
    }
}

impl Song {
    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: i64) {
        self.bpm = bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u16;
    }

    pub fn has_content(&self) -> bool {
        self.tracks.iter().any(Track::has_content)
    }

    pub fn save_snapshot(&mut self, slot: usize) -> bool {
        if slot >= NUM_SNAPSHOTS {
            return false;
        }
        let snapshot = std::array::from_fn(|t| self.tracks[t].current_pattern);
        self.pattern_snapshots.insert(slot, snapshot);
        self.active_pattern_snapshot = Some(slot);
        true
    }

    pub fn recall_snapshot(&mut self, slot: usize) -> bool {
        let Some(snapshot) = self.pattern_snapshots.get(&slot) else {
            return false;
        };
        for (track, current) in self.tracks.iter_mut().zip(snapshot.iter()) {
            track.current_pattern = *current;
        }
        self.active_pattern_snapshot = Some(slot);
        true
    }

    pub fn clear_snapshot(&mut self, slot: usize) -> bool {
        let removed = self.pattern_snapshots.remove(&slot).is_some();
        if removed && self.active_pattern_snapshot == Some(slot) {
            self.active_pattern_snapshot = None;
        }
        removed
    }

    /// Copies a pattern between any two track/pattern slots.
    pub fn copy_pattern(&mut self, from: (usize, usize), to: (usize, usize)) -> bool {
        let Some(src) = self.tracks.get(from.0).and_then(|t| t.patterns.get(from.1)) else {
            return false;
        };
        let copy = src.clone();
        match self.tracks.get_mut(to.0).and_then(|t| t.patterns.get_mut(to.1)) {
            Some(dst) => {
                *dst = copy;
                true
            }
            None => false,
        }
    }
}
