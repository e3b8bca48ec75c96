// Global transpose sequence: up to 16 steps, each holding a semitone offset
// for a number of beats. The sequence loops.

use crate::shared::MAX_TRANSPOSE_STEPS;
use crate::trigger::Condition;

pub const DEFAULT_DURATION: u8 = 4; // one bar
pub const MIN_DURATION: u8 = 1;
pub const MAX_DURATION: u8 = 64;
pub const MIN_TRANSPOSE: i8 = -24;
pub const MAX_TRANSPOSE: i8 = 24;
const BEAT_GRANULARITY_MAX: u8 = 20; // 5 bars, above this durations move in bars

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransposeStep {
    pub transpose: i8,
    pub duration: u8, // beats
    pub jump: Option<u8>,
    pub condition: Condition,
}

impl Default for TransposeStep {
    fn default() -> Self {
        Self::new(0, DEFAULT_DURATION as i64)
    }
}

impl TransposeStep {
    pub fn new(transpose: i64, duration: i64) -> Self {
        Self {
            transpose: clamp_transpose(transpose),
            duration: clamp_duration(duration),
            jump: None,
            condition: Condition::NONE,
        }
    }
}

pub fn clamp_transpose(transpose: i64) -> i8 {
    transpose.clamp(MIN_TRANSPOSE as i64, MAX_TRANSPOSE as i64) as i8
}

pub fn clamp_duration(duration: i64) -> u8 {
    duration.clamp(MIN_DURATION as i64, MAX_DURATION as i64) as u8
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransposeSequence {
    steps: Vec<TransposeStep>,
}

impl TransposeSequence {
    /// Keeps the first `MAX_TRANSPOSE_STEPS` steps.
    pub fn from_steps(mut steps: Vec<TransposeStep>) -> Self {
        steps.truncate(MAX_TRANSPOSE_STEPS);
        Self { steps }
    }

    pub fn steps(&self) -> &[TransposeStep] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&TransposeStep> {
        self.steps.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TransposeStep> {
        self.steps.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Updates an existing step, or appends one when `index` is the next free
    /// slot. `duration` of None keeps the existing duration.
    pub fn set_step(&mut self, index: usize, transpose: i64, duration: Option<i64>) -> bool {
        if index >= MAX_TRANSPOSE_STEPS || index > self.steps.len() {
            return false;
        }
        if let Some(step) = self.steps.get_mut(index) {
            step.transpose = clamp_transpose(transpose);
            if let Some(d) = duration {
                step.duration = clamp_duration(d);
            }
        } else {
            let d = duration.unwrap_or(DEFAULT_DURATION as i64);
            self.steps.push(TransposeStep::new(transpose, d));
        }
        true
    }

    pub fn set_duration(&mut self, index: usize, duration: i64) -> bool {
        match self.steps.get_mut(index) {
            Some(step) => {
                step.duration = clamp_duration(duration);
                true
            }
            None => false,
        }
    }

    /// Beat steps up to five bars, bar steps above; coming down from the bar
    /// range snaps back onto five bars.
    pub fn adjust_duration(&mut self, index: usize, delta: i32) -> Option<u8> {
        let step = self.steps.get_mut(index)?;
        let mut d = step.duration as i64;
        if delta > 0 {
            d += if d < BEAT_GRANULARITY_MAX as i64 { 1 } else { 4 };
        } else if delta < 0 {
            if d <= BEAT_GRANULARITY_MAX as i64 {
                d -= 1;
            } else {
                d = (d - 4).max(BEAT_GRANULARITY_MAX as i64);
            }
        }
        step.duration = clamp_duration(d);
        Some(step.duration)
    }

    /// Removes a step and shifts the rest down. Jumps that pointed past the
    /// removed step follow it, jumps onto it are cleared.
    pub fn remove_step(&mut self, index: usize) -> bool {
        if index >= self.steps.len() {
            return false;
        }
        self.steps.remove(index);
        for step in &mut self.steps {
            step.jump = match step.jump {
                Some(j) if j as usize == index => None,
                Some(j) if j as usize > index => Some(j - 1),
                other => other,
            };
        }
        true
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn total_duration(&self) -> u32 {
        self.steps.iter().map(|s| s.duration as u32).sum()
    }

    /// Index of the step sounding at `beat`, looping over the sequence.
    pub fn step_index_at_beat(&self, beat: u32) -> Option<usize> {
        let total = self.total_duration();
        if total == 0 {
            return None;
        }
        let looped = beat % total;
        let mut acc = 0;
        for (i, step) in self.steps.iter().enumerate() {
            acc += step.duration as u32;
            if looped < acc {
                return Some(i);
            }
        }
        None
    }

    pub fn transpose_at_beat(&self, beat: u32) -> i8 {
        self.step_index_at_beat(beat)
            .map_or(0, |i| self.steps[i].transpose)
    }
}

pub fn format_duration(beats: u8) -> String {
    let plural = |n: u8, word: &str| format!("{n} {word}{}", if n == 1 { "" } else { "s" });
    if beats < 4 {
        plural(beats, "beat")
    } else if beats % 4 == 0 {
        plural(beats / 4, "bar")
    } else {
        format!("{} {}", plural(beats / 4, "bar"), plural(beats % 4, "beat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_step_appends_and_clamps() {
        let mut seq = TransposeSequence::default();
        assert!(seq.set_step(0, 5, None));
        assert!(seq.set_step(1, -40, Some(100)));
        assert!(!seq.set_step(5, 0, None));
        assert_eq!(seq.steps()[1].transpose, MIN_TRANSPOSE);
        assert_eq!(seq.steps()[1].duration, MAX_DURATION);

        assert!(seq.set_step(0, 7, None));
        assert_eq!(seq.steps()[0], TransposeStep::new(7, 4));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut seq = TransposeSequence::default();
        for i in 0..MAX_TRANSPOSE_STEPS {
            assert!(seq.set_step(i, 0, None));
        }
        assert!(!seq.set_step(MAX_TRANSPOSE_STEPS, 0, None));
    }

    #[test]
    fn beat_lookup_loops() {
        let mut seq = TransposeSequence::default();
        seq.set_step(0, 0, Some(4));
        seq.set_step(1, 5, Some(2));
        assert_eq!(seq.total_duration(), 6);
        assert_eq!(seq.transpose_at_beat(3), 0);
        assert_eq!(seq.transpose_at_beat(4), 5);
        assert_eq!(seq.transpose_at_beat(6), 0);
        assert_eq!(seq.step_index_at_beat(11), Some(1));
        assert_eq!(TransposeSequence::default().transpose_at_beat(3), 0);
    }

    #[test]
    fn duration_granularity() {
        let mut seq = TransposeSequence::default();
        seq.set_step(0, 0, Some(19));
        assert_eq!(seq.adjust_duration(0, 1), Some(20));
        assert_eq!(seq.adjust_duration(0, 1), Some(24));
        assert_eq!(seq.adjust_duration(0, -1), Some(20));
        assert_eq!(seq.adjust_duration(0, -1), Some(19));
        seq.set_duration(0, 22);
        assert_eq!(seq.adjust_duration(0, -1), Some(20));
        seq.set_duration(0, 64);
        assert_eq!(seq.adjust_duration(0, 1), Some(64));
    }

    #[test]
    fn remove_step_rewires_jumps() {
        let mut seq = TransposeSequence::default();
        for i in 0..4 {
            seq.set_step(i, i as i64, None);
        }
        seq.get_mut(0).unwrap().jump = Some(3);
        seq.get_mut(3).unwrap().jump = Some(1);
        assert!(seq.remove_step(1));
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.steps()[0].jump, Some(2));
        assert_eq!(seq.steps()[2].jump, None);
    }

    #[test]
    fn duration_labels() {
        assert_eq!(format_duration(1), "1 beat");
        assert_eq!(format_duration(8), "2 bars");
        assert_eq!(format_duration(6), "1 bar 2 beats");
    }
}
