// Algorithmic pattern generator. Picks which slots sound from the style, then
// picks notes from the scale around a per-style "center" and velocities from
// a per-style curve. Randomness comes from the caller's rng so tests can seed it.

pub mod euclid;
pub mod scale;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::pipeline::{Step, Track};
use crate::shared::{NUM_PATTERNS, NUM_STEPS};

pub use scale::{detect_scale, DetectedScale, GeneratorScale, SCALES};

const BASE_VELOCITY: f64 = 90.0;
const FALLBACK_NOTE: u8 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GenerateStyle {
    #[default]
    Random,
    Euclidean,
    Rising,
    Falling,
    Arc,
    Pulse,
    Offbeat,
    Clustered,
}

impl GenerateStyle {
    pub const ALL: [GenerateStyle; 8] = [
        GenerateStyle::Random,
        GenerateStyle::Euclidean,
        GenerateStyle::Rising,
        GenerateStyle::Falling,
        GenerateStyle::Arc,
        GenerateStyle::Pulse,
        GenerateStyle::Offbeat,
        GenerateStyle::Clustered,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            GenerateStyle::Random => "Random",
            GenerateStyle::Euclidean => "Euclidean",
            GenerateStyle::Rising => "Rising",
            GenerateStyle::Falling => "Falling",
            GenerateStyle::Arc => "Arc",
            GenerateStyle::Pulse => "Pulse",
            GenerateStyle::Offbeat => "Offbeat",
            GenerateStyle::Clustered => "Clustered",
        }
    }
}

/// The eight generator knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerateParams {
    pub length: u8,  // 1-64 steps
    pub density: u8, // 5-100 %
    pub voices: u8,  // 1-7 notes per step
    pub scale: GeneratorScale,
    pub root: u8,   // 0 = auto, 1-12 = C..B
    pub octave: u8, // 1-6
    pub range: u8,  // 1-4 octaves
    pub variation: u8, // 0-127, meaning depends on style
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            length: 16,
            density: 50,
            voices: 1,
            scale: GeneratorScale::Detected,
            root: 0,
            octave: 3,
            range: 2,
            variation: 64,
        }
    }
}

impl GenerateParams {
    pub fn clamped(self) -> Self {
        Self {
            length: self.length.clamp(1, NUM_STEPS as u8),
            density: self.density.clamp(5, 100),
            voices: self.voices.clamp(1, 7),
            scale: GeneratorScale::from_index(self.scale.index()).unwrap_or_default(),
            root: self.root.min(12),
            octave: self.octave.clamp(1, 6),
            range: self.range.clamp(1, 4),
            variation: self.variation.min(127),
        }
    }

    /// One detent on knob `knob` (0-7). Scale and root wrap, the rest clamp.
    pub fn nudge(&mut self, knob: usize, delta: i32) {
        let step = |v: u8, by: i32, lo: i32, hi: i32| (v as i32 + by).clamp(lo, hi) as u8;
        let wrap = |v: usize, n: usize| (v as i32 + delta).rem_euclid(n as i32) as usize;
        match knob {
            0 => self.length = step(self.length, delta, 1, NUM_STEPS as i32),
            1 => self.density = step(self.density, delta * 5, 5, 100),
            2 => self.voices = step(self.voices, delta, 1, 7),
            3 => {
                self.scale = GeneratorScale::from_index(wrap(self.scale.index(), GeneratorScale::COUNT))
                    .unwrap_or_default()
            }
            4 => self.root = wrap(self.root as usize, 13) as u8,
            5 => self.octave = step(self.octave, delta, 1, 6),
            6 => self.range = step(self.range, delta, 1, 4),
            7 => self.variation = step(self.variation, delta * 4, 0, 127),
            _ => {}
        }
    }

    /// Root pitch class: explicit 1-12, else the detected root, else C.
    pub fn resolve_root(&self, hint: Option<&DetectedScale>) -> u8 {
        match self.root {
            0 => hint.map_or(0, |h| h.root),
            r => (r - 1).min(11),
        }
    }
}

/// Number of sounding slots, never zero.
pub fn num_notes(length: usize, density: u8) -> usize {
    ((density as f64 / 100.0) * length as f64).round().max(1.0) as usize
}

fn ranked(length: usize, count: usize, priority: impl Fn(usize) -> u8) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..length).collect();
    slots.sort_by_key(|&i| (priority(i), i));
    slots.truncate(count);
    slots.sort_unstable();
    slots
}

/// Which of the first `length` slots get notes, ascending.
pub fn active_steps<R: Rng>(
    length: usize,
    density: u8,
    style: GenerateStyle,
    variation: u8,
    rng: &mut R,
) -> Vec<usize> {
    let count = num_notes(length, density);
    let variation = variation as f64 / 127.0;
    match style {
        GenerateStyle::Euclidean => {
            let mut pattern = euclid::euclidean(count, length);
            euclid::rotate(&mut pattern, (variation * length as f64).floor() as isize);
            pattern
                .iter()
                .enumerate()
                .filter_map(|(i, hit)| hit.then_some(i))
                .collect()
        }
        GenerateStyle::Pulse => ranked(length, count, |i| match i {
            i if i % 4 == 0 => 0,
            i if i % 2 == 0 => 1,
            _ => 2,
        }),
        GenerateStyle::Offbeat => ranked(length, count, |i| match i {
            i if i % 2 == 1 => 0,
            i if i % 4 == 2 => 1,
            _ => 2,
        }),
        GenerateStyle::Clustered => {
            let max_cluster = 2 + (variation * 6.0).round() as usize;
            let mut steps = Vec::with_capacity(count);
            let mut position = 0;
            while steps.len() < count && position < length {
                let cluster = rng.random_range(2..=max_cluster).min(count - steps.len());
                for _ in 0..cluster {
                    if position >= length {
                        break;
                    }
                    steps.push(position);
                    position += 1;
                }
                position += rng.random_range(2..=6);
            }
            steps
        }
        GenerateStyle::Random | GenerateStyle::Rising | GenerateStyle::Falling | GenerateStyle::Arc => {
            let mut all: Vec<usize> = (0..length).collect();
            all.shuffle(rng);
            all.truncate(count);
            all.sort_unstable();
            all
        }
    }
}

/// Notes from `octave` up through `range` octaves that sit in the scale.
pub fn valid_notes(intervals: &[u8], root: u8, octave: u8, range: u8) -> Vec<u8> {
    let low = (octave as u32 + 1) * 12 + root as u32;
    let high = (low + range as u32 * 12 - 1).min(127);
    (low..=high)
        .filter(|midi| intervals.contains(&(((midi - root as u32) % 12) as u8)))
        .map(|midi| midi as u8)
        .collect()
}

/// Up to `count` distinct notes near `center`, each pick jittered a little
/// and walked outward (up first) to the nearest unused index. Sorted.
fn select_notes_near<R: Rng>(valid: &[u8], center: usize, count: usize, rng: &mut R) -> Vec<u8> {
    if valid.is_empty() {
        return Vec::new();
    }
    let last = valid.len() as i64 - 1;
    let center = (center as i64).clamp(0, last);
    let mut used = vec![false; valid.len()];
    let mut notes = Vec::with_capacity(count);
    for _ in 0..count {
        if notes.len() >= valid.len() {
            break;
        }
        let jitter = ((rng.random::<f64>() - 0.5) * 8.0).floor() as i64;
        let idx = (center + jitter).clamp(0, last);
        for offset in 0..valid.len() as i64 {
            let up = idx + offset;
            let down = idx - offset;
            if up <= last && !used[up as usize] {
                used[up as usize] = true;
                notes.push(valid[up as usize]);
                break;
            }
            if down >= 0 && !used[down as usize] {
                used[down as usize] = true;
                notes.push(valid[down as usize]);
                break;
            }
        }
    }
    notes.sort_unstable();
    notes
}

fn position(step: usize, length: usize) -> f64 {
    step as f64 / length.saturating_sub(1).max(1) as f64
}

fn notes_for_step<R: Rng>(
    step: usize,
    length: usize,
    voices: usize,
    valid: &[u8],
    style: GenerateStyle,
    variation: u8,
    rng: &mut R,
) -> Vec<u8> {
    if valid.is_empty() {
        return vec![FALLBACK_NOTE];
    }
    let pos = position(step, length);
    let span = (valid.len() - 1) as f64;
    let v = variation as f64 / 127.0;
    let center = match style {
        GenerateStyle::Rising => (pos.powf(1.0 + v * 2.0) * span).floor() as usize,
        GenerateStyle::Falling => ((1.0 - pos).powf(1.0 + v * 2.0) * span).floor() as usize,
        GenerateStyle::Arc => {
            let arc = if pos <= v {
                if v > 0.0 { pos / v } else { 0.0 }
            } else if v < 1.0 {
                1.0 - (pos - v) / (1.0 - v)
            } else {
                1.0
            };
            (arc * span).floor() as usize
        }
        GenerateStyle::Pulse if step % 4 == 0 => 0,
        _ => rng.random_range(0..valid.len()),
    };
    select_notes_near(valid, center, voices, rng)
}

fn velocities_for<R: Rng>(
    count: usize,
    step: usize,
    length: usize,
    style: GenerateStyle,
    variation: u8,
    rng: &mut R,
) -> Vec<u8> {
    (0..count)
        .map(|_| {
            let mut vel = match style {
                GenerateStyle::Pulse => {
                    let accent = variation as f64 / 127.0 * 30.0;
                    if step % 4 == 0 {
                        BASE_VELOCITY + accent
                    } else {
                        BASE_VELOCITY - accent / 2.0
                    }
                }
                GenerateStyle::Rising => 60.0 + position(step, length) * 60.0,
                GenerateStyle::Falling => 120.0 - position(step, length) * 60.0,
                _ => BASE_VELOCITY + (rng.random::<f64>() - 0.5) * 25.0,
            };
            vel += (rng.random::<f64>() - 0.5) * 10.0; // humanize
            vel.round().clamp(1.0, 127.0) as u8
        })
        .collect()
}

/// A full `NUM_STEPS` step array; slots at or past `length` stay empty.
pub fn generate_pattern<R: Rng>(
    params: &GenerateParams,
    style: GenerateStyle,
    hint: Option<&DetectedScale>,
    rng: &mut R,
) -> Vec<Step> {
    let p = params.clamped();
    let length = p.length as usize;
    let root = p.resolve_root(hint);
    let valid = valid_notes(p.scale.intervals(hint), root, p.octave, p.range);
    let active = active_steps(length, p.density, style, p.variation, rng);

    let mut steps = vec![Step::default(); NUM_STEPS];
    for &s in active.iter().filter(|&&s| s < length) {
        let notes = notes_for_step(s, length, p.voices as usize, &valid, style, p.variation, rng);
        let vels = velocities_for(notes.len(), s, length, style, p.variation, rng);
        steps[s].set_chord(&notes, &vels, BASE_VELOCITY as u8);
    }
    steps
}

/// Where a generate press lands: the pattern generated last time this
/// session, else the current pattern if empty, else the next empty pattern
/// (wrapping), else the one after the current.
pub fn choose_generate_target(track: &Track, last_generated: Option<usize>) -> usize {
    if let Some(p) = last_generated.filter(|p| *p < NUM_PATTERNS) {
        return p;
    }
    let current = track.playing_pattern_index();
    if !track.patterns[current].has_content() {
        return current;
    }
    (1..NUM_PATTERNS)
        .map(|o| (current + o) % NUM_PATTERNS)
        .find(|&i| !track.patterns[i].has_content())
        .unwrap_or((current + 1) % NUM_PATTERNS)
}

/// Remembers the audition target between presses until the user leaves
/// generate mode. The target belongs to one track; pressing generate on
/// another track starts over.
#[derive(Clone, Debug, Default)]
pub struct GenerateSession {
    last_target: Option<(usize, usize)>, // (track, pattern)
}

impl GenerateSession {
    pub fn last_target(&self) -> Option<(usize, usize)> {
        self.last_target
    }

    pub fn end(&mut self) {
        self.last_target = None;
    }

    /// Generates into the chosen pattern of track `track_index`, switches
    /// the track to it and sets the track length. Returns the target
    /// pattern index.
    pub fn generate_into<R: Rng>(
        &mut self,
        track_index: usize,
        track: &mut Track,
        params: &GenerateParams,
        style: GenerateStyle,
        hint: Option<&DetectedScale>,
        rng: &mut R,
    ) -> usize {
        let previous = self
            .last_target
            .and_then(|(t, p)| (t == track_index).then_some(p));
        let target = choose_generate_target(track, previous);
        self.last_target = Some((track_index, target));
        let steps = generate_pattern(params, style, hint, rng);
        track.patterns[target].replace_steps(steps);
        track.track_length = params.clamped().length;
        track.current_pattern = Some(target as u8);
        log::debug!("generated {} into track {track_index} pattern {target}", style.name());
        target
    }
}
