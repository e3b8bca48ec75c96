// Scale templates and detection from the notes already in a song.

use std::collections::BTreeSet;

use crate::pipeline::Song;
use crate::shared::pitch_class_name;

pub struct ScaleTemplate {
    pub name: &'static str,
    pub short: &'static str,
    pub intervals: &'static [u8],
}

/// Ordered simplest first; detection prefers earlier entries on a tie.
pub const SCALES: [ScaleTemplate; 15] = [
    ScaleTemplate { name: "Minor Penta", short: "mPn", intervals: &[0, 3, 5, 7, 10] },
    ScaleTemplate { name: "Major Penta", short: "MPn", intervals: &[0, 2, 4, 7, 9] },
    ScaleTemplate { name: "Blues", short: "Blu", intervals: &[0, 3, 5, 6, 7, 10] },
    ScaleTemplate { name: "Whole Tone", short: "WhT", intervals: &[0, 2, 4, 6, 8, 10] },
    ScaleTemplate { name: "Major", short: "Maj", intervals: &[0, 2, 4, 5, 7, 9, 11] },
    ScaleTemplate { name: "Natural Minor", short: "Min", intervals: &[0, 2, 3, 5, 7, 8, 10] },
    ScaleTemplate { name: "Dorian", short: "Dor", intervals: &[0, 2, 3, 5, 7, 9, 10] },
    ScaleTemplate { name: "Mixolydian", short: "Mix", intervals: &[0, 2, 4, 5, 7, 9, 10] },
    ScaleTemplate { name: "Phrygian", short: "Phr", intervals: &[0, 1, 3, 5, 7, 8, 10] },
    ScaleTemplate { name: "Lydian", short: "Lyd", intervals: &[0, 2, 4, 6, 7, 9, 11] },
    ScaleTemplate { name: "Locrian", short: "Loc", intervals: &[0, 1, 3, 5, 6, 8, 10] },
    ScaleTemplate { name: "Harmonic Minor", short: "HMn", intervals: &[0, 2, 3, 5, 7, 8, 11] },
    ScaleTemplate { name: "Melodic Minor", short: "MMn", intervals: &[0, 2, 3, 5, 7, 9, 11] },
    ScaleTemplate { name: "Diminished HW", short: "DHW", intervals: &[0, 1, 3, 4, 6, 7, 9, 10] },
    ScaleTemplate { name: "Diminished WH", short: "DWH", intervals: &[0, 2, 3, 5, 6, 8, 9, 11] },
];

const CHROMATIC: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Scale choice for the generator: the detected scale, chromatic, or one of
/// the fixed templates. Index order is what the host stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GeneratorScale {
    #[default]
    Detected,
    Chromatic,
    Template(usize), // index into SCALES
}

impl GeneratorScale {
    pub const COUNT: usize = SCALES.len() + 2;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(GeneratorScale::Detected),
            1 => Some(GeneratorScale::Chromatic),
            i if i < Self::COUNT => Some(GeneratorScale::Template(i - 2)),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            GeneratorScale::Detected => 0,
            GeneratorScale::Chromatic => 1,
            GeneratorScale::Template(i) => i + 2,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            GeneratorScale::Detected => "Det",
            GeneratorScale::Chromatic => "Chr",
            GeneratorScale::Template(i) => SCALES.get(i).map_or("?", |s| s.short),
        }
    }

    /// Intervals above the root. `Detected` resolves through the hint and
    /// falls back to chromatic when there is none.
    pub fn intervals(self, hint: Option<&DetectedScale>) -> &'static [u8] {
        match self {
            GeneratorScale::Detected => hint.map_or(CHROMATIC, |h| h.intervals()),
            GeneratorScale::Chromatic => CHROMATIC,
            GeneratorScale::Template(i) => SCALES.get(i).map_or(CHROMATIC, |s| s.intervals),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectedScale {
    pub root: u8, // pitch class
    pub template: usize, // index into SCALES
}

impl DetectedScale {
    pub fn intervals(&self) -> &'static [u8] {
        SCALES.get(self.template).map_or(CHROMATIC, |s| s.intervals)
    }

    pub fn scale_name(&self) -> &'static str {
        SCALES.get(self.template).map_or("Chromatic", |s| s.name)
    }

    /// e.g. "A Minor Penta"
    pub fn display_name(&self) -> String {
        format!("{} {}", pitch_class_name(self.root), self.scale_name())
    }

    pub fn contains(&self, pitch_class: u8) -> bool {
        let rel = (pitch_class % 12 + 12 - self.root) % 12;
        self.intervals().contains(&rel)
    }

    /// Parses the host's `detected_scale_root` / `detected_scale_name` pair.
    pub fn from_host(root: &str, name: &str) -> Option<Self> {
        let root: u8 = root.trim().parse().ok().filter(|r| *r < 12)?;
        let template = SCALES.iter().position(|s| s.name == name.trim())?;
        Some(DetectedScale { root, template })
    }
}

/// Pitch classes used anywhere in the chord-follow tracks, all patterns.
pub fn collect_pitch_classes(song: &Song) -> BTreeSet<u8> {
    song.tracks
        .iter()
        .zip(song.chord_follow.iter())
        .filter(|(_, follows)| **follows)
        .flat_map(|(track, _)| track.patterns.iter())
        .flat_map(|pattern| pattern.steps().iter())
        .flat_map(|step| step.notes().iter().map(|n| n % 12))
        .collect()
}

// In-scale ratio plus a small bonus for smaller scales.
fn score(pitch_classes: &BTreeSet<u8>, candidate: &DetectedScale) -> f64 {
    let size = candidate.intervals().len() as f64;
    let fit = pitch_classes.iter().filter(|pc| candidate.contains(**pc)).count() as f64
        / pitch_classes.len() as f64;
    fit + 0.1 / size
}

/// Best root x template for the song's chord-follow notes, None when there
/// are no notes. Ties go to the lower root, then the earlier template.
pub fn detect_scale(song: &Song) -> Option<DetectedScale> {
    let pitch_classes = collect_pitch_classes(song);
    if pitch_classes.is_empty() {
        return None;
    }
    let mut best: Option<(f64, DetectedScale)> = None;
    for root in 0..12u8 {
        for template in 0..SCALES.len() {
            let candidate = DetectedScale { root, template };
            let s = score(&pitch_classes, &candidate);
            if best.is_none_or(|(b, _)| s > b) {
                best = Some((s, candidate));
            }
        }
    }
    best.map(|(_, scale)| scale)
}
