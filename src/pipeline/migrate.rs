// Reads every song shape that has ever been written to disk and returns the
// current typed model:
//
//   - a bare array of tracks (the very first format)
//   - `{ tracks: [...], bpm, transposeSequence, ... }` with long field names
//   - v2 sparse `{ v: 2, t: { "3": { p: { "0": { s: { "5": {...} } } } } } }`
//
// Reading is additive only. Missing fields get defaults, short arrays grow to
// the fixed sizes, and a field with the wrong type or an out-of-range value is
// treated as missing. Nothing here returns an error.

use serde_json::{Map, Value};

use crate::shared::{
    default_channel, ArpLayer, ArpMode, ArpOctave, ArpSpeed, Speed, DEFAULT_BPM, DEFAULT_VELOCITY,
    MAX_OFFSET, MAX_RESET_LENGTH, MAX_STEP_LENGTH, NUM_PATTERNS, NUM_SNAPSHOTS, NUM_STEPS,
    NUM_TRACKS,
};
use crate::trigger::{Condition, Ratchet};

use super::project::{
    create_empty_tracks, default_chord_follow, Pattern, PatternSnapshot, Song, Step, Track,
};
use super::transpose::{TransposeSequence, TransposeStep, DEFAULT_DURATION};

pub const SCHEMA_VERSION: i64 = 2;

type Obj = Map<String, Value>;

// First key that holds a number wins; callers list long names before short
// ones because the long form overrode the short one in mixed files.
fn int(obj: &Obj, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| {
        let v = obj.get(*k)?;
        v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64))
    })
}

fn int_in(obj: &Obj, keys: &[&str], lo: i64, hi: i64) -> Option<i64> {
    int(obj, keys).filter(|v| (lo..=hi).contains(v))
}

fn flag(obj: &Obj, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    })
}

// `-1` (or anything negative) is the "inherit/unset" sentinel for optional fields.
fn optional<T>(obj: &Obj, keys: &[&str], resolve: impl Fn(i64) -> Option<T>) -> Option<T> {
    int(obj, keys).filter(|v| *v >= 0).and_then(resolve)
}

// Sparse containers are JSON objects keyed by decimal index, legacy ones are arrays.
fn indexed(value: &Value, limit: usize) -> Vec<(usize, &Value)> {
    match value {
        Value::Array(items) => items.iter().enumerate().take(limit).collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().filter(|i| *i < limit).map(|i| (i, v)))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn step_from_value(value: &Value) -> Step {
    let mut step = Step::default();
    let Some(obj) = value.as_object() else {
        return step;
    };

    let notes: Vec<u8> = ["notes", "n"]
        .iter()
        .find_map(|k| obj.get(*k)?.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_i64)
                .filter(|n| (0..=127).contains(n))
                .map(|n| n as u8)
                .collect()
        })
        .unwrap_or_default();

    // Old steps kept one scalar velocity for the whole chord.
    let scalar = int_in(obj, &["velocity"], 1, 127)
        .map(|v| v as u8)
        .unwrap_or(DEFAULT_VELOCITY);
    let velocities: Vec<u8> = ["velocities", "v"]
        .iter()
        .find_map(|k| obj.get(*k)?.as_array())
        .map(|arr| {
            arr.iter()
                .map(|v| v.as_i64().map_or(scalar, |v| v.clamp(1, 127) as u8))
                .collect()
        })
        .unwrap_or_default();
    step.set_chord(&notes, &velocities, scalar);

    if let Some(v) = int_in(obj, &["gate", "gt"], 0, 100) {
        step.gate = v as u8;
    }
    step.cc1 = optional(obj, &["cc1", "c1"], |v| Some(v.min(127) as u8));
    step.cc2 = optional(obj, &["cc2", "c2"], |v| Some(v.min(127) as u8));
    if let Some(v) = int(obj, &["probability", "pr"]) {
        step.probability = v.clamp(1, 100) as u8;
    }
    if let Some(v) = int(obj, &["condition", "co"]) {
        step.condition = Condition::from_index(v).unwrap_or_default();
    }
    if let Some(v) = int(obj, &["ratchet", "ra"]) {
        step.ratchet = Ratchet::from_index(v).unwrap_or_default();
    }
    if let Some(v) = int(obj, &["length", "le"]) {
        step.length = v.clamp(1, MAX_STEP_LENGTH as i64) as u8;
    }
    if let Some(v) = int(obj, &["paramSpark", "ps"]) {
        step.param_spark = Condition::from_index(v).unwrap_or_default();
    }
    if let Some(v) = int(obj, &["compSpark", "cs"]) {
        step.comp_spark = Condition::from_index(v).unwrap_or_default();
    }
    step.jump = optional(obj, &["jump", "ju"], |v| {
        (v < NUM_STEPS as i64).then_some(v as u8)
    });
    if let Some(v) = int(obj, &["offset", "of"]) {
        step.offset = v.clamp(-(MAX_OFFSET as i64), MAX_OFFSET as i64) as i8;
    }
    step.arp_mode = optional(obj, &["arpMode", "am"], |v| ArpMode::from_index(v as usize));
    step.arp_speed = optional(obj, &["arpSpeed", "as"], |v| ArpSpeed::from_index(v as usize));
    step.arp_octave = optional(obj, &["arpOctave", "ao"], |v| ArpOctave::from_index(v as usize));
    if let Some(layer) = optional(obj, &["arpLayer", "al"], |v| ArpLayer::from_index(v as usize)) {
        step.arp_layer = layer;
    }
    step.arp_play_steps = optional(obj, &["arpPlaySteps", "ap"], |v| {
        (1..=255).contains(&v).then_some(v as u8)
    });
    step.arp_play_start = optional(obj, &["arpPlayStart", "at"], |v| {
        (v <= 7).then_some(v as u8)
    });
    step
}

pub fn pattern_from_value(value: &Value) -> Pattern {
    let mut pattern = Pattern::default();
    let Some(obj) = value.as_object() else {
        return pattern;
    };
    let steps = obj.get("steps").or_else(|| obj.get("s"));
    if let Some(steps) = steps {
        for (i, raw) in indexed(steps, NUM_STEPS) {
            if let Some(slot) = pattern.step_mut(i) {
                *slot = step_from_value(raw);
            }
        }
    }
    let start = int(obj, &["loopStart", "ls"]).unwrap_or(0);
    let end = int(obj, &["loopEnd", "le"]).unwrap_or(NUM_STEPS as i64 - 1);
    if start >= 0 && end >= 0 {
        pattern.set_loop(start as usize, end as usize);
    }
    pattern
}

pub fn track_from_value(value: &Value, index: usize) -> Track {
    let mut track = Track::new(default_channel(index));
    let Some(obj) = value.as_object() else {
        return track;
    };

    if let Some(v) = int(obj, &["currentPattern", "cp"]) {
        track.current_pattern = match v {
            v if v < 0 => None,
            v if v < NUM_PATTERNS as i64 => Some(v as u8),
            _ => Some(0),
        };
    }
    if let Some(v) = int_in(obj, &["channel", "ch"], 0, 15) {
        track.channel = v as u8;
    }
    if let Some(v) = flag(obj, &["muted", "mu"]) {
        track.muted = v;
    }
    if let Some(speed) = optional(obj, &["speedIndex", "sp"], |v| Speed::from_index(v as usize)) {
        track.speed = speed;
    }
    if let Some(v) = int_in(obj, &["swing", "sw"], 0, 100) {
        track.swing = v as u8;
    }
    if let Some(v) = int_in(obj, &["trackLength", "tl"], 1, NUM_STEPS as i64) {
        track.track_length = v as u8;
    }
    if let Some(v) = int_in(obj, &["resetLength", "rl"], 0, MAX_RESET_LENGTH as i64) {
        track.reset_length = v as u16;
    }
    if let Some(v) = int_in(obj, &["gate", "ga"], 1, 100) {
        track.gate = v as u8;
    }
    if let Some(m) = optional(obj, &["arpMode", "am"], |v| ArpMode::from_index(v as usize)) {
        track.arp_mode = m;
    }
    if let Some(s) = optional(obj, &["arpSpeed", "as"], |v| ArpSpeed::from_index(v as usize)) {
        track.arp_speed = s;
    }
    if let Some(o) = optional(obj, &["arpOctave", "ao"], |v| ArpOctave::from_index(v as usize)) {
        track.arp_octave = o;
    }
    if let Some(v) = flag(obj, &["arpContinuous", "ac"]) {
        track.arp_continuous = v;
    }
    if let Some(v) = int_in(obj, &["arpPlaySteps", "ap"], 1, 255) {
        track.arp_play_steps = v as u8;
    }
    if let Some(v) = int_in(obj, &["arpPlayStart", "at"], 0, 7) {
        track.arp_play_start = v as u8;
    }
    if let Some(v) = int_in(obj, &["cc1Default", "c1"], 0, 127) {
        track.cc1_default = v as u8;
    }
    if let Some(v) = int_in(obj, &["cc2Default", "c2"], 0, 127) {
        track.cc2_default = v as u8;
    }

    if let Some(patterns) = obj.get("patterns").or_else(|| obj.get("p")) {
        for (i, raw) in indexed(patterns, NUM_PATTERNS) {
            track.patterns[i] = pattern_from_value(raw);
        }
    }
    track
}

/// Any tracks container (legacy array or sparse object) to exactly
/// `NUM_TRACKS` tracks. Missing tracks are fresh empty ones.
pub fn migrate_track_data(value: &Value) -> [Track; NUM_TRACKS] {
    let mut tracks = create_empty_tracks();
    for (i, raw) in indexed(value, NUM_TRACKS) {
        tracks[i] = track_from_value(raw, i);
    }
    tracks
}

/// Backfills `jump`/`condition` on old transpose steps and drops null holes.
pub fn migrate_transpose_sequence(value: &Value) -> TransposeSequence {
    let steps = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|obj| {
                    let mut step = TransposeStep::new(
                        int(obj, &["transpose"]).unwrap_or(0),
                        int(obj, &["duration"]).unwrap_or(DEFAULT_DURATION as i64),
                    );
                    step.jump = optional(obj, &["jump"], |v| u8::try_from(v).ok());
                    if let Some(c) = int(obj, &["condition"]) {
                        step.condition = Condition::from_index(c).unwrap_or_default();
                    }
                    step
                })
                .collect()
        })
        .unwrap_or_default();
    let mut seq = TransposeSequence::from_steps(steps);
    // jumps may only target steps that survived the hole removal
    let len = seq.len();
    for i in 0..len {
        if let Some(step) = seq.get_mut(i) {
            if step.jump.is_some_and(|j| j as usize >= len) {
                step.jump = None;
            }
        }
    }
    seq
}

/// Legacy 8-entry vectors repeat their last eight entries out to 16.
fn chord_follow_from_value(value: Option<&Value>) -> [bool; NUM_TRACKS] {
    let flags: Vec<bool> = value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|v| v.as_bool().unwrap_or_else(|| v.as_i64().is_some_and(|n| n != 0)))
                .collect()
        })
        .unwrap_or_default();
    if flags.len() < 8 {
        return default_chord_follow();
    }
    let mut out = flags;
    while out.len() < NUM_TRACKS {
        out.push(out[out.len() - 8]);
    }
    std::array::from_fn(|t| out[t])
}

fn snapshot_from_value(value: &Value) -> Option<PatternSnapshot> {
    let arr = value.as_array()?;
    Some(std::array::from_fn(|t| {
        match arr.get(t).and_then(Value::as_i64) {
            Some(v) if (0..NUM_PATTERNS as i64).contains(&v) => Some(v as u8),
            Some(v) if v < 0 => None,
            _ => Some(0),
        }
    }))
}

/// Entry point for anything read from disk. Unrecognised input yields an
/// empty song.
pub fn song_from_value(value: &Value) -> Song {
    let mut song = Song::default();
    let obj = match value {
        Value::Array(_) => {
            song.tracks = migrate_track_data(value);
            return song;
        }
        Value::Object(obj) => obj,
        _ => return song,
    };

    if let Some(v) = int(obj, &["v"]) {
        if v > SCHEMA_VERSION {
            log::warn!("song schema v{v} is newer than v{SCHEMA_VERSION}, reading what is known");
        }
    }
    if let Some(tracks) = obj.get("t").or_else(|| obj.get("tracks")) {
        song.tracks = migrate_track_data(tracks);
    }
    song.set_bpm(int(obj, &["bpm"]).unwrap_or(DEFAULT_BPM as i64));
    if let Some(ts) = obj.get("ts").or_else(|| obj.get("transposeSequence")) {
        song.transpose_sequence = migrate_transpose_sequence(ts);
    }
    song.chord_follow = chord_follow_from_value(obj.get("cf").or_else(|| obj.get("chordFollow")));
    if let Some(v) = int_in(obj, &["st", "sequencerType"], 0, 255) {
        song.sequencer_type = v as u8;
    }
    if let Some(ps) = obj.get("ps").or_else(|| obj.get("patternSnapshots")) {
        for (slot, raw) in indexed(ps, NUM_SNAPSHOTS) {
            if let Some(snapshot) = snapshot_from_value(raw) {
                song.pattern_snapshots.insert(slot, snapshot);
            }
        }
    }
    song.active_pattern_snapshot = int(obj, &["ap", "activePatternSnapshot"])
        .filter(|v| *v >= 0 && (*v as usize) < NUM_SNAPSHOTS)
        .map(|v| v as usize);
    if let Some(v) = int_in(obj, &["mr", "masterReset"], 0, MAX_RESET_LENGTH as i64) {
        song.master_reset = v as u16;
    }
    song.color = int_in(obj, &["color"], 0, 255).map(|v| v as u8);
    song
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_velocity_becomes_parallel_array() {
        let step = step_from_value(&json!({ "notes": [60, 64, 67], "velocity": 80 }));
        assert_eq!(step.notes(), &[60, 64, 67]);
        assert_eq!(step.velocities(), &[80, 80, 80]);

        let step = step_from_value(&json!({ "notes": [60, 64] }));
        assert_eq!(step.velocities(), &[100, 100]);
    }

    #[test]
    fn short_velocity_arrays_are_padded() {
        let step = step_from_value(&json!({ "n": [60, 62, 64], "v": [30] }));
        assert_eq!(step.velocities(), &[30, 100, 100]);
    }

    #[test]
    fn long_keys_override_short_keys() {
        let step = step_from_value(&json!({ "pr": 40, "probability": 60 }));
        assert_eq!(step.probability, 60);
    }

    #[test]
    fn corrupt_fields_fall_back_to_defaults() {
        let step = step_from_value(&json!({
            "notes": "C4",
            "probability": "lots",
            "condition": 400,
            "ratchet": 99,
            "jump": 1000,
            "arpMode": 77,
            "offset": -90,
        }));
        assert!(step.notes().is_empty());
        assert_eq!(step.probability, 100);
        assert!(step.condition.is_none());
        assert_eq!(step.ratchet, Ratchet::default());
        assert_eq!(step.jump, None);
        assert_eq!(step.arp_mode, None);
        assert_eq!(step.offset, -24);
    }

    #[test]
    fn sixteen_step_patterns_grow_to_full_size() {
        let steps: Vec<Value> = (0..16).map(|i| json!({ "notes": [40 + i] })).collect();
        let pattern = pattern_from_value(&json!({ "steps": steps, "loopStart": 0, "loopEnd": 15 }));
        assert_eq!(pattern.steps().len(), NUM_STEPS);
        assert_eq!(pattern.steps()[15].notes(), &[55]);
        assert!(pattern.steps()[16].is_empty());
        assert_eq!(pattern.loop_end(), 15);
    }

    #[test]
    fn eight_track_songs_grow_to_sixteen() {
        let tracks: Vec<Value> = (0..8)
            .map(|i| json!({ "channel": i, "patterns": [{ "steps": [] }], "speedIndex": 3 }))
            .collect();
        let song = song_from_value(&json!({ "tracks": tracks, "bpm": 98 }));
        assert_eq!(song.bpm(), 98);
        assert_eq!(song.tracks[3].speed, Speed::TwoThirds);
        assert_eq!(song.tracks[12].channel, 9);
        assert_eq!(song.tracks[12].speed, Speed::Normal);
        for track in &song.tracks {
            assert_eq!(track.patterns.len(), NUM_PATTERNS);
        }
    }

    #[test]
    fn bare_track_arrays_are_read() {
        let song = song_from_value(&json!([{ "patterns": [{ "steps": [{ "notes": [36] }] }] }]));
        assert_eq!(song.tracks[0].patterns[0].steps()[0].notes(), &[36]);
        assert_eq!(song.bpm(), 120);
    }

    #[test]
    fn chord_follow_extends_legacy_vectors() {
        let cf = chord_follow_from_value(Some(&json!([
            false, false, false, false, true, true, true, true
        ])));
        assert_eq!(&cf[8..12], &[false, false, false, false]);
        assert_eq!(&cf[12..16], &[true, true, true, true]);
        assert_eq!(chord_follow_from_value(None), default_chord_follow());
    }

    #[test]
    fn transpose_steps_gain_jump_and_condition() {
        let seq = migrate_transpose_sequence(&json!([
            { "transpose": 3, "duration": 8 },
            null,
            { "transpose": -2, "duration": 2, "jump": 0, "condition": 4 },
            { "transpose": 1, "duration": 2, "jump": 9 },
        ]));
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.steps()[0].jump, None);
        assert!(seq.steps()[0].condition.is_none());
        assert_eq!(seq.steps()[1].jump, Some(0));
        assert_eq!(seq.steps()[1].condition.index(), 4);
        assert_eq!(seq.steps()[2].jump, None);
    }

    #[test]
    fn legacy_snapshots_keep_track_off() {
        let song = song_from_value(&json!({
            "tracks": [],
            "patternSnapshots": [null, [1, -1, 3]],
            "activePatternSnapshot": 1,
        }));
        let snap = song.pattern_snapshots.get(&1).unwrap();
        assert_eq!(snap[0], Some(1));
        assert_eq!(snap[1], None);
        assert_eq!(snap[2], Some(3));
        assert_eq!(snap[3], Some(0));
        assert!(!song.pattern_snapshots.contains_key(&0));
        assert_eq!(song.active_pattern_snapshot, Some(1));
    }

    #[test]
    fn garbage_is_an_empty_song() {
        assert_eq!(song_from_value(&json!("nope")), Song::default());
        assert_eq!(song_from_value(&json!({ "t": 5, "bpm": "fast" })), Song::default());
    }
}
