// v2 on-disk writer. Only values that differ from their defaults are emitted,
// empty steps/patterns/tracks are left out entirely, and every table-backed
// field is written as its stable index. `migrate::song_from_value` reads it back.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::shared::{default_channel, ArpSpeed, Speed, DEFAULT_BPM, DEFAULT_CC, DEFAULT_GATE,
    DEFAULT_SWING, DEFAULT_TRACK_LENGTH, NUM_STEPS};

use super::migrate::SCHEMA_VERSION;
use super::project::{default_chord_follow, Pattern, Song, Step, Track};
use super::transpose::TransposeStep;

#[derive(Serialize, Default, Debug, PartialEq)]
pub struct SparseStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    v: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gt: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    c1: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    c2: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    co: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ra: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    le: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ju: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    of: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    am: Option<usize>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    arp_speed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ao: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    al: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ap: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    at: Option<u8>,
}

// Some(value) only when it differs from the default.
fn changed<T: PartialEq>(value: T, default: T) -> Option<T> {
    (value != default).then_some(value)
}

impl SparseStep {
    fn from_step(step: &Step) -> Option<Self> {
        if step.is_empty() {
            return None;
        }
        let d = Step::default();
        let has_notes = !step.notes().is_empty();
        Some(SparseStep {
            n: has_notes.then(|| step.notes().to_vec()),
            v: has_notes.then(|| step.velocities().to_vec()),
            gt: changed(step.gate, d.gate),
            c1: step.cc1,
            c2: step.cc2,
            pr: changed(step.probability, d.probability),
            co: changed(step.condition.index(), 0),
            ra: changed(step.ratchet.index(), 0),
            le: changed(step.length, d.length),
            ps: changed(step.param_spark.index(), 0),
            cs: changed(step.comp_spark.index(), 0),
            ju: step.jump,
            of: changed(step.offset, 0),
            am: step.arp_mode.map(|m| m.index()),
            arp_speed: step.arp_speed.map(|s| s.index()),
            ao: step.arp_octave.map(|o| o.index()),
            al: changed(step.arp_layer.index(), 0),
            ap: step.arp_play_steps,
            at: step.arp_play_start,
        })
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SparsePattern {
    s: BTreeMap<usize, SparseStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    le: Option<usize>,
}

impl SparsePattern {
    fn from_pattern(pattern: &Pattern) -> Option<Self> {
        let s: BTreeMap<usize, SparseStep> = pattern
            .steps()
            .iter()
            .enumerate()
            .filter_map(|(i, step)| SparseStep::from_step(step).map(|st| (i, st)))
            .collect();
        let ls = changed(pattern.loop_start(), 0);
        let le = changed(pattern.loop_end(), NUM_STEPS - 1);
        if s.is_empty() && ls.is_none() && le.is_none() {
            return None;
        }
        Some(SparsePattern { s, ls, le })
    }
}

#[derive(Serialize, Default, Debug, PartialEq)]
pub struct SparseTrack {
    #[serde(skip_serializing_if = "Option::is_none")]
    cp: Option<i16>, // -1 = off
    #[serde(skip_serializing_if = "Option::is_none")]
    mu: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ch: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sp: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tl: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rl: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ga: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    am: Option<usize>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    arp_speed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ao: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ac: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ap: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    at: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    c1: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    c2: Option<u8>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    p: BTreeMap<usize, SparsePattern>,
}

impl SparseTrack {
    fn from_track(track: &Track, index: usize) -> Option<Self> {
        let p: BTreeMap<usize, SparsePattern> = track
            .patterns
            .iter()
            .enumerate()
            .filter_map(|(i, pat)| SparsePattern::from_pattern(pat).map(|sp| (i, sp)))
            .collect();
        let sparse = SparseTrack {
            cp: changed(track.current_pattern.map_or(-1, i16::from), 0),
            mu: track.muted.then_some(true),
            ch: changed(track.channel, default_channel(index)),
            sp: changed(track.speed.index(), Speed::default().index()),
            sw: changed(track.swing, DEFAULT_SWING),
            tl: changed(track.track_length, DEFAULT_TRACK_LENGTH),
            rl: changed(track.reset_length, 0),
            ga: changed(track.gate, DEFAULT_GATE),
            am: changed(track.arp_mode.index(), 0),
            arp_speed: changed(track.arp_speed.index(), ArpSpeed::default().index()),
            ao: changed(track.arp_octave.index(), 0),
            ac: track.arp_continuous.then_some(true),
            ap: changed(track.arp_play_steps, 1),
            at: changed(track.arp_play_start, 0),
            c1: changed(track.cc1_default, DEFAULT_CC),
            c2: changed(track.cc2_default, DEFAULT_CC),
            p,
        };
        (sparse != SparseTrack::default()).then_some(sparse)
    }
}

#[derive(Serialize, Debug)]
struct SparseTransposeStep {
    transpose: i8,
    duration: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    jump: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<usize>,
}

impl From<&TransposeStep> for SparseTransposeStep {
    fn from(step: &TransposeStep) -> Self {
        SparseTransposeStep {
            transpose: step.transpose,
            duration: step.duration,
            jump: step.jump,
            condition: changed(step.condition.index(), 0),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SparseSong {
    v: i64,
    t: BTreeMap<usize, SparseTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bpm: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ts: Vec<SparseTransposeStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cf: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    st: Option<u8>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    ps: BTreeMap<usize, Vec<i16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mr: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<u8>,
}

pub fn to_sparse(song: &Song) -> SparseSong {
    SparseSong {
        v: SCHEMA_VERSION,
        t: song
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, track)| SparseTrack::from_track(track, i).map(|st| (i, st)))
            .collect(),
        bpm: changed(song.bpm(), DEFAULT_BPM),
        ts: song.transpose_sequence.steps().iter().map(Into::into).collect(),
        cf: changed(song.chord_follow, default_chord_follow()).map(|cf| cf.to_vec()),
        st: changed(song.sequencer_type, 0),
        ps: song
            .pattern_snapshots
            .iter()
            .map(|(slot, snap)| (*slot, snap.iter().map(|p| p.map_or(-1, i16::from)).collect()))
            .collect(),
        ap: song.active_pattern_snapshot,
        mr: changed(song.master_reset, 0),
        color: song.color,
    }
}

pub fn to_value(song: &Song) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(to_sparse(song))
}

pub fn to_json_string(song: &Song) -> serde_json::Result<String> {
    serde_json::to_string(&to_sparse(song))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::migrate::song_from_value;
    use crate::shared::{ArpLayer, ArpMode};
    use crate::trigger::{Condition, Ratchet, RatchetMode};

    fn busy_song() -> Song {
        let mut song = Song::default();
        song.set_bpm(97);
        song.color = Some(3);
        song.master_reset = 64;
        song.chord_follow[12] = true;
        song.transpose_sequence.set_step(0, 5, Some(8));
        song.transpose_sequence.set_step(1, -3, None);
        song.transpose_sequence.get_mut(1).unwrap().jump = Some(0);

        let track = &mut song.tracks[2];
        track.current_pattern = Some(3);
        track.speed = Speed::Double;
        track.arp_mode = ArpMode::UpDown;
        track.arp_continuous = true;
        track.reset_length = 32;
        let pattern = &mut track.patterns[3];
        pattern.set_loop(2, 13);
        let step = pattern.step_mut(7).unwrap();
        step.add_note(60, 90);
        step.add_note(67, 40);
        step.ratchet = Ratchet::new(RatchetMode::RampDown, 4).unwrap();
        step.condition = Condition::from_index(9).unwrap();
        step.jump = Some(0);
        step.set_offset(-12);
        step.arp_layer = ArpLayer::Cut;
        step.cc2 = Some(0);

        song.tracks[15].current_pattern = None;
        song.save_snapshot(4);
        song
    }

    #[test]
    fn default_song_is_tiny() {
        let json = to_json_string(&Song::default()).unwrap();
        assert_eq!(json, r#"{"v":2,"t":{}}"#);
    }

    #[test]
    fn default_bpm_is_omitted() {
        let mut song = Song::default();
        let value = to_value(&song).unwrap();
        assert!(value.get("bpm").is_none());
        song.set_bpm(121);
        assert_eq!(to_value(&song).unwrap()["bpm"], 121);
    }

    #[test]
    fn only_non_default_fields_are_written() {
        let song = busy_song();
        let value = to_value(&song).unwrap();
        let step = &value["t"]["2"]["p"]["3"]["s"]["7"];
        assert_eq!(step["n"], serde_json::json!([60, 67]));
        assert_eq!(step["v"], serde_json::json!([90, 40]));
        assert!(step.get("pr").is_none());
        assert!(step.get("c1").is_none());
        assert_eq!(step["c2"], 0);
        assert_eq!(value["t"]["2"]["p"]["3"]["ls"], 2);
        assert!(value["t"].get("0").is_none());
        assert_eq!(value["t"]["15"]["cp"], -1);
        assert_eq!(value["ps"]["4"][15], -1);
        assert_eq!(value["cf"].as_array().map(Vec::len), Some(16));
    }

    #[test]
    fn round_trip_is_lossless() {
        let song = busy_song();
        let back = song_from_value(&to_value(&song).unwrap());
        assert_eq!(back, song);
    }

    #[test]
    fn rewriting_migrated_data_is_stable() {
        let legacy = serde_json::json!({
            "tracks": [{ "patterns": [{ "steps": [{ "notes": [50], "velocity": 70 }] }] }],
            "bpm": 140,
            "chordFollow": [true, true, true, true, false, false, false, false],
        });
        let once = song_from_value(&legacy);
        let twice = song_from_value(&to_value(&once).unwrap());
        assert_eq!(once, twice);
    }
}
