// Sits between the host's input/tick callbacks and the song. Each edit mutates
// the model, pushes the affected parameters to the engine and marks the set
// dirty; `tick` lets the debounced save run.

use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::audio_api::{BulkSink, ParamSink};
use crate::config::EngineConfig;
use crate::generator::{detect_scale, DetectedScale, GenerateParams, GenerateSession, GenerateStyle};
use crate::pipeline::{SetStore, SongState, Step};
use crate::shared::{NUM_PATTERNS, NUM_SETS, NUM_TRACKS};
use crate::sync;
use crate::trigger::Ratchet;

/// Discrete edits, already translated from buttons and knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edit {
    ToggleNote { track: usize, step: usize, note: u8, velocity: u8 },
    ClearStep { track: usize, step: usize },
    SetUnifiedIndex { track: usize, step: usize, index: i64 },
    SetRatchet { track: usize, step: usize, index: i64 },
    SetOffset { track: usize, step: usize, ticks: i32 },
    SetBpm(i64),
    ToggleMute(usize),
    SetCurrentPattern { track: usize, pattern: Option<u8> },
    SetChordFollow { track: usize, on: bool },
    SaveSnapshot(usize),
    RecallSnapshot(usize),
    ClearSnapshot(usize),
    CopyPattern { from: (usize, usize), to: (usize, usize) },
    SetTransposeStep { index: usize, transpose: i64, duration: Option<i64> },
    AdjustTransposeDuration { index: usize, delta: i32 },
    RemoveTransposeStep(usize),
    ClearTranspose,
    NudgeGenerator { knob: usize, delta: i32 },
    SetGenerateStyle(GenerateStyle),
    Generate { track: usize },
    EndGenerate,
}

pub struct Middle<S: ParamSink> {
    pub state: SongState,
    store: SetStore,
    sink: S,
    config: EngineConfig,
    pub gen_params: GenerateParams,
    pub gen_style: GenerateStyle,
    session: GenerateSession,
    rng: Pcg32,
}

impl<S: ParamSink> Middle<S> {
    /// Opens `set_index` from the store and pushes it to the engine.
    pub fn new(store: SetStore, set_index: usize, sink: S, config: EngineConfig, seed: u64) -> Self {
        let set_index = set_index.min(NUM_SETS - 1);
        let state = SongState::open(&store, set_index, config.save_debounce());
        let mut middle = Self {
            state,
            store,
            sink,
            config,
            gen_params: GenerateParams::default(),
            gen_style: GenerateStyle::default(),
            session: GenerateSession::default(),
            rng: Pcg32::seed_from_u64(seed),
        };
        middle.sync_all();
        middle
    }

    pub fn store(&self) -> &SetStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn sync_all(&mut self) {
        sync::sync_song(&self.state.song, &mut self.sink, self.config.bulk_chunk_bytes);
    }

    /// Applies one edit. Returns false when it was rejected (bad index,
    /// out-of-range value) and nothing changed.
    pub fn apply(&mut self, edit: Edit, now: Duration) -> bool {
        let changed = self.apply_inner(edit);
        if changed {
            self.state.mark_dirty(now);
        } else {
            log::debug!("ignored {edit:?}");
        }
        changed
    }

    fn apply_inner(&mut self, edit: Edit) -> bool {
        let song = &mut self.state.song;
        match edit {
            Edit::ToggleNote { track, step, note, velocity } => {
                self.edit_step(track, step, |s| s.toggle_note(note, velocity))
            }
            Edit::ClearStep { track, step } => self.edit_step(track, step, |s| {
                *s = Step::default();
                true
            }),
            Edit::SetUnifiedIndex { track, step, index } => self.edit_step(track, step, |s| {
                s.set_unified_index(index);
                true
            }),
            Edit::SetRatchet { track, step, index } => match Ratchet::from_index(index) {
                Ok(ratchet) => self.edit_step(track, step, |s| {
                    s.ratchet = ratchet;
                    true
                }),
                Err(e) => {
                    log::warn!("{e}");
                    false
                }
            },
            Edit::SetOffset { track, step, ticks } => self.edit_step(track, step, |s| {
                s.set_offset(ticks);
                true
            }),
            Edit::SetBpm(bpm) => {
                song.set_bpm(bpm);
                sync::sync_bpm(song, &mut self.sink);
                true
            }
            Edit::ToggleMute(t) => match song.tracks.get_mut(t) {
                Some(track) => {
                    track.muted = !track.muted;
                    sync::sync_mute(t, track, &mut self.sink);
                    true
                }
                None => false,
            },
            Edit::SetCurrentPattern { track, pattern } => {
                if track >= NUM_TRACKS || pattern.is_some_and(|p| p as usize >= NUM_PATTERNS) {
                    return false;
                }
                song.tracks[track].current_pattern = pattern;
                self.sync_tracks(&[track]);
                true
            }
            Edit::SetChordFollow { track, on } => {
                if track >= NUM_TRACKS {
                    return false;
                }
                song.chord_follow[track] = on;
                sync::sync_track_settings(track, &song.tracks[track], on, &mut self.sink);
                true
            }
            Edit::SaveSnapshot(slot) => song.save_snapshot(slot),
            Edit::RecallSnapshot(slot) => {
                if !song.recall_snapshot(slot) {
                    return false;
                }
                let all: Vec<usize> = (0..NUM_TRACKS).collect();
                self.sync_tracks(&all);
                true
            }
            Edit::ClearSnapshot(slot) => song.clear_snapshot(slot),
            Edit::CopyPattern { from, to } => {
                if !song.copy_pattern(from, to) {
                    return false;
                }
                if song.tracks[to.0].playing_pattern_index() == to.1 {
                    self.sync_tracks(&[to.0]);
                }
                true
            }
            Edit::SetTransposeStep { index, transpose, duration } => {
                let ok = song.transpose_sequence.set_step(index, transpose, duration);
                self.sync_transpose(ok)
            }
            Edit::AdjustTransposeDuration { index, delta } => {
                let ok = song.transpose_sequence.adjust_duration(index, delta).is_some();
                self.sync_transpose(ok)
            }
            Edit::RemoveTransposeStep(index) => {
                let ok = song.transpose_sequence.remove_step(index);
                self.sync_transpose(ok)
            }
            Edit::ClearTranspose => {
                song.transpose_sequence.clear();
                self.sync_transpose(true)
            }
            Edit::NudgeGenerator { knob, delta } => {
                self.gen_params.nudge(knob, delta);
                false // generator knobs are not song data
            }
            Edit::SetGenerateStyle(style) => {
                self.gen_style = style;
                false
            }
            Edit::Generate { track } => self.generate(track).is_some(),
            Edit::EndGenerate => {
                self.session.end();
                false
            }
        }
    }

    // Step edits always land on the playing pattern.
    fn edit_step(&mut self, track: usize, step: usize, f: impl FnOnce(&mut Step) -> bool) -> bool {
        let Some(t) = self.state.song.tracks.get_mut(track) else {
            return false;
        };
        let Some(s) = t.playing_pattern_mut().step_mut(step) else {
            return false;
        };
        if !f(s) {
            return false;
        }
        sync::sync_step(track, step, s, &mut self.sink);
        true
    }

    fn sync_tracks(&mut self, tracks: &[usize]) {
        let song = &self.state.song;
        let mut bulk = BulkSink::new(&mut self.sink, self.config.bulk_chunk_bytes);
        bulk.begin();
        for &t in tracks {
            sync::sync_track(t, &song.tracks[t], song.chord_follow[t], &mut bulk);
        }
        bulk.end();
    }

    fn sync_transpose(&mut self, changed: bool) -> bool {
        if changed {
            sync::sync_transpose_sequence(&self.state.song.transpose_sequence, &mut self.sink);
        }
        changed
    }

    /// The engine's detected scale if it reports one, else our own guess
    /// from the chord-follow tracks.
    pub fn scale_hint(&mut self) -> Option<DetectedScale> {
        let root = self.sink.get_parameter("detected_scale_root");
        let name = self.sink.get_parameter("detected_scale_name");
        root.zip(name)
            .and_then(|(r, n)| DetectedScale::from_host(&r, &n))
            .or_else(|| detect_scale(&self.state.song))
    }

    /// Returns the pattern index written.
    pub fn generate(&mut self, track: usize) -> Option<usize> {
        if track >= NUM_TRACKS {
            return None;
        }
        let hint = self.scale_hint();
        let target = self.session.generate_into(
            track,
            &mut self.state.song.tracks[track],
            &self.gen_params,
            self.gen_style,
            hint.as_ref(),
            &mut self.rng,
        );
        self.sync_tracks(&[track]);
        Some(target)
    }

    /// Returns true when a save went to disk.
    pub fn tick(&mut self, now: Duration) -> bool {
        self.state.tick(now, &self.store)
    }

    pub fn set_playing(&mut self, playing: bool, now: Duration) -> bool {
        self.state.set_playing(playing, now, &self.store)
    }

    pub fn flush(&mut self, now: Duration) -> bool {
        self.state.flush(now, &self.store)
    }

    /// Saves the current set, loads `index` from disk and pushes it. Stays
    /// on the current set when its unsaved edits cannot be written.
    pub fn open_set(&mut self, index: usize, now: Duration) -> bool {
        if index >= NUM_SETS || !self.state.switch_set(index, now, &self.store) {
            return false;
        }
        self.session.end();
        self.sync_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::{parse_bulk, RecordingSink, BULK_KEY};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn middle(dir: &std::path::Path) -> Middle<RecordingSink> {
        Middle::new(SetStore::new(dir), 0, RecordingSink::default(), EngineConfig::default(), 1)
    }

    fn bulk_keys(sink: &RecordingSink) -> Vec<String> {
        sink.values_for(BULK_KEY)
            .iter()
            .flat_map(|p| parse_bulk(p))
            .map(|(k, _)| k.to_string())
            .collect()
    }

    #[test]
    fn opening_pushes_the_whole_song() {
        let dir = tempfile::tempdir().unwrap();
        let m = middle(dir.path());
        let keys = bulk_keys(m.sink());
        assert_eq!(keys.first().map(String::as_str), Some("bpm"));
        assert!(keys.iter().any(|k| k == "transpose_step_count"));
    }

    #[test]
    fn note_edit_pushes_step_and_saves_after_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        assert!(m.apply(Edit::ToggleNote { track: 0, step: 3, note: 60, velocity: 100 }, ms(0)));
        assert_eq!(m.sink().last("track_0_step_3_add_note"), Some("60,100"));

        assert!(!m.tick(ms(499)));
        assert!(m.tick(ms(500)));
        assert!(m.store().set_exists(0));
        let loaded = m.store().load_set(0);
        assert_eq!(loaded.tracks[0].patterns[0].steps()[3].notes(), &[60]);
    }

    #[test]
    fn rejected_edits_do_not_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        assert!(!m.apply(Edit::SetRatchet { track: 0, step: 0, index: 99 }, ms(0)));
        assert!(!m.apply(Edit::ToggleMute(16), ms(0)));
        assert!(!m.apply(Edit::SetCurrentPattern { track: 0, pattern: Some(16) }, ms(0)));
        assert!(!m.apply(Edit::NudgeGenerator { knob: 1, delta: 1 }, ms(0)));
        assert!(!m.state.is_dirty());
        assert_eq!(m.gen_params.density, 55);
    }

    #[test]
    fn ratchet_goes_out_as_wire_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        let index = crate::trigger::RATCHET_VALUES.iter().position(|&v| v == 22).unwrap();
        assert!(m.apply(Edit::SetRatchet { track: 1, step: 0, index: index as i64 }, ms(0)));
        assert_eq!(m.sink().last("track_1_step_0_ratchet"), Some("22"));
    }

    #[test]
    fn saves_wait_for_the_transport() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        m.set_playing(true, ms(0));
        m.apply(Edit::SetBpm(140), ms(0));
        assert_eq!(m.sink().last("bpm"), Some("140"));
        assert!(!m.tick(ms(2000)));
        assert!(m.set_playing(false, ms(2100)));
        assert_eq!(m.store().load_set(0).bpm(), 140);
    }

    #[test]
    fn generate_writes_an_empty_pattern_and_resyncs() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        m.apply(Edit::ToggleNote { track: 2, step: 0, note: 50, velocity: 90 }, ms(0));
        m.apply(Edit::SetGenerateStyle(GenerateStyle::Euclidean), ms(0));
        assert!(m.apply(Edit::Generate { track: 2 }, ms(10)));

        let track = &m.state.song.tracks[2];
        assert_eq!(track.current_pattern, Some(1));
        assert!(track.patterns[1].has_content());
        assert!(bulk_keys(m.sink()).iter().any(|k| k == "track_2_pattern"));

        // pressing again regenerates in place
        m.apply(Edit::Generate { track: 2 }, ms(20));
        assert_eq!(m.state.song.tracks[2].current_pattern, Some(1));
    }

    #[test]
    fn generate_on_another_track_keeps_its_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        m.apply(Edit::ToggleNote { track: 2, step: 0, note: 50, velocity: 90 }, ms(0));
        m.apply(Edit::ToggleNote { track: 5, step: 0, note: 40, velocity: 90 }, ms(0));
        m.apply(Edit::SetCurrentPattern { track: 5, pattern: Some(1) }, ms(0));
        m.apply(Edit::ToggleNote { track: 5, step: 7, note: 62, velocity: 90 }, ms(0));
        m.apply(Edit::SetCurrentPattern { track: 5, pattern: Some(0) }, ms(0));

        assert_eq!(m.generate(2), Some(1));
        assert_eq!(m.generate(5), Some(2));
        let track = &m.state.song.tracks[5];
        assert_eq!(track.patterns[1].steps()[7].notes(), &[62]);
        assert_eq!(track.current_pattern, Some(2));
    }

    #[test]
    fn host_scale_hint_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        m.sink_mut().facts.insert("detected_scale_root".into(), "2".into());
        m.sink_mut().facts.insert("detected_scale_name".into(), "Dorian".into());
        assert_eq!(m.scale_hint(), Some(DetectedScale { root: 2, template: 6 }));
    }

    #[test]
    fn switching_sets_flushes_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        m.apply(Edit::SetBpm(90), ms(0));
        assert!(m.open_set(3, ms(10)));
        assert_eq!(m.state.set_index(), 3);
        assert_eq!(m.state.song.bpm(), 120);
        assert_eq!(m.store().load_set(0).bpm(), 90);
        assert!(!m.open_set(NUM_SETS, ms(20)));
    }

    #[test]
    fn unsaved_set_is_not_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = middle(dir.path());
        std::fs::write(dir.path().join("sets"), "").unwrap();
        m.apply(Edit::SetBpm(95), ms(0));
        assert!(!m.open_set(2, ms(10)));
        assert_eq!(m.state.set_index(), 0);
        assert_eq!(m.state.song.bpm(), 95);
        assert!(m.state.is_dirty());
    }
}
