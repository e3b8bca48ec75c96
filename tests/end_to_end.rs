use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use sparkseq::audio_api::RecordingSink;
use sparkseq::config::EngineConfig;
use sparkseq::generator::{generate_pattern, GenerateParams, GenerateStyle};
use sparkseq::middle::{Edit, Middle};
use sparkseq::pipeline::{SetStore, SongState};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn euclidean_sixteen_at_half_density() {
    let params = GenerateParams { length: 16, density: 50, ..Default::default() };
    for seed in 0..4 {
        let steps =
            generate_pattern(&params, GenerateStyle::Euclidean, None, &mut Pcg32::seed_from_u64(seed));
        let active = steps.iter().filter(|s| !s.notes().is_empty()).count();
        assert_eq!(active, 8);
    }
}

#[test]
fn debounce_waits_for_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let store = SetStore::new(dir.path());
    let mut state = SongState::open(&store, 0, ms(500));

    state.song.tracks[0].patterns[0].step_mut(0).unwrap().add_note(60, 100);
    state.mark_dirty(ms(0));
    state.song.set_bpm(128);
    state.mark_dirty(ms(300));

    for t in [100, 500, 700, 799] {
        assert!(!state.tick(ms(t), &store), "saved at {t}ms");
        assert!(!store.set_exists(0));
    }
    assert!(state.tick(ms(800), &store));
    assert_eq!(store.load_set(0).bpm(), 128);
    assert!(!state.tick(ms(2000), &store));
}

#[test]
fn edits_through_the_coordinator_reach_disk_and_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig { save_debounce_ms: 200, ..Default::default() };
    let mut m = Middle::new(SetStore::new(dir.path()), 1, RecordingSink::default(), config, 9);

    m.apply(Edit::ToggleNote { track: 0, step: 0, note: 62, velocity: 110 }, ms(0));
    m.apply(Edit::SetUnifiedIndex { track: 0, step: 0, index: 20 }, ms(50));
    m.apply(Edit::SetTransposeStep { index: 0, transpose: -3, duration: Some(2) }, ms(100));
    assert_eq!(m.sink().last("track_0_step_0_add_note"), Some("62,110"));
    assert_eq!(m.sink().last("track_0_step_0_condition_n"), Some("2"));
    assert_eq!(m.sink().last("transpose_step_0_duration"), Some("8"));

    assert!(!m.tick(ms(299)));
    assert!(m.tick(ms(300)));

    let saved = m.store().load_set(1);
    let step = &saved.tracks[0].patterns[0].steps()[0];
    assert_eq!(step.probability, 100);
    assert_eq!(step.condition.index(), 1);
    assert_eq!(saved.transpose_sequence.get(0).map(|s| s.transpose), Some(-3));
}
