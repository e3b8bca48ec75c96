// Pushes song state to the engine as flat parameters.
//
// A full sync resends everything the engine plays: globals, each track's
// settings and the 64 steps of its playing pattern, then the transpose
// sequence. Step fields at their default are skipped; the `_clear` sent
// before each step resets them engine-side.

use crate::audio_api::{BulkSink, ParamSink};
use crate::pipeline::{Song, Step, Track, TransposeSequence};
use crate::shared::{ArpLayer, MAX_BPM, MIN_BPM};
use crate::trigger::Condition;

fn bool_str(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

fn send(sink: &mut (impl ParamSink + ?Sized), key: &str, value: impl ToString) {
    sink.set_parameter(key, &value.to_string());
}

// (n, m, not); all zero when there is no condition.
fn condition_fields(condition: Condition) -> (u8, u8, bool) {
    condition.cycle().map_or((0, 0, false), |c| (c.n, c.m, c.invert))
}

fn send_condition(sink: &mut (impl ParamSink + ?Sized), prefix: &str, condition: Condition) {
    let (n, m, not) = condition_fields(condition);
    send(sink, &format!("{prefix}_n"), n);
    send(sink, &format!("{prefix}_m"), m);
    send(sink, &format!("{prefix}_not"), bool_str(not));
}

pub fn sync_bpm(song: &Song, sink: &mut (impl ParamSink + ?Sized)) {
    send(sink, "bpm", song.bpm().clamp(MIN_BPM, MAX_BPM));
}

pub fn sync_mute(track_index: usize, track: &Track, sink: &mut (impl ParamSink + ?Sized)) {
    send(sink, &format!("track_{track_index}_mute"), bool_str(track.muted));
}

pub fn sync_current_pattern(track_index: usize, track: &Track, sink: &mut (impl ParamSink + ?Sized)) {
    let pattern = track.current_pattern.map_or(-1, |p| p as i16);
    send(sink, &format!("track_{track_index}_pattern"), pattern);
}

/// Track-level settings, not the steps.
pub fn sync_track_settings(
    track_index: usize,
    track: &Track,
    chord_follow: bool,
    sink: &mut (impl ParamSink + ?Sized),
) {
    let p = format!("track_{track_index}");
    send(sink, &format!("{p}_channel"), track.channel);
    sync_mute(track_index, track, sink);
    send(sink, &format!("{p}_speed"), track.speed.multiplier());
    send(sink, &format!("{p}_swing"), track.swing);
    sync_current_pattern(track_index, track, sink);
    send(sink, &format!("{p}_chord_follow"), bool_str(chord_follow));
    send(sink, &format!("{p}_arp_mode"), track.arp_mode.index());
    send(sink, &format!("{p}_arp_speed"), track.arp_speed.index());
    send(sink, &format!("{p}_arp_octave"), track.arp_octave.index());
    send(sink, &format!("{p}_arp_continuous"), bool_str(track.arp_continuous));
    send(sink, &format!("{p}_arp_play_steps"), track.arp_play_steps);
    send(sink, &format!("{p}_arp_play_start"), track.arp_play_start);
    send(sink, &format!("{p}_cc1_default"), track.cc1_default);
    send(sink, &format!("{p}_cc2_default"), track.cc2_default);
    send(sink, &format!("{p}_length"), track.track_length);
    send(sink, &format!("{p}_reset"), track.reset_length);
    send(sink, &format!("{p}_gate"), track.gate);
}

/// One step: clear, then notes, then every field that differs from default.
pub fn sync_step(
    track_index: usize,
    step_index: usize,
    step: &Step,
    sink: &mut (impl ParamSink + ?Sized),
) {
    let p = format!("track_{track_index}_step_{step_index}");
    send(sink, &format!("{p}_clear"), "1");
    for (note, vel) in step.notes().iter().zip(step.velocities()) {
        send(sink, &format!("{p}_add_note"), format!("{note},{vel}"));
    }

    if step.gate != 0 {
        send(sink, &format!("{p}_gate"), step.gate);
    }
    if let Some(cc) = step.cc1 {
        send(sink, &format!("{p}_cc1"), cc);
    }
    if let Some(cc) = step.cc2 {
        send(sink, &format!("{p}_cc2"), cc);
    }
    if step.probability < 100 {
        send(sink, &format!("{p}_probability"), step.probability);
    }
    if !step.ratchet.is_single() {
        match step.ratchet.encode() {
            Ok(value) => send(sink, &format!("{p}_ratchet"), value),
            Err(e) => log::warn!("{p}: {e}"),
        }
    }
    if step.length > 1 {
        send(sink, &format!("{p}_length"), step.length);
    }
    if step.offset != 0 {
        send(sink, &format!("{p}_offset"), step.offset);
    }
    for (name, condition) in [
        ("condition", step.condition),
        ("param_spark", step.param_spark),
        ("comp_spark", step.comp_spark),
    ] {
        if !condition.is_none() {
            send_condition(sink, &format!("{p}_{name}"), condition);
        }
    }
    if let Some(jump) = step.jump {
        send(sink, &format!("{p}_jump"), jump);
    }

    if let Some(mode) = step.arp_mode {
        send(sink, &format!("{p}_arp_mode"), mode.index());
    }
    if let Some(speed) = step.arp_speed {
        send(sink, &format!("{p}_arp_speed"), speed.index());
    }
    if let Some(octave) = step.arp_octave {
        send(sink, &format!("{p}_arp_octave"), octave.index());
    }
    if step.arp_layer != ArpLayer::Layer {
        send(sink, &format!("{p}_arp_layer"), step.arp_layer.index());
    }
    if let Some(v) = step.arp_play_steps {
        send(sink, &format!("{p}_arp_play_steps"), v);
    }
    if let Some(v) = step.arp_play_start {
        send(sink, &format!("{p}_arp_play_start"), v);
    }
}

/// Settings plus every step of the playing pattern.
pub fn sync_track(
    track_index: usize,
    track: &Track,
    chord_follow: bool,
    sink: &mut (impl ParamSink + ?Sized),
) {
    sync_track_settings(track_index, track, chord_follow, sink);
    for (s, step) in track.playing_pattern().steps().iter().enumerate() {
        sync_step(track_index, s, step, sink);
    }
}

pub fn sync_transpose_sequence(sequence: &TransposeSequence, sink: &mut (impl ParamSink + ?Sized)) {
    send(sink, "transpose_clear", "1");
    for (i, step) in sequence.steps().iter().enumerate() {
        let p = format!("transpose_step_{i}");
        send(sink, &format!("{p}_transpose"), step.transpose);
        // engine counts sixteenths, 4 per beat
        send(sink, &format!("{p}_duration"), step.duration as u32 * 4);
        let jump = step.jump.filter(|j| (*j as usize) < sequence.len());
        send(sink, &format!("{p}_jump"), jump.map_or(-1, |j| j as i16));
        send_condition(sink, &format!("{p}_condition"), step.condition);
    }
    send(sink, "transpose_step_count", sequence.len());
}

/// Everything, batched into `bulk_set` chunks of at most `chunk_bytes`.
pub fn sync_song(song: &Song, sink: &mut (impl ParamSink + ?Sized), chunk_bytes: usize) {
    let mut bulk = BulkSink::new(sink, chunk_bytes);
    bulk.begin();
    sync_bpm(song, &mut bulk);
    for (t, track) in song.tracks.iter().enumerate() {
        sync_track(t, track, song.chord_follow[t], &mut bulk);
    }
    sync_transpose_sequence(&song.transpose_sequence, &mut bulk);
    send(&mut bulk, "master_reset", song.master_reset);
    let chunks = bulk.end();
    log::debug!("synced song in {chunks} bulk chunks");
}
