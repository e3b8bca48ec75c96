use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::RecvTimeoutError;

use sparkseq::audio_api::{engine_channel, ParamCommand};
use sparkseq::config::EngineConfig;
use sparkseq::generator::GenerateStyle;
use sparkseq::middle::{Edit, Middle};
use sparkseq::pipeline::SetStore;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// Line commands read from stdin, one per line.
enum Command {
    Edit(Edit),
    Play(bool),
    OpenSet(usize),
    Save,
    Quit,
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let data_dir: PathBuf = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let set_index: usize = args.next().and_then(|a| a.parse().ok()).unwrap_or(0);

    let config = EngineConfig::load(&data_dir);
    let store = SetStore::new(&data_dir);
    match store.migrate_from_legacy() {
        Ok(0) => {}
        Ok(migrated) => println!("migrated {migrated} sets from sets.json"),
        Err(e) => log::warn!("legacy migration skipped, {} left in place: {e:#}", store.legacy_path().display()),
    }

    // stand-in engine: log what would be played
    let (handle, engine) = engine_channel(config.engine_queue);
    let engine_thread = std::thread::spawn(move || {
        let _facts = engine.facts_tx;
        for ParamCommand::Set { key, value } in engine.rx.iter() {
            log::debug!("engine <- {key} ({} bytes)", value.len());
        }
    });

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let tick_rate = config.tick();
    let mut middle = Middle::new(store, set_index, handle, config, seed);
    println!(
        "set {} loaded from {} ({} populated)",
        middle.state.set_index(),
        data_dir.display(),
        middle.store().list_populated_sets().len()
    );

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let start = Instant::now();
    loop {
        match line_rx.recv_timeout(tick_rate) {
            Ok(line) => {
                let now = start.elapsed();
                match parse_command(&line) {
                    Some(Command::Quit) => break,
                    Some(Command::Edit(edit)) => {
                        if !middle.apply(edit, now) {
                            println!("nothing changed");
                        }
                    }
                    Some(Command::Play(playing)) => {
                        middle.set_playing(playing, now);
                    }
                    Some(Command::OpenSet(index)) => {
                        if middle.open_set(index, now) {
                            println!("set {index}");
                        }
                    }
                    Some(Command::Save) => {
                        middle.flush(now);
                    }
                    None => println!("? {line}"),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break, // stdin closed
        }
        middle.tick(start.elapsed());
    }

    // save before quitting
    middle.flush(start.elapsed());
    drop(middle);
    join_engine(engine_thread);
    Ok(())
}

// A panic in the engine thread is reported, not swallowed. False when it panicked.
fn join_engine(thread: std::thread::JoinHandle<()>) -> bool {
    match thread.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".into());
            log::warn!("engine thread panicked: {reason}");
            false
        }
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let num = |i: usize| words.get(i).and_then(|w| w.parse::<i64>().ok());
    let idx = |i: usize| num(i).and_then(|v| usize::try_from(v).ok());

    let edit = match *words.first()? {
        "quit" | "q" => return Some(Command::Quit),
        "play" => return Some(Command::Play(true)),
        "stop" => return Some(Command::Play(false)),
        "save" => return Some(Command::Save),
        "set" => return Some(Command::OpenSet(idx(1)?)),
        "note" => Edit::ToggleNote {
            track: idx(1)?,
            step: idx(2)?,
            note: u8::try_from(num(3)?).ok()?,
            velocity: num(4).map_or(Some(100), |v| u8::try_from(v).ok())?,
        },
        "clear" => Edit::ClearStep { track: idx(1)?, step: idx(2)? },
        "prob" => Edit::SetUnifiedIndex { track: idx(1)?, step: idx(2)?, index: num(3)? },
        "ratchet" => Edit::SetRatchet { track: idx(1)?, step: idx(2)?, index: num(3)? },
        "offset" => Edit::SetOffset {
            track: idx(1)?,
            step: idx(2)?,
            ticks: i32::try_from(num(3)?).ok()?,
        },
        "bpm" => Edit::SetBpm(num(1)?),
        "mute" => Edit::ToggleMute(idx(1)?),
        "pattern" => Edit::SetCurrentPattern {
            track: idx(1)?,
            pattern: num(2).and_then(|p| u8::try_from(p).ok()),
        },
        "follow" => Edit::SetChordFollow { track: idx(1)?, on: num(2)? != 0 },
        "snap" => Edit::SaveSnapshot(idx(1)?),
        "recall" => Edit::RecallSnapshot(idx(1)?),
        "copy" => Edit::CopyPattern { from: (idx(1)?, idx(2)?), to: (idx(3)?, idx(4)?) },
        "transpose" => Edit::SetTransposeStep { index: idx(1)?, transpose: num(2)?, duration: num(3) },
        "style" => {
            let name = words.get(1)?;
            let style = GenerateStyle::ALL
                .into_iter()
                .find(|s| s.name().eq_ignore_ascii_case(name))?;
            Edit::SetGenerateStyle(style)
        }
        "knob" => Edit::NudgeGenerator { knob: idx(1)?, delta: i32::try_from(num(2)?).ok()? },
        "gen" => Edit::Generate { track: idx(1)? },
        _ => return None,
    };
    Some(Command::Edit(edit))
}
