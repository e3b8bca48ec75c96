// One file per song under <root>/sets/<index>.json. Writes go to a temp file
// in the same directory and are renamed over the target, so a crash mid-save
// leaves either the old file or the new one, never half of each.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::shared::NUM_SETS;

use super::migrate::song_from_value;
use super::project::Song;
use super::sparse;

const SETS_DIR: &str = "sets";
const LEGACY_FILE: &str = "sets.json";
const LEGACY_BACKUP: &str = "sets.json.backup";

#[derive(Clone, Debug)]
pub struct SetStore {
    root: PathBuf,
}

impl SetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // <root>/sets
    pub fn sets_dir(&self) -> PathBuf {
        self.root.join(SETS_DIR)
    }

    // <root>/sets/<index>.json
    pub fn set_path(&self, index: usize) -> PathBuf {
        self.sets_dir().join(format!("{index}.json"))
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.root.join(LEGACY_FILE)
    }

    pub fn set_exists(&self, index: usize) -> bool {
        self.set_path(index).is_file()
    }

    /// Always reads from disk. A missing or unreadable file is an empty song.
    pub fn load_set(&self, index: usize) -> Song {
        let path = self.set_path(index);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(_) => return Song::default(),
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(value) => song_from_value(&value),
            Err(e) => {
                log::warn!("set {index}: {} is not valid json ({e}), starting empty", path.display());
                Song::default()
            }
        }
    }

    pub fn save_set(&self, index: usize, song: &Song) -> anyhow::Result<()> {
        anyhow::ensure!(index < NUM_SETS, "set index {index} out of range");
        let dir = self.sets_dir();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let json = sparse::to_json_string(song).context("serializing song")?;
        let target = self.set_path(index);
        write_atomic(&dir, &target, json.as_bytes())
            .with_context(|| format!("writing {}", target.display()))?;
        log::debug!("saved set {index} ({} bytes)", json.len());
        Ok(())
    }

    pub fn delete_set(&self, index: usize) -> anyhow::Result<bool> {
        let path = self.set_path(index);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    /// Indices of sets whose file holds at least one note or cc lock.
    pub fn list_populated_sets(&self) -> Vec<usize> {
        (0..NUM_SETS)
            .filter(|&i| self.set_exists(i) && self.load_set(i).has_content())
            .collect()
    }

    fn sets_dir_has_files(&self) -> bool {
        fs::read_dir(self.sets_dir())
            .map(|mut entries| entries.any(|e| e.is_ok_and(|e| e.path().is_file())))
            .unwrap_or(false)
    }

    /// One-time move from the single `sets.json` file to per-song files.
    /// Runs only while `sets/` holds no files; songs without content are not
    /// carried over. Returns how many songs were written.
    pub fn migrate_from_legacy(&self) -> anyhow::Result<usize> {
        let legacy = self.legacy_path();
        if !legacy.is_file() || self.sets_dir_has_files() {
            return Ok(0);
        }
        let data = fs::read_to_string(&legacy)
            .with_context(|| format!("reading {}", legacy.display()))?;
        let value: Value = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", legacy.display()))?;
        let songs = value.as_array().map(Vec::as_slice).unwrap_or_default();

        let mut written = 0;
        for (index, raw) in songs.iter().enumerate().take(NUM_SETS) {
            let song = song_from_value(raw);
            if !song.has_content() {
                continue;
            }
            self.save_set(index, &song)?;
            written += 1;
        }

        let backup = self.root.join(LEGACY_BACKUP);
        fs::rename(&legacy, &backup)
            .with_context(|| format!("renaming {} to {}", legacy.display(), backup.display()))?;
        log::info!("migrated {written} of {} legacy sets, kept {}", songs.len(), backup.display());
        Ok(written)
    }
}

// The temp file deletes itself when dropped, which covers every early return.
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song_with_note(note: u8) -> Song {
        let mut song = Song::default();
        song.tracks[0].patterns[0].step_mut(0).unwrap().add_note(note, 100);
        song
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        let song = song_with_note(48);
        store.save_set(3, &song).unwrap();
        assert!(store.set_exists(3));
        assert_eq!(store.load_set(3), song);
    }

    #[test]
    fn missing_and_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        assert_eq!(store.load_set(0), Song::default());

        fs::create_dir_all(store.sets_dir()).unwrap();
        fs::write(store.set_path(1), "{ not json").unwrap();
        assert_eq!(store.load_set(1), Song::default());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        store.save_set(0, &song_with_note(60)).unwrap();
        store.save_set(0, &song_with_note(61)).unwrap();
        let names: Vec<_> = fs::read_dir(store.sets_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("0.json")]);
    }

    #[test]
    fn reads_see_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        store.save_set(2, &song_with_note(60)).unwrap();
        fs::write(store.set_path(2), r#"{"v":2,"t":{},"bpm":90}"#).unwrap();
        assert_eq!(store.load_set(2).bpm(), 90);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        assert!(store.save_set(NUM_SETS, &Song::default()).is_err());
    }

    #[test]
    fn housekeeping() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        store.save_set(1, &song_with_note(60)).unwrap();
        store.save_set(4, &Song::default()).unwrap();
        store.save_set(7, &song_with_note(62)).unwrap();
        assert_eq!(store.list_populated_sets(), vec![1, 7]);
        assert!(store.delete_set(7).unwrap());
        assert!(!store.delete_set(7).unwrap());
        assert_eq!(store.list_populated_sets(), vec![1]);
    }
}
