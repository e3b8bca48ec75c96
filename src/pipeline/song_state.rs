// Owns the song being edited and decides when it goes to disk. Everything runs
// on the host's tick/event thread, so there is no locking here: edits mark the
// song dirty, `tick` writes it once it has been quiet for the debounce window
// and the transport is stopped.

use std::time::Duration;

use super::persistence::SetStore;
use super::project::Song;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    SaveSet(usize),
}

impl Action {
    // Actions sharing a target replace each other.
    fn target(self) -> usize {
        match self {
            Action::SaveSet(index) => index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredAction {
    pub fire_at: Duration,
    pub action: Action,
}

/// Time-ordered queue checked once per tick. At most one live entry per target.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    pending: Vec<DeferredAction>,
}

impl Scheduler {
    pub fn schedule(&mut self, action: Action, fire_at: Duration) {
        self.cancel(action);
        self.pending.push(DeferredAction { fire_at, action });
    }

    pub fn cancel(&mut self, action: Action) {
        self.pending.retain(|d| d.action.target() != action.target());
    }

    pub fn pending(&self) -> &[DeferredAction] {
        &self.pending
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn take_due(&mut self, now: Duration) -> Vec<Action> {
        let mut due: Vec<DeferredAction> = Vec::new();
        self.pending.retain(|d| {
            if d.fire_at <= now {
                due.push(*d);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|d| d.fire_at);
        due.into_iter().map(|d| d.action).collect()
    }
}

pub struct SongState {
    pub song: Song,
    set_index: usize,
    playing: bool,
    dirty: bool,
    debounce: Duration,
    scheduler: Scheduler,
}

impl SongState {
    pub fn new(set_index: usize, song: Song, debounce: Duration) -> Self {
        Self {
            song,
            set_index,
            playing: false,
            dirty: false,
            debounce,
            scheduler: Scheduler::default(),
        }
    }

    pub fn open(store: &SetStore, set_index: usize, debounce: Duration) -> Self {
        Self::new(set_index, store.load_set(set_index), debounce)
    }

    pub fn set_index(&self) -> usize {
        self.set_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Restarts the quiet period for the active set.
    pub fn mark_dirty(&mut self, now: Duration) {
        self.dirty = true;
        self.scheduler
            .schedule(Action::SaveSet(self.set_index), now + self.debounce);
    }

    /// Runs due actions. While playing nothing is taken off the queue, so a
    /// save that came due mid-song waits for the transport to stop.
    /// Returns true when a set was written.
    pub fn tick(&mut self, now: Duration, store: &SetStore) -> bool {
        if self.playing {
            return false;
        }
        let mut saved = false;
        for action in self.scheduler.take_due(now) {
            match action {
                Action::SaveSet(index) if index == self.set_index => {
                    saved |= self.save(now, store);
                }
                Action::SaveSet(index) => {
                    log::debug!("dropping stale save for set {index}");
                }
            }
        }
        saved
    }

    /// Writes the active set right away if it has unsaved edits.
    pub fn flush(&mut self, now: Duration, store: &SetStore) -> bool {
        if !self.dirty {
            return false;
        }
        self.scheduler.cancel(Action::SaveSet(self.set_index));
        self.save(now, store)
    }

    /// Stopping the transport flushes anything deferred during playback.
    pub fn set_playing(&mut self, playing: bool, now: Duration, store: &SetStore) -> bool {
        let was_playing = self.playing;
        self.playing = playing;
        if was_playing && !playing {
            return self.flush(now, store);
        }
        false
    }

    /// Flushes the current set, then loads `index` fresh from disk. When the
    /// flush fails nothing is switched: the unsaved song stays active and its
    /// retry stays queued. Returns whether the switch happened.
    pub fn switch_set(&mut self, index: usize, now: Duration, store: &SetStore) -> bool {
        if self.dirty && !self.flush(now, store) {
            log::warn!("staying on set {}, it has unsaved edits", self.set_index);
            return false;
        }
        self.set_index = index;
        self.song = store.load_set(index);
        self.dirty = false;
        log::info!("opened set {index}");
        true
    }

    // On failure the song stays dirty and the save is retried after another
    // debounce window.
    fn save(&mut self, now: Duration, store: &SetStore) -> bool {
        match store.save_set(self.set_index, &self.song) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(e) => {
                log::error!("saving set {} failed: {e:#}", self.set_index);
                self.scheduler
                    .schedule(Action::SaveSet(self.set_index), now + self.debounce);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn edit(state: &mut SongState, note: u8) {
        state.song.tracks[0].patterns[0].step_mut(0).unwrap().toggle_note(note, 100);
    }

    #[test]
    fn scheduling_replaces_previous_entry() {
        let mut s = Scheduler::default();
        s.schedule(Action::SaveSet(1), ms(500));
        s.schedule(Action::SaveSet(1), ms(800));
        s.schedule(Action::SaveSet(2), ms(100));
        assert_eq!(s.pending().len(), 2);
        assert_eq!(s.take_due(ms(799)), vec![Action::SaveSet(2)]);
        assert_eq!(s.take_due(ms(800)), vec![Action::SaveSet(1)]);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn debounce_waits_for_quiet_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        let mut state = SongState::new(0, Song::default(), DEBOUNCE);

        edit(&mut state, 60);
        state.mark_dirty(ms(0));
        edit(&mut state, 62);
        state.mark_dirty(ms(300));

        assert!(!state.tick(ms(500), &store));
        assert!(!state.tick(ms(799), &store));
        assert!(!store.set_exists(0));

        assert!(state.tick(ms(800), &store));
        assert!(!state.is_dirty());
        assert_eq!(store.load_set(0), state.song);
        assert!(!state.tick(ms(2000), &store));
    }

    #[test]
    fn saves_wait_for_playback_to_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        let mut state = SongState::new(5, Song::default(), DEBOUNCE);

        state.set_playing(true, ms(0), &store);
        edit(&mut state, 60);
        state.mark_dirty(ms(10));
        assert!(!state.tick(ms(5000), &store));
        assert!(!store.set_exists(5));

        assert!(state.set_playing(false, ms(6000), &store));
        assert!(store.set_exists(5));
        assert!(state.scheduler().pending().is_empty());
    }

    #[test]
    fn switching_sets_flushes_then_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SetStore::new(dir.path());
        let mut other = Song::default();
        other.set_bpm(88);
        store.save_set(1, &other).unwrap();

        let mut state = SongState::open(&store, 0, DEBOUNCE);
        edit(&mut state, 64);
        state.mark_dirty(ms(0));
        assert!(state.switch_set(1, ms(100), &store));

        assert_eq!(state.set_index(), 1);
        assert_eq!(state.song.bpm(), 88);
        assert!(store.load_set(0).has_content());
        // the old set's timer must not write set 1
        assert!(!state.tick(ms(1000), &store));
    }

    #[test]
    fn failed_save_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the sets directory should go
        std::fs::write(dir.path().join("sets"), "").unwrap();
        let store = SetStore::new(dir.path());
        let mut state = SongState::new(0, Song::default(), DEBOUNCE);
        edit(&mut state, 60);
        state.mark_dirty(ms(0));

        assert!(!state.tick(ms(500), &store));
        assert!(state.is_dirty());
        assert_eq!(state.scheduler().pending()[0].fire_at, ms(1000));
    }

    #[test]
    fn failed_flush_blocks_set_switch() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("sets");
        std::fs::write(&blocker, "").unwrap();
        let store = SetStore::new(dir.path());
        let mut state = SongState::new(0, Song::default(), DEBOUNCE);
        edit(&mut state, 60);
        state.mark_dirty(ms(0));

        assert!(!state.switch_set(1, ms(100), &store));
        assert_eq!(state.set_index(), 0);
        assert!(state.is_dirty());
        assert!(state.song.has_content());

        // disk comes back, the queued retry writes set 0
        std::fs::remove_file(&blocker).unwrap();
        assert!(state.tick(ms(5000), &store));
        assert!(!state.is_dirty());
        assert!(store.load_set(0).has_content());
        assert!(state.switch_set(1, ms(5100), &store));
        assert_eq!(state.set_index(), 1);
    }
}
