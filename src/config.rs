use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio_api::DEFAULT_BULK_CHUNK_BYTES;

pub const CONFIG_FILE: &str = "config.json";

/// Host tunables, read from `<data_dir>/config.json`. Missing keys take the
/// default value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub save_debounce_ms: u64,
    pub tick_ms: u64,
    pub bulk_chunk_bytes: usize,
    pub engine_queue: usize, // bounded channel capacity
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 500,
            tick_ms: 16,
            bulk_chunk_bytes: DEFAULT_BULK_CHUNK_BYTES,
            engine_queue: 4096,
        }
    }
}

impl EngineConfig {
    /// Never fails: an absent or unreadable file gives the defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<EngineConfig>(&text) {
            Ok(config) => config.sanitized(),
            Err(e) => {
                log::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        self.tick_ms = self.tick_ms.max(1);
        self.bulk_chunk_bytes = self.bulk_chunk_bytes.max(1);
        self.engine_queue = self.engine_queue.max(1);
        self
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path());
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.save_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"save_debounce_ms": 250, "tick_ms": 0}"#)
            .unwrap();
        let config = EngineConfig::load(dir.path());
        assert_eq!(config.save_debounce_ms, 250);
        assert_eq!(config.tick_ms, 1);
        assert_eq!(config.bulk_chunk_bytes, 60_000);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{nope").unwrap();
        assert_eq!(EngineConfig::load(dir.path()), EngineConfig::default());
    }
}
