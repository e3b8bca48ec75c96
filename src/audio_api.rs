// The engine side is a flat key/value parameter surface: the core pushes
// string values with `set_parameter` and reads transient facts (like a scale
// the engine detected) with `get_parameter`.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};

pub const BULK_KEY: &str = "bulk_set";
pub const DEFAULT_BULK_CHUNK_BYTES: usize = 60_000;

pub trait ParamSink {
    fn set_parameter(&mut self, key: &str, value: &str);
    fn get_parameter(&mut self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamCommand {
    Set { key: String, value: String },
}

/// Core end of the engine channel. Sends never block; a full queue drops the
/// command, the same as a lost message on the host bus.
pub struct EngineHandle {
    tx: Sender<ParamCommand>,
    facts_rx: Receiver<(String, String)>,
    facts: HashMap<String, String>,
}

/// Engine end: receives commands, publishes facts back.
pub struct EngineEnd {
    pub rx: Receiver<ParamCommand>,
    pub facts_tx: Sender<(String, String)>,
}

pub fn engine_channel(capacity: usize) -> (EngineHandle, EngineEnd) {
    let (tx, rx) = crossbeam_channel::bounded::<ParamCommand>(capacity);
    let (facts_tx, facts_rx) = crossbeam_channel::unbounded::<(String, String)>();
    (
        EngineHandle { tx, facts_rx, facts: HashMap::new() },
        EngineEnd { rx, facts_tx },
    )
}

impl EngineHandle {
    fn drain_facts(&mut self) {
        while let Ok((key, value)) = self.facts_rx.try_recv() {
            self.facts.insert(key, value);
        }
    }
}

impl ParamSink for EngineHandle {
    fn set_parameter(&mut self, key: &str, value: &str) {
        let cmd = ParamCommand::Set { key: key.to_string(), value: value.to_string() };
        if self.tx.try_send(cmd).is_err() {
            log::warn!("engine queue full, dropped {key}");
        }
    }

    fn get_parameter(&mut self, key: &str) -> Option<String> {
        self.drain_facts();
        self.facts.get(key).cloned()
    }
}

/// Buffers calls between `begin` and `end` and sends them as
/// `bulk_set` payloads of `key\nvalue\n` lines, each below `chunk_bytes`
/// unless a single entry is larger on its own.
pub struct BulkSink<'a, S: ParamSink + ?Sized> {
    inner: &'a mut S,
    buffer: Option<Vec<(String, String)>>,
    chunk_bytes: usize,
}

impl<'a, S: ParamSink + ?Sized> BulkSink<'a, S> {
    pub fn new(inner: &'a mut S, chunk_bytes: usize) -> Self {
        Self { inner, buffer: None, chunk_bytes }
    }

    pub fn begin(&mut self) {
        self.buffer = Some(Vec::new());
    }

    /// Sends what was buffered. Returns the number of `bulk_set` calls made.
    pub fn end(&mut self) -> usize {
        let Some(entries) = self.buffer.take() else {
            return 0;
        };
        let mut sent = 0;
        let mut chunk = String::new();
        for (key, value) in entries {
            let entry = format!("{key}\n{value}\n");
            if !chunk.is_empty() && chunk.len() + entry.len() > self.chunk_bytes {
                self.inner.set_parameter(BULK_KEY, &chunk);
                sent += 1;
                chunk.clear();
            }
            chunk.push_str(&entry);
        }
        if !chunk.is_empty() {
            self.inner.set_parameter(BULK_KEY, &chunk);
            sent += 1;
        }
        sent
    }
}

impl<S: ParamSink + ?Sized> ParamSink for BulkSink<'_, S> {
    fn set_parameter(&mut self, key: &str, value: &str) {
        match &mut self.buffer {
            Some(buf) => buf.push((key.to_string(), value.to_string())),
            None => self.inner.set_parameter(key, value),
        }
    }

    fn get_parameter(&mut self, key: &str) -> Option<String> {
        self.inner.get_parameter(key)
    }
}

/// Splits a `bulk_set` payload back into pairs.
pub fn parse_bulk(payload: &str) -> Vec<(&str, &str)> {
    let mut lines = payload.lines();
    let mut pairs = Vec::new();
    while let (Some(k), Some(v)) = (lines.next(), lines.next()) {
        pairs.push((k, v));
    }
    pairs
}

/// Keeps every call in order; facts are set directly. Used by tests and by
/// the headless host as a stand-in engine.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<(String, String)>,
    pub facts: HashMap<String, String>,
}

impl RecordingSink {
    pub fn values_for(&self, key: &str) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn last(&self, key: &str) -> Option<&str> {
        self.values_for(key).pop()
    }
}

impl ParamSink for RecordingSink {
    fn set_parameter(&mut self, key: &str, value: &str) {
        self.sent.push((key.to_string(), value.to_string()));
    }

    fn get_parameter(&mut self, key: &str) -> Option<String> {
        self.facts.get(key).cloned()
    }
}
