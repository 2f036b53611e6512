//! Per-document version history.
//!
//! Every document owns a hidden JSON sidecar mapping a sortable timestamp key
//! to a full snapshot of the content saved at that moment. Keys are unique
//! within one document and sort in save order, so the greatest key is always
//! the current content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use tracing::{debug, warn};

use super::paths::PathResolver;
use super::{Result, StoreError};

/// Content of the entry seeded before any real edit is recorded.
pub const PLACEHOLDER: &str = "History initialised.";

const KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub content: String,
}

/// In-memory form of one sidecar.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct History {
    entries: BTreeMap<String, String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert a snapshot. Returns `false` and leaves the history untouched if
    /// the key is already taken.
    pub fn insert(&mut self, timestamp: String, content: String) -> bool {
        if self.entries.contains_key(&timestamp) {
            return false;
        }
        self.entries.insert(timestamp, content);
        true
    }

    /// Newest snapshot, if any.
    pub fn latest(&self) -> Option<HistoryEntry> {
        self.entries
            .iter()
            .next_back()
            .map(|(timestamp, content)| HistoryEntry {
                timestamp: timestamp.clone(),
                content: content.clone(),
            })
    }

    pub fn get(&self, timestamp: &str) -> Option<HistoryEntry> {
        self.entries.get(timestamp).map(|content| HistoryEntry {
            timestamp: timestamp.to_string(),
            content: content.clone(),
        })
    }

    /// All snapshots, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .map(|(timestamp, content)| HistoryEntry {
                timestamp: timestamp.clone(),
                content: content.clone(),
            })
            .collect()
    }

    /// Produce a key for a snapshot taken at `now`.
    ///
    /// The plain second-resolution time is used when it sorts after every
    /// existing key. Otherwise (two saves within one second, or a clock that
    /// stepped back) the newest key's base gets a zero-padded counter one
    /// above its own, which keeps the result unique and last in order.
    pub fn mint_at(&self, now: DateTime<Utc>) -> String {
        let base = now.format(KEY_FORMAT).to_string();
        let Some(newest) = self.entries.keys().next_back() else {
            return base;
        };
        if base.as_str() > newest.as_str() {
            return base;
        }
        let (newest_base, counter) = split_key(newest);
        // Six digits keep lexical order for up to 999999 saves in one second.
        format!("{}.{:06}", newest_base, counter + 1)
    }
}

fn split_key(key: &str) -> (&str, u64) {
    match key.rsplit_once('.') {
        Some((base, suffix)) => match suffix.parse::<u64>() {
            Ok(counter) => (base, counter),
            Err(_) => (key, 0),
        },
        None => (key, 0),
    }
}

/// Reads and writes history sidecars under the storage root.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    paths: PathResolver,
}

impl HistoryStore {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Whether a sidecar exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.paths.history_path(name).is_file()
    }

    /// Load the history of `name`. A missing sidecar is an empty history.
    pub fn load(&self, name: &str) -> Result<History> {
        let path = self.paths.history_path(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(History::new()),
            Err(e) => Err(StoreError::Storage(e)),
        }
    }

    fn save(&self, name: &str, history: &History) -> Result<()> {
        let path = self.paths.history_path(name);
        let data = serde_json::to_vec_pretty(history)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        debug!(name, entries = history.len(), path = %path.display(), "saved history");
        Ok(())
    }

    /// Append one snapshot under a caller-supplied key.
    pub fn append(&self, name: &str, timestamp: &str, content: &str) -> Result<()> {
        let mut history = self.load(name)?;
        if !history.insert(timestamp.to_string(), content.to_string()) {
            return Err(StoreError::HistoryKeyCollision {
                name: PathResolver::sanitize(name),
                timestamp: timestamp.to_string(),
            });
        }
        self.save(name, &history)
    }

    /// A fresh key for `name`, unique within its history.
    pub fn mint_timestamp(&self, name: &str) -> Result<String> {
        Ok(self.load(name)?.mint_at(Utc::now()))
    }

    /// Mint a key and append `content` under it.
    pub fn record(&self, name: &str, content: &str) -> Result<String> {
        self.record_in(name, self.load(name)?, content)
    }

    fn record_in(&self, name: &str, mut history: History, content: &str) -> Result<String> {
        let timestamp = history.mint_at(Utc::now());
        history.insert(timestamp.clone(), content.to_string());
        self.save(name, &history)?;
        Ok(timestamp)
    }

    /// Seed the placeholder entry when the history is still empty.
    fn ensure_seeded(&self, name: &str, mut history: History) -> Result<History> {
        if history.is_empty() {
            let timestamp = history.mint_at(Utc::now());
            history.insert(timestamp, PLACEHOLDER.to_string());
            self.save(name, &history)?;
        }
        Ok(history)
    }

    /// Content of the newest snapshot, seeding the placeholder first if the
    /// history is empty.
    pub fn latest(&self, name: &str) -> Result<String> {
        let history = self.ensure_seeded(name, self.load(name)?)?;
        Ok(history.latest().map(|e| e.content).unwrap_or_default())
    }

    /// Start (or extend) a history at document creation.
    ///
    /// `content` is recorded unless the newest snapshot already holds it, so
    /// re-creating a document with empty content still snapshots `""`. Only
    /// an empty history with empty content gets the placeholder, and the
    /// placeholder stands in for empty content afterwards.
    pub fn seed(&self, name: &str, content: &str) -> Result<()> {
        let history = self.load(name)?;
        match history.latest() {
            None if content.is_empty() => {
                self.ensure_seeded(name, history)?;
            }
            Some(newest)
                if newest.content == content
                    || (content.is_empty() && newest.content == PLACEHOLDER) => {}
            _ => {
                self.record_in(name, history, content)?;
            }
        }
        Ok(())
    }

    /// All snapshots of `name`, oldest first. Never empty.
    pub fn entries(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.ensure_seeded(name, self.load(name)?)?.entries())
    }

    pub fn get(&self, name: &str, timestamp: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.load(name)?.get(timestamp))
    }

    /// Move the whole history of `old` to `new`.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let from = self.paths.history_path(old);
        let to = self.paths.history_path(new);
        match std::fs::rename(&from, &to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(old, new, "no history sidecar to rename");
                Ok(())
            }
            Err(e) => Err(StoreError::Storage(e)),
        }
    }

    /// Drop the history of `name`. A missing sidecar is not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.paths.history_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(name, "no history sidecar to delete");
                Ok(())
            }
            Err(e) => Err(StoreError::Storage(e)),
        }
    }
}
