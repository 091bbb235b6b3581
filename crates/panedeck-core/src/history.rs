//! Per-session durable log of terminal input/output.
//!
//! The log lets a view-model rebuild what the terminal showed before a reload.
//! Consecutive identical entries are collapsed, and the log is bounded by
//! entry count, cumulative content size and entry age (oldest dropped first).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::HistoryConfig;
use crate::store::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub content: String,
    /// Milliseconds since the unix epoch
    pub timestamp: u64,
    pub id: String,
}

#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KvStore>,
    config: HistoryConfig,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    pub fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, session_id)
    }

    /// Entries for a session in stored order. Missing or unreadable history is empty.
    pub fn load(&self, session_id: &str) -> Vec<HistoryEntry> {
        let key = self.key(session_id);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("failed to read history {key}: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("discarding corrupt history {key}: {e}");
                Vec::new()
            }
        }
    }

    /// Appends an entry stamped with the current time. Returns false when the
    /// entry was dropped as a duplicate (or empty).
    pub fn append(&self, session_id: &str, kind: HistoryKind, content: &str) -> bool {
        self.append_at(session_id, kind, content, now_ms())
    }

    pub fn append_at(
        &self,
        session_id: &str,
        kind: HistoryKind,
        content: &str,
        timestamp: u64,
    ) -> bool {
        if content.is_empty() {
            return false;
        }
        let mut entries = self.load(session_id);
        if let Some(last) = entries.last() {
            if last.kind == kind && last.content == content {
                return false;
            }
        }
        entries.push(HistoryEntry {
            kind,
            content: content.to_string(),
            timestamp,
            id: uuid::Uuid::new_v4().simple().to_string(),
        });
        self.enforce_retention(&mut entries);
        self.save(session_id, &entries);
        true
    }

    fn enforce_retention(&self, entries: &mut Vec<HistoryEntry>) {
        // Timestamps from `append_at` need not be ascending.
        if self.config.max_age_secs > 0 {
            if let Some(newest) = entries.iter().map(|e| e.timestamp).max() {
                let cutoff = newest.saturating_sub(self.config.max_age_secs * 1000);
                let last = entries.len() - 1;
                let mut index = 0;
                entries.retain(|e| {
                    let keep = index == last || e.timestamp >= cutoff;
                    index += 1;
                    keep
                });
            }
        }

        if entries.len() > self.config.max_entries {
            let excess = entries.len() - self.config.max_entries;
            entries.drain(..excess);
        }

        let mut total: usize = entries.iter().map(|e| e.content.chars().count()).sum();
        let mut evict = 0;
        // The newest entry is always kept.
        while total > self.config.max_chars && evict + 1 < entries.len() {
            total -= entries[evict].content.chars().count();
            evict += 1;
        }
        entries.drain(..evict);
    }

    fn save(&self, session_id: &str, entries: &[HistoryEntry]) {
        let key = self.key(session_id);
        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to encode history {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &raw) {
            warn!("failed to persist history {key}: {e}");
        }
    }

    /// Concatenated output entries in timestamp order, or `None` when the
    /// session has no persisted output.
    pub fn reconstruct_buffer(&self, session_id: &str) -> Option<String> {
        let mut outputs: Vec<HistoryEntry> = self
            .load(session_id)
            .into_iter()
            .filter(|e| e.kind == HistoryKind::Output)
            .collect();
        if outputs.is_empty() {
            return None;
        }
        outputs.sort_by_key(|e| e.timestamp);
        Some(outputs.into_iter().map(|e| e.content).collect())
    }

    pub fn clear(&self, session_id: &str) {
        let key = self.key(session_id);
        if let Err(e) = self.store.remove(&key) {
            warn!("failed to clear history {key}: {e}");
        }
    }

    /// Session ids that currently have stored history.
    pub fn sessions(&self) -> Vec<String> {
        match self.store.keys_with_prefix(&self.config.key_prefix) {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(&self.config.key_prefix).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!("failed to list history sessions: {e}");
                Vec::new()
            }
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
