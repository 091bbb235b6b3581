//! Save/restore of the pane layout.
//!
//! A snapshot either validates completely and replaces the manager state, or
//! it is rejected and the manager is left exactly as it was.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::layout::{Layout, LayoutKind, Pane, PaneId, PaneManager};
use crate::store::KvStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub layout: Layout,
    pub panes: Vec<Pane>,
    pub active_pane_id: PaneId,
}

impl LayoutSnapshot {
    /// Snapshot of a non-empty manager.
    pub fn capture(manager: &PaneManager) -> Option<Self> {
        let active_pane_id = manager.focused_pane_id()?;
        Some(Self {
            layout: *manager.layout(),
            panes: manager.panes().to_vec(),
            active_pane_id,
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.panes.is_empty() {
            return Err("no panes".into());
        }
        let mut seen = HashSet::new();
        if !self.panes.iter().all(|p| seen.insert(p.id)) {
            return Err("duplicate pane id".into());
        }
        if !seen.contains(&self.active_pane_id) {
            return Err(format!("active pane {} not in pane list", self.active_pane_id));
        }
        let count = self.panes.len();
        let consistent = match self.layout.kind {
            LayoutKind::Single => count == 1,
            LayoutKind::Split => count == 2,
            LayoutKind::Grid => count >= 1,
        };
        if !consistent {
            return Err(format!("{:?} layout with {count} panes", self.layout.kind));
        }
        if !self.layout.ratio.is_finite() {
            return Err("non-finite ratio".into());
        }
        Ok(())
    }
}

/// Encodes the manager's layout, panes and focused pane as JSON. An empty
/// manager has nothing to save and yields `None`.
pub fn serialize_layout(manager: &PaneManager) -> Option<String> {
    let snapshot = LayoutSnapshot::capture(manager)?;
    match serde_json::to_string(&snapshot) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!("failed to encode layout: {e}");
            None
        }
    }
}

/// Parses and validates a saved layout; any failure reads as "no saved layout".
pub fn deserialize_layout(raw: &str) -> Option<LayoutSnapshot> {
    let snapshot: LayoutSnapshot = match serde_json::from_str(raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("ignoring unreadable saved layout: {e}");
            return None;
        }
    };
    if let Err(reason) = snapshot.validate() {
        warn!("ignoring invalid saved layout: {reason}");
        return None;
    }
    Some(snapshot)
}

impl PaneManager {
    /// Persists the layout under `key`. Storage failures are logged and absorbed.
    pub fn save_layout(&self, store: &dyn KvStore, key: &str) -> bool {
        let Some(raw) = serialize_layout(self) else {
            debug!("no layout to save");
            return false;
        };
        match store.set(key, &raw) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to save layout {key}: {e}");
                false
            }
        }
    }

    /// Restores the layout saved under `key`. Returns false, leaving the
    /// manager untouched, when nothing valid is stored.
    pub fn load_layout(&mut self, store: &dyn KvStore, key: &str) -> bool {
        match store.get(key) {
            Ok(Some(raw)) => self.load_layout_from_str(&raw),
            Ok(None) => false,
            Err(e) => {
                warn!("failed to read layout {key}: {e}");
                false
            }
        }
    }

    pub fn load_layout_from_str(&mut self, raw: &str) -> bool {
        let Some(snapshot) = deserialize_layout(raw) else {
            return false;
        };
        self.restore(snapshot.layout, snapshot.panes, snapshot.active_pane_id);
        debug!(count = self.pane_count(), "layout restored");
        true
    }
}
