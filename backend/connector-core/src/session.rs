//! In-memory session state shared between the RPC client and the event
//! stream.
//!
//! The state is owned by this subsystem: UI collaborators read snapshots
//! but never mutate it directly. Mutation happens only from RPC response
//! handling and stream notifications, and each mutation takes the write
//! lock exactly once so a call's outcome and its connectivity update are
//! applied atomically.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedLibrary {
    pub id: Option<i64>,
    pub editable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedCollection {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Last-known selection in the host app: library, collection, item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selected {
    pub library: Option<SelectedLibrary>,
    pub collection: Option<SelectedCollection>,
    pub item: Option<Value>,
}

impl Selected {
    /// Apply a partial selection update from a `select` stream event.
    /// Only the keys present in `patch` are replaced.
    pub fn merge(&mut self, patch: &Value) {
        let Some(map) = patch.as_object() else {
            return;
        };

        if let Some(library) = map.get("library") {
            self.library = serde_json::from_value(library.clone()).ok();
        }
        if let Some(collection) = map.get("collection") {
            self.collection = serde_json::from_value(collection.clone()).ok();
        }
        if let Some(item) = map.get("item") {
            self.item = if item.is_null() {
                None
            } else {
                Some(item.clone())
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// `None` until the first connectivity signal, then strictly
    /// `Some(true)` / `Some(false)`.
    pub online: Option<bool>,
    pub selected: Selected,
    /// Latched from the host app's `reportActiveURL` preference.
    pub report_active_url: bool,
    /// Latched from the host app's `automaticSnapshots` preference.
    pub auto_snapshot: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            online: None,
            selected: Selected::default(),
            report_active_url: true,
            auto_snapshot: false,
        }
    }
}

/// Shared handle to the session state.
///
/// Clones share the same underlying state. Lock poisoning is recovered
/// by adopting the inner value; no accessor panics.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn online(&self) -> Option<bool> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .online
    }

    pub fn selected(&self) -> Selected {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .selected
            .clone()
    }

    /// Set the online flag. Returns true if the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let mut state = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = state.online != Some(online);
        state.online = Some(online);
        changed
    }

    /// Replace the whole selection (from an `init` stream event).
    pub fn replace_selected(&self, selected: Selected) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .selected = selected;
    }

    /// Merge a partial selection patch (from a `select` stream event).
    pub fn merge_selected(&self, patch: &Value) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .selected
            .merge(patch);
    }

    /// Latch preference flags reported by the host app.
    pub fn apply_prefs(&self, report_active_url: bool, auto_snapshot: bool) {
        let mut state = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.report_active_url = report_active_url;
        state.auto_snapshot = auto_snapshot;
    }
}
