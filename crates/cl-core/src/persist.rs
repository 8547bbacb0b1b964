//! Persisted lock file.
//!
//! The engine never touches storage. The plugin shell loads this document at
//! startup, hands it to the engine, and saves whatever [`LockFile`] the
//! engine gives back after a change.
//!
//! ```json
//! { "version": 1, "locked": { "boards/plan.canvas": ["a1", "b2"] }, "settings": { } }
//! ```
//!
//! Version 0 (unversioned) files are a bare `{ path: [ids] }` map and are
//! migrated on load.

use crate::id::{CanvasPath, NodeId};
use crate::locked::LockedSet;
use crate::settings::LockSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format version.
pub const LOCK_FILE_VERSION: u32 = 1;

/// Durable state: locked ids per canvas, plus options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,
    #[serde(default)]
    pub locked: BTreeMap<String, Vec<NodeId>>,
    #[serde(default)]
    pub settings: LockSettings,
}

impl LockFile {
    /// Build a current-version file from in-memory state.
    pub fn from_state(locked: &LockedSet, settings: &LockSettings) -> Self {
        let locked = locked
            .canvases()
            .filter_map(|canvas| {
                let ids = locked.ids(canvas);
                (!ids.is_empty()).then(|| (canvas.as_str().to_string(), ids.to_vec()))
            })
            .collect();
        Self {
            version: LOCK_FILE_VERSION,
            locked,
            settings: settings.clone(),
        }
    }

    /// Parse any known version. Empty input is a fresh default file.
    pub fn from_json(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::current_default());
        }
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| format!("invalid lock file: {e}"))?;
        let version = match value.get("version") {
            None => 0,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| format!("invalid lock file version: {v}"))?,
        };
        let mut file = match version {
            0 => {
                let locked: BTreeMap<String, Vec<NodeId>> = serde_json::from_value(value)
                    .map_err(|e| format!("invalid legacy lock file: {e}"))?;
                log::debug!("migrating legacy lock file ({} canvases)", locked.len());
                Self {
                    version: LOCK_FILE_VERSION,
                    locked,
                    settings: LockSettings::default(),
                }
            }
            LOCK_FILE_VERSION => serde_json::from_value::<LockFile>(value)
                .map_err(|e| format!("invalid lock file: {e}"))?,
            other => return Err(format!("unsupported lock file version {other}")),
        };
        file.normalize();
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("failed to encode lock file: {e}"))
    }

    /// In-memory locked set. Duplicate ids collapse.
    pub fn locked_set(&self) -> LockedSet {
        let mut set = LockedSet::new();
        for (path, ids) in &self.locked {
            let canvas = CanvasPath::intern(path);
            for id in ids {
                set.insert(canvas, *id);
            }
        }
        set
    }

    fn current_default() -> Self {
        Self {
            version: LOCK_FILE_VERSION,
            ..Self::default()
        }
    }

    /// Drop duplicate ids and empty canvases.
    fn normalize(&mut self) {
        self.version = LOCK_FILE_VERSION;
        for ids in self.locked.values_mut() {
            let mut seen = Vec::with_capacity(ids.len());
            ids.retain(|id| {
                if seen.contains(id) {
                    false
                } else {
                    seen.push(*id);
                    true
                }
            });
        }
        self.locked.retain(|_, ids| !ids.is_empty());
    }
}
