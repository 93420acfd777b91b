//! Tombstone lifecycle tunables (normative defaults).
//!
//! Values are intentionally explicit about their units to avoid confusion.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tunables for the removal sweep, loadable from the replica's local
/// config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Age after which a shared tombstone that is still waiting on peer
    /// acknowledgements is reported as possibly orphaned.
    pub removal_orphan_timeout_ms: u64,
    /// Age after which a local-only remembered tombstone is dropped; by
    /// then the replica set has long finished purging.
    pub removal_local_timeout_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            removal_orphan_timeout_ms: 30 * 24 * 60 * 60 * 1000,
            removal_local_timeout_ms: 180 * 24 * 60 * 60 * 1000,
        }
    }
}

impl Limits {
    /// Load from a TOML file, falling back to defaults when the file is
    /// absent or unreadable. A malformed file is worth a warning; a
    /// missing one is the common case.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&raw) {
            Ok(limits) => limits,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                Self::default()
            }
        }
    }
}
