//! Peer roster: replica-set membership for tombstone bookkeeping.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::PeerId;

/// The replica-set membership list, stored as `peers.toml` inside the
/// reserved org subtree so it replicates like any other file.
///
/// Every listed peer must acknowledge a removal before its shared
/// tombstone may be purged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRoster {
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

impl PeerRoster {
    pub fn from_toml_str(input: &str) -> Result<Self, RosterError> {
        let roster: PeerRoster = toml::from_str(input)?;
        roster.validate()?;
        Ok(roster)
    }

    /// Read the roster file; a missing file is an empty roster (a replica
    /// that has not yet been introduced to any peer).
    pub fn load_or_default(path: &Path) -> Result<Self, RosterError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Ok(Self::default()),
        };
        Self::from_toml_str(&raw)
    }

    pub fn entry(&self, peer_id: &PeerId) -> Option<&PeerEntry> {
        self.peers.iter().find(|entry| &entry.peer_id == peer_id)
    }

    /// Every member's id, excluding `self_id`.
    pub fn peer_ids(&self, self_id: &PeerId) -> Vec<PeerId> {
        self.peers
            .iter()
            .map(|entry| entry.peer_id)
            .filter(|id| id != self_id)
            .collect()
    }

    fn validate(&self) -> Result<(), RosterError> {
        let mut ids = BTreeSet::new();
        let mut names = BTreeSet::new();

        for entry in &self.peers {
            if entry.name.trim().is_empty() {
                return Err(RosterError::InvalidName {
                    reason: "name cannot be empty".to_string(),
                });
            }
            if !ids.insert(entry.peer_id) {
                return Err(RosterError::DuplicatePeerId {
                    peer_id: entry.peer_id,
                });
            }
            if !names.insert(entry.name.clone()) {
                return Err(RosterError::DuplicateName {
                    name: entry.name.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub peer_id: PeerId,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("peer roster parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate peer_id {peer_id}")]
    DuplicatePeerId { peer_id: PeerId },
    #[error("duplicate peer name {name}")]
    DuplicateName { name: String },
    #[error("invalid peer name: {reason}")]
    InvalidName { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_roster_and_excludes_self() {
        let input = r#"
[[peers]]
peer_id = "00000000-0000-0000-0000-000000000001"
name = "alpha"

[[peers]]
peer_id = "00000000-0000-0000-0000-000000000002"
name = "beta"
"#;

        let roster = PeerRoster::from_toml_str(input).unwrap();
        assert_eq!(roster.peers.len(), 2);

        let alpha = PeerId::parse("00000000-0000-0000-0000-000000000001").unwrap();
        let others = roster.peer_ids(&alpha);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].to_string(), "00000000-0000-0000-0000-000000000002");
        assert_eq!(roster.entry(&alpha).unwrap().name, "alpha");
    }

    #[test]
    fn rejects_duplicate_peer_id() {
        let input = r#"
[[peers]]
peer_id = "00000000-0000-0000-0000-000000000001"
name = "alpha"

[[peers]]
peer_id = "00000000-0000-0000-0000-000000000001"
name = "beta"
"#;

        let err = PeerRoster::from_toml_str(input).unwrap_err();
        assert!(matches!(err, RosterError::DuplicatePeerId { .. }));
    }

    #[test]
    fn rejects_duplicate_name() {
        let input = r#"
[[peers]]
peer_id = "00000000-0000-0000-0000-000000000001"
name = "alpha"

[[peers]]
peer_id = "00000000-0000-0000-0000-000000000002"
name = "alpha"
"#;

        let err = PeerRoster::from_toml_str(input).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateName { .. }));
    }

    #[test]
    fn missing_file_is_an_empty_roster() {
        let dir = tempfile::tempdir().unwrap();
        let roster = PeerRoster::load_or_default(&dir.path().join("peers.toml")).unwrap();
        assert!(roster.peers.is_empty());
        assert!(
            roster
                .peer_ids(&PeerId::new(Uuid::from_bytes([1; 16])))
                .is_empty()
        );
    }
}
