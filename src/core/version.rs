//! Layer 2: Version vectors
//!
//! Per-peer monotonic counters - the sole conflict-detection mechanism.
//! A vector that includes another may overwrite it; incomparable vectors
//! are a conflict the caller must refuse.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::PeerId;

/// Version vector mapping peer ids to monotonic counters.
///
/// Missing entries count as zero, so `{}` and `{a: 0}` compare equal in
/// `includes` but not in `==`; snapshots never store zero entries because
/// `increase` starts at one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector {
    counters: BTreeMap<PeerId, u64>,
}

impl VersionVector {
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    /// Vector with a single `{peer: 1}` entry, the birth version of a
    /// locally created object.
    pub fn birth(peer: &PeerId) -> Self {
        let mut v = Self::new();
        v.increase(peer);
        v
    }

    pub fn get(&self, peer: &PeerId) -> u64 {
        self.counters.get(peer).copied().unwrap_or(0)
    }

    /// Record one new local event for `peer`, creating the entry at 1.
    pub fn increase(&mut self, peer: &PeerId) {
        *self.counters.entry(*peer).or_insert(0) += 1;
    }

    /// No entries, or all entries zero.
    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Pointwise dominance: `self[k] >= other[k]` for every key of `other`.
    ///
    /// "I already know every event this vector describes."
    pub fn includes(&self, other: &VersionVector) -> bool {
        other
            .counters
            .iter()
            .all(|(peer, &counter)| self.get(peer) >= counter)
    }

    /// Merge two vectors into their pointwise max.
    ///
    /// Succeeds only when the vectors are ordered (one includes the other,
    /// equality included). `None` means concurrent histories - a conflict
    /// the caller must surface rather than resolve.
    pub fn merge(&self, other: &VersionVector) -> Option<VersionVector> {
        if !self.includes(other) && !other.includes(self) {
            return None;
        }
        let mut merged = self.clone();
        for (peer, &counter) in &other.counters {
            let entry = merged.counters.entry(*peer).or_insert(0);
            if counter > *entry {
                *entry = counter;
            }
        }
        Some(merged)
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (peer, counter)) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", peer, counter)?;
        }
        write!(f, "}}")
    }
}
