//! Layer 1: Identity atoms
//!
//! ObjectId: stable identity of one tracked object
//! PeerId: identity of one replica in the set
//! ContentHash: SHA-256 content address of a file body

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::{CoreError, InvalidId};

/// Object identifier - assigned once at creation, preserved across renames
/// and through the tombstone lifecycle.
///
/// Two replicas refer to the same logical object iff they carry the same
/// ObjectId. Opaque to the model; the UUID form only pins down entropy.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Mint a fresh id for a newly observed object.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let uuid = Uuid::parse_str(s).map_err(|e| InvalidId::Object {
            raw: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replica identifier.
///
/// Doubles as the marker file name under a tombstone's `check/` and `done/`
/// directories, so the string form must stay filesystem-safe.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil peer, used by models built from a descriptor tree alone.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let uuid = Uuid::parse_str(s).map_err(|e| InvalidId::Peer {
            raw: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash - SHA-256 of file bytes.
///
/// Directories carry no content; their hash is the empty state and
/// serializes as `""` so snapshots and descriptors stay comparable across
/// replicas.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(Option<[u8; 32]>);

impl ContentHash {
    /// The directory / no-content state.
    pub const NONE: Self = Self(None);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Some(bytes))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Hash a file's bytes from disk.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        let digest: [u8; 32] = hasher.finalize().into();
        Ok(Self(Some(digest)))
    }

    pub fn to_hex(&self) -> String {
        match &self.0 {
            None => String::new(),
            Some(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        }
    }

    /// Parse from hex; the empty string is the directory state.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() {
            return Ok(Self::NONE);
        }
        if s.len() != 64 {
            return Err(InvalidId::ContentHash {
                raw: s.to_string(),
                reason: format!("must be 64 hex chars (got {})", s.len()),
            }
            .into());
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| InvalidId::ContentHash {
                raw: s.to_string(),
                reason: "contains invalid UTF-8".into(),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| InvalidId::ContentHash {
                raw: s.to_string(),
                reason: format!("contains invalid hex: {}", hex),
            })?;
        }
        Ok(Self(Some(bytes)))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => write!(f, "ContentHash(none)"),
            Some(_) => write!(f, "ContentHash({})", self.to_hex()),
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
