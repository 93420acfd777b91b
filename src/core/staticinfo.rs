//! Layer 3: Static info
//!
//! The per-path record the model must keep between update calls: object
//! id and version for reapplication, plus content hash and mtime for
//! change detection.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::identity::{ContentHash, ObjectId, PeerId};
use super::object::ObjectInfo;
use super::time::WallClock;
use super::version::VersionVector;

/// Metadata for one tracked subpath.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaticInfo {
    pub id: ObjectId,
    pub directory: bool,
    pub content: ContentHash,
    pub mtime: WallClock,
    pub version: VersionVector,
}

impl StaticInfo {
    /// Mint a record for a locally observed path: fresh id, birth version
    /// `{self: 1}`, hash and mtime taken from disk.
    pub fn from_disk(path: &Path, self_id: &PeerId) -> io::Result<Self> {
        let meta = std::fs::symlink_metadata(path)?;
        let directory = meta.is_dir();
        let content = if directory {
            ContentHash::NONE
        } else {
            ContentHash::of_file(path)?
        };
        Ok(Self {
            id: ObjectId::generate(),
            directory,
            content,
            mtime: WallClock::from_system_time(meta.modified()?),
            version: VersionVector::birth(self_id),
        })
    }

    /// Refresh hash and mtime to match the file on disk.
    pub fn refresh_from_disk(&mut self, path: &Path) -> io::Result<()> {
        if !self.directory {
            self.content = ContentHash::of_file(path)?;
        }
        let meta = std::fs::symlink_metadata(path)?;
        self.mtime = WallClock::from_system_time(meta.modified()?);
        Ok(())
    }

    /// Adopt the remote identity: id, version, directory flag, and content
    /// hash all come from the descriptor.
    pub fn adopt(&mut self, remote: &ObjectInfo) {
        self.id = remote.id;
        self.version = remote.version.clone();
        self.directory = remote.directory;
        self.content = remote.content;
    }
}
