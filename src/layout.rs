//! The reserved `.mirra/` subtree in one place.
//!
//! Everything the model persists or exchanges through well-known files
//! lives here: the staging area, the shared tombstones, the local-only
//! state, and the replicated org documents. User processes must never
//! write below `.mirra/`.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ObjectId;

/// Name of the reserved subtree under every replica root.
pub const RESERVED_DIR: &str = ".mirra";

/// Name of ignore-rule files, both the reserved one and user-owned ones.
pub const IGNORE_FILE: &str = ".mirraignore";

/// Subpath of the replica-set identity token.
pub const AUTH_SUBPATH: &str = ".mirra/org/auth.json";

const REMOVE_PREFIX: &str = ".mirra/remove/";

/// Well-known locations under one replica root.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn reserved_dir(&self) -> PathBuf {
        self.root.join(RESERVED_DIR)
    }

    /// Staging area the transport fills before an apply.
    pub fn temp_dir(&self) -> PathBuf {
        self.reserved_dir().join("temp")
    }

    pub fn temp_path(&self, id: &ObjectId) -> PathBuf {
        self.temp_dir().join(id.to_string())
    }

    /// Shared tombstone directory, replicated across the set.
    pub fn remove_dir(&self) -> PathBuf {
        self.reserved_dir().join("remove")
    }

    pub fn remove_path(&self, id: &ObjectId) -> PathBuf {
        self.remove_dir().join(id.to_string())
    }

    pub fn check_dir(&self, id: &ObjectId) -> PathBuf {
        self.remove_path(id).join("check")
    }

    pub fn done_dir(&self, id: &ObjectId) -> PathBuf {
        self.remove_path(id).join("done")
    }

    /// Local-only state; never replicated (the reserved ignore file
    /// excludes it from every scan).
    pub fn local_dir(&self) -> PathBuf {
        self.reserved_dir().join("local")
    }

    /// Local-only remembered tombstones, kept after the shared tombstone
    /// has been purged.
    pub fn removed_dir(&self) -> PathBuf {
        self.local_dir().join("removed")
    }

    pub fn removed_path(&self, id: &ObjectId) -> PathBuf {
        self.removed_dir().join(id.to_string())
    }

    /// Persisted model snapshot.
    pub fn model_path(&self) -> PathBuf {
        self.local_dir().join("model.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.local_dir().join("config.toml")
    }

    /// Replicated org documents (auth token, peer roster).
    pub fn org_dir(&self) -> PathBuf {
        self.reserved_dir().join("org")
    }

    pub fn auth_path(&self) -> PathBuf {
        self.org_dir().join("auth.json")
    }

    pub fn peers_path(&self) -> PathBuf {
        self.org_dir().join("peers.toml")
    }

    /// Subpath of a shared tombstone root, as seen in tracked sets and
    /// foreign snapshots.
    pub fn remove_subpath(id: &ObjectId) -> String {
        format!("{}{}", REMOVE_PREFIX, id)
    }

    /// Whether a subpath lies inside the shared tombstone subtree.
    pub fn in_remove_subtree(subpath: &str) -> bool {
        subpath.starts_with(REMOVE_PREFIX)
    }

    /// Split a tombstone-subtree subpath into the object id it belongs to
    /// and whether it is the tombstone root itself (as opposed to a
    /// check/done descendant).
    pub fn parse_remove_subpath(subpath: &str) -> Option<(ObjectId, bool)> {
        let rest = subpath.strip_prefix(REMOVE_PREFIX)?;
        let (id_segment, is_root) = match rest.split_once('/') {
            Some((id, _)) => (id, false),
            None => (rest, true),
        };
        let id = ObjectId::parse(id_segment).ok()?;
        Some((id, is_root))
    }
}

/// Replica-set identity token, content-compared by the sync planner to
/// refuse mixing incompatible sets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub replica_set: Uuid,
}

impl AuthToken {
    pub fn generate() -> Self {
        Self {
            replica_set: Uuid::new_v4(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(io::Error::other)
    }

    pub fn store(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Whether `root` holds an initialized reserved subtree.
pub fn is_replica_root(root: &Path) -> bool {
    root.join(RESERVED_DIR).is_dir()
}

/// Initialize the reserved subtree for a brand-new replica set.
pub fn scaffold(root: &Path) -> io::Result<AuthToken> {
    let auth = AuthToken::generate();
    scaffold_with_auth(root, &auth)?;
    Ok(auth)
}

/// Initialize the reserved subtree for a replica joining an existing set
/// (same auth token as the peers it will sync with).
pub fn scaffold_with_auth(root: &Path, auth: &AuthToken) -> io::Result<()> {
    let layout = Layout::new(root);
    std::fs::create_dir_all(layout.temp_dir())?;
    std::fs::create_dir_all(layout.remove_dir())?;
    std::fs::create_dir_all(layout.removed_dir())?;
    std::fs::create_dir_all(layout.org_dir())?;
    std::fs::write(
        layout.reserved_dir().join(IGNORE_FILE),
        "# local-only state never replicates\n/local\n/temp\n",
    )?;
    auth.store(&layout.auth_path())
}
