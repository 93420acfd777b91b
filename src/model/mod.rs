//! The per-replica synchronization model.
//!
//! A [`Model`] owns one directory tree: it remembers which subpaths exist
//! and their metadata, turns filesystem changes into operation events,
//! filters and applies inbound operations, and drives the tombstone
//! protocol. All public operations must be serialized by the caller; the
//! model is single-threaded with cooperative entry points.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};

use crate::core::{
    ContentHash, Limits, ObjectId, ObjectInfo, Operation, PeerId, StaticInfo, TreePath,
    UpdateMessage, WallClock,
};
use crate::layout::{self, Layout, RESERVED_DIR};

mod apply;
pub mod diff;
pub mod error;
pub mod filter;
mod remove;
mod scan;
mod sync;

pub use diff::TreeDiff;
pub use error::ModelError;
pub use filter::CheckOutcome;

/// Model of one replica's directory and its contents.
#[derive(Debug)]
pub struct Model {
    pub(crate) root: TreePath,
    pub(crate) self_id: PeerId,
    pub(crate) layout: Layout,
    pub(crate) limits: Limits,
    /// Invariant: identical to the key set of `static_infos`.
    pub(crate) tracked_paths: BTreeSet<String>,
    pub(crate) static_infos: BTreeMap<String, StaticInfo>,
    events: Option<Sender<UpdateMessage>>,
}

/// On-disk form of the static-info store (`.mirra/local/model.json`).
#[derive(Serialize)]
struct SnapshotRef<'a> {
    self_id: &'a PeerId,
    tracked_paths: &'a BTreeSet<String>,
    static_infos: &'a BTreeMap<String, StaticInfo>,
}

#[derive(Deserialize)]
struct Snapshot {
    self_id: PeerId,
    tracked_paths: BTreeSet<String>,
    static_infos: BTreeMap<String, StaticInfo>,
}

impl Model {
    /// Create a fresh model for an initialized replica root. Does not
    /// scan; call [`Model::update`] explicitly.
    pub fn create(root: &Path, self_id: PeerId) -> Result<Model, ModelError> {
        if !layout::is_replica_root(root) {
            return Err(ModelError::NotReplicaRoot {
                root: root.to_path_buf(),
            });
        }
        let layout = Layout::new(root);
        let limits = Limits::load_or_default(&layout.config_path());
        Ok(Model {
            root: TreePath::root_of(root),
            self_id,
            layout,
            limits,
            tracked_paths: BTreeSet::new(),
            static_infos: BTreeMap::new(),
            events: None,
        })
    }

    /// Restore a model from its persisted snapshot.
    pub fn load(root: &Path) -> Result<Model, ModelError> {
        if !layout::is_replica_root(root) {
            return Err(ModelError::NotReplicaRoot {
                root: root.to_path_buf(),
            });
        }
        let layout = Layout::new(root);
        let bytes = std::fs::read(layout.model_path())?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let keys: BTreeSet<String> = snapshot.static_infos.keys().cloned().collect();
        if keys != snapshot.tracked_paths {
            return Err(ModelError::ModelInconsistent {
                path: layout.model_path().display().to_string(),
            });
        }
        let limits = Limits::load_or_default(&layout.config_path());
        Ok(Model {
            root: TreePath::root_of(root),
            self_id: snapshot.self_id,
            layout,
            limits,
            tracked_paths: snapshot.tracked_paths,
            static_infos: snapshot.static_infos,
            events: None,
        })
    }

    /// Build an in-memory model from a descriptor tree alone. The result
    /// has no filesystem behind it; it exists to diff two snapshots.
    pub fn build(foreign_root: &ObjectInfo) -> Model {
        let mut model = Model {
            root: TreePath::root_of(""),
            self_id: PeerId::nil(),
            layout: Layout::new(""),
            limits: Limits::default(),
            tracked_paths: BTreeSet::new(),
            static_infos: BTreeMap::new(),
            events: None,
        };
        let now = WallClock::now();
        foreign_root.for_each(&mut |obj| {
            model.tracked_paths.insert(obj.path.clone());
            model.static_infos.insert(
                obj.path.clone(),
                StaticInfo {
                    id: obj.id,
                    directory: obj.directory,
                    content: obj.content,
                    mtime: now,
                    version: obj.version.clone(),
                },
            );
        });
        model
    }

    /// Register the single outbound event sink. The model only ever
    /// writes to it.
    pub fn register(&mut self, sink: Sender<UpdateMessage>) {
        self.events = Some(sink);
    }

    pub fn root(&self) -> &Path {
        self.root.root()
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    /// Update the complete model state.
    pub fn update(&mut self) -> Result<(), ModelError> {
        let scope = self.root.full_path();
        self.partial_update(&scope)
    }

    /// Update the model for one scope (the FULL path of a subtree).
    /// Applies the local diff, sweeps the tombstones, then persists.
    pub fn partial_update(&mut self, scope: &Path) -> Result<(), ModelError> {
        self.update_local(scope)?;
        self.check_remove()?;
        self.store()
    }

    /// Apply an inbound operation. The caller is expected to have passed
    /// it through [`Model::check_message`] first; the filter is not
    /// re-invoked here.
    pub fn apply_update_message(&mut self, msg: &UpdateMessage) -> Result<(), ModelError> {
        let path = self.root.join(&msg.object.path);
        match msg.operation {
            Operation::Create => self.apply_create(&path, Some(&msg.object))?,
            Operation::Modify => self.apply_modify(&path, Some(&msg.object))?,
            Operation::Remove => self.apply_remove(&path, Some(&msg.object))?,
        }
        self.store()
    }

    /// Reconcile the model with what survives on disk: creates first
    /// (parents before children), then modifies, then removes. Individual
    /// failures are logged; the pass continues.
    ///
    /// The scan always covers the whole tree; `scope` only gates which
    /// diffs are applied. A partial scan would misread the scope's
    /// ancestors (tracked, but outside the scan) as removals.
    pub(crate) fn update_local(&mut self, scope: &Path) -> Result<(), ModelError> {
        let current = scan::scan_subtree(&self.root, &self.root.full_path());
        let diff = diff::compare(self.root.root(), &self.tracked_paths, &current, scope);
        for sub in &diff.created {
            let path = self.root.join(sub);
            if let Err(e) = self.apply_create(&path, None) {
                tracing::warn!("local create of `{sub}` failed: {e}");
            }
        }
        for sub in &diff.modified {
            let path = self.root.join(sub);
            if self.is_modified(&path)
                && let Err(e) = self.apply_modify(&path, None)
            {
                tracing::warn!("local modify of `{sub}` failed: {e}");
            }
        }
        for sub in &diff.removed {
            if !self.tracked_paths.contains(sub) {
                // A parent's removal already swept this path.
                continue;
            }
            let path = self.root.join(sub);
            if let Err(e) = self.apply_remove(&path, None) {
                tracing::warn!("local remove of `{sub}` failed: {e}");
            }
        }
        Ok(())
    }

    /// Materialize the tracked set as a descriptor tree, children linked
    /// by depth and containment. Fast: nothing is re-hashed.
    pub fn read(&self) -> Result<ObjectInfo, ModelError> {
        if !self.tracked_paths.contains("") {
            return Err(ModelError::Untracked {
                path: String::new(),
            });
        }
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for sub in &self.tracked_paths {
            if sub.is_empty() {
                continue;
            }
            let parent = sub.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
            children.entry(parent).or_default().push(sub);
        }
        self.read_subtree("", &children)
    }

    fn read_subtree(
        &self,
        sub: &str,
        children: &BTreeMap<&str, Vec<&str>>,
    ) -> Result<ObjectInfo, ModelError> {
        let mut obj = self.info_subpath(sub)?;
        if obj.directory
            && let Some(child_subs) = children.get(sub)
        {
            for child in child_subs {
                match self.read_subtree(child, children) {
                    Ok(child_obj) => obj.children.push(child_obj),
                    Err(e) => tracing::warn!("read skipping `{child}`: {e}"),
                }
            }
        }
        Ok(obj)
    }

    /// Persist the static-info store to `.mirra/local/model.json`.
    pub fn store(&self) -> Result<(), ModelError> {
        let snapshot = SnapshotRef {
            self_id: &self.self_id,
            tracked_paths: &self.tracked_paths,
            static_infos: &self.static_infos,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        std::fs::write(self.layout.model_path(), json)?;
        Ok(())
    }

    /// True when nothing is tracked beyond the reserved subtree.
    pub fn is_empty(&self) -> bool {
        !self.tracked_paths.iter().any(|sub| {
            !sub.is_empty() && sub.as_str() != RESERVED_DIR && !sub.starts_with(".mirra/")
        })
    }

    /// Whether a full path is currently tracked.
    pub fn is_tracked(&self, full: &Path) -> bool {
        self.root
            .resolve(full)
            .is_some_and(|path| self.tracked_paths.contains(path.subpath()))
    }

    /// Descriptor for one tracked location.
    pub fn info_at(&self, path: &TreePath) -> Result<ObjectInfo, ModelError> {
        self.info_subpath(path.subpath())
    }

    /// Descriptor for the object with the given id, wherever it lives.
    pub fn info_for(&self, id: &ObjectId) -> Result<ObjectInfo, ModelError> {
        let sub = self.subpath_for(id).ok_or(ModelError::Untracked {
            path: id.to_string(),
        })?;
        self.info_subpath(&sub)
    }

    /// Subpath of the object with the given id.
    pub fn subpath_for(&self, id: &ObjectId) -> Option<String> {
        self.static_infos
            .iter()
            .find(|(_, stin)| &stin.id == id)
            .map(|(sub, _)| sub.clone())
    }

    /// Id of the object at the given location.
    pub fn id_at(&self, path: &TreePath) -> Result<ObjectId, ModelError> {
        self.static_infos
            .get(path.subpath())
            .map(|stin| stin.id)
            .ok_or(ModelError::Untracked {
                path: path.subpath().to_string(),
            })
    }

    pub(crate) fn info_subpath(&self, sub: &str) -> Result<ObjectInfo, ModelError> {
        if !self.tracked_paths.contains(sub) {
            return Err(ModelError::Untracked {
                path: sub.to_string(),
            });
        }
        let stin = self
            .static_infos
            .get(sub)
            .ok_or(ModelError::ModelInconsistent {
                path: sub.to_string(),
            })?;
        let path = self.root.join(sub);
        Ok(ObjectInfo {
            id: stin.id,
            name: path.name().to_string(),
            path: sub.to_string(),
            directory: stin.directory,
            content: if stin.directory {
                ContentHash::NONE
            } else {
                stin.content
            },
            version: stin.version.clone(),
            children: Vec::new(),
        })
    }

    /// Whether a tracked file's bytes changed: mtime first, hash only on
    /// an mtime mismatch. Directories are never modified.
    pub(crate) fn is_modified(&self, path: &TreePath) -> bool {
        let Some(stin) = self.static_infos.get(path.subpath()) else {
            tracing::debug!("static info lookup failed for `{}`", path.subpath());
            return false;
        };
        if stin.directory {
            return false;
        }
        let full = path.full_path();
        match std::fs::symlink_metadata(&full).and_then(|meta| meta.modified()) {
            Ok(modified) => {
                if WallClock::from_system_time(modified) == stin.mtime {
                    return false;
                }
            }
            // Continue to the hash check; a stat failure alone is not a
            // modification verdict.
            Err(e) => tracing::debug!("stat failed for `{}`: {e}", path.subpath()),
        }
        match ContentHash::of_file(&full) {
            Ok(hash) => hash != stin.content,
            Err(e) => {
                tracing::debug!("hash failed for `{}`: {e}", path.subpath());
                false
            }
        }
    }

    /// Every ancestor up to the root must already be tracked.
    pub(crate) fn parents_exist(&self, path: &TreePath) -> bool {
        let mut cursor = path.clone();
        while !cursor.is_root() {
            cursor = cursor.parent();
            if !self.tracked_paths.contains(cursor.subpath()) {
                return false;
            }
        }
        true
    }

    /// Deliver one event to the registered sink. The root object itself
    /// is never announced.
    pub(crate) fn notify(&self, operation: Operation, object: ObjectInfo) {
        if object.path.is_empty() {
            tracing::debug!("suppressing event for the root object");
            return;
        }
        tracing::debug!("notify {}: {}", operation, object.name);
        if let Some(sink) = &self.events
            && sink.send(UpdateMessage::new(operation, object)).is_err()
        {
            tracing::warn!("event sink disconnected, dropping event");
        }
    }
}
