//! Operation appliers: create, modify, remove.
//!
//! Each applier takes a location and an optional remote descriptor; no
//! descriptor means the operation is of local origin. File bytes for
//! remote operations come from the staging area, never from the wire.

use std::path::Path;

use crate::core::{ObjectId, ObjectInfo, Operation, StaticInfo, TreePath};
use crate::layout::Layout;

use super::error::ModelError;
use super::Model;

impl Model {
    /// Apply a create. For remote file creates the object's bytes must
    /// already sit in the staging area under its id.
    pub fn apply_create(
        &mut self,
        path: &TreePath,
        remote: Option<&ObjectInfo>,
    ) -> Result<(), ModelError> {
        // A create must not leave a hanging object.
        if !self.parents_exist(path) {
            return Err(ModelError::ParentsMissing {
                path: path.subpath().to_string(),
            });
        }
        let full = path.full_path();
        let on_disk = std::fs::symlink_metadata(&full).is_ok();
        if self.tracked_paths.contains(path.subpath()) {
            return Err(if on_disk {
                ModelError::Conflict {
                    path: path.subpath().to_string(),
                }
            } else {
                ModelError::IllegalFileState {
                    path: path.subpath().to_string(),
                }
            });
        }
        let stin = match remote {
            Some(remote) => {
                if self.is_removed(&remote.id) {
                    tracing::warn!("received create for object pending removal: {}", remote.id);
                    return Ok(());
                }
                if on_disk {
                    return Err(ModelError::Conflict {
                        path: path.subpath().to_string(),
                    });
                }
                if remote.directory {
                    std::fs::create_dir(&full)?;
                } else {
                    self.stage_into(&remote.id, &full)?;
                }
                let mut stin = StaticInfo::from_disk(&full, &self.self_id)?;
                stin.adopt(remote);
                stin
            }
            None => {
                if !on_disk {
                    return Err(ModelError::IllegalFileState {
                        path: path.subpath().to_string(),
                    });
                }
                StaticInfo::from_disk(&full, &self.self_id)?
            }
        };
        self.tracked_paths.insert(path.subpath().to_string());
        self.static_infos.insert(path.subpath().to_string(), stin);
        if let Ok(obj) = self.info_at(path) {
            self.notify(Operation::Create, obj);
        }
        Ok(())
    }

    /// Apply a modify. Remote modifies merge versions and take their
    /// bytes from staging; local modifies bump `self`'s counter.
    pub fn apply_modify(
        &mut self,
        path: &TreePath,
        remote: Option<&ObjectInfo>,
    ) -> Result<(), ModelError> {
        let sub = path.subpath().to_string();
        if let Some(remote) = remote
            && remote.version.is_empty()
        {
            return Err(ModelError::EmptyVersion { path: sub });
        }
        let full = path.full_path();
        if std::fs::symlink_metadata(&full).is_err() {
            return Err(ModelError::IllegalFileState { path: sub });
        }
        if !self.tracked_paths.contains(&sub) {
            return Err(ModelError::IllegalFileState { path: sub });
        }
        let Some(mut stin) = self.static_infos.get(&sub).cloned() else {
            return Err(ModelError::ModelInconsistent { path: sub });
        };
        let local_modified = self.is_modified(path);
        match remote {
            Some(remote) => {
                if remote.directory {
                    tracing::warn!("modify not supported for directories, skipping `{sub}`");
                    return Ok(());
                }
                if local_modified {
                    tracing::debug!("unreplicated local change under remote modify of `{sub}`");
                    return Err(ModelError::Conflict { path: sub });
                }
                let Some(merged) = stin.version.merge(&remote.version) else {
                    tracing::debug!("concurrent versions on `{sub}`");
                    return Err(ModelError::Conflict { path: sub });
                };
                stin.version = merged;
                self.stage_into(&stin.id, &full)?;
            }
            None => {
                if !local_modified {
                    tracing::warn!("modify of `{sub}` without an actual change");
                    return Ok(());
                }
                let self_id = self.self_id;
                stin.version.increase(&self_id);
            }
        }
        stin.refresh_from_disk(&full)?;
        self.static_infos.insert(sub, stin);
        if let Ok(obj) = self.info_at(path) {
            self.notify(Operation::Modify, obj);
        }
        Ok(())
    }

    /// Apply a remove. Tombstone-subtree paths are the sweep's business
    /// and succeed silently; the root and foreign-rooted paths are
    /// refused.
    pub fn apply_remove(
        &mut self,
        path: &TreePath,
        remote: Option<&ObjectInfo>,
    ) -> Result<(), ModelError> {
        if Layout::in_remove_subtree(path.subpath()) {
            tracing::debug!(
                "remove inside the tombstone subtree is handled by the sweep: `{}`",
                path.subpath()
            );
            return Ok(());
        }
        if path.is_root() || path.root() != self.root.root() {
            tracing::warn!(
                "refusing to remove illegal path: {}",
                path.full_path().display()
            );
            return Ok(());
        }
        match remote {
            None => self.local_remove(path),
            Some(remote) => self.remote_remove(path, remote),
        }
    }

    /// Move a staged update file into place, atomically.
    fn stage_into(&self, id: &ObjectId, target: &Path) -> Result<(), ModelError> {
        let staged = self.layout.temp_path(id);
        if std::fs::symlink_metadata(&staged).is_err() {
            return Err(ModelError::MissingUpdateFile { id: *id });
        }
        std::fs::rename(&staged, target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentHash, PeerId, VersionVector};
    use crate::layout;
    use crate::model::Model;

    fn replica() -> (tempfile::TempDir, Model) {
        let dir = tempfile::tempdir().unwrap();
        layout::scaffold(dir.path()).unwrap();
        let mut model = Model::create(dir.path(), PeerId::generate()).unwrap();
        model.update().unwrap();
        (dir, model)
    }

    /// Remote file descriptor with its bytes already staged.
    fn descriptor(model: &Model, path: &str, peer: &PeerId) -> ObjectInfo {
        let remote = ObjectInfo {
            id: ObjectId::generate(),
            name: path.rsplit('/').next().unwrap_or("").to_string(),
            path: path.to_string(),
            directory: false,
            content: ContentHash::from_bytes([9; 32]),
            version: VersionVector::birth(peer),
            children: Vec::new(),
        };
        std::fs::write(model.layout.temp_path(&remote.id), b"staged bytes").unwrap();
        remote
    }

    #[test]
    fn local_create_requires_the_file_on_disk() {
        let (_dir, mut model) = replica();
        let path = model.root.join("ghost.txt");
        let err = model.apply_create(&path, None).unwrap_err();
        assert!(matches!(err, ModelError::IllegalFileState { .. }));
    }

    #[test]
    fn remote_create_moves_staged_bytes_into_place() {
        let (dir, mut model) = replica();
        let peer = PeerId::generate();
        let remote = descriptor(&model, "inbound.txt", &peer);

        let path = model.root.join("inbound.txt");
        model.apply_create(&path, Some(&remote)).unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("inbound.txt")).unwrap(),
            b"staged bytes"
        );
        let stin = model.static_infos.get("inbound.txt").unwrap();
        assert_eq!(stin.id, remote.id);
        assert_eq!(stin.version, remote.version);
        assert!(!model.layout.temp_path(&remote.id).exists());
    }

    #[test]
    fn remote_create_without_staging_is_retryable() {
        let (_dir, mut model) = replica();
        let peer = PeerId::generate();
        let remote = descriptor(&model, "inbound.txt", &peer);
        std::fs::remove_file(model.layout.temp_path(&remote.id)).unwrap();

        let path = model.root.join("inbound.txt");
        let err = model.apply_create(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::MissingUpdateFile { .. }));
        assert!(!model.tracked_paths.contains("inbound.txt"));
    }

    #[test]
    fn remote_create_over_existing_file_is_a_conflict() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("taken.txt"), b"local").unwrap();
        let peer = PeerId::generate();
        let remote = descriptor(&model, "taken.txt", &peer);

        let path = model.root.join("taken.txt");
        let err = model.apply_create(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::Conflict { .. }));
    }

    #[test]
    fn hanging_creates_are_rejected() {
        let (_dir, mut model) = replica();
        let peer = PeerId::generate();
        let remote = descriptor(&model, "no/such/parent.txt", &peer);
        let path = model.root.join("no/such/parent.txt");
        let err = model.apply_create(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::ParentsMissing { .. }));
    }

    #[test]
    fn remote_modify_merges_ordered_versions() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("b.txt"), b"v1").unwrap();
        model.update().unwrap();

        let self_id = model.self_id;
        let local = model.info_subpath("b.txt").unwrap();
        let peer2 = PeerId::generate();
        let mut remote = local.clone();
        remote.version.increase(&peer2);
        std::fs::write(model.layout.temp_path(&remote.id), b"v2").unwrap();

        let path = model.root.join("b.txt");
        model.apply_modify(&path, Some(&remote)).unwrap();

        let stin = model.static_infos.get("b.txt").unwrap();
        assert_eq!(stin.version.get(&self_id), 1);
        assert_eq!(stin.version.get(&peer2), 1);
        assert_eq!(std::fs::read(dir.path().join("b.txt")).unwrap(), b"v2");
    }

    #[test]
    fn concurrent_versions_conflict_without_state_change() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("c.txt"), b"v1").unwrap();
        model.update().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(dir.path().join("c.txt"), b"v2 local").unwrap();
        model.update().unwrap(); // version is now {self: 2}

        let before = model.static_infos.get("c.txt").unwrap().clone();
        let peer2 = PeerId::generate();
        let mut remote = model.info_subpath("c.txt").unwrap();
        // Foreign history: {self: 1, peer2: 1} - incomparable with {self: 2}.
        remote.version = VersionVector::birth(&model.self_id);
        remote.version.increase(&peer2);
        std::fs::write(model.layout.temp_path(&remote.id), b"v2 remote").unwrap();

        let path = model.root.join("c.txt");
        let err = model.apply_modify(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::Conflict { .. }));
        assert_eq!(model.static_infos.get("c.txt").unwrap(), &before);
        assert_eq!(
            std::fs::read(dir.path().join("c.txt")).unwrap(),
            b"v2 local"
        );
    }

    #[test]
    fn remote_modify_over_dirty_local_file_is_a_conflict() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("d.txt"), b"v1").unwrap();
        model.update().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        // Local edit that no update() has seen yet.
        std::fs::write(dir.path().join("d.txt"), b"dirty").unwrap();

        let peer2 = PeerId::generate();
        let mut remote = model.info_subpath("d.txt").unwrap();
        remote.version.increase(&peer2);
        std::fs::write(model.layout.temp_path(&remote.id), b"remote").unwrap();

        let path = model.root.join("d.txt");
        let err = model.apply_modify(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::Conflict { .. }));
    }

    #[test]
    fn empty_remote_version_is_rejected() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("e.txt"), b"v1").unwrap();
        model.update().unwrap();

        let mut remote = model.info_subpath("e.txt").unwrap();
        remote.version = VersionVector::new();
        let path = model.root.join("e.txt");
        let err = model.apply_modify(&path, Some(&remote)).unwrap_err();
        assert!(matches!(err, ModelError::EmptyVersion { .. }));
    }

    #[test]
    fn directory_modify_is_skipped_not_failed() {
        let (dir, mut model) = replica();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        model.update().unwrap();

        let mut remote = model.info_subpath("subdir").unwrap();
        remote.version.increase(&PeerId::generate());
        let before = model.static_infos.get("subdir").unwrap().clone();

        let path = model.root.join("subdir");
        model.apply_modify(&path, Some(&remote)).unwrap();
        assert_eq!(model.static_infos.get("subdir").unwrap(), &before);
    }

    #[test]
    fn local_noop_modify_emits_nothing() {
        let (dir, mut model) = replica();
        std::fs::write(dir.path().join("f.txt"), b"same").unwrap();
        model.update().unwrap();

        let (tx, rx) = crossbeam::channel::unbounded();
        model.register(tx);
        let path = model.root.join("f.txt");
        model.apply_modify(&path, None).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn removing_the_root_is_refused() {
        let (dir, mut model) = replica();
        let root = model.root.clone();
        model.apply_remove(&root, None).unwrap();
        assert!(dir.path().exists());
        assert!(model.tracked_paths.contains(""));
    }
}
