//! Tombstone protocol.
//!
//! A removal is promoted to a shared, peer-acknowledged record under
//! `.mirra/remove/<id>` so stale replicas cannot resurrect deleted
//! objects. Once every peer has acknowledged, the shared record is
//! hard-deleted and a local-only marker under `.mirra/local/removed/`
//! guards against re-adoption until it expires.

use crate::core::{ObjectId, ObjectInfo, Operation, PeerRoster, TreePath, WallClock};
use crate::layout::Layout;

use super::error::ModelError;
use super::{scan, Model};

impl Model {
    /// Initiate a removal for a locally deleted object: wipe it from disk
    /// and model, publish the shared tombstone, and announce the removal
    /// as one event carrying a freshly increased version.
    pub(crate) fn local_remove(&mut self, path: &TreePath) -> Result<(), ModelError> {
        let sub = path.subpath().to_string();
        let Some(stin) = self.static_infos.get(&sub).cloned() else {
            tracing::debug!("local remove of untracked `{sub}`");
            return Err(ModelError::IllegalFileState { path: sub });
        };
        if self.is_removed(&stin.id) {
            tracing::warn!("object {} is already pending removal", stin.id);
        }
        // No Remove event yet; the single announcement happens below.
        self.direct_remove(path)?;
        // Publish the tombstone, then scan it so the ack markers replicate
        // as ordinary creates ahead of the removal announcement.
        self.update_removal_dir(&stin.id)?;
        let mut version = stin.version;
        version.increase(&self.self_id);
        self.notify(
            Operation::Remove,
            ObjectInfo {
                id: stin.id,
                name: path.name().to_string(),
                path: sub,
                directory: stin.directory,
                content: stin.content,
                version,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    /// Apply a removal received from a peer: wipe local state if still
    /// present and acknowledge by publishing `done/<self>`.
    pub(crate) fn remote_remove(
        &mut self,
        path: &TreePath,
        remote: &ObjectInfo,
    ) -> Result<(), ModelError> {
        if self.tracked_paths.contains(path.subpath()) {
            self.direct_remove(path)?;
        }
        if !self.is_removed(&remote.id) {
            // Normal race: the removal message can overtake the creates
            // that carry the tombstone files.
            tracing::warn!("removal of {} arrived before its tombstone", remote.id);
        }
        self.update_removal_dir(&remote.id)?;
        self.notify(Operation::Remove, remote.shallow());
        Ok(())
    }

    /// Write all known peers into `check/` and `self` into `done/`, then
    /// run an update pass scoped to the tombstone so the markers become
    /// tracked objects.
    pub(crate) fn update_removal_dir(&mut self, id: &ObjectId) -> Result<(), ModelError> {
        let dir = self.layout.remove_path(id);
        std::fs::create_dir_all(self.layout.check_dir(id))?;
        std::fs::create_dir_all(self.layout.done_dir(id))?;

        let roster = PeerRoster::load_or_default(&self.layout.peers_path())?;
        let mut members = roster.peer_ids(&self.self_id);
        members.push(self.self_id);
        for peer in members {
            let marker = self.layout.check_dir(id).join(peer.to_string());
            if std::fs::symlink_metadata(&marker).is_err() {
                std::fs::write(&marker, b"")?;
            }
        }
        let done = self.layout.done_dir(id).join(self.self_id.to_string());
        if std::fs::symlink_metadata(&done).is_err() {
            std::fs::write(&done, b"")?;
        }
        self.update_local(&dir)
    }

    /// Periodic sweep over every shared tombstone and every local-only
    /// marker. Filesystem trouble on one entry is logged and skipped so a
    /// broken tombstone cannot block the rest.
    pub(crate) fn check_remove(&mut self) -> Result<(), ModelError> {
        let entries = match std::fs::read_dir(self.layout.remove_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("reading tombstones failed: {e}");
                return Ok(());
            }
        };
        let now = WallClock::now();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("tombstone listing failed: {e}");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|s| ObjectId::parse(s).ok()) else {
                tracing::warn!("foreign entry in the tombstone directory: {:?}", name);
                continue;
            };
            // Keep the peer list fresh in case new peers appeared.
            if let Err(e) = self.update_removal_dir(&id) {
                tracing::warn!("tombstone refresh for {id} failed: {e}");
                continue;
            }
            if let Err(e) = self.complete_tracked_removal(&id) {
                tracing::warn!("tombstone completion for {id} failed: {e}");
            }
            if let Ok(meta) = entry.metadata()
                && let Ok(modified) = meta.modified()
            {
                let age_ms = now.since(WallClock::from_system_time(modified));
                if age_ms > self.limits.removal_orphan_timeout_ms {
                    tracing::warn!("removal of {id} may be orphaned");
                }
            }
            if let Some(sub) = self.subpath_for(&id)
                && !Layout::in_remove_subtree(&sub)
            {
                tracing::warn!("removal of {id} (at `{sub}`) has not been applied");
            }
        }
        self.expire_local_removes(now);
        Ok(())
    }

    /// Drop local-only markers old enough that the whole set has surely
    /// finished purging.
    fn expire_local_removes(&self, now: WallClock) {
        let entries = match std::fs::read_dir(self.layout.removed_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("reading local removal markers failed: {e}");
                return;
            }
        };
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            if now.since(WallClock::from_system_time(modified)) > self.limits.removal_local_timeout_ms
                && let Err(e) = std::fs::remove_file(entry.path())
            {
                tracing::warn!("expiring local removal marker failed: {e}");
            }
        }
    }

    /// Purge a tombstone once every `check/<peer>` has a matching
    /// `done/<peer>`: remember it locally, then hard-delete the shared
    /// subtree (every peer does the same once complete).
    pub(crate) fn complete_tracked_removal(&mut self, id: &ObjectId) -> Result<(), ModelError> {
        let done_dir = self.layout.done_dir(id);
        for entry in std::fs::read_dir(self.layout.check_dir(id))? {
            let entry = entry?;
            if std::fs::symlink_metadata(done_dir.join(entry.file_name())).is_err() {
                return Ok(());
            }
        }
        // The local note lands first so the purge cannot be re-adopted
        // from a lagging peer.
        std::fs::write(self.layout.removed_path(id), b"")?;
        let tomb = self.root.join(&Layout::remove_subpath(id));
        self.direct_remove(&tomb)
    }

    /// Remove a subtree from disk and model without emitting any event.
    /// Strictly a building block of the removal protocol.
    pub(crate) fn direct_remove(&mut self, path: &TreePath) -> Result<(), ModelError> {
        let full = path.full_path();
        let mut subs = scan::scan_subtree(&self.root, &full);
        subs.insert(path.subpath().to_string());
        // Tracked entries below the subtree may already be gone from disk;
        // they leave the model regardless.
        let prefix = format!("{}/", path.subpath());
        subs.extend(
            self.tracked_paths
                .iter()
                .filter(|sub| sub.starts_with(&prefix))
                .cloned(),
        );
        for sub in subs {
            let target = self.root.join(&sub).full_path();
            match std::fs::symlink_metadata(&target) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&target)?,
                Ok(_) => std::fs::remove_file(&target)?,
                Err(_) => {}
            }
            self.tracked_paths.remove(&sub);
            self.static_infos.remove(&sub);
        }
        Ok(())
    }

    /// Whether an object is known-removed: its shared tombstone exists or
    /// a local-only marker remembers it.
    pub fn is_removed(&self, id: &ObjectId) -> bool {
        self.layout.remove_path(id).exists() || self.is_local_removed(id)
    }

    pub(crate) fn is_local_removed(&self, id: &ObjectId) -> bool {
        self.layout.removed_path(id).exists()
    }
}
