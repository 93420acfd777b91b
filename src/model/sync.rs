//! Sync and bootstrap planners.
//!
//! Both take the root descriptor of a foreign model and return the
//! ordered operations the caller must fetch-and-apply to converge.
//! Neither moves file bytes; that is the transport's job.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{sort_messages, ObjectInfo, Operation, UpdateMessage};
use crate::layout::{Layout, AUTH_SUBPATH};

use super::diff;
use super::error::ModelError;
use super::Model;

impl Model {
    /// Plan the operations needed to converge on the foreign tree.
    ///
    /// Refuses foreign models from another replica set (the auth tokens
    /// are content-compared). Output is sorted so directories precede
    /// their contents; the caller must apply in order.
    pub fn sync(&self, foreign_root: &ObjectInfo) -> Result<Vec<UpdateMessage>, ModelError> {
        let mut foreign_paths: BTreeSet<String> = BTreeSet::new();
        let mut foreign_objs: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        foreign_root.for_each(&mut |obj| {
            foreign_paths.insert(obj.path.clone());
            foreign_objs.insert(obj.path.clone(), obj.shallow());
        });

        let Some(foreign_auth) = foreign_objs.get(AUTH_SUBPATH) else {
            tracing::warn!("foreign model carries no auth token");
            return Err(ModelError::IncompatibleReplica);
        };
        let local_auth = self.info_subpath(AUTH_SUBPATH).map_err(|_| {
            tracing::warn!("local model carries no auth token");
            ModelError::IllegalFileState {
                path: AUTH_SUBPATH.to_string(),
            }
        })?;
        if foreign_auth.content != local_auth.content {
            return Err(ModelError::IncompatibleReplica);
        }

        let scope = self.root.full_path();
        let diff = diff::compare(self.root.root(), &self.tracked_paths, &foreign_paths, &scope);

        let mut messages = Vec::new();
        for sub in &diff.created {
            let Some(remote) = foreign_objs.get(sub) else {
                tracing::warn!("created path `{sub}` missing from the foreign objects");
                continue;
            };
            if self.is_removed(&remote.id) {
                // Our tombstone wins over a stale foreign copy.
                tracing::debug!("skipping create of removed object {}", remote.id);
                continue;
            }
            messages.push(UpdateMessage::new(Operation::Create, remote.clone()));
        }
        for sub in &diff.modified {
            if Layout::in_remove_subtree(sub) {
                // Ack markers are written independently by every peer and
                // carry unrelated identities; only their creates replicate.
                continue;
            }
            let Ok(local) = self.info_subpath(sub) else {
                tracing::warn!("modify candidate `{sub}` missing from the local model");
                continue;
            };
            let Some(remote) = foreign_objs.get(sub) else {
                tracing::warn!("modified path `{sub}` missing from the foreign objects");
                continue;
            };
            // Fetch only genuinely new history. Inclusion (not equality)
            // is the test: equal or locally-dominated versions carry
            // nothing we lack.
            if local.version.includes(&remote.version) {
                continue;
            }
            if remote.directory {
                tracing::debug!("skipping directory modify for `{sub}`");
                continue;
            }
            messages.push(UpdateMessage::new(Operation::Modify, remote.clone()));
        }
        for sub in &diff.removed {
            let Ok(local) = self.info_subpath(sub) else {
                tracing::warn!("removed candidate `{sub}` missing from the local model");
                continue;
            };
            // A path the foreign tree lacks may simply never have reached
            // it. Only a tombstone visible on the foreign side proves a
            // deletion.
            if foreign_paths.contains(&Layout::remove_subpath(&local.id)) {
                messages.push(UpdateMessage::new(Operation::Remove, local));
            }
        }
        Ok(sort_messages(messages))
    }

    /// Adopt a foreign model when joining an existing replica set.
    ///
    /// Already-present paths take over the foreign id and version so all
    /// later merges line up; diverging content is scheduled as a modify.
    /// Everything else becomes a create.
    pub fn bootstrap(&mut self, foreign_root: &ObjectInfo) -> Result<Vec<UpdateMessage>, ModelError> {
        if !self.is_empty() {
            tracing::warn!("bootstrapping a replica that already tracks user files");
        }
        let mut foreign_objs: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        foreign_root.for_each(&mut |obj| {
            foreign_objs.insert(obj.path.clone(), obj.shallow());
        });

        let mut messages = Vec::new();
        for (sub, remote) in &foreign_objs {
            if !self.tracked_paths.contains(sub) {
                messages.push(UpdateMessage::new(Operation::Create, remote.clone()));
                continue;
            }
            let Some(stin) = self.static_infos.get_mut(sub) else {
                return Err(ModelError::ModelInconsistent {
                    path: sub.to_string(),
                });
            };
            // The foreign identity always wins, otherwise cumulative
            // merging can never work.
            stin.id = remote.id;
            stin.version = remote.version.clone();
            if stin.content != remote.content {
                tracing::debug!("bootstrap will fetch `{sub}`");
                messages.push(UpdateMessage::new(Operation::Modify, remote.clone()));
            }
        }
        self.store()?;
        Ok(sort_messages(messages))
    }
}
