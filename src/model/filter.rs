//! Message filter: validates and rewrites inbound operations before they
//! may be applied.
//!
//! The filter is advisory and pure with respect to the static-info store;
//! it only reads model state and the reserved subtree. It may rewrite a
//! message's kind in place (Create <-> Modify) and is idempotent: running
//! an accepted message through again yields the same verdict.

use crate::core::{Operation, UpdateMessage};
use crate::layout::Layout;

use super::error::ModelError;
use super::Model;

/// Verdict of [`Model::check_message`]. Only `Accept` may proceed to an
/// apply; the other outcomes tell the caller what to do with the message
/// and are not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Safe to apply (the operation kind may have been rewritten).
    Accept,
    /// Already applied or premature; drop the message.
    IgnoreUpdate,
    /// The object is known-removed here; the sender should be sent the
    /// removal again so it can catch up.
    ObjectRemoved,
    /// The object's tombstone has already completed here.
    ObjectRemovalDone,
}

impl Model {
    /// Whether the update has already been applied locally. Used to avoid
    /// re-fetching updates that originated from us.
    pub fn has_update(&self, msg: &UpdateMessage) -> bool {
        let stin = self.static_infos.get(&msg.object.path);
        match msg.operation {
            // We have the removal once the object is gone.
            Operation::Remove => stin.is_none(),
            // Inclusion, not equality: a message whose history we already
            // dominate carries nothing new either. Empty versions are not
            // "known"; they are an invariant violation caught further down.
            Operation::Modify => {
                !msg.object.version.is_empty()
                    && stin.is_some_and(|s| s.version.includes(&msg.object.version))
            }
            // A create is known once the same object sits at the path; a
            // different id at the path is a concurrent create, which the
            // filter rewrites to a modify instead.
            Operation::Create => stin.is_some_and(|s| s.id == msg.object.id),
        }
    }

    /// Validate an inbound operation against local state, rewriting its
    /// kind where transfer races make that the correct reading.
    pub fn check_message(&self, msg: &mut UpdateMessage) -> Result<CheckOutcome, ModelError> {
        let sub = msg.object.path.clone();
        let path = self.root.join(&sub);

        // Rule 1: already applied.
        if self.has_update(msg) {
            return Ok(CheckOutcome::IgnoreUpdate);
        }

        // Rule 2: transfer races flip the kind. A modify for an untracked
        // path is a create whose transfer overtook the creation message;
        // a create for a tracked path is a concurrent create and must run
        // version comparison as a modify.
        let tracked = self.tracked_paths.contains(&sub);
        match msg.operation {
            Operation::Modify if !tracked => msg.operation = Operation::Create,
            Operation::Create if tracked => msg.operation = Operation::Modify,
            _ => {}
        }

        // Rule 3: operations on a deleted object. The sender is behind;
        // it must be sent the removal again.
        if msg.operation != Operation::Remove && self.is_removed(&msg.object.id) {
            return Ok(CheckOutcome::ObjectRemoved);
        }

        // Rule 4: the tombstone subtree only receives ack-file creates.
        if Layout::in_remove_subtree(&sub) {
            if msg.operation != Operation::Create {
                return Err(ModelError::TombstoneCreateOnly { path: sub });
            }
            if let Some((tomb_id, is_tomb_root)) = Layout::parse_remove_subpath(&sub)
                && self.is_local_removed(&tomb_id)
            {
                // The shared record was already purged here; a lagging
                // peer is re-publishing it.
                return Ok(if is_tomb_root {
                    CheckOutcome::ObjectRemoved
                } else {
                    CheckOutcome::ObjectRemovalDone
                });
            }
            if !self.parents_exist(&path) {
                // Normal race: the tombstone directories have not arrived
                // yet. The next synchronization delivers them.
                return Ok(CheckOutcome::IgnoreUpdate);
            }
            return Ok(CheckOutcome::Accept);
        }

        // Rule 5: no hanging objects.
        if !self.parents_exist(&path) {
            return Err(ModelError::ParentsMissing { path: sub });
        }

        // Rule 6: every non-create targets a tracked path.
        if msg.operation != Operation::Create && !self.tracked_paths.contains(&sub) {
            return Err(ModelError::Untracked { path: sub });
        }

        // Rule 7: modifies carry history.
        if msg.operation == Operation::Modify && msg.object.version.is_empty() {
            return Err(ModelError::EmptyVersion { path: sub });
        }

        Ok(CheckOutcome::Accept)
    }
}
