//! Model capability errors.
//!
//! Advisory outcomes (`IgnoreUpdate`, `ObjectRemoved`, `ObjectRemovalDone`)
//! are NOT errors; they live in [`crate::model::filter::CheckOutcome`].
//! Everything here is a refusal or an invariant breach the caller must
//! branch on.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::{ObjectId, RosterError};
use crate::error::{Effect, Transience};

/// Canonical error enum for the model capability.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// Divergent writes; the caller owns reconciliation policy.
    #[error("conflicting update for `{path}`")]
    Conflict { path: String },

    /// Disk and tracked state disagree.
    #[error("illegal file state for `{path}`")]
    IllegalFileState { path: String },

    /// Tracked set and static-info store disagree; fatal for the call.
    #[error("tracked set and static infos disagree for `{path}`")]
    ModelInconsistent { path: String },

    /// Staging was empty when an apply expected file bytes; the transport
    /// must retry after re-depositing them.
    #[error("staged update file missing for object {id}")]
    MissingUpdateFile { id: ObjectId },

    #[error("path `{path}` is not tracked")]
    Untracked { path: String },

    #[error("parent objects of `{path}` are missing")]
    ParentsMissing { path: String },

    #[error("modify message for `{path}` carries an empty version")]
    EmptyVersion { path: String },

    /// The tombstone subtree only ever receives acknowledgement-file
    /// creates.
    #[error("operation other than create targets the tombstone subtree at `{path}`")]
    TombstoneCreateOnly { path: String },

    #[error("`{root}` is not an initialized replica root")]
    NotReplicaRoot { root: PathBuf },

    /// Foreign snapshot carries a different replica-set auth token.
    #[error("foreign model belongs to an incompatible replica set")]
    IncompatibleReplica,

    #[error("model snapshot is invalid: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub fn transience(&self) -> Transience {
        match self {
            // Staging will be refilled by the transport; filesystem
            // trouble may clear.
            ModelError::MissingUpdateFile { .. } | ModelError::Io(_) => Transience::Retryable,
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            // Refusals are decided before any mutation.
            ModelError::Conflict { .. }
            | ModelError::IllegalFileState { .. }
            | ModelError::Untracked { .. }
            | ModelError::ParentsMissing { .. }
            | ModelError::EmptyVersion { .. }
            | ModelError::TombstoneCreateOnly { .. }
            | ModelError::NotReplicaRoot { .. }
            | ModelError::IncompatibleReplica
            | ModelError::MissingUpdateFile { .. } => Effect::None,
            ModelError::ModelInconsistent { .. }
            | ModelError::Snapshot(_)
            | ModelError::Roster(_)
            | ModelError::Io(_) => Effect::Unknown,
        }
    }
}
