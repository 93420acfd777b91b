#![forbid(unsafe_code)]

pub mod core;
pub mod error;
pub mod layout;
pub mod matcher;
pub mod model;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the model surface at crate root for convenience
pub use crate::core::{
    ContentHash, CoreError, Limits, ObjectId, ObjectInfo, Operation, PeerEntry, PeerId,
    PeerRoster, StaticInfo, TreePath, UpdateMessage, VersionVector, WallClock, sort_messages,
};
pub use crate::layout::{AuthToken, Layout, is_replica_root, scaffold, scaffold_with_auth};
pub use crate::matcher::Matcher;
pub use crate::model::{CheckOutcome, Model, ModelError, TreeDiff};
