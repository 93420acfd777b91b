//! Core domain types for the replication model.
//!
//! Module hierarchy follows type dependency order:
//! - time: wall-clock measurement (Layer 0)
//! - identity: ObjectId, PeerId, ContentHash (Layer 1)
//! - version, path: version vectors and tree locations (Layer 2)
//! - staticinfo, object: per-path records and wire descriptors (Layer 3)
//! - limits, roster: tunables and replica-set membership

pub mod error;
pub mod identity;
pub mod limits;
pub mod object;
pub mod path;
pub mod roster;
pub mod staticinfo;
pub mod time;
pub mod version;

pub use error::{CoreError, InvalidId};
pub use identity::{ContentHash, ObjectId, PeerId};
pub use limits::Limits;
pub use object::{ObjectInfo, Operation, UpdateMessage, sort_messages};
pub use path::TreePath;
pub use roster::{PeerEntry, PeerRoster, RosterError};
pub use staticinfo::StaticInfo;
pub use time::WallClock;
pub use version::VersionVector;
