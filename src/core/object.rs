//! Wire-facing descriptors and operation messages.
//!
//! ObjectInfo is the externally visible snapshot of one tracked object,
//! used both for events and for foreign-tree synchronization. It is
//! deliberately separate from the StaticInfo record the model stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::{ContentHash, ObjectId};
use super::version::VersionVector;

/// Operation kind carried by an update message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Modify,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Modify => "modify",
            Operation::Remove => "remove",
        };
        write!(f, "{}", s)
    }
}

/// Descriptor of one object, optionally carrying its children.
///
/// `children` is only populated by tree reads; planner maps and events
/// always carry shallow descriptors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub name: String,
    /// Subpath relative to the replica root; empty for the root itself.
    pub path: String,
    pub directory: bool,
    pub content: ContentHash,
    pub version: VersionVector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ObjectInfo>,
}

impl ObjectInfo {
    /// Visit this descriptor and every descendant, parents first.
    pub fn for_each(&self, f: &mut impl FnMut(&ObjectInfo)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    /// Copy without children.
    pub fn shallow(&self) -> ObjectInfo {
        ObjectInfo {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// One operation against one object - the unit the event sink and the
/// planners speak.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub operation: Operation,
    pub object: ObjectInfo,
}

impl UpdateMessage {
    pub fn new(operation: Operation, object: ObjectInfo) -> Self {
        Self { operation, object }
    }
}

/// Order messages so directories precede their contents: shorter subpaths
/// first, ties broken lexicographically. Callers apply in list order.
pub fn sort_messages(mut messages: Vec<UpdateMessage>) -> Vec<UpdateMessage> {
    messages.sort_by(|a, b| {
        let (pa, pb) = (&a.object.path, &b.object.path);
        pa.len().cmp(&pb.len()).then_with(|| pa.cmp(pb))
    });
    messages
}
