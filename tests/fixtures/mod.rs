//! Shared replica harness for the integration suite.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use crossbeam::channel::{Receiver, unbounded};
use tempfile::TempDir;

use mirra_rs::{
    AuthToken, CheckOutcome, ContentHash, Model, ObjectId, ObjectInfo, Operation, PeerEntry,
    PeerId, PeerRoster, UpdateMessage, layout,
};

/// One replica: a scaffolded temp root, its model, and a drained event
/// sink.
pub struct TestReplica {
    pub dir: TempDir,
    pub model: Model,
    pub events: Receiver<UpdateMessage>,
}

impl TestReplica {
    /// First replica of a fresh set; returns the auth token others join
    /// with.
    pub fn new() -> (Self, AuthToken) {
        let dir = tempfile::tempdir().unwrap();
        let auth = layout::scaffold(dir.path()).unwrap();
        (Self::open(dir), auth)
    }

    /// A replica joining an existing set.
    pub fn joined(auth: &AuthToken) -> Self {
        let dir = tempfile::tempdir().unwrap();
        layout::scaffold_with_auth(dir.path(), auth).unwrap();
        Self::open(dir)
    }

    fn open(dir: TempDir) -> Self {
        init_logging();
        let mut model = Model::create(dir.path(), PeerId::generate()).unwrap();
        let (tx, rx) = unbounded();
        model.register(tx);
        Self {
            dir,
            model,
            events: rx,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, bytes: &[u8]) {
        std::fs::write(self.path(rel), bytes).unwrap();
    }

    pub fn drain(&self) -> Vec<UpdateMessage> {
        self.events.try_iter().collect()
    }

    /// Deposit bytes in the staging area, as the transport layer would.
    pub fn stage(&self, id: &ObjectId, bytes: &[u8]) {
        std::fs::write(self.path(&format!(".mirra/temp/{id}")), bytes).unwrap();
    }

    /// Write the full membership list. Callers pass the same list to every
    /// replica so the roster file never churns through sync.
    pub fn set_peers(&self, members: &[(PeerId, &str)]) {
        let roster = PeerRoster {
            peers: members
                .iter()
                .map(|(peer_id, name)| PeerEntry {
                    peer_id: *peer_id,
                    name: name.to_string(),
                })
                .collect(),
        };
        std::fs::write(
            self.path(".mirra/org/peers.toml"),
            toml::to_string(&roster).unwrap(),
        )
        .unwrap();
    }
}

/// Run one planned operation list against `to`, staging file bytes from
/// `from`'s disk the way the transport would. Messages the filter refuses
/// or redirects are dropped, as a real caller does. Returns the number of
/// operations applied.
pub fn apply_plan(from: &TestReplica, to: &mut TestReplica, plan: Vec<UpdateMessage>) -> usize {
    let mut applied = 0;
    for mut msg in plan {
        match to.model.check_message(&mut msg) {
            Ok(CheckOutcome::Accept) => {
                if msg.operation != Operation::Remove && !msg.object.directory {
                    let bytes = std::fs::read(from.path(&msg.object.path)).expect("source bytes");
                    to.stage(&msg.object.id, &bytes);
                }
                to.model
                    .apply_update_message(&msg)
                    .expect("apply planned operation");
                applied += 1;
            }
            Ok(_) | Err(_) => {
                // Advisory outcome or filter rejection: drop the message.
            }
        }
    }
    applied
}

/// One pull: plan against `from`'s snapshot and apply everything the
/// filter accepts. Returns the number of operations applied.
pub fn deliver(from: &TestReplica, to: &mut TestReplica) -> usize {
    let tree = from.model.read().unwrap();
    let plan = to.model.sync(&tree).unwrap();
    apply_plan(from, to, plan)
}

/// Apply an edit to the descriptor at `path` inside a tree snapshot.
pub fn patch_tree(tree: &mut ObjectInfo, path: &str, f: impl Fn(&mut ObjectInfo) + Copy) {
    if tree.path == path {
        f(tree);
    }
    for child in &mut tree.children {
        patch_tree(child, path, f);
    }
}

/// Flatten a tree snapshot into path -> (directory, content hash).
pub fn flatten(tree: &ObjectInfo) -> BTreeMap<String, (bool, ContentHash)> {
    let mut out = BTreeMap::new();
    tree.for_each(&mut |obj| {
        out.insert(obj.path.clone(), (obj.directory, obj.content));
    });
    out
}

/// Honor `RUST_LOG` when debugging a failing scenario.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
