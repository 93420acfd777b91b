//! Scanner: produces the current set of tracked subpaths.
//!
//! Walks a scope depth-first, pruning directories the ignore matcher
//! rejects. Unreadable entries are logged and skipped - the diff engine
//! then treats them as removals.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::TreePath;
use crate::matcher::Matcher;

/// Scan `scope` (the full path of a subtree at or below the root) and
/// return every surviving subpath, the scope itself included.
pub(crate) fn scan_subtree(root: &TreePath, scope: &Path) -> BTreeSet<String> {
    let root_dir = root.root().to_path_buf();
    // One matcher per directory; resolution walks up to the nearest rule
    // file, so cache by the directory being scanned.
    let mut matchers: BTreeMap<PathBuf, Matcher> = BTreeMap::new();
    let mut tracked = BTreeSet::new();

    let walker = WalkDir::new(scope).follow_links(false).into_iter();
    for entry in walker.filter_entry(|entry| {
        if entry.depth() == 0 {
            // The scope itself is never matched against its own parent.
            return true;
        }
        let Some(parent) = entry.path().parent() else {
            return true;
        };
        let matcher = matchers
            .entry(parent.to_path_buf())
            .or_insert_with(|| Matcher::resolve(&root_dir, parent));
        !matcher.ignores(entry.path(), entry.file_type().is_dir())
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("scan skipping unreadable entry: {e}");
                continue;
            }
        };
        match root.resolve(entry.path()) {
            Some(path) => {
                tracked.insert(path.subpath().to_string());
            }
            None => {
                tracing::debug!("scanned entry outside root: {}", entry.path().display());
            }
        }
    }
    tracked
}
