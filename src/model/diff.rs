//! Diff engine: previous tracked set vs current scan, filtered by scope.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Paths that changed between two snapshots of the tree, each sorted
/// lexicographically so parents are handled before their children.
/// `modified` holds candidates only - whether a file actually changed is
/// decided later by mtime and content hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub created: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// The scope predicate, in both directions: a subpath participates when it
/// lies inside the scope, or when it is an ancestor on the way from the
/// root to the scope. The ancestor half keeps intermediate directories in
/// play so a deep partial update can still create them in order.
pub(crate) fn in_scope(root: &Path, subpath: &str, scope: &Path) -> bool {
    let full: PathBuf = if subpath.is_empty() {
        root.to_path_buf()
    } else {
        root.join(subpath)
    };
    full.starts_with(scope) || scope.starts_with(&full)
}

/// Compare the previously tracked subpaths against a fresh scan.
pub(crate) fn compare(
    root: &Path,
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
    scope: &Path,
) -> TreeDiff {
    let mut diff = TreeDiff::default();
    for subpath in previous {
        if !in_scope(root, subpath, scope) {
            continue;
        }
        if current.contains(subpath) {
            diff.modified.push(subpath.clone());
        } else {
            diff.removed.push(subpath.clone());
        }
    }
    for subpath in current {
        if !in_scope(root, subpath, scope) {
            continue;
        }
        if !previous.contains(subpath) {
            diff.created.push(subpath.clone());
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partitions_into_created_modified_removed() {
        let root = Path::new("/r");
        let previous = set(&["", "a", "b"]);
        let current = set(&["", "b", "c"]);

        let diff = compare(root, &previous, &current, root);
        assert_eq!(diff.created, vec!["c"]);
        assert_eq!(diff.modified, vec!["", "b"]);
        assert_eq!(diff.removed, vec!["a"]);
    }

    #[test]
    fn outputs_are_lexicographic_so_parents_come_first() {
        let root = Path::new("/r");
        let previous = set(&[]);
        let current = set(&["dir/file", "dir", "dir/file2", ""]);

        let diff = compare(root, &previous, &current, root);
        assert_eq!(diff.created, vec!["", "dir", "dir/file", "dir/file2"]);
    }

    #[test]
    fn scope_keeps_out_unrelated_paths() {
        let root = Path::new("/r");
        let previous = set(&["", "sub", "sub/x", "other", "other/y"]);
        let current = set(&["", "sub", "sub/x", "sub/new", "other"]);

        let diff = compare(root, &previous, &current, &root.join("sub"));
        assert_eq!(diff.created, vec!["sub/new"]);
        // "other/y" vanished but lies outside the scope.
        assert!(diff.removed.is_empty());
        assert_eq!(diff.modified, vec!["", "sub", "sub/x"]);
    }

    #[test]
    fn ancestors_of_the_scope_stay_in_play() {
        let root = Path::new("/r");
        // "sub" is on the way from the root to the scope; it must be
        // considered even though it is not inside the scope.
        assert!(in_scope(root, "sub", &root.join("sub/deep")));
        assert!(in_scope(root, "", &root.join("sub/deep")));
        assert!(in_scope(root, "sub/deep/file", &root.join("sub/deep")));
        assert!(!in_scope(root, "subzero", &root.join("sub/deep")));
        assert!(!in_scope(root, "other", &root.join("sub/deep")));
    }
}
