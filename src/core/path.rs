//! Layer 2: Path abstraction
//!
//! A TreePath carries (root, subpath). Subpaths are `/`-separated strings
//! because they double as snapshot keys and wire paths; the root subpath
//! is the empty string.

use std::path::{Path, PathBuf};

/// A location inside one replica's tree.
///
/// No symlink resolution is performed anywhere; paths are compared
/// segment-wise, never as raw strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreePath {
    root: PathBuf,
    sub: String,
}

impl TreePath {
    /// The root itself (empty subpath).
    pub fn root_of(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sub: String::new(),
        }
    }

    /// Append a subpath (relative, `/`-separated) below this path.
    pub fn join(&self, sub: &str) -> TreePath {
        let sub = sub.trim_matches('/');
        if sub.is_empty() {
            return self.clone();
        }
        let joined = if self.sub.is_empty() {
            sub.to_string()
        } else {
            format!("{}/{}", self.sub, sub)
        };
        TreePath {
            root: self.root.clone(),
            sub: joined,
        }
    }

    /// Reinterpret an absolute path as a location under the same root.
    ///
    /// Returns `None` when `full` does not lie under the root.
    pub fn resolve(&self, full: &Path) -> Option<TreePath> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let mut sub = String::new();
        for component in rel.components() {
            let segment = component.as_os_str().to_str()?;
            if !sub.is_empty() {
                sub.push('/');
            }
            sub.push_str(segment);
        }
        Some(TreePath {
            root: self.root.clone(),
            sub,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subpath(&self) -> &str {
        &self.sub
    }

    pub fn full_path(&self) -> PathBuf {
        if self.sub.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.sub)
        }
    }

    /// Last element: the file name, or the root directory's name at root.
    pub fn name(&self) -> &str {
        match self.sub.rsplit_once('/') {
            Some((_, name)) => name,
            None if !self.sub.is_empty() => &self.sub,
            None => self
                .root
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(""),
        }
    }

    /// Number of segments below the root; the root itself is 0.
    pub fn depth(&self) -> usize {
        if self.sub.is_empty() {
            0
        } else {
            self.sub.split('/').count()
        }
    }

    pub fn is_root(&self) -> bool {
        self.sub.is_empty()
    }

    /// One level up, clamped at the root.
    pub fn parent(&self) -> TreePath {
        let sub = match self.sub.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };
        TreePath {
            root: self.root.clone(),
            sub,
        }
    }
}
