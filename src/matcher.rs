//! Ignore matcher for `.mirraignore` files.
//!
//! Each rule file covers the directory it lives in and everything below,
//! except where a deeper `.mirraignore` takes over (the nearest file on
//! the way up wins). Rules starting with `/` prune whole directories
//! anchored at the rule file's directory; other rules match file-name
//! suffixes. `#` comments and blank lines are skipped.

use std::path::{Path, PathBuf};

use crate::layout::IGNORE_FILE;

/// Compiled rules of one `.mirraignore` file.
#[derive(Clone, Debug, Default)]
pub struct Matcher {
    dir: PathBuf,
    dir_rules: Vec<PathBuf>,
    file_rules: Vec<String>,
}

impl Matcher {
    /// Load the ignore file of `dir`. A missing or unreadable file yields
    /// an empty matcher that ignores nothing.
    pub fn load(dir: &Path) -> Matcher {
        let mut matcher = Matcher {
            dir: dir.to_path_buf(),
            ..Matcher::default()
        };
        let Ok(raw) = std::fs::read_to_string(dir.join(IGNORE_FILE)) else {
            return matcher;
        };
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix('/') {
                Some(rule) if !rule.is_empty() => matcher.dir_rules.push(PathBuf::from(rule)),
                Some(_) => {}
                None => matcher.file_rules.push(line.to_string()),
            }
        }
        matcher
    }

    /// The matcher governing `dir`: the nearest directory at or above it
    /// (clamped at `root`) that carries an ignore file.
    pub fn resolve(root: &Path, dir: &Path) -> Matcher {
        let mut cursor = dir;
        loop {
            if cursor.join(IGNORE_FILE).is_file() || cursor == root {
                return Matcher::load(cursor);
            }
            match cursor.parent() {
                Some(parent) => cursor = parent,
                None => return Matcher::load(root),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dir_rules.is_empty() && self.file_rules.is_empty()
    }

    /// Whether `path` (absolute, inside this matcher's directory) is to be
    /// skipped. Directory rules match segment-wise so `/local` prunes
    /// `local/` but never `localstuff/`.
    pub fn ignores(&self, path: &Path, is_dir: bool) -> bool {
        if self.is_empty() {
            return false;
        }
        let Ok(rel) = path.strip_prefix(&self.dir) else {
            return false;
        };
        for rule in &self.dir_rules {
            if rel.starts_with(rule) {
                return true;
            }
        }
        if !is_dir {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            for rule in &self.file_rules {
                if name.ends_with(rule.as_str()) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rules(dir: &Path, rules: &str) {
        std::fs::write(dir.join(IGNORE_FILE), rules).unwrap();
    }

    #[test]
    fn missing_file_ignores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = Matcher::load(dir.path());
        assert!(matcher.is_empty());
        assert!(!matcher.ignores(&dir.path().join("anything"), false));
    }

    #[test]
    fn dir_rules_are_anchored_and_segment_wise() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "/local\n");
        let matcher = Matcher::load(dir.path());

        assert!(matcher.ignores(&dir.path().join("local"), true));
        assert!(matcher.ignores(&dir.path().join("local/deep/file"), false));
        assert!(!matcher.ignores(&dir.path().join("localstuff"), true));
        assert!(!matcher.ignores(&dir.path().join("sub/local"), true));
    }

    #[test]
    fn file_rules_match_name_suffixes_only_for_files() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), ".swp\n");
        let matcher = Matcher::load(dir.path());

        assert!(matcher.ignores(&dir.path().join("notes.swp"), false));
        assert!(matcher.ignores(&dir.path().join("deep/notes.swp"), false));
        assert!(!matcher.ignores(&dir.path().join("notes.txt"), false));
        assert!(!matcher.ignores(&dir.path().join("dir.swp"), true));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "# a comment\n\n.tmp\n");
        let matcher = Matcher::load(dir.path());
        assert!(matcher.ignores(&dir.path().join("x.tmp"), false));
        assert!(!matcher.ignores(&dir.path().join("# a comment"), false));
    }

    #[test]
    fn resolve_prefers_the_nearest_rule_file() {
        let root = tempfile::tempdir().unwrap();
        let sub = root.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_rules(root.path(), ".root\n");
        write_rules(&sub, ".sub\n");

        let at_root = Matcher::resolve(root.path(), root.path());
        assert!(at_root.ignores(&root.path().join("x.root"), false));

        let at_sub = Matcher::resolve(root.path(), &sub);
        assert!(at_sub.ignores(&sub.join("x.sub"), false));
        assert!(!at_sub.ignores(&sub.join("x.root"), false));
    }

    #[test]
    fn resolve_clamps_at_the_root() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("a/b");
        std::fs::create_dir_all(&deep).unwrap();
        let matcher = Matcher::resolve(root.path(), &deep);
        assert!(matcher.is_empty());
    }
}
