//! Include/exclude pattern filtering
//!
//! Shell-style globs (`*`, `?`, `[...]`) matched against the full relative
//! path, not just the basename. `*` crosses `/`, matching the fnmatch
//! semantics device users expect from patterns like `*.py`.

use crate::error::{Result, SyncError};
use crate::tree::canonical;
use crate::walk::FileEntry;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob sets. Stateless; applied per entry.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    include: GlobSet,
    exclude: GlobSet,
}

impl FilterSpec {
    /// Compile pattern lists. A syntactically invalid glob is reported here,
    /// before any walk executes.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    /// Filter that admits every file (`include = ["*"]`).
    pub fn include_all() -> Self {
        Self::new(&["*".to_string()], &[]).expect("literal pattern compiles")
    }

    /// Whether a single entry passes the filter.
    ///
    /// Directories always pass, so structure stays visible even when its
    /// contents are excluded. A file passes if it matches at least one
    /// include pattern; any exclude match then forces the verdict to false,
    /// and it is never re-opened by a later include check.
    pub fn admits(&self, entry: &FileEntry) -> bool {
        if entry.is_dir() {
            return true;
        }
        let path = canonical(&entry.path);
        let mut keep = self.include.is_match(path);
        if self.exclude.is_match(path) {
            keep = false;
        }
        keep
    }

    /// Apply the filter to a walk output sequence.
    pub fn apply(&self, entries: Vec<FileEntry>) -> Vec<FileEntry> {
        entries.into_iter().filter(|e| self.admits(e)).collect()
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| SyncError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| SyncError::Pattern {
        pattern: patterns.join(" "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::EntryKind;

    fn file(path: &str) -> FileEntry {
        FileEntry {
            kind: EntryKind::File,
            depth: 0,
            path: path.into(),
            mtime: 0.0,
            size: 1,
        }
    }

    fn dir(path: &str) -> FileEntry {
        FileEntry {
            kind: EntryKind::Directory,
            depth: 0,
            path: path.into(),
            mtime: 0.0,
            size: 0,
        }
    }

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_include_all_is_identity_for_files() {
        let spec = FilterSpec::include_all();
        let entries = vec![file("a.py"), dir("sub"), file("sub/b.txt")];
        let kept = spec.apply(entries.clone());
        assert_eq!(kept, entries);
    }

    #[test]
    fn test_star_crosses_separators() {
        let spec = FilterSpec::new(&patterns(&["*.py"]), &[]).unwrap();
        assert!(spec.admits(&file("a.py")));
        assert!(spec.admits(&file("sub/c.py")));
        assert!(!spec.admits(&file("README.md")));
    }

    #[test]
    fn test_exclude_overrides_include() {
        // boot.py matches both sets; exclude wins regardless of order
        let spec = FilterSpec::new(&patterns(&["*.py"]), &patterns(&["boot.py"])).unwrap();
        assert!(!spec.admits(&file("boot.py")));
        assert!(spec.admits(&file("main.py")));

        let spec = FilterSpec::new(&patterns(&["boot.py", "*.py"]), &patterns(&["boot.py"])).unwrap();
        assert!(!spec.admits(&file("boot.py")));
    }

    #[test]
    fn test_directories_always_pass() {
        let spec = FilterSpec::new(&patterns(&["*.py"]), &patterns(&["lib*"])).unwrap();
        assert!(spec.admits(&dir("lib")));
        assert!(spec.admits(&dir("docs")));
        assert!(!spec.admits(&file("lib/data.bin")));
    }

    #[test]
    fn test_leading_slash_stripped_before_matching() {
        let spec = FilterSpec::new(&patterns(&["boot.py"]), &[]).unwrap();
        assert!(spec.admits(&file("/boot.py")));
    }

    #[test]
    fn test_question_mark_and_class() {
        let spec = FilterSpec::new(&patterns(&["a?.py", "[xy].txt"]), &[]).unwrap();
        assert!(spec.admits(&file("a1.py")));
        assert!(!spec.admits(&file("a12.py")));
        assert!(spec.admits(&file("x.txt")));
        assert!(!spec.admits(&file("z.txt")));
    }

    #[test]
    fn test_empty_include_admits_no_files() {
        let spec = FilterSpec::new(&[], &[]).unwrap();
        assert!(!spec.admits(&file("a.py")));
        assert!(spec.admits(&dir("sub")));
    }

    #[test]
    fn test_invalid_pattern_reported_at_construction() {
        let err = FilterSpec::new(&patterns(&["[unclosed"]), &[]).unwrap_err();
        match err {
            SyncError::Pattern { pattern, .. } => assert_eq!(pattern, "[unclosed"),
            other => panic!("expected pattern error, got {:?}", other),
        }
    }
}
