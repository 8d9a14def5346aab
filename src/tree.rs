//! Tree map reduction
//!
//! Reduces a (filtered) walk output to a map from canonical relative file
//! path to metadata. Directories are dropped here; they exist only so the
//! listing display can show structure. A map is rebuilt from scratch on every
//! invocation and never cached.

use crate::walk::FileEntry;
use std::collections::BTreeMap;

/// Metadata kept per file for diffing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileMeta {
    pub size: u64,
    pub mtime: f64,
}

/// Canonical relative file path -> metadata. BTreeMap keeps keys sorted so
/// the diff output is deterministic.
pub type TreeMap = BTreeMap<String, FileMeta>;

/// Strip the leading `/` a device listing carries on its relative paths.
pub fn canonical(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Reduce an entry sequence to a [`TreeMap`].
pub fn tree_map(entries: &[FileEntry]) -> TreeMap {
    let mut map = TreeMap::new();
    for entry in entries {
        if entry.is_dir() {
            continue;
        }
        map.insert(
            canonical(&entry.path).to_string(),
            FileMeta {
                size: entry.size,
                mtime: entry.mtime,
            },
        );
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::EntryKind;

    fn entry(kind: EntryKind, path: &str, size: u64) -> FileEntry {
        FileEntry {
            kind,
            depth: 0,
            path: path.into(),
            mtime: 100.0,
            size,
        }
    }

    #[test]
    fn test_directories_excluded() {
        let entries = vec![
            entry(EntryKind::Directory, "lib", 0),
            entry(EntryKind::File, "lib/a.py", 3),
        ];
        let map = tree_map(&entries);
        assert_eq!(map.len(), 1);
        assert_eq!(map["lib/a.py"].size, 3);
    }

    #[test]
    fn test_leading_slash_stripped() {
        let entries = vec![entry(EntryKind::File, "/boot.py", 7)];
        let map = tree_map(&entries);
        assert!(map.contains_key("boot.py"));
        assert!(!map.contains_key("/boot.py"));
    }

    #[test]
    fn test_keys_sorted() {
        let entries = vec![
            entry(EntryKind::File, "z.py", 1),
            entry(EntryKind::File, "a.py", 1),
            entry(EntryKind::File, "m/x.py", 1),
        ];
        let keys: Vec<_> = tree_map(&entries).into_keys().collect();
        assert_eq!(keys, vec!["a.py", "m/x.py", "z.py"]);
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("/a/b.py"), "a/b.py");
        assert_eq!(canonical("a/b.py"), "a/b.py");
    }
}
