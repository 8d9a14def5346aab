//! Tree walkers
//!
//! Two walkers share one data contract: the local walker enumerates a
//! directory with direct filesystem calls, the remote walker runs the fixed
//! listing program on the device and decodes its streamed output. Both emit
//! entries in preorder with lexicographically sorted siblings, never emit the
//! walk root itself, and abort on the first failure rather than returning a
//! partial tree.

use crate::channel::CommandChannel;
use crate::error::{Result, SyncError};
use crate::wire;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One node observed during a tree walk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub kind: EntryKind,
    /// Distance from the walk root; 0 for the root's direct children.
    pub depth: u32,
    /// POSIX-style path relative to the walk root, `/`-separated.
    pub path: String,
    /// Seconds since the epoch of whichever clock produced the entry.
    pub mtime: f64,
    /// Byte count; always 0 for directories.
    pub size: u64,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Final path component, used for display.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Recursively enumerate a local directory.
///
/// Any walk or stat failure (permission denied, broken link, entry vanishing
/// mid-walk) aborts the whole walk; no partial result is returned. Paths are
/// passed absolutely at each step, the process working directory is never
/// touched, and symlinks are not followed.
pub fn walk_local(root: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for item in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            SyncError::filesystem(path, e.into())
        })?;

        let meta = item
            .metadata()
            .map_err(|e| SyncError::filesystem(item.path().to_path_buf(), e.into()))?;

        let rel = item
            .path()
            .strip_prefix(root)
            .expect("walked path is under the walk root");
        let path: String = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mtime = meta
            .modified()
            .map_err(|e| SyncError::filesystem(item.path().to_path_buf(), e))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        entries.push(FileEntry {
            kind,
            depth: (item.depth() - 1) as u32,
            path,
            mtime,
            size: if meta.is_dir() { 0 } else { meta.len() },
        });
    }

    Ok(entries)
}

/// Enumerate a directory tree on the device.
///
/// The fixed listing program is transmitted once with `root` bound as its
/// argument; the device streams back one wire-format line per entry. A
/// malformed line fails the whole walk, because a sync plan built on a
/// truncated tree is unsafe.
pub fn walk_remote(channel: &mut dyn CommandChannel, root: &str) -> Result<Vec<FileEntry>> {
    let lines = channel.send_listing(root)?;

    let mut entries = Vec::with_capacity(lines.len());
    for line in &lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        entries.push(wire::decode_entry(line)?);
    }
    Ok(entries)
}
