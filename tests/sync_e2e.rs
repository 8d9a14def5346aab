//! End-to-end pipeline test against an in-memory mock device:
//! walk -> filter -> map -> diff -> apply -> re-walk.

use mpsync::channel::CommandChannel;
use mpsync::diff::{diff, ChangePolicy, DiffPlan};
use mpsync::error::{Phase, Result as SyncResult, SyncError};
use mpsync::filter::FilterSpec;
use mpsync::logger::NoopLogger;
use mpsync::sync::{apply, SyncOptions, SyncSummary};
use mpsync::tree::{canonical, tree_map};
use mpsync::walk::{walk_local, walk_remote, EntryKind, FileEntry};
use mpsync::wire;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

/// In-memory device filesystem speaking the listing wire format.
struct MockDevice {
    files: BTreeMap<String, Vec<u8>>,
}

impl MockDevice {
    fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|&(p, d)| (p.to_string(), d.to_vec()))
                .collect(),
        }
    }

    fn listing_entries(&self) -> Vec<FileEntry> {
        let mut dirs = std::collections::BTreeSet::new();
        for path in self.files.keys() {
            let parts: Vec<&str> = path.split('/').collect();
            for i in 1..parts.len() {
                dirs.insert(parts[..i].join("/"));
            }
        }
        let mut entries = Vec::new();
        for dir in &dirs {
            entries.push(FileEntry {
                kind: EntryKind::Directory,
                depth: dir.matches('/').count() as u32,
                path: format!("/{}", dir),
                mtime: 0.0,
                size: 0,
            });
        }
        for (path, data) in &self.files {
            entries.push(FileEntry {
                kind: EntryKind::File,
                depth: path.matches('/').count() as u32,
                path: format!("/{}", path),
                mtime: 0.0,
                size: data.len() as u64,
            });
        }
        entries
    }
}

impl CommandChannel for MockDevice {
    fn send_listing(&mut self, _root: &str) -> SyncResult<Vec<String>> {
        Ok(self
            .listing_entries()
            .iter()
            .map(wire::encode_entry)
            .collect())
    }

    fn upload(&mut self, local: &Path, remote: &str) -> SyncResult<()> {
        let data =
            std::fs::read(local).map_err(|e| SyncError::filesystem(local.to_path_buf(), e))?;
        self.files.insert(canonical(remote).to_string(), data);
        Ok(())
    }

    fn remove(&mut self, remote: &str) -> SyncResult<()> {
        let key = canonical(remote).to_string();
        if self.files.remove(&key).is_some() {
            return Ok(());
        }
        // recursive directory remove
        let prefix = format!("{}/", key);
        let victims: Vec<String> = self
            .files
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        if victims.is_empty() {
            return Err(SyncError::transport(Phase::Delete, "no such path"));
        }
        for victim in victims {
            self.files.remove(&victim);
        }
        Ok(())
    }
}

fn plan_and_apply(
    local_root: &Path,
    device: &mut MockDevice,
    filter: &FilterSpec,
    opts: &SyncOptions,
) -> (DiffPlan, SyncSummary) {
    let local = filter.apply(walk_local(local_root).unwrap());
    let remote = filter.apply(walk_remote(device, "/").unwrap());
    let plan = diff(&tree_map(&local), &tree_map(&remote), opts.policy);
    let summary = apply(device, &plan, local_root, "/", opts, &NoopLogger).unwrap();
    (plan, summary)
}

fn py_filter() -> FilterSpec {
    FilterSpec::new(&["*.py".to_string()], &[]).unwrap()
}

fn local_fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.py"), b"0123456789").unwrap();
    std::fs::create_dir(temp.path().join("sub")).unwrap();
    std::fs::write(temp.path().join("sub").join("c.py"), b"1234567").unwrap();
    temp
}

#[test]
fn full_sync_converges() {
    let local = local_fixture();
    let mut device = MockDevice::new(&[("a.py", b"012345678901"), ("old.py", b"01234")]);

    let filter = py_filter();
    let opts = SyncOptions::default();
    let (plan, summary) = plan_and_apply(local.path(), &mut device, &filter, &opts);

    assert_eq!(plan.to_delete, vec!["old.py"]);
    assert_eq!(plan.to_add, vec!["sub/c.py"]);
    assert_eq!(plan.to_update, vec!["a.py"]);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.updated, 1);

    // device now mirrors the local tree
    assert_eq!(device.files.get("a.py").unwrap(), b"0123456789");
    assert_eq!(device.files.get("sub/c.py").unwrap(), b"1234567");
    assert!(!device.files.contains_key("old.py"));

    // recomputing the diff against the updated device yields an empty plan
    let (plan, summary) = plan_and_apply(local.path(), &mut device, &filter, &opts);
    assert!(plan.is_empty());
    assert_eq!(summary.total(), 0);
}

#[test]
fn dry_run_leaves_device_untouched() {
    let local = local_fixture();
    let mut device = MockDevice::new(&[("old.py", b"01234")]);
    let before = device.files.clone();

    let opts = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let (plan, summary) = plan_and_apply(local.path(), &mut device, &py_filter(), &opts);

    assert!(!plan.is_empty());
    assert_eq!(summary.total(), 0);
    assert_eq!(device.files, before);
}

#[test]
fn upload_only_keeps_stale_device_files() {
    let local = local_fixture();
    let mut device = MockDevice::new(&[("old.py", b"01234")]);

    let opts = SyncOptions {
        upload_only: true,
        ..SyncOptions::default()
    };
    let (plan, summary) = plan_and_apply(local.path(), &mut device, &py_filter(), &opts);

    assert_eq!(plan.to_delete, vec!["old.py"]);
    assert_eq!(summary.deleted, 0);
    assert!(device.files.contains_key("old.py"));
    assert!(device.files.contains_key("a.py"));
    assert!(device.files.contains_key("sub/c.py"));
}

#[test]
fn excluded_device_files_survive_sync() {
    let local = local_fixture();
    let mut device = MockDevice::new(&[("boot.py", b"import machine")]);

    let filter = FilterSpec::new(&["*.py".to_string()], &["boot.py".to_string()]).unwrap();
    let opts = SyncOptions::default();
    let (plan, _) = plan_and_apply(local.path(), &mut device, &filter, &opts);

    // boot.py is filtered out of the destination map, so it is never deleted
    assert!(plan.to_delete.is_empty());
    assert!(device.files.contains_key("boot.py"));
}

#[test]
fn malformed_listing_line_aborts_remote_walk() {
    struct BrokenDevice;
    impl CommandChannel for BrokenDevice {
        fn send_listing(&mut self, _root: &str) -> SyncResult<Vec<String>> {
            Ok(vec![
                "F,0,'/a.py',1,2".to_string(),
                "F,0,not-a-literal,1,2".to_string(),
            ])
        }
        fn upload(&mut self, _local: &Path, _remote: &str) -> SyncResult<()> {
            unreachable!()
        }
        fn remove(&mut self, _remote: &str) -> SyncResult<()> {
            unreachable!()
        }
    }

    let mut device = BrokenDevice;
    match walk_remote(&mut device, "/") {
        Err(SyncError::Parse { .. }) => {}
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn mtime_policy_reuploads_older_destination() {
    let local = local_fixture();
    // same sizes as local, mtime 0.0 (older than any real local mtime)
    let mut device = MockDevice::new(&[("a.py", b"0123456789")]);

    let filter = FilterSpec::new(&["a.py".to_string()], &[]).unwrap();
    let opts = SyncOptions {
        policy: ChangePolicy::SizeAndMtime,
        ..SyncOptions::default()
    };
    let (plan, _) = plan_and_apply(local.path(), &mut device, &filter, &opts);
    assert_eq!(plan.to_update, vec!["a.py"]);

    let size_only = SyncOptions::default();
    let (plan, _) = plan_and_apply(local.path(), &mut device, &filter, &size_only);
    assert!(plan.is_empty());
}
