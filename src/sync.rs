//! Sync planner/applier
//!
//! Applies a [`DiffPlan`] against the device in a fixed order: deletions,
//! then additions, then updates. Deleting stale paths first avoids name
//! collisions when a path changed kind between sides. Every action is
//! reported before its side effect, so a dry run is an accurate preview.

use crate::channel::CommandChannel;
use crate::diff::{ChangePolicy, DiffPlan};
use crate::error::Result;
use crate::logger::Logger;
use crossterm::style::{Color, Stylize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Report the plan without performing any channel operation.
    pub dry_run: bool,
    /// Never delete on the device; additions and updates still apply.
    pub upload_only: bool,
    pub policy: ChangePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub deleted: usize,
    pub added: usize,
    pub updated: usize,
    pub dry_run: bool,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.deleted + self.added + self.updated
    }
}

/// Join a device-side destination path onto the remote root.
pub fn join_remote(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    format!("{}/{}", root, path)
}

/// Apply `plan` to the device.
///
/// The channel handle is exclusive for the duration of the call; a transport
/// failure aborts the whole operation and already-applied actions stay
/// applied. Re-running the sync converges because the plan is recomputed
/// from current state each time.
pub fn apply(
    channel: &mut dyn CommandChannel,
    plan: &DiffPlan,
    local_root: &Path,
    remote_root: &str,
    opts: &SyncOptions,
    logger: &dyn Logger,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary {
        dry_run: opts.dry_run,
        ..SyncSummary::default()
    };

    if plan.is_empty() {
        println!(
            "{}",
            "Local and remote directories match".with(Color::Green)
        );
        logger.done(&summary);
        return Ok(summary);
    }

    if opts.dry_run {
        println!("{}", "Dry run - no files will be transferred or deleted".bold());
    }

    if !plan.to_delete.is_empty() {
        println!("{}", "Delete".with(Color::Red).bold());
        logger.section("delete", plan.to_delete.len());
        for path in &plan.to_delete {
            println!("  {}", path);
            logger.action("delete", path);
            if !opts.dry_run && !opts.upload_only {
                let dst = join_remote(remote_root, path);
                if let Err(e) = channel.remove(&dst) {
                    logger.error("delete", path, &e.to_string());
                    return Err(e);
                }
                summary.deleted += 1;
            }
        }
    }

    if !plan.to_add.is_empty() {
        println!("{}", "Add".with(Color::Green).bold());
        logger.section("add", plan.to_add.len());
        for path in &plan.to_add {
            println!("  {}", path);
            logger.action("add", path);
            if !opts.dry_run {
                let src = local_root.join(path);
                let dst = join_remote(remote_root, path);
                if let Err(e) = channel.upload(&src, &dst) {
                    logger.error("upload", path, &e.to_string());
                    return Err(e);
                }
                summary.added += 1;
            }
        }
    }

    if !plan.to_update.is_empty() {
        println!("{}", "Update".with(Color::Cyan).bold());
        logger.section("update", plan.to_update.len());
        for path in &plan.to_update {
            println!("  {}", path);
            logger.action("update", path);
            if !opts.dry_run {
                let src = local_root.join(path);
                let dst = join_remote(remote_root, path);
                // The device's file-creation primitive cannot safely
                // overwrite an existing path, so an update is
                // remove-then-upload through the same primitives as
                // delete/add.
                if let Err(e) = channel.remove(&dst) {
                    logger.error("update", path, &e.to_string());
                    return Err(e);
                }
                if let Err(e) = channel.upload(&src, &dst) {
                    logger.error("update", path, &e.to_string());
                    return Err(e);
                }
                summary.updated += 1;
            }
        }
    }

    logger.done(&summary);
    Ok(summary)
}
