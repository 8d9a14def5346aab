//! Machine-readable action log
//!
//! The applier reports every planned action here in addition to the console.
//! `NoopLogger` keeps hot paths free when no log file was requested.

use crate::error::Result as SyncResult;
use crate::sync::SyncSummary;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn section(&self, _name: &str, _count: usize) {}
    fn action(&self, _verb: &str, _path: &str) {}
    fn error(&self, _context: &str, _path: &str, _msg: &str) {}
    fn done(&self, _summary: &SyncSummary) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|e| crate::error::SyncError::filesystem(path.as_ref().to_path_buf(), e))?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn section(&self, name: &str, count: usize) {
        self.line(&format!("PHASE name={} files={}", name, count));
    }
    fn action(&self, verb: &str, path: &str) {
        self.line(&format!("{} path={}", verb.to_uppercase(), path));
    }
    fn error(&self, context: &str, path: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} path={} msg={}", context, path, msg));
    }
    fn done(&self, summary: &SyncSummary) {
        self.line(&format!(
            "DONE deleted={} added={} updated={}",
            summary.deleted, summary.added, summary.updated
        ));
    }
}
