//! Error taxonomy for the sync engine
//!
//! Every failure aborts the operation it belongs to; nothing is retried
//! inside the core. The binary wraps these with `anyhow` context.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which part of a sync operation an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Local tree walk
    ListLocal,
    /// Remote tree listing over the command channel
    ListRemote,
    /// Remote recursive delete
    Delete,
    /// Upload of a local file to the device
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ListLocal => "listing/local",
            Phase::ListRemote => "listing/remote",
            Phase::Delete => "delete",
            Phase::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Local stat/list/read failure during a walk; no partial tree is kept.
    #[error("filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Channel failure during listing, upload or delete; fatal to the whole
    /// sync operation. Already-applied actions are not rolled back.
    #[error("transport error during {phase}: {msg}")]
    Transport { phase: Phase, msg: String },

    /// Malformed listing line from the device; fatal to the remote walk.
    #[error("malformed listing line {line:?}: {reason}")]
    Parse { line: String, reason: String },

    /// Invalid glob pattern, reported at filter construction time.
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl SyncError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn transport(phase: Phase, msg: impl Into<String>) -> Self {
        SyncError::Transport {
            phase,
            msg: msg.into(),
        }
    }

    pub fn parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Parse {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
