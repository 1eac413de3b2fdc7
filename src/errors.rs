//! Typed error definitions for atomic_paths.
//! Each I/O failure is tagged with the step that failed and the path it touched,
//! so callers can tell a sync failure from a rename failure.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fs_ops::helpers::os_hint;

/// The filesystem step an [`AtomicPathsError::Io`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Create,
    Mkdir,
    Sync,
    Close,
    Rename,
    SyncDir,
    Remove,
    Chmod,
    ReadDir,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Open => "open",
            Op::Create => "create",
            Op::Mkdir => "mkdir",
            Op::Sync => "sync",
            Op::Close => "close",
            Op::Rename => "rename",
            Op::SyncDir => "sync-dir",
            Op::Remove => "remove",
            Op::Chmod => "chmod",
            Op::ReadDir => "read-dir",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AtomicPathsError {
    #[error("invalid path '{}': no final component to replace", .0.display())]
    InvalidPath(PathBuf),

    #[error("read random bytes: {0}")]
    RandomSource(#[source] io::Error),

    #[error("exhausted {attempts} attempts to claim a temporary name beside '{}'", .path.display())]
    Exhausted { path: PathBuf, attempts: u32 },

    #[error("already committed")]
    AlreadyCommitted,

    #[error("already closed")]
    AlreadyClosed,

    #[error("temporary artifact was discarded; nothing to commit")]
    RolledBack,

    #[error("{op} '{}': {source}{}", .path.display(), os_hint(.source))]
    Io {
        op: Op,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AtomicPathsError {
    pub(crate) fn io(op: Op, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| AtomicPathsError::Io { op, path, source }
    }

    /// Stable short code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            AtomicPathsError::InvalidPath(_) => "invalid_path",
            AtomicPathsError::RandomSource(_) => "random_source",
            AtomicPathsError::Exhausted { .. } => "exhausted",
            AtomicPathsError::AlreadyCommitted => "already_committed",
            AtomicPathsError::AlreadyClosed => "already_closed",
            AtomicPathsError::RolledBack => "rolled_back",
            AtomicPathsError::Io { .. } => "io",
        }
    }

    /// The failing step, for I/O errors.
    pub fn op(&self) -> Option<Op> {
        match self {
            AtomicPathsError::Io { op, .. } => Some(*op),
            _ => None,
        }
    }
}

pub type Result<T, E = AtomicPathsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_step_and_path() {
        let err = AtomicPathsError::io(Op::Rename, "/data/foo")(io::Error::from(
            io::ErrorKind::NotFound,
        ));
        let msg = err.to_string();
        assert!(msg.starts_with("rename '/data/foo'"), "msg was: {msg}");
        assert_eq!(err.op(), Some(Op::Rename));
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn misuse_errors_have_no_step() {
        assert_eq!(AtomicPathsError::AlreadyClosed.op(), None);
        assert_eq!(AtomicPathsError::RolledBack.code(), "rolled_back");
    }
}
