//! Core library for `atomic_paths`.
//!
//! Create a file or directory under a hidden temporary name next to its final
//! location, fill it, then `commit` to move it into place durably:
//!
//! ```no_run
//! use std::io::Write;
//!
//! let mut f = atomic_paths::create_file("settings.toml", 0o644)?;
//! f.write_all(b"answer = 42\n")?;
//! f.commit()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! A file commit is fsync(file), close, rename, fsync(parent). Directories are
//! swapped into place: an existing occupant is moved aside first and deleted
//! after the new directory is placed. Any step that fails can be retried by
//! calling `commit` again; `close` before a commit rolls everything back.

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod output;
pub mod platform;
pub mod shutdown;

pub use config::{default_config_path, path_has_symlink_ancestor, Config, LogLevel};
pub use errors::{AtomicPathsError, Op, Result};
pub use fs_ops::{
    create_dir, create_file, find_orphans, remove_orphans, EntropySource, Options, Orphan,
    OrphanKind, OsEntropy, SweepOptions, TemporaryDirectory, TemporaryFile,
};
