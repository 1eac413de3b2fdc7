//! Platform-specific helpers.
//! Directory descriptors and `*at` syscalls are POSIX-only, so only a Unix
//! backend exists.

#[cfg(not(unix))]
compile_error!("atomic_paths requires a Unix platform (openat/renameat/fsync on directories)");

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{
    close_file, ensure_mode_bits, open_log_file_secure_append, rename_noreplace, ParentDir,
};
