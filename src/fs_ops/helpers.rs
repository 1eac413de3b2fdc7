//! I/O helper utilities.
//!
//! Turns raw OS error codes into short actionable hints for error messages, and
//! classifies the "name already taken" family of failures that drive collision
//! retries.

use std::io;

/// Platform-aware hint suffix for an I/O error (empty when nothing useful applies).
pub(crate) fn os_hint(e: &io::Error) -> String {
    let hint = match e.raw_os_error() {
        Some(code) => match code {
            libc::EACCES | libc::EPERM => ": permission denied; check ownership and write permissions.",
            libc::EXDEV => ": cross-filesystem; atomic rename not possible.",
            libc::EBUSY => ": resource busy; ensure no other process is using it.",
            libc::ENOENT => ": path not found; verify it exists.",
            libc::EEXIST | libc::ENOTEMPTY => ": already exists.",
            libc::ENOSPC => ": insufficient space on device.",
            libc::EROFS => ": read-only filesystem; cannot write here.",
            libc::EIO => ": low-level I/O error; data may not be on stable storage.",
            libc::ELOOP => ": too many symbolic link levels (ELOOP); possible symlink cycle.",
            libc::ENAMETOOLONG => ": filename or path too long; shorten path segments.",
            libc::EMFILE => ": process file descriptor limit reached; close files or raise limits.",
            libc::ENFILE => ": system-wide file table overflow; reduce open files.",
            _ => "",
        },
        None => match e.kind() {
            io::ErrorKind::PermissionDenied => ": permission denied; check ownership and write permissions.",
            io::ErrorKind::NotFound => ": path not found; verify it exists.",
            io::ErrorKind::AlreadyExists => ": already exists.",
            _ => "",
        },
    };

    match e.raw_os_error() {
        Some(code) => format!("{hint} [os code: {code}]"),
        None => hint.to_string(),
    }
}

/// True when `e` means the destination name is already occupied.
///
/// `rename(2)` onto a non-empty directory reports `ENOTEMPTY` (or `EEXIST` on
/// some systems) rather than `AlreadyExists`, so both codes count.
pub(crate) fn is_occupied(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::AlreadyExists {
        return true;
    }
    matches!(e.raw_os_error(), Some(libc::EEXIST) | Some(libc::ENOTEMPTY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enospc_hint_includes_code() {
        let msg = os_hint(&io::Error::from_raw_os_error(libc::ENOSPC));
        assert!(msg.contains("insufficient space"), "msg was: {msg}");
        assert!(msg.contains("os code"));
    }

    #[test]
    fn kind_fallback_without_os_code() {
        let msg = os_hint(&io::Error::from(io::ErrorKind::NotFound));
        assert!(msg.contains("path not found"));
        assert!(!msg.contains("os code"));
    }

    #[test]
    fn occupied_covers_not_empty() {
        assert!(is_occupied(&io::Error::from_raw_os_error(libc::ENOTEMPTY)));
        assert!(is_occupied(&io::Error::from_raw_os_error(libc::EEXIST)));
        assert!(is_occupied(&io::Error::from(io::ErrorKind::AlreadyExists)));
        assert!(!is_occupied(&io::Error::from_raw_os_error(libc::EACCES)));
    }
}
