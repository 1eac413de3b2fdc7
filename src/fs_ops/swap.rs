//! Directory swap.
//!
//! `rename(2)` cannot replace a non-empty directory, so placing a new directory
//! over an existing one goes:
//!
//! 1. rename new -> destination; done if the destination was free.
//! 2. otherwise rename the occupant aside to `.#<name>.original-<rand>.tmp`
//!    and try step 1 again.
//! 3. fsync the parent directory, then force-remove the aside artifacts.
//!
//! A crash before the aside removal finishes leaves the old content under its aside name next
//! to the destination. That artifact is the recovery signal; nothing removes
//! it automatically (see `sweep`).

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::claim::claim_temp_name;
use super::helpers::is_occupied;
use super::options::Options;
use super::tmpname::split_path;
use crate::errors::{AtomicPathsError, Op, Result};
use crate::platform::{ensure_mode_bits, rename_noreplace};

const ASIDE_MARKER: &str = ".original";

/// Base name an aside artifact is derived from.
fn aside_base(name: &OsStr) -> OsString {
    let mut base = name.to_os_string();
    base.push(ASIDE_MARKER);
    base
}

/// True when an original name (as recovered from a temp name) marks an aside.
pub(crate) fn is_aside_name(original: &str) -> bool {
    original.ends_with(ASIDE_MARKER)
}

/// Move whatever is at `dir/name` to a fresh aside name in `dir`.
fn rename_aside(opts: &Options, dir: &Path, name: &OsStr) -> Result<PathBuf> {
    let occupant = dir.join(name);
    let (aside_name, ()) = claim_temp_name(
        opts.entropy.as_ref(),
        opts.retry_budget,
        dir,
        &aside_base(name),
        Op::Rename,
        |candidate| rename_noreplace(&occupant, &dir.join(candidate)),
    )?;
    let aside = dir.join(aside_name);
    debug!(occupant = %occupant.display(), aside = %aside.display(), "moved existing entry aside");
    Ok(aside)
}

/// Rename `from` onto `to`, moving any occupant of `to` aside first.
///
/// The retry budget bounds how many occupants are moved aside; a rename onto
/// a free destination never counts against it.
///
/// Returns the aside artifacts that still hold old content; the caller
/// deletes them once the new content is in place.
pub(crate) fn move_into_place(from: &Path, to: &Path, opts: &Options) -> Result<Vec<PathBuf>> {
    let (dir, name) = split_path(to)?;
    let mut asides = Vec::new();

    loop {
        match fs::rename(from, to) {
            Ok(()) => return Ok(asides),
            Err(e) if is_occupied(&e) || occupied_by_non_dir(to, &e) => {
                if asides.len() >= opts.retry_budget as usize {
                    break;
                }
                match rename_aside(opts, &dir, &name) {
                    Ok(aside) => asides.push(aside),
                    Err(err) => {
                        restore_aside(&mut asides, to);
                        return Err(err);
                    }
                }
            }
            Err(e) => {
                restore_aside(&mut asides, to);
                return Err(AtomicPathsError::io(Op::Rename, to)(e));
            }
        }
    }

    restore_aside(&mut asides, to);
    Err(AtomicPathsError::Exhausted {
        path: to.to_path_buf(),
        attempts: opts.retry_budget,
    })
}

/// A directory cannot be renamed over a file or symlink (`ENOTDIR`); that
/// occupant is moved aside like an existing directory.
fn occupied_by_non_dir(to: &Path, e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::ENOTDIR)
        && fs::symlink_metadata(to).is_ok_and(|m| !m.is_dir())
}

/// Put the most recent aside back so a failed swap does not leave `to` empty.
fn restore_aside(asides: &mut Vec<PathBuf>, to: &Path) {
    let Some(aside) = asides.pop() else {
        return;
    };
    if let Err(e) = rename_noreplace(&aside, to) {
        warn!(
            aside = %aside.display(),
            target_path = %to.display(),
            error = %e,
            "could not restore original after failed swap; old content remains aside"
        );
        asides.push(aside);
    }
}

/// Make everything under `path` deletable by its owner (dirs u+rwx, files
/// u+rw), then remove it. Symlinks are removed, never followed.
pub(crate) fn force_remove_all(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AtomicPathsError::io(Op::Remove, path)(e)),
    };

    if meta.is_dir() {
        make_tree_removable(path)?;
        fs::remove_dir_all(path).map_err(AtomicPathsError::io(Op::Remove, path))
    } else {
        fs::remove_file(path).map_err(AtomicPathsError::io(Op::Remove, path))
    }
}

fn make_tree_removable(dir: &Path) -> Result<()> {
    // Permissions first: an unreadable directory cannot be listed.
    ensure_mode_bits(dir, 0o700).map_err(AtomicPathsError::io(Op::Chmod, dir))?;
    let entries = fs::read_dir(dir).map_err(AtomicPathsError::io(Op::ReadDir, dir))?;
    for entry in entries {
        let entry = entry.map_err(AtomicPathsError::io(Op::ReadDir, dir))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(AtomicPathsError::io(Op::ReadDir, &path))?;
        if file_type.is_dir() {
            make_tree_removable(&path)?;
        } else if file_type.is_file() {
            ensure_mode_bits(&path, 0o600).map_err(AtomicPathsError::io(Op::Chmod, &path))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::tmpname::parse_temp_name;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn free_destination_is_a_plain_rename() {
        let td = tempdir().unwrap();
        let from = td.path().join("new");
        let to = td.path().join("dest");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("a"), b"new").unwrap();

        let asides = move_into_place(&from, &to, &Options::new()).unwrap();
        assert!(asides.is_empty());
        assert_eq!(fs::read(to.join("a")).unwrap(), b"new");
        assert!(!from.exists());
    }

    #[test]
    fn interrupted_swap_keeps_old_content_aside() {
        let td = tempdir().unwrap();
        let from = td.path().join("new");
        let to = td.path().join("dest");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("a"), b"new").unwrap();
        fs::create_dir(&to).unwrap();
        fs::write(to.join("a"), b"old").unwrap();

        // Stop before deleting the aside, as a crash would.
        let asides = move_into_place(&from, &to, &Options::new()).unwrap();
        assert_eq!(asides.len(), 1);
        let aside = &asides[0];

        assert_eq!(fs::read(to.join("a")).unwrap(), b"new");
        assert_eq!(fs::read(aside.join("a")).unwrap(), b"old");
        assert_eq!(aside.parent(), to.parent());
        let original = parse_temp_name(aside.file_name().unwrap()).unwrap();
        assert_eq!(original, "dest.original");
        assert!(is_aside_name(original));
        assert_eq!(entries(td.path()).len(), 2);
    }

    #[test]
    fn single_retry_budget_replaces_existing_directory() {
        let td = tempdir().unwrap();
        let from = td.path().join("new");
        let to = td.path().join("dest");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("a"), b"new").unwrap();
        fs::create_dir(&to).unwrap();
        fs::write(to.join("a"), b"old").unwrap();

        let asides = move_into_place(&from, &to, &Options::new().retry_budget(1)).unwrap();
        assert_eq!(asides.len(), 1);
        assert_eq!(fs::read(to.join("a")).unwrap(), b"new");
        assert_eq!(fs::read(asides[0].join("a")).unwrap(), b"old");
    }

    #[test]
    fn failed_placement_restores_original() {
        let td = tempdir().unwrap();
        let missing = td.path().join("does-not-exist");
        let to = td.path().join("dest");
        fs::create_dir(&to).unwrap();
        fs::write(to.join("a"), b"old").unwrap();

        // Source vanished: the first rename fails with ENOENT before any aside.
        let err = move_into_place(&missing, &to, &Options::new()).unwrap_err();
        assert_eq!(err.op(), Some(Op::Rename));
        assert_eq!(fs::read(to.join("a")).unwrap(), b"old");
        assert_eq!(entries(td.path()), vec!["dest".to_string()]);
    }

    #[test]
    fn force_remove_handles_read_only_tree() {
        let td = tempdir().unwrap();
        let root = td.path().join("tree");
        let sub = root.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("f"), b"x").unwrap();
        fs::set_permissions(sub.join("f"), fs::Permissions::from_mode(0o400)).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o500)).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o500)).unwrap();

        force_remove_all(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn force_remove_leaves_symlink_targets_alone() {
        let td = tempdir().unwrap();
        let outside = td.path().join("outside");
        fs::write(&outside, b"keep").unwrap();
        fs::set_permissions(&outside, fs::Permissions::from_mode(0o400)).unwrap();
        let root = td.path().join("tree");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        force_remove_all(&root).unwrap();
        assert!(!root.exists());
        let mode = fs::metadata(&outside).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o400);
    }

    #[test]
    fn force_remove_missing_path_is_ok() {
        let td = tempdir().unwrap();
        force_remove_all(&td.path().join("nope")).unwrap();
    }
}
