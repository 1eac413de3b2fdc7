//! Orphaned temporary artifacts.
//!
//! A crash can leave `.#<name>-<rand>.tmp` entries behind: uncommitted temp
//! files/directories, or old directory content moved aside mid-swap. Nothing
//! reclaims them automatically; this module finds them and, when asked,
//! removes them.
//!
//! Notes:
//! - Entries younger than `min_age` are skipped so a live writer in another
//!   process is not disturbed.
//! - Walks at most `max_depth` levels (1 = direct children only) and never
//!   descends into an orphan.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::swap::{force_remove_all, is_aside_name};
use super::tmpname::parse_temp_name;
use crate::config::DEFAULT_SWEEP_MIN_AGE;
use crate::errors::{AtomicPathsError, Op, Result};

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub max_depth: usize,
    pub min_age: Duration,
    /// Log what would be removed without touching anything.
    pub dry_run: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            min_age: DEFAULT_SWEEP_MIN_AGE,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanKind {
    File,
    Dir,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub path: PathBuf,
    /// Name the artifact was derived from (`<name>.original` for asides).
    pub original_name: String,
    pub kind: OrphanKind,
    /// Old directory content moved aside by an interrupted swap.
    pub aside: bool,
}

/// List temporary artifacts under `root` older than `opts.min_age`.
pub fn find_orphans(root: &Path, opts: &SweepOptions) -> Result<Vec<Orphan>> {
    let cutoff = SystemTime::now()
        .checked_sub(opts.min_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(opts.max_depth.max(1))
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            AtomicPathsError::io(Op::ReadDir, path)(e.into())
        })?;

        let Some(original) = parse_temp_name(entry.file_name()) else {
            continue;
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            walker.skip_current_dir();
        }

        let meta = entry
            .metadata()
            .map_err(|e| AtomicPathsError::io(Op::ReadDir, entry.path())(e.into()))?;
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if modified > cutoff {
            debug!(path = %entry.path().display(), "skipping recent temporary artifact");
            continue;
        }

        let kind = if file_type.is_dir() {
            OrphanKind::Dir
        } else if file_type.is_file() {
            OrphanKind::File
        } else {
            OrphanKind::Other
        };
        found.push(Orphan {
            path: entry.path().to_path_buf(),
            original_name: original.to_string(),
            kind,
            aside: is_aside_name(original),
        });
    }

    Ok(found)
}

/// Remove the orphans found under `root`; returns what was (or, on a dry run,
/// would have been) removed. Stops at the first removal failure.
pub fn remove_orphans(root: &Path, opts: &SweepOptions) -> Result<Vec<Orphan>> {
    let orphans = find_orphans(root, opts)?;
    for orphan in &orphans {
        if opts.dry_run {
            info!(path = %orphan.path.display(), aside = orphan.aside, "dry-run: would remove orphan");
            continue;
        }
        if orphan.aside {
            warn!(path = %orphan.path.display(), "removing old content left aside by an interrupted swap");
        }
        force_remove_all(&orphan.path)?;
        info!(path = %orphan.path.display(), "removed orphan");
    }
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn immediate() -> SweepOptions {
        SweepOptions {
            min_age: Duration::ZERO,
            ..SweepOptions::default()
        }
    }

    #[test]
    fn finds_files_dirs_and_asides() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(".#a.txt-0123abcd.tmp"), b"x").unwrap();
        fs::create_dir(td.path().join(".#site.original-vvvvvvvv.tmp")).unwrap();
        fs::write(td.path().join("keep.txt"), b"x").unwrap();
        fs::write(td.path().join(".#bad-name.tmp"), b"x").unwrap();

        let mut found = find_orphans(td.path(), &immediate()).unwrap();
        found.sort_by(|a, b| a.original_name.cmp(&b.original_name));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].original_name, "a.txt");
        assert_eq!(found[0].kind, OrphanKind::File);
        assert!(!found[0].aside);
        assert_eq!(found[1].original_name, "site.original");
        assert_eq!(found[1].kind, OrphanKind::Dir);
        assert!(found[1].aside);
    }

    #[test]
    fn recent_artifacts_are_skipped() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(".#a-00000000.tmp"), b"x").unwrap();
        let found = find_orphans(td.path(), &SweepOptions::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn depth_limits_walk() {
        let td = tempdir().unwrap();
        let nested = td.path().join("sub");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join(".#a-00000000.tmp"), b"x").unwrap();

        assert!(find_orphans(td.path(), &immediate()).unwrap().is_empty());
        let deep = SweepOptions {
            max_depth: 2,
            ..immediate()
        };
        assert_eq!(find_orphans(td.path(), &deep).unwrap().len(), 1);
    }

    #[test]
    fn remove_respects_dry_run() {
        let td = tempdir().unwrap();
        let orphan = td.path().join(".#a-00000000.tmp");
        fs::create_dir(&orphan).unwrap();
        fs::write(orphan.join("inner"), b"x").unwrap();

        let dry = SweepOptions {
            dry_run: true,
            ..immediate()
        };
        assert_eq!(remove_orphans(td.path(), &dry).unwrap().len(), 1);
        assert!(orphan.exists());

        assert_eq!(remove_orphans(td.path(), &immediate()).unwrap().len(), 1);
        assert!(!orphan.exists());
    }
}
