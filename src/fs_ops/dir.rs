//! Temporary directory that replaces its original path on commit.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::claim::claim_temp_name;
use super::options::Options;
use super::state::{CloseAction, Phase, State};
use super::swap::{force_remove_all, move_into_place};
use super::tmpname::split_path;
use crate::errors::{AtomicPathsError, Op, Result};
use crate::platform::ParentDir;

/// A freshly created directory beside the original path. Populate it through
/// [`TemporaryDirectory::name`], then `commit` to swap it into place.
#[derive(Debug)]
pub struct TemporaryDirectory {
    temp_path: PathBuf,
    orig_path: PathBuf,
    parent_path: PathBuf,
    /// Old content moved aside during placement, not yet deleted.
    asides: Vec<PathBuf>,
    opts: Options,
    state: State,
    phase: Phase,
    /// Aside removals that fail with `EACCES` before any real attempt.
    #[cfg(test)]
    failing_cleanups: u32,
}

impl TemporaryDirectory {
    pub(crate) fn create(opts: &Options, path: &Path, mode: u32) -> Result<Self> {
        let (dir, orig_name) = split_path(path)?;
        let mut builder = DirBuilder::new();
        builder.mode(mode);

        let (temp_name, ()) = claim_temp_name(
            opts.entropy.as_ref(),
            opts.retry_budget,
            &dir,
            &orig_name,
            Op::Mkdir,
            |name| builder.create(dir.join(name)),
        )?;

        let temp_path = dir.join(temp_name);
        debug!(temp = %temp_path.display(), target = %path.display(), "created temporary directory");
        Ok(Self {
            temp_path,
            orig_path: path.to_path_buf(),
            parent_path: dir,
            asides: Vec::new(),
            opts: opts.clone(),
            state: State::default(),
            phase: Phase::Uncommitted,
            #[cfg(test)]
            failing_cleanups: 0,
        })
    }

    /// Current location of the temporary directory.
    pub fn name(&self) -> &Path {
        &self.temp_path
    }

    /// The path the directory is committed to.
    pub fn original_path(&self) -> &Path {
        &self.orig_path
    }

    /// Swap the temporary directory into the original path, fsync the parent
    /// directory and delete the old content.
    ///
    /// Like [`TemporaryFile::commit`](super::file::TemporaryFile::commit), a
    /// failed commit can be retried and resumes where it stopped. An error
    /// from deleting the old content leaves the new tree in place and durable;
    /// retrying only repeats the cleanup.
    pub fn commit(&mut self) -> Result<()> {
        self.phase.commit_gate()?;
        let res = self.run_commit();
        self.phase = if self.asides.is_empty() {
            Phase::after_commit(self.state)
        } else {
            Phase::FailedAfterPlacement
        };
        if res.is_ok() {
            info!(target_path = %self.orig_path.display(), "committed directory");
        }
        res
    }

    fn run_commit(&mut self) -> Result<()> {
        if !self.state.is(State::PLACED) {
            self.asides = move_into_place(&self.temp_path, &self.orig_path, &self.opts)?;
            self.state.set(State::PLACED);
            debug!(target_path = %self.orig_path.display(), asides = self.asides.len(), "temporary directory placed");
        }

        if !self.state.is(State::SYNCED) {
            let parent = ParentDir::open(&self.parent_path)
                .map_err(AtomicPathsError::io(Op::Open, &self.parent_path))?;
            parent
                .sync()
                .map_err(AtomicPathsError::io(Op::SyncDir, &self.parent_path))?;
            self.state.set(State::SYNCED);
            parent
                .close()
                .map_err(AtomicPathsError::io(Op::Close, &self.parent_path))?;
        }

        while let Some(aside) = self.asides.last() {
            #[cfg(test)]
            if self.failing_cleanups > 0 {
                self.failing_cleanups -= 1;
                return Err(AtomicPathsError::io(Op::Remove, aside)(
                    std::io::Error::from_raw_os_error(libc::EACCES),
                ));
            }
            force_remove_all(aside)?;
            self.asides.pop();
        }

        Ok(())
    }

    /// Remove the temporary directory if it was never placed; after placement
    /// this only marks the object closed. A second call fails with
    /// `AlreadyClosed`.
    pub fn close(&mut self) -> Result<()> {
        let action = self.phase.close_action()?;
        let res = match action {
            CloseAction::Discard => self.discard(),
            CloseAction::Release => {
                for aside in &self.asides {
                    warn!(aside = %aside.display(), "old content left aside after incomplete commit");
                }
                Ok(())
            }
        };
        self.phase = Phase::after_close(action);
        res
    }

    fn discard(&mut self) -> Result<()> {
        force_remove_all(&self.temp_path)?;
        info!(temp = %self.temp_path.display(), "discarded temporary directory");
        Ok(())
    }
}

impl Drop for TemporaryDirectory {
    fn drop(&mut self) {
        if self.phase == Phase::Uncommitted {
            if let Err(e) = self.discard() {
                warn!(temp = %self.temp_path.display(), error = %e, "failed to discard temporary directory on drop");
            }
            self.phase = Phase::Discarded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::tmpname::{make_temp_name, EntropySource};
    use std::ffi::OsStr;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn commit_replaces_existing_tree_and_removes_aside() {
        let td = tempdir().unwrap();
        let target = td.path().join("site");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("old.html"), b"old").unwrap();

        let mut d = Options::new().create_dir(&target, 0o755).unwrap();
        fs::write(d.name().join("new.html"), b"new").unwrap();
        d.commit().unwrap();

        assert!(target.join("new.html").exists());
        assert!(!target.join("old.html").exists());
        assert!(d.asides.is_empty());
        let leftovers: Vec<_> = fs::read_dir(td.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "only the target should remain");
    }

    #[test]
    fn single_retry_budget_still_replaces_existing_tree() {
        let td = tempdir().unwrap();
        let target = td.path().join("site");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("old.html"), b"old").unwrap();

        let mut d = Options::new().retry_budget(1).create_dir(&target, 0o755).unwrap();
        fs::write(d.name().join("new.html"), b"new").unwrap();
        d.commit().unwrap();

        assert_eq!(fs::read(target.join("new.html")).unwrap(), b"new");
        assert!(!target.join("old.html").exists());
        assert_eq!(d.phase, Phase::Committed);
    }

    #[test]
    fn failed_cleanup_leaves_new_tree_durable_and_retries() {
        let td = tempdir().unwrap();
        let target = td.path().join("site");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("old.html"), b"old").unwrap();

        let mut d = Options::new().create_dir(&target, 0o755).unwrap();
        fs::write(d.name().join("new.html"), b"new").unwrap();
        d.failing_cleanups = 1;

        let err = d.commit().unwrap_err();
        assert_eq!(err.op(), Some(Op::Remove));
        assert!(d.state.is(State::PLACED));
        assert!(d.state.is(State::SYNCED), "parent synced before cleanup");
        assert_eq!(d.phase, Phase::FailedAfterPlacement);
        assert_eq!(fs::read(target.join("new.html")).unwrap(), b"new");
        assert_eq!(d.asides.len(), 1);
        let aside = d.asides[0].clone();
        assert_eq!(fs::read(aside.join("old.html")).unwrap(), b"old");

        d.commit().unwrap();
        assert_eq!(d.phase, Phase::Committed);
        assert!(d.asides.is_empty());
        assert!(!aside.exists());
        assert_eq!(fs::read(target.join("new.html")).unwrap(), b"new");
        assert!(matches!(d.commit(), Err(AtomicPathsError::AlreadyCommitted)));
    }

    #[test]
    fn cleanup_failure_survives_a_real_permission_error() {
        if unsafe { libc::geteuid() } == 0 {
            eprintln!("Skipping: root ignores directory permissions");
            return;
        }
        let td = tempdir().unwrap();
        let parent = td.path().join("p");
        let target = parent.join("site");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("old.html"), b"old").unwrap();

        let mut d = Options::new().create_dir(&target, 0o755).unwrap();
        fs::write(d.name().join("new.html"), b"new").unwrap();
        d.asides = move_into_place(&d.temp_path, &d.orig_path, &d.opts).unwrap();
        d.state.set(State::PLACED);
        d.phase = Phase::FailedAfterPlacement;

        // Unlinking the aside needs write access to the parent.
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o500)).unwrap();
        let res = d.commit();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();

        let err = res.unwrap_err();
        assert_eq!(err.op(), Some(Op::Remove));
        assert!(d.state.is(State::SYNCED));
        assert_eq!(d.phase, Phase::FailedAfterPlacement);
        assert_eq!(fs::read(target.join("new.html")).unwrap(), b"new");
        let aside = d.asides[0].clone();
        assert!(aside.exists());

        d.commit().unwrap();
        assert_eq!(d.phase, Phase::Committed);
        assert!(!aside.exists());
    }

    /// Always draws zero bytes, so every aside name is the same.
    #[derive(Debug)]
    struct Zeros;

    impl EntropySource for Zeros {
        fn fill(&self, buf: &mut [u8]) -> std::io::Result<()> {
            buf.fill(0);
            Ok(())
        }
    }

    #[test]
    fn exhausted_aside_names_keep_original_in_place() {
        let td = tempdir().unwrap();
        let target = td.path().join("site");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("old.html"), b"old").unwrap();

        let opts = Options::new().entropy(Zeros).retry_budget(1);
        let mut d = opts.create_dir(&target, 0o755).unwrap();
        fs::write(d.name().join("new.html"), b"new").unwrap();

        let blocker_name = make_temp_name(&Zeros, OsStr::new("site.original")).unwrap();
        let blocker = td.path().join(blocker_name);
        fs::create_dir(&blocker).unwrap();

        let err = d.commit().unwrap_err();
        assert!(matches!(err, AtomicPathsError::Exhausted { attempts: 1, .. }), "{err:?}");
        assert_eq!(d.phase, Phase::Uncommitted);
        assert_eq!(fs::read(target.join("old.html")).unwrap(), b"old");
        assert!(!target.join("new.html").exists());
        assert!(d.name().join("new.html").exists(), "temporary tree kept for retry");

        fs::remove_dir(&blocker).unwrap();
        d.commit().unwrap();
        assert_eq!(fs::read(target.join("new.html")).unwrap(), b"new");
        assert!(!target.join("old.html").exists());
    }

    #[test]
    fn drop_removes_uncommitted_directory() {
        let td = tempdir().unwrap();
        let temp = {
            let d = Options::new().create_dir(td.path().join("x"), 0o755).unwrap();
            fs::write(d.name().join("f"), b"data").unwrap();
            d.name().to_path_buf()
        };
        assert!(!temp.exists());
    }

    #[test]
    fn commit_into_missing_parent_fails_at_creation() {
        let td = tempdir().unwrap();
        let err = Options::new()
            .create_dir(td.path().join("no/such/parent/x"), 0o755)
            .unwrap_err();
        assert_eq!(err.op(), Some(Op::Mkdir));
    }
}
