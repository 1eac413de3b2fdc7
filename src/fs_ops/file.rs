//! Temporary file that replaces its original path atomically on commit.
//!
//! Commit runs close-temp -> rename-into-place -> fsync-parent. Each step is
//! recorded in the state bitset once it succeeds, so a commit that failed
//! midway can simply be called again and resumes at the failed step.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::claim::claim_temp_name;
use super::options::Options;
use super::state::{CloseAction, Phase, State};
use super::tmpname::split_path;
use crate::errors::{AtomicPathsError, Op, Result};
use crate::platform::{close_file, ParentDir};

/// A temporary file that can be committed to its original path or discarded.
///
/// While uncommitted, writes go to `.#<name>-<rand>.tmp` beside the original
/// and the original path is untouched.
#[derive(Debug)]
pub struct TemporaryFile {
    file: Option<File>,
    parent: Option<ParentDir>,
    temp_name: OsString,
    orig_name: OsString,
    temp_path: PathBuf,
    orig_path: PathBuf,
    state: State,
    phase: Phase,
}

impl TemporaryFile {
    pub(crate) fn create(opts: &Options, path: &Path, mode: u32) -> Result<Self> {
        let (dir, orig_name) = split_path(path)?;
        let parent = ParentDir::open(&dir).map_err(AtomicPathsError::io(Op::Open, &dir))?;

        let (temp_name, file) = claim_temp_name(
            opts.entropy.as_ref(),
            opts.retry_budget,
            &dir,
            &orig_name,
            Op::Create,
            |name| parent.create_new_file(name, mode),
        )?;

        let temp_path = dir.join(&temp_name);
        debug!(temp = %temp_path.display(), target = %path.display(), "created temporary file");
        Ok(Self {
            file: Some(file),
            parent: Some(parent),
            temp_name,
            orig_name,
            temp_path,
            orig_path: path.to_path_buf(),
            state: State::default(),
            phase: Phase::Uncommitted,
        })
    }

    /// Current location of the temporary file.
    pub fn name(&self) -> &Path {
        &self.temp_path
    }

    /// The path the file is committed to.
    pub fn original_path(&self) -> &Path {
        &self.orig_path
    }

    /// Flush written data to stable storage without committing.
    pub fn sync(&self) -> io::Result<()> {
        self.handle()?.sync_all()
    }

    /// The underlying handle, while it is still open.
    pub fn as_file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    fn handle(&self) -> io::Result<&File> {
        self.file.as_ref().ok_or_else(|| closed_error(&self.temp_path))
    }

    fn handle_mut(&mut self) -> io::Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(closed_error(&self.temp_path)),
        }
    }

    /// Flush, close and rename the temporary file over the original path, then
    /// fsync the parent directory.
    ///
    /// On error the completed steps are remembered; calling `commit` again
    /// resumes with the step that failed.
    pub fn commit(&mut self) -> Result<()> {
        self.phase.commit_gate()?;
        let res = self.run_commit();
        self.phase = Phase::after_commit(self.state);
        if res.is_ok() {
            info!(target_path = %self.orig_path.display(), "committed file");
        }
        res
    }

    fn run_commit(&mut self) -> Result<()> {
        if !self.state.is(State::CLOSED) {
            if let Some(file) = self.file.as_ref() {
                file.sync_all()
                    .map_err(AtomicPathsError::io(Op::Sync, &self.temp_path))?;
            }
            // close(2) releases the descriptor even when it reports an error.
            let closed = self.file.take().map_or(Ok(()), close_file);
            self.state.set(State::CLOSED);
            closed.map_err(AtomicPathsError::io(Op::Close, &self.temp_path))?;
            debug!(temp = %self.temp_path.display(), "temporary file flushed and closed");
        }

        if !self.state.is(State::PLACED) {
            let parent = self.parent_dir()?;
            parent
                .rename(&self.temp_name, &self.orig_name)
                .map_err(AtomicPathsError::io(Op::Rename, &self.orig_path))?;
            self.state.set(State::PLACED);
            debug!(target_path = %self.orig_path.display(), "temporary file placed");
        }

        if !self.state.is(State::SYNCED) {
            let parent = self.parent_dir()?;
            parent
                .sync()
                .map_err(AtomicPathsError::io(Op::SyncDir, parent.path()))?;
            let parent = self.parent.take();
            self.state.set(State::SYNCED);
            if let Some(parent) = parent {
                let dir = parent.path().to_path_buf();
                parent.close().map_err(AtomicPathsError::io(Op::Close, dir))?;
            }
        }

        Ok(())
    }

    fn parent_dir(&self) -> Result<&ParentDir> {
        // Only dropped once SYNCED is set or the file was discarded.
        self.parent.as_ref().ok_or(AtomicPathsError::AlreadyClosed)
    }

    /// Discard the temporary file if it was never placed; after a commit this
    /// just releases the object. A second call fails with `AlreadyClosed`.
    pub fn close(&mut self) -> Result<()> {
        let action = self.phase.close_action()?;
        let res = match action {
            CloseAction::Discard => self.discard(),
            CloseAction::Release => {
                self.release();
                Ok(())
            }
        };
        self.phase = Phase::after_close(action);
        res
    }

    /// Runs every cleanup step; reports the first failure.
    fn discard(&mut self) -> Result<()> {
        let mut errors: Vec<AtomicPathsError> = Vec::new();

        if !self.state.is(State::CLOSED) {
            if let Some(file) = self.file.take() {
                if let Err(e) = close_file(file) {
                    errors.push(AtomicPathsError::io(Op::Close, &self.temp_path)(e));
                }
            }
            self.state.set(State::CLOSED);
        }

        if let Some(parent) = self.parent.take() {
            if let Err(e) = parent.remove_file(&self.temp_name) {
                errors.push(AtomicPathsError::io(Op::Remove, &self.temp_path)(e));
            }
            let dir = parent.path().to_path_buf();
            if let Err(e) = parent.close() {
                errors.push(AtomicPathsError::io(Op::Close, dir)(e));
            }
        }

        info!(temp = %self.temp_path.display(), "discarded temporary file");
        let mut errors = errors.into_iter();
        match errors.next() {
            None => Ok(()),
            Some(first) => {
                for later in errors {
                    warn!(error = %later, "additional failure while discarding");
                }
                Err(first)
            }
        }
    }

    fn release(&mut self) {
        self.file = None;
        self.parent = None;
    }
}

fn closed_error(temp_path: &Path) -> io::Error {
    io::Error::other(format!(
        "temporary file '{}' is already closed",
        temp_path.display()
    ))
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        if self.phase == Phase::Uncommitted {
            if let Err(e) = self.discard() {
                warn!(temp = %self.temp_path.display(), error = %e, "failed to discard temporary file on drop");
            }
            self.phase = Phase::Discarded;
        }
    }
}

impl Write for TemporaryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle_mut()?.flush()
    }
}

impl Read for TemporaryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle_mut()?.read(buf)
    }
}

impl Seek for TemporaryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle_mut()?.seek(pos)
    }
}
