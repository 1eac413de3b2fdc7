//! Commit/close state tracking shared by temporary files and directories.
//!
//! `State` records which durable steps already happened; `Phase` decides what
//! a call to `commit` or `close` does next. Flags are never cleared, so a failed
//! commit can be retried and only the remaining steps run.

use crate::errors::{AtomicPathsError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct State(u8);

impl State {
    /// Temporary handle flushed and closed.
    pub(crate) const CLOSED: State = State(1);
    /// Renamed into the original path. No rollback past this point.
    pub(crate) const PLACED: State = State(1 << 1);
    /// Parent directory fsync-ed; the rename is crash-durable.
    pub(crate) const SYNCED: State = State(1 << 2);

    pub(crate) fn is(self, flag: State) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub(crate) fn set(&mut self, flag: State) {
        self.0 |= flag.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Uncommitted,
    FailedAfterPlacement,
    Committed,
    /// Closed before placement; the temporary artifact is gone.
    Discarded,
    /// Closed after placement.
    Closed,
}

/// What `close` has to do in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseAction {
    Discard,
    Release,
}

impl Phase {
    /// Whether `commit` may run; otherwise the terminal error for this phase.
    pub(crate) fn commit_gate(self) -> Result<()> {
        match self {
            Phase::Uncommitted | Phase::FailedAfterPlacement => Ok(()),
            Phase::Committed => Err(AtomicPathsError::AlreadyCommitted),
            Phase::Discarded => Err(AtomicPathsError::RolledBack),
            Phase::Closed => Err(AtomicPathsError::AlreadyClosed),
        }
    }

    pub(crate) fn close_action(self) -> Result<CloseAction> {
        match self {
            Phase::Uncommitted => Ok(CloseAction::Discard),
            Phase::FailedAfterPlacement | Phase::Committed => Ok(CloseAction::Release),
            Phase::Discarded | Phase::Closed => Err(AtomicPathsError::AlreadyClosed),
        }
    }

    pub(crate) fn after_commit(state: State) -> Phase {
        if state.is(State::SYNCED) {
            Phase::Committed
        } else if state.is(State::PLACED) {
            Phase::FailedAfterPlacement
        } else {
            Phase::Uncommitted
        }
    }

    pub(crate) fn after_close(action: CloseAction) -> Phase {
        match action {
            CloseAction::Discard => Phase::Discarded,
            CloseAction::Release => Phase::Closed,
        }
    }
}
