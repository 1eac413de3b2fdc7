//! Process-wide shutdown flag.
//! Set by the ctrlc handler; long-running copies poll `is_requested()` and
//! abort so the pending temporary artifact is discarded instead of committed.
//!
//! Relaxed atomics are enough for a one-way "stop" flag.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Clear the flag. Tests only.
#[cfg(test)]
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}

/// Error returned by copy loops that stopped because of a shutdown request.
pub fn interrupted() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted by shutdown request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn request_then_reset() {
        reset();
        assert!(!is_requested());
        request();
        request();
        assert!(is_requested());
        reset();
        assert!(!is_requested());
    }
}
