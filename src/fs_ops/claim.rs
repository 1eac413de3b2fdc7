//! Claim a fresh temporary name next to an original path.
//! - Each attempt generates a new random name and tries to create/rename onto it.
//! - "Name already taken" discards the name and retries, up to the retry budget.
//! - Any other failure aborts immediately.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use tracing::trace;

use super::helpers::is_occupied;
use super::tmpname::{make_temp_name, EntropySource};
use crate::errors::{AtomicPathsError, Op, Result};

/// Run `attempt` with fresh temporary names derived from `original_name` until
/// one is not already taken.
///
/// `dir` and `original` are only used to label errors.
pub(crate) fn claim_temp_name<T>(
    entropy: &dyn EntropySource,
    budget: u32,
    dir: &Path,
    original_name: &OsStr,
    op: Op,
    mut attempt: impl FnMut(&OsStr) -> io::Result<T>,
) -> Result<(OsString, T)> {
    for tries in 1..=budget {
        let name = make_temp_name(entropy, original_name)?;
        match attempt(&name) {
            Ok(value) => return Ok((name, value)),
            Err(e) if is_occupied(&e) => {
                trace!(name = ?name, tries, "temporary name taken; retrying");
            }
            Err(e) => return Err(AtomicPathsError::io(op, dir.join(&name))(e)),
        }
    }
    Err(AtomicPathsError::Exhausted {
        path: dir.join(original_name),
        attempts: budget,
    })
}
