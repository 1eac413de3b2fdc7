//! Temporary name generation.
//!
//! Names look like `.#<original>-<rand>.tmp` where `<rand>` is 5 random bytes
//! encoded as 8 lowercase base32hex characters (no padding). The name always
//! lives in the same directory as the original so a rename never crosses a
//! filesystem boundary.

use rand::TryRngCore;
use rand::rngs::OsRng;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::errors::{AtomicPathsError, Result};

const PREFIX: &str = ".#";
const SUFFIX: &str = ".tmp";
const RANDOM_BYTES: usize = 5;
/// 5 bytes = 40 bits = 8 base32 symbols.
pub const RANDOM_CHARS: usize = 8;
const BASE32HEX_LOWER: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Source of the random bits mixed into temporary names.
///
/// Implementations must be safe to share between threads; one source is
/// typically held behind an `Arc` for the whole process.
pub trait EntropySource: Send + Sync + fmt::Debug {
    fn fill(&self, buf: &mut [u8]) -> io::Result<()>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        OsRng.try_fill_bytes(buf).map_err(io::Error::other)
    }
}

fn encode_base32hex(bytes: &[u8; RANDOM_BYTES]) -> String {
    let bits = bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    (0..RANDOM_CHARS)
        .rev()
        .map(|i| BASE32HEX_LOWER[((bits >> (i * 5)) & 0x1f) as usize] as char)
        .collect()
}

/// Build a temporary sibling name for `original` (a bare name, not a path).
pub fn make_temp_name(entropy: &dyn EntropySource, original: &OsStr) -> Result<OsString> {
    let mut rnd = [0u8; RANDOM_BYTES];
    entropy.fill(&mut rnd).map_err(AtomicPathsError::RandomSource)?;

    let mut name = OsString::from(PREFIX);
    name.push(original);
    name.push("-");
    name.push(encode_base32hex(&rnd));
    name.push(SUFFIX);
    Ok(name)
}

/// Lexically normalize `path`: drop `.`, collapse separators and fold `..`
/// into a preceding normal component.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Split a path into (parent directory, final name) after normalization.
///
/// A bare name has `.` as its parent.
pub(crate) fn split_path(path: &Path) -> Result<(PathBuf, OsString)> {
    let cleaned = clean_path(path);
    let name = match cleaned.components().next_back() {
        Some(Component::Normal(name)) => name.to_os_string(),
        _ => return Err(AtomicPathsError::InvalidPath(path.to_path_buf())),
    };
    let parent = match cleaned.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

/// Temporary sibling path for `original`: same parent, final component replaced.
pub fn make_temp_path(entropy: &dyn EntropySource, original: &Path) -> Result<PathBuf> {
    let (parent, name) = split_path(original)?;
    Ok(parent.join(make_temp_name(entropy, &name)?))
}

/// Recover the original name from a temporary name, if `name` has the format.
pub fn parse_temp_name(name: &OsStr) -> Option<&str> {
    let name = name.to_str()?;
    let inner = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    let (original, rand) = inner.rsplit_once('-')?;
    let valid_rand = rand.len() == RANDOM_CHARS
        && rand.bytes().all(|b| BASE32HEX_LOWER.contains(&b));
    if original.is_empty() || !valid_rand {
        return None;
    }
    Some(original)
}
