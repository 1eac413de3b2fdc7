//! Filesystem operations: temporary artifacts and their commit protocol.

mod claim;
mod dir;
mod file;
pub(crate) mod helpers;
mod options;
mod state;
pub mod sweep;
mod swap;
pub mod tmpname;

pub use dir::TemporaryDirectory;
pub use file::TemporaryFile;
pub use options::{create_dir, create_file, Options};
pub use sweep::{find_orphans, remove_orphans, Orphan, OrphanKind, SweepOptions};
pub use tmpname::{make_temp_name, make_temp_path, parse_temp_name, EntropySource, OsEntropy};
