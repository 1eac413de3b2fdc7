//! Config module.
//! Provides configuration types, the default config path and XML loading.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{default_config_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{load_config, load_config_from_xml_path};

/// Attempts to claim a temporary name before giving up with `Exhausted`.
pub const DEFAULT_RETRY_BUDGET: u32 = 1000;
/// Requested mode for temporary files (the process umask still applies).
pub const DEFAULT_FILE_MODE: u32 = 0o666;
pub const DEFAULT_DIR_MODE: u32 = 0o777;
/// Temporary artifacts younger than this are left alone by the sweep.
pub const DEFAULT_SWEEP_MIN_AGE: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "ATOMIC_PATHS_CONFIG";
