//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Global flags override values loaded from the XML config.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::{parse_mode, Config, LogLevel};

/// Write files and install directories atomically.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Atomically write files and replace directories (Rust)"
)]
pub struct Args {
    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Also append logs to this file (refused if an ancestor is a symlink).
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Attempts to claim a temporary name before giving up.
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Attempts to claim a temporary name (>= 1)"
    )]
    pub retry_budget: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Stream stdin (or --input) into PATH, replacing it atomically.
    Write {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        /// Mode for the new file, in octal (default from config, 0666 minus umask).
        #[arg(long, value_parser = parse_mode)]
        mode: Option<u32>,
        /// Read content from this file instead of stdin.
        #[arg(long, short = 'i', value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },
    /// Copy the SOURCE tree to TARGET, replacing TARGET atomically.
    InstallDir {
        #[arg(value_hint = ValueHint::DirPath)]
        source: PathBuf,
        #[arg(value_hint = ValueHint::DirPath)]
        target: PathBuf,
        /// Mode for the new top-level directory, in octal.
        #[arg(long, value_parser = parse_mode)]
        mode: Option<u32>,
    },
    /// Report (or remove) temporary artifacts left behind by crashed writers.
    Sweep {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        #[arg(long, default_value_t = 1)]
        max_depth: usize,
        /// Ignore artifacts modified more recently than this (default from config).
        #[arg(long)]
        min_age_secs: Option<u64>,
        /// Delete what was found instead of only listing it.
        #[arg(long)]
        remove: bool,
        /// With --remove: log what would be deleted but touch nothing.
        #[arg(long)]
        dry_run: bool,
    },
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        if let Some(n) = self.retry_budget {
            cfg.retry_budget = n;
        }
        match &self.command {
            Command::Write { mode: Some(m), .. } => cfg.file_mode = *m,
            Command::InstallDir { mode: Some(m), .. } => cfg.dir_mode = *m,
            Command::Sweep {
                min_age_secs: Some(secs),
                ..
            } => cfg.sweep_min_age = Duration::from_secs(*secs),
            _ => {}
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
