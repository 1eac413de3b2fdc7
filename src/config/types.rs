//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_RETRY_BUDGET, DEFAULT_SWEEP_MIN_AGE};
use crate::fs_ops::{Options, SweepOptions};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Parse an octal permission string such as `644`, `0644` or `0o644`.
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let digits = t.strip_prefix("0o").unwrap_or(t);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: '{s}'"))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: '{s}'"));
    }
    Ok(mode)
}

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Attempts to claim a temporary name
    pub retry_budget: u32,
    /// Mode for temporary files
    pub file_mode: u32,
    /// Mode for temporary directories
    pub dir_mode: u32,
    /// Minimum age before the sweep considers an artifact orphaned
    pub sweep_min_age: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: None,
            retry_budget: DEFAULT_RETRY_BUDGET,
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            sweep_min_age: DEFAULT_SWEEP_MIN_AGE,
        }
    }
}

impl Config {
    /// Library options derived from this config.
    pub fn options(&self) -> Options {
        Options::new().retry_budget(self.retry_budget)
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            min_age: self.sweep_min_age,
            ..SweepOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_accepts_common_spellings() {
        assert_eq!(parse_mode("644").unwrap(), 0o644);
        assert_eq!(parse_mode("0755").unwrap(), 0o755);
        assert_eq!(parse_mode(" 0o600 ").unwrap(), 0o600);
        assert!(parse_mode("999").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn log_level_parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!("quiet".parse::<LogLevel>().unwrap(), LogLevel::Quiet);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn options_carry_retry_budget() {
        let cfg = Config {
            retry_budget: 7,
            ..Config::default()
        };
        assert_eq!(cfg.options().retry_budget, 7);
    }
}
