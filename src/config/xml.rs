//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Unknown fields are rejected so typos surface instead of being ignored.
//! - A missing default config file means "use defaults"; a missing file named by
//!   `ATOMIC_PATHS_CONFIG` is an error.

use anyhow::{bail, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::paths::default_config_path;
use super::types::{parse_mode, Config, LogLevel};
use super::CONFIG_ENV;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    retry_budget: Option<u64>,
    file_mode: Option<String>,
    dir_mode: Option<String>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    sweep_min_age_seconds: Option<u64>,
}

// Trims surrounding whitespace for optional integers.
fn de_u64_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)?;
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    if let Some(n) = parsed.retry_budget {
        if n == 0 {
            bail!("retry_budget must be at least 1");
        }
        cfg.retry_budget = u32::try_from(n).context("retry_budget out of range")?;
    }
    if let Some(s) = parsed.file_mode.as_deref() {
        cfg.file_mode = parse_mode(s).map_err(anyhow::Error::msg)?;
    }
    if let Some(s) = parsed.dir_mode.as_deref() {
        cfg.dir_mode = parse_mode(s).map_err(anyhow::Error::msg)?;
    }
    if let Some(secs) = parsed.sweep_min_age_seconds {
        cfg.sweep_min_age = Duration::from_secs(secs);
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid config xml '{}'", path.display()))
}

/// Load the config from `$ATOMIC_PATHS_CONFIG` or the default location.
/// Returns Ok(None) when no default config file exists.
pub fn load_config() -> Result<Option<(Config, PathBuf)>> {
    let explicit = env::var_os(CONFIG_ENV).is_some();
    let Some(path) = default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        if explicit {
            bail!("{CONFIG_ENV} points to a missing file: {}", path.display());
        }
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(None);
    }
    let cfg = load_config_from_xml_path(&path)?;
    Ok(Some((cfg, path)))
}
