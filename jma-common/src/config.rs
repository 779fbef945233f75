//! Configuration loading and path resolution
//!
//! Every JMA tool follows the same priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: the tool logs a
//! warning and continues with defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application name used for config and data directories
pub const APP_DIR_NAME: &str = "jma";

/// Default database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "japanese_music.db";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "JMA_CONFIG";

/// Logging configuration shared by all tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` level filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// User-Agent sent to every external API
///
/// MusicBrainz rejects anonymous clients, so this must identify the
/// application and a way to reach its maintainers.
pub fn get_user_agent() -> String {
    format!(
        "JapaneseMusicAnalytics/{} (educational project)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Resolve the TOML config path for a tool
///
/// `$JMA_CONFIG` wins; otherwise `<config_dir>/jma/<module_name>.toml`.
/// Returns `None` only when the platform has no config directory.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Load a TOML config file, degrading to defaults when it is absent
///
/// A file that exists but fails to parse is reported as an error: silently
/// ignoring a typo would run with settings the operator did not ask for.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config directory available on this platform, using defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Resolve the SQLite database path
///
/// Priority: environment variable → TOML value → OS default data directory.
pub fn resolve_database_path(env_var_name: &str, toml_value: Option<&Path>) -> PathBuf {
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_data_folder().join(DEFAULT_DB_FILE)
}

/// Get OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Read an environment variable and parse it, ignoring it when blank
///
/// A value that is present but unparsable is a configuration error.
pub fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", name, raw, e))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_identifies_project() {
        let ua = get_user_agent();
        assert!(ua.starts_with("JapaneseMusicAnalytics/"));
        assert!(ua.contains("educational project"));
    }

    #[test]
    fn test_logging_default_level() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_default_data_folder_ends_with_app_dir() {
        let folder = default_data_folder();
        assert!(folder.ends_with(APP_DIR_NAME) || folder == PathBuf::from("./data"));
    }
}
