//! Enrichment configuration
//!
//! Priority: ENV → TOML (`$JMA_CONFIG` or `<config_dir>/jma/jma-enrich.toml`)
//! → compiled defaults. Every field has a default so an empty or missing
//! file is a valid configuration.

use crate::retry::RetryPolicy;
use crate::services::acousticbrainz_client::ACOUSTICBRAINZ_BASE_URL;
use crate::services::musicbrainz_client::MUSICBRAINZ_BASE_URL;
use crate::services::ClientSettings;
use jma_common::config::{
    config_file_path, env_override, get_user_agent, load_toml_config, resolve_database_path,
    LoggingConfig,
};
use jma_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Config file stem under the JMA config directory
pub const MODULE_NAME: &str = "jma-enrich";

pub const ENV_DB_PATH: &str = "JMA_DB_PATH";
pub const ENV_WORKERS: &str = "JMA_WORKERS";
pub const ENV_BATCH_SIZE: &str = "JMA_BATCH_SIZE";
pub const ENV_REQUESTS_PER_SECOND: &str = "JMA_REQUESTS_PER_SECOND";
pub const ENV_MUSICBRAINZ_URL: &str = "JMA_MUSICBRAINZ_URL";
pub const ENV_ACOUSTICBRAINZ_URL: &str = "JMA_ACOUSTICBRAINZ_URL";

/// `[musicbrainz]` table; either key may be left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzConfig {
    pub base_url: String,
    /// Politeness pacing for this service, on top of the global budget
    pub requests_per_second: u32,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            base_url: MUSICBRAINZ_BASE_URL.to_string(),
            requests_per_second: 1,
        }
    }
}

/// `[acousticbrainz]` table; either key may be left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcousticBrainzConfig {
    pub base_url: String,
    pub requests_per_second: u32,
}

impl Default for AcousticBrainzConfig {
    fn default() -> Self {
        Self {
            base_url: ACOUSTICBRAINZ_BASE_URL.to_string(),
            requests_per_second: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_rate_limit_waits: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            max_rate_limit_waits: policy.max_rate_limit_waits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// SQLite database; `None` falls back to the OS data directory
    pub database_path: Option<PathBuf>,
    pub workers: usize,
    pub batch_size: usize,
    /// Global budget shared by every worker and both services
    pub requests_per_second: u32,
    /// Pool-wide pause when a service throttles without saying how long
    pub rate_limit_cooldown_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub db_max_lock_wait_ms: u64,
    pub musicbrainz: MusicBrainzConfig,
    pub acousticbrainz: AcousticBrainzConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            workers: 8,
            batch_size: 50,
            requests_per_second: 10,
            rate_limit_cooldown_secs: 5,
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            db_max_lock_wait_ms: 5000,
            musicbrainz: MusicBrainzConfig::default(),
            acousticbrainz: AcousticBrainzConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EnrichConfig {
    /// Load TOML, apply ENV overrides, validate
    pub fn resolve() -> Result<Self> {
        let path = config_file_path(MODULE_NAME);
        let mut config: Self = load_toml_config(path.as_deref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.database_path = Some(resolve_database_path(
            ENV_DB_PATH,
            self.database_path.as_deref(),
        ));

        if let Some(workers) = env_override(ENV_WORKERS)? {
            self.workers = workers;
        }
        if let Some(batch_size) = env_override(ENV_BATCH_SIZE)? {
            self.batch_size = batch_size;
        }
        if let Some(rps) = env_override(ENV_REQUESTS_PER_SECOND)? {
            self.requests_per_second = rps;
        }
        if let Some(url) = env_override::<String>(ENV_MUSICBRAINZ_URL)? {
            self.musicbrainz.base_url = url;
        }
        if let Some(url) = env_override::<String>(ENV_ACOUSTICBRAINZ_URL)? {
            self.acousticbrainz.base_url = url;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, base_url, requests_per_second) in [
            (
                "musicbrainz",
                &self.musicbrainz.base_url,
                self.musicbrainz.requests_per_second,
            ),
            (
                "acousticbrainz",
                &self.acousticbrainz.base_url,
                self.acousticbrainz.requests_per_second,
            ),
        ] {
            if requests_per_second == 0 {
                return Err(Error::Config(format!(
                    "{}.requests_per_second must be at least 1",
                    name
                )));
            }
            if base_url.trim().is_empty() {
                return Err(Error::Config(format!("{}.base_url is empty", name)));
            }
        }
        Ok(())
    }

    /// Database path after ENV/TOML/default resolution
    pub fn database_path(&self) -> PathBuf {
        resolve_database_path(ENV_DB_PATH, self.database_path.as_deref())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            max_rate_limit_waits: self.retry.max_rate_limit_waits,
        }
    }

    pub fn global_rate(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.requests_per_second)
            .ok_or_else(|| Error::Config("requests_per_second must be at least 1".to_string()))
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn musicbrainz_settings(&self) -> Result<ClientSettings> {
        self.client_settings(
            "musicbrainz",
            &self.musicbrainz.base_url,
            self.musicbrainz.requests_per_second,
        )
    }

    pub fn acousticbrainz_settings(&self) -> Result<ClientSettings> {
        self.client_settings(
            "acousticbrainz",
            &self.acousticbrainz.base_url,
            self.acousticbrainz.requests_per_second,
        )
    }

    fn client_settings(
        &self,
        name: &str,
        base_url: &str,
        requests_per_second: u32,
    ) -> Result<ClientSettings> {
        let requests_per_second = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            Error::Config(format!("{}.requests_per_second must be at least 1", name))
        })?;

        Ok(ClientSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: get_user_agent(),
            requests_per_second,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        })
    }
}
