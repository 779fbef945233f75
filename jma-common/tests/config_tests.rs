//! Unit tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate JMA_* variables are marked with #[serial].

use jma_common::config::{
    config_file_path, env_override, load_toml_config, resolve_database_path, LoggingConfig,
    CONFIG_PATH_ENV, DEFAULT_DB_FILE,
};
use jma_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SampleConfig {
    workers: usize,
    logging: LoggingConfig,
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let config: SampleConfig = load_toml_config(Some(&missing)).unwrap();
    assert_eq!(config.workers, 0);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_config_file_values_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("jma-enrich.toml");
    std::fs::write(&path, "workers = 12\n\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.workers, 12);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_config_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "workers = = 3").unwrap();

    let result: Result<SampleConfig, Error> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_database_path_env_wins_over_toml() {
    env::set_var("JMA_TEST_DB_PATH", "/tmp/jma-env.db");

    let path = resolve_database_path("JMA_TEST_DB_PATH", Some(Path::new("/tmp/jma-toml.db")));
    assert_eq!(path, PathBuf::from("/tmp/jma-env.db"));

    env::remove_var("JMA_TEST_DB_PATH");
}

#[test]
#[serial]
fn test_database_path_toml_then_default() {
    env::remove_var("JMA_TEST_DB_PATH");

    let path = resolve_database_path("JMA_TEST_DB_PATH", Some(Path::new("/tmp/jma-toml.db")));
    assert_eq!(path, PathBuf::from("/tmp/jma-toml.db"));

    let path = resolve_database_path("JMA_TEST_DB_PATH", None);
    assert!(path.ends_with(DEFAULT_DB_FILE));
}

#[test]
#[serial]
fn test_config_path_env_override() {
    env::set_var(CONFIG_PATH_ENV, "/tmp/custom-jma.toml");
    assert_eq!(
        config_file_path("jma-enrich"),
        Some(PathBuf::from("/tmp/custom-jma.toml"))
    );
    env::remove_var(CONFIG_PATH_ENV);

    if let Some(path) = config_file_path("jma-enrich") {
        assert!(path.ends_with("jma/jma-enrich.toml"));
    }
}

#[test]
#[serial]
fn test_env_override_parsing() {
    env::set_var("JMA_TEST_WORKERS", " 16 ");
    assert_eq!(env_override::<usize>("JMA_TEST_WORKERS").unwrap(), Some(16));

    env::set_var("JMA_TEST_WORKERS", "lots");
    assert!(matches!(
        env_override::<usize>("JMA_TEST_WORKERS"),
        Err(Error::Config(_))
    ));

    env::set_var("JMA_TEST_WORKERS", "");
    assert_eq!(env_override::<usize>("JMA_TEST_WORKERS").unwrap(), None);

    env::remove_var("JMA_TEST_WORKERS");
    assert_eq!(env_override::<usize>("JMA_TEST_WORKERS").unwrap(), None);
}
