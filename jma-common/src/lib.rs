//! # JMA Common Library
//!
//! Shared code for the Japanese music analytics Rust tooling:
//! - Error types
//! - Configuration loading (TOML file, environment overrides, defaults)
//! - SQLite database bootstrap

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
