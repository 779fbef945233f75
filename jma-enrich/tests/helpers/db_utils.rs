//! Database Test Utilities
//!
//! Temporary SQLite databases with the enrichment tables and a
//! `bronze_tracks` fixture.

use anyhow::Result;
use jma_enrich::dispatcher::DispatchOptions;
use jma_enrich::retry::RetryPolicy;
use sqlx::SqlitePool;
use std::num::NonZeroU32;
use std::time::Duration;
use tempfile::TempDir;

/// Create temporary test database with all tables
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_jma.db");

    let pool = jma_common::db::init_database(&db_path).await?;
    jma_enrich::db::init_tables(&pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE bronze_tracks (
            track_id TEXT PRIMARY KEY,
            track_name TEXT,
            artist_name TEXT,
            isrc TEXT,
            popularity INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok((temp_dir, pool))
}

/// Insert (track_id, isrc, popularity) rows
pub async fn insert_tracks(pool: &SqlitePool, rows: &[(&str, Option<&str>, i64)]) -> Result<()> {
    for (track_id, isrc, popularity) in rows {
        sqlx::query(
            "INSERT INTO bronze_tracks (track_id, track_name, artist_name, isrc, popularity)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(track_id)
        .bind(format!("Song {}", track_id))
        .bind("Test Artist")
        .bind(isrc)
        .bind(popularity)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Retry policy with millisecond backoffs
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        max_rate_limit_waits: 10,
    }
}

/// Options that never throttle on their own
pub fn fast_options(workers: usize, batch_size: usize) -> DispatchOptions {
    DispatchOptions {
        workers,
        batch_size,
        requests_per_second: NonZeroU32::new(10_000).unwrap(),
        rate_limit_cooldown: Duration::from_millis(50),
        retry: fast_retry(),
        db_max_lock_wait_ms: 2000,
    }
}

pub async fn feature_row_count(pool: &SqlitePool) -> i64 {
    jma_enrich::db::features::count(pool).await.unwrap()
}
