//! Database access for jma-enrich
//!
//! Reads the upstream `bronze_tracks` table and owns two output tables:
//! - `isrc_mbid_cache`: one row per attempted ISRC lookup, never deleted
//! - `acousticbrainz_features`: one row per ISRC with descriptors, upserted

pub mod cache_entries;
pub mod features;
pub mod report;
pub mod tracks;

use crate::types::{CacheEntry, FeatureBundle, Isrc};
use jma_common::Result;
use sqlx::SqlitePool;

/// Create the enrichment tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS isrc_mbid_cache (
            isrc TEXT PRIMARY KEY,
            mbid TEXT,
            lookup_status TEXT NOT NULL CHECK (lookup_status IN ('resolved', 'not_found')),
            recording_title TEXT,
            artist_name TEXT,
            looked_up_at TEXT NOT NULL,
            CHECK ((mbid IS NULL) = (lookup_status = 'not_found'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS acousticbrainz_features (
            isrc TEXT PRIMARY KEY,
            mbid TEXT NOT NULL,
            tempo REAL,
            bpm_histogram_first_peak REAL,
            bpm_histogram_second_peak REAL,
            danceability REAL,
            onset_rate REAL,
            loudness REAL,
            dynamic_complexity REAL,
            key_key TEXT,
            key_scale TEXT,
            raw_json TEXT,
            loaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (isrc_mbid_cache, acousticbrainz_features)");

    Ok(())
}

/// Persist one batch of cache entries and feature bundles atomically
///
/// Cache entries are written first so a committed feature row always has
/// its resolved cache row alongside it.
pub async fn write_batch(
    pool: &SqlitePool,
    entries: &[CacheEntry],
    bundles: &[(Isrc, FeatureBundle)],
    written_at: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        cache_entries::upsert(&mut tx, entry, written_at).await?;
    }

    for (isrc, bundle) in bundles {
        features::upsert(&mut tx, isrc, bundle, written_at).await?;
    }

    tx.commit().await?;
    Ok(())
}
