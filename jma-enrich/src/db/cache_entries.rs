//! ISRC → MBID lookup cache table

use crate::types::{CacheEntry, Isrc, Mbid};
use jma_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// Load every cached lookup
///
/// Rows whose ISRC or MBID no longer parse are skipped with a warning; they
/// will be looked up again.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<(Isrc, Option<Mbid>)>> {
    let rows = sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT isrc, mbid FROM isrc_mbid_cache",
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for (raw_isrc, raw_mbid) in rows {
        let isrc = match Isrc::parse(&raw_isrc) {
            Ok(isrc) => isrc,
            Err(e) => {
                tracing::warn!(isrc = %raw_isrc, error = %e, "Skipping unreadable cache row");
                continue;
            }
        };

        let mbid = match raw_mbid.as_deref().map(Mbid::parse).transpose() {
            Ok(mbid) => mbid,
            Err(e) => {
                tracing::warn!(isrc = %isrc, error = %e, "Skipping unreadable cache row");
                continue;
            }
        };

        entries.push((isrc, mbid));
    }

    Ok(entries)
}

/// Insert or replace one cache row
pub async fn upsert(conn: &mut SqliteConnection, entry: &CacheEntry, looked_up_at: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO isrc_mbid_cache
            (isrc, mbid, lookup_status, recording_title, artist_name, looked_up_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(isrc) DO UPDATE SET
            mbid = excluded.mbid,
            lookup_status = excluded.lookup_status,
            recording_title = excluded.recording_title,
            artist_name = excluded.artist_name,
            looked_up_at = excluded.looked_up_at
        "#,
    )
    .bind(entry.isrc.as_str())
    .bind(entry.mbid.map(|m| m.to_string()))
    .bind(entry.status().as_str())
    .bind(entry.recording_title.as_deref())
    .bind(entry.artist_name.as_deref())
    .bind(looked_up_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Cached value for one ISRC
///
/// `None` = never looked up; `Some(None)` = looked up, no match.
pub async fn get(pool: &SqlitePool, isrc: &Isrc) -> Result<Option<Option<Mbid>>> {
    let row = sqlx::query_scalar::<_, Option<String>>(
        "SELECT mbid FROM isrc_mbid_cache WHERE isrc = ?",
    )
    .bind(isrc.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => Mbid::parse(&raw)
            .map(|mbid| Some(Some(mbid)))
            .map_err(|e| jma_common::Error::InvalidInput(e.to_string())),
    }
}

/// Row counts by lookup status: (total, resolved, not_found)
pub async fn count_by_status(pool: &SqlitePool) -> Result<(i64, i64, i64)> {
    let counts = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN lookup_status = 'resolved' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN lookup_status = 'not_found' THEN 1 ELSE 0 END), 0)
        FROM isrc_mbid_cache
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(counts)
}
