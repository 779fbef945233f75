//! Upstream tracks table (read-only)

use crate::types::TrackRecord;
use jma_common::{Error, Result};
use sqlx::SqlitePool;

pub const TRACKS_TABLE: &str = "bronze_tracks";

/// Load every upstream track, most popular first
///
/// Popular tracks are more likely to have AcousticBrainz coverage, so an
/// interrupted run still enriches the rows that matter most.
pub async fn load_tracks(pool: &SqlitePool) -> Result<Vec<TrackRecord>> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(TRACKS_TABLE)
    .fetch_one(pool)
    .await?;

    if exists == 0 {
        return Err(Error::Config(format!(
            "Table {} not found. Run the track extraction step first.",
            TRACKS_TABLE
        )));
    }

    let rows = sqlx::query_as::<_, (String, Option<String>, Option<String>, Option<String>, Option<i64>)>(
        r#"
        SELECT track_id, track_name, artist_name, isrc, popularity
        FROM bronze_tracks
        ORDER BY popularity DESC, track_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(track_id, track_name, artist_name, isrc, popularity)| TrackRecord {
            track_id,
            track_name,
            artist_name,
            isrc,
            popularity,
        })
        .collect())
}
