//! AcousticBrainz feature table

use crate::types::{FeatureBundle, Isrc, Mbid};
use jma_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

type FeatureRow = (
    String,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Insert or refresh the descriptors for one ISRC
pub async fn upsert(
    conn: &mut SqliteConnection,
    isrc: &Isrc,
    bundle: &FeatureBundle,
    loaded_at: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO acousticbrainz_features (
            isrc, mbid, tempo, bpm_histogram_first_peak, bpm_histogram_second_peak,
            danceability, onset_rate, loudness, dynamic_complexity,
            key_key, key_scale, raw_json, loaded_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(isrc) DO UPDATE SET
            mbid = excluded.mbid,
            tempo = excluded.tempo,
            bpm_histogram_first_peak = excluded.bpm_histogram_first_peak,
            bpm_histogram_second_peak = excluded.bpm_histogram_second_peak,
            danceability = excluded.danceability,
            onset_rate = excluded.onset_rate,
            loudness = excluded.loudness,
            dynamic_complexity = excluded.dynamic_complexity,
            key_key = excluded.key_key,
            key_scale = excluded.key_scale,
            raw_json = excluded.raw_json,
            loaded_at = excluded.loaded_at
        "#,
    )
    .bind(isrc.as_str())
    .bind(bundle.mbid.to_string())
    .bind(bundle.tempo)
    .bind(bundle.bpm_histogram_first_peak)
    .bind(bundle.bpm_histogram_second_peak)
    .bind(bundle.danceability)
    .bind(bundle.onset_rate)
    .bind(bundle.loudness)
    .bind(bundle.dynamic_complexity)
    .bind(bundle.key_key.as_deref())
    .bind(bundle.key_scale.as_deref())
    .bind(bundle.raw_json.as_deref())
    .bind(loaded_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Stored descriptors for one ISRC
pub async fn get(pool: &SqlitePool, isrc: &Isrc) -> Result<Option<FeatureBundle>> {
    let row = sqlx::query_as::<_, FeatureRow>(
        r#"
        SELECT mbid, tempo, bpm_histogram_first_peak, bpm_histogram_second_peak,
               danceability, onset_rate, loudness, dynamic_complexity,
               key_key, key_scale, raw_json
        FROM acousticbrainz_features
        WHERE isrc = ?
        "#,
    )
    .bind(isrc.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(into_bundle).transpose()
}

/// ISRCs with stored descriptors, sorted
pub async fn list_isrcs(pool: &SqlitePool) -> Result<Vec<String>> {
    let isrcs = sqlx::query_scalar::<_, String>(
        "SELECT isrc FROM acousticbrainz_features ORDER BY isrc",
    )
    .fetch_all(pool)
    .await?;

    Ok(isrcs)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM acousticbrainz_features")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn into_bundle(row: FeatureRow) -> Result<FeatureBundle> {
    let (
        mbid,
        tempo,
        bpm_histogram_first_peak,
        bpm_histogram_second_peak,
        danceability,
        onset_rate,
        loudness,
        dynamic_complexity,
        key_key,
        key_scale,
        raw_json,
    ) = row;

    Ok(FeatureBundle {
        mbid: Mbid::parse(&mbid).map_err(|e| Error::InvalidInput(e.to_string()))?,
        tempo,
        bpm_histogram_first_peak,
        bpm_histogram_second_peak,
        danceability,
        onset_rate,
        loudness,
        dynamic_complexity,
        key_key,
        key_scale,
        raw_json,
    })
}
