//! Post-run verification report
//!
//! Summarizes what the enrichment tables hold and samples enriched tracks
//! joined back to `bronze_tracks`, so an operator can eyeball the output.

use super::{cache_entries, features};
use jma_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;

/// One enriched track for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTrackSample {
    pub track_name: String,
    pub artist_name: String,
    pub tempo: Option<f64>,
    pub danceability: Option<f64>,
    pub key_scale: Option<String>,
}

/// Contents of the enrichment tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub feature_rows: i64,
    pub cache_rows: i64,
    pub resolved_rows: i64,
    pub not_found_rows: i64,
    pub samples: Vec<EnrichedTrackSample>,
}

impl VerificationReport {
    /// Share of cached lookups that ended with features, as a percentage
    pub fn feature_rate(&self) -> f64 {
        if self.cache_rows == 0 {
            0.0
        } else {
            self.feature_rows as f64 / self.cache_rows as f64 * 100.0
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracks with audio features: {:>6}", self.feature_rows)?;
        writeln!(f, "ISRC lookups cached:        {:>6}", self.cache_rows)?;
        writeln!(f, "  Resolved:                 {:>6}", self.resolved_rows)?;
        writeln!(f, "  Not found:                {:>6}", self.not_found_rows)?;
        writeln!(f, "Feature rate:               {:>5.1}%", self.feature_rate())?;

        for sample in &self.samples {
            writeln!(
                f,
                "{:30} | {:20} | {:>6} BPM | Dance: {:>5} | Key: {}",
                clip(&sample.track_name, 30),
                clip(&sample.artist_name, 20),
                sample
                    .tempo
                    .map(|t| format!("{:.1}", t))
                    .unwrap_or_else(|| "-".to_string()),
                sample
                    .danceability
                    .map(|d| format!("{:.2}", d))
                    .unwrap_or_else(|| "-".to_string()),
                sample.key_scale.as_deref().unwrap_or("-"),
            )?;
        }

        Ok(())
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Build the report, sampling up to `sample_limit` enriched tracks
pub async fn build_report(pool: &SqlitePool, sample_limit: i64) -> Result<VerificationReport> {
    let feature_rows = features::count(pool).await?;
    let (cache_rows, resolved_rows, not_found_rows) = cache_entries::count_by_status(pool).await?;

    let samples = sqlx::query_as::<_, (Option<String>, Option<String>, Option<f64>, Option<f64>, Option<String>)>(
        r#"
        SELECT t.track_name, t.artist_name, a.tempo, a.danceability, a.key_scale
        FROM bronze_tracks t
        JOIN acousticbrainz_features a ON UPPER(REPLACE(TRIM(t.isrc), '-', '')) = a.isrc
        ORDER BY t.popularity DESC, t.track_id
        LIMIT ?
        "#,
    )
    .bind(sample_limit)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(track_name, artist_name, tempo, danceability, key_scale)| EnrichedTrackSample {
        track_name: track_name.unwrap_or_default(),
        artist_name: artist_name.unwrap_or_default(),
        tempo,
        danceability,
        key_scale,
    })
    .collect();

    Ok(VerificationReport {
        feature_rows,
        cache_rows,
        resolved_rows,
        not_found_rows,
        samples,
    })
}
