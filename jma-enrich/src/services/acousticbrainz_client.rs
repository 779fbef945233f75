//! AcousticBrainz low-level feature client
//!
//! `GET /api/v1/{mbid}/low-level` returns the Essentia analysis submitted for
//! a recording. Only a handful of descriptors are extracted; the full body is
//! kept verbatim in [`FeatureBundle::raw_json`].
//!
//! Note: AcousticBrainz stopped accepting submissions in 2022, so recordings
//! released later are expected to 404. A 404 here is not cached: coverage of
//! the dataset can still change between runs.

use super::{check_status, ClientSettings, FeatureSource, ServiceError};
use crate::types::{FeatureBundle, Mbid};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

pub const ACOUSTICBRAINZ_BASE_URL: &str = "https://acousticbrainz.org/api/v1";

const THROTTLE_STATUSES: [StatusCode; 1] = [StatusCode::TOO_MANY_REQUESTS];

/// AcousticBrainz low-level response (the parts we read)
#[derive(Debug, Default, Deserialize)]
struct ABLowLevel {
    #[serde(default)]
    rhythm: Option<ABRhythm>,
    #[serde(default)]
    tonal: Option<ABTonal>,
    #[serde(default)]
    lowlevel: Option<ABLowLevelFeatures>,
}

#[derive(Debug, Default, Deserialize)]
struct ABRhythm {
    bpm: Option<f64>,
    danceability: Option<f64>,
    onset_rate: Option<f64>,
    bpm_histogram_first_peak_bpm: Option<ABValue>,
    bpm_histogram_second_peak_bpm: Option<ABValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ABTonal {
    key_key: Option<String>,
    key_scale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ABLowLevelFeatures {
    loudness: Option<ABValue>,
    average_loudness: Option<f64>,
    dynamic_complexity: Option<f64>,
}

/// A descriptor reported either as a bare number or as summary statistics
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ABValue {
    Scalar(f64),
    Stats { mean: Option<f64> },
}

impl ABValue {
    fn value(&self) -> Option<f64> {
        match self {
            ABValue::Scalar(v) => Some(*v),
            ABValue::Stats { mean } => *mean,
        }
    }
}

impl ABLowLevel {
    fn into_bundle(self, mbid: Mbid, raw_json: String) -> FeatureBundle {
        let rhythm = self.rhythm.unwrap_or_default();
        let tonal = self.tonal.unwrap_or_default();
        let lowlevel = self.lowlevel.unwrap_or_default();

        FeatureBundle {
            mbid,
            tempo: rhythm.bpm,
            bpm_histogram_first_peak: rhythm
                .bpm_histogram_first_peak_bpm
                .as_ref()
                .and_then(ABValue::value),
            bpm_histogram_second_peak: rhythm
                .bpm_histogram_second_peak_bpm
                .as_ref()
                .and_then(ABValue::value),
            danceability: rhythm.danceability,
            onset_rate: rhythm.onset_rate,
            loudness: lowlevel
                .loudness
                .as_ref()
                .and_then(ABValue::value)
                .or(lowlevel.average_loudness),
            dynamic_complexity: lowlevel.dynamic_complexity,
            key_key: tonal.key_key,
            key_scale: tonal.key_scale,
            raw_json: Some(raw_json),
        }
    }
}

/// AcousticBrainz API client
pub struct AcousticBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: governor::DefaultDirectRateLimiter,
}

impl AcousticBrainzClient {
    pub fn new(settings: &ClientSettings) -> jma_common::Result<Self> {
        Ok(Self {
            http_client: settings.build_http_client()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            rate_limiter: settings.build_rate_limiter(),
        })
    }

    fn lowlevel_url(&self, mbid: &Mbid) -> String {
        format!("{}/{}/low-level", self.base_url, mbid)
    }

    /// Extract descriptors from a low-level response body
    pub fn parse_lowlevel(mbid: Mbid, body: String) -> Result<FeatureBundle, ServiceError> {
        let parsed: ABLowLevel = serde_json::from_str(&body).map_err(|e| {
            ServiceError::Transient(format!("malformed AcousticBrainz response for {}: {}", mbid, e))
        })?;
        Ok(parsed.into_bundle(mbid, body))
    }
}

#[async_trait]
impl FeatureSource for AcousticBrainzClient {
    fn service_name(&self) -> &'static str {
        "AcousticBrainz"
    }

    async fn pace(&self) {
        self.rate_limiter.until_ready().await;
    }

    async fn fetch_features(&self, mbid: &Mbid) -> Result<Option<FeatureBundle>, ServiceError> {
        let url = self.lowlevel_url(mbid);
        tracing::debug!(mbid = %mbid, url = %url, "Querying AcousticBrainz API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let Some(response) = check_status(response, &THROTTLE_STATUSES).await? else {
            tracing::debug!(mbid = %mbid, "No AcousticBrainz analysis for recording");
            return Ok(None);
        };

        let body = response.text().await.map_err(ServiceError::from_reqwest)?;
        let bundle = Self::parse_lowlevel(*mbid, body)?;

        tracing::debug!(
            mbid = %mbid,
            tempo = ?bundle.tempo,
            key = ?bundle.key_key,
            scale = ?bundle.key_scale,
            "AcousticBrainz lookup successful"
        );

        Ok(Some(bundle))
    }
}
