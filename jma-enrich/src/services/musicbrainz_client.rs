//! MusicBrainz ISRC lookup client
//!
//! `GET /ws/2/isrc/{isrc}?fmt=json&inc=artist-credits` lists every recording
//! carrying an ISRC. The first listed recording is taken as the match.
//!
//! MusicBrainz signals throttling with 503 as well as 429, so both map to
//! [`ServiceError::RateLimited`].
//!
//! API Documentation: https://musicbrainz.org/doc/MusicBrainz_API

use super::{check_status, ClientSettings, RecordingLookup, RecordingMatch, ServiceError};
use crate::types::{Isrc, Mbid};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

pub const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";

const THROTTLE_STATUSES: [StatusCode; 2] =
    [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE];

/// MusicBrainz ISRC lookup response
#[derive(Debug, Deserialize)]
struct MBIsrcResponse {
    #[serde(default)]
    recordings: Vec<MBRecording>,
}

#[derive(Debug, Deserialize)]
struct MBRecording {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MBArtistCredit>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    name: String,
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    /// Per-service pacing, independent of the pool-wide budget
    rate_limiter: governor::DefaultDirectRateLimiter,
}

impl MusicBrainzClient {
    pub fn new(settings: &ClientSettings) -> jma_common::Result<Self> {
        Ok(Self {
            http_client: settings.build_http_client()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            rate_limiter: settings.build_rate_limiter(),
        })
    }

    fn lookup_url(&self, isrc: &Isrc) -> String {
        format!("{}/isrc/{}?fmt=json&inc=artist-credits", self.base_url, isrc)
    }

    fn parse_response(isrc: &Isrc, body: &str) -> Result<Option<RecordingMatch>, ServiceError> {
        let response: MBIsrcResponse = serde_json::from_str(body).map_err(|e| {
            ServiceError::Transient(format!("malformed MusicBrainz response for {}: {}", isrc, e))
        })?;

        let Some(recording) = response.recordings.into_iter().next() else {
            return Ok(None);
        };

        let mbid = Mbid::parse(&recording.id).map_err(|e| {
            ServiceError::Transient(format!("malformed MusicBrainz recording id: {}", e))
        })?;

        Ok(Some(RecordingMatch {
            mbid,
            title: recording.title,
            artist: recording.artist_credit.into_iter().next().map(|ac| ac.name),
        }))
    }
}

#[async_trait]
impl RecordingLookup for MusicBrainzClient {
    fn service_name(&self) -> &'static str {
        "MusicBrainz"
    }

    async fn pace(&self) {
        self.rate_limiter.until_ready().await;
    }

    async fn lookup_isrc(&self, isrc: &Isrc) -> Result<Option<RecordingMatch>, ServiceError> {
        let url = self.lookup_url(isrc);
        tracing::debug!(isrc = %isrc, url = %url, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let Some(response) = check_status(response, &THROTTLE_STATUSES).await? else {
            tracing::debug!(isrc = %isrc, "ISRC not known to MusicBrainz");
            return Ok(None);
        };

        let body = response.text().await.map_err(ServiceError::from_reqwest)?;
        let result = Self::parse_response(isrc, &body)?;

        match &result {
            Some(found) => tracing::debug!(
                isrc = %isrc,
                mbid = %found.mbid,
                title = found.title.as_deref().unwrap_or("Unknown"),
                "Resolved ISRC via MusicBrainz"
            ),
            None => tracing::debug!(isrc = %isrc, "MusicBrainz returned no recordings"),
        }

        Ok(result)
    }
}
