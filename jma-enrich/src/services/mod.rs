//! External service clients
//!
//! Both services sit behind a trait so the dispatcher can be driven by
//! scripted fakes in tests. A "no match" answer is `Ok(None)`, never an
//! error: most ISRCs have no AcousticBrainz data and that is normal.

pub mod acousticbrainz_client;
pub mod musicbrainz_client;

pub use acousticbrainz_client::AcousticBrainzClient;
pub use musicbrainz_client::MusicBrainzClient;

use crate::types::{FeatureBundle, Isrc, Mbid};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Non-standard header AcousticBrainz uses for its rate-limit window
const RATE_LIMIT_RESET_IN: &str = "x-ratelimit-reset-in";

/// Service call failure
///
/// Classifies what the caller should do next, not what went wrong on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Service asked us to slow down (HTTP 429, or 503 from MusicBrainz)
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeout, connection failure, 5xx, or malformed payload
    #[error("Transient error: {0}")]
    Transient(String),

    /// Request refused for reasons retrying will not fix (4xx)
    #[error("Request rejected {0}: {1}")]
    Rejected(u16, String),
}

impl ServiceError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Transient(format!("timeout: {}", err))
        } else if err.is_decode() {
            ServiceError::Transient(format!("malformed response: {}", err))
        } else {
            ServiceError::Transient(format!("network error: {}", err))
        }
    }
}

/// Recording returned by an ISRC lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingMatch {
    pub mbid: Mbid,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// ISRC → recording lookup service
#[async_trait]
pub trait RecordingLookup: Send + Sync {
    /// Service name for logging
    fn service_name(&self) -> &'static str;

    /// Wait until this service's own request quota allows another call
    ///
    /// Callers await this before the pool-wide budget, never after it.
    async fn pace(&self) {}

    /// Resolve an ISRC to at most one recording
    ///
    /// # Returns
    /// * `Ok(Some(_))` - Recording found
    /// * `Ok(None)` - Definitive "no recording carries this ISRC"
    /// * `Err(_)` - Lookup could not be completed
    async fn lookup_isrc(&self, isrc: &Isrc) -> Result<Option<RecordingMatch>, ServiceError>;
}

/// Recording → audio descriptor service
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Service name for logging
    fn service_name(&self) -> &'static str;

    /// Wait until this service's own request quota allows another call
    async fn pace(&self) {}

    /// Fetch descriptors for a recording
    ///
    /// `Ok(None)` means the recording exists but has no stored analysis.
    async fn fetch_features(&self, mbid: &Mbid) -> Result<Option<FeatureBundle>, ServiceError>;
}

/// Per-client HTTP settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub user_agent: String,
    /// Politeness pacing for this service alone
    pub requests_per_second: NonZeroU32,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientSettings {
    pub(crate) fn build_http_client(&self) -> jma_common::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| jma_common::Error::Internal(format!("HTTP client build failed: {}", e)))
    }

    pub(crate) fn build_rate_limiter(&self) -> governor::DefaultDirectRateLimiter {
        governor::RateLimiter::direct(governor::Quota::per_second(self.requests_per_second))
    }
}

/// Map a response status onto the error taxonomy
///
/// Returns `Ok(None)` for 404, `Ok(Some(response))` for success.
/// `throttle_statuses` lists the codes a service uses to signal throttling.
pub(crate) async fn check_status(
    response: Response,
    throttle_statuses: &[StatusCode],
) -> Result<Option<Response>, ServiceError> {
    let status = response.status();

    if status.is_success() {
        return Ok(Some(response));
    }

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    if throttle_statuses.contains(&status) {
        return Err(ServiceError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate(&body, 200);

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(ServiceError::Transient(format!("HTTP {}: {}", status.as_u16(), body)))
    } else {
        Err(ServiceError::Rejected(status.as_u16(), body))
    }
}

/// Cool-down requested by the service, if any
///
/// Honours `Retry-After` in delta-seconds form, then AcousticBrainz's
/// `X-RateLimit-Reset-In`. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    [RETRY_AFTER.as_str(), RATE_LIMIT_RESET_IN]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .next()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
