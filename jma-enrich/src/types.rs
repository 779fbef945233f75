//! Core identifiers and records flowing through enrichment
//!
//! - [`Isrc`]: per-track recording code, the join key everywhere
//! - [`Mbid`]: MusicBrainz recording id an ISRC resolves to
//! - [`FeatureBundle`]: AcousticBrainz low-level descriptors for one recording
//! - [`CacheEntry`]: memo of a completed ISRC lookup (hit or definitive miss)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Rejected identifier text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("empty identifier")]
    Empty,

    #[error("invalid ISRC {0:?}: expected 12 alphanumeric characters")]
    MalformedIsrc(String),

    #[error("invalid MBID {0:?}: {1}")]
    MalformedMbid(String, String),
}

/// International Standard Recording Code
///
/// Normalized on parse: surrounding whitespace and hyphens removed,
/// upper-cased. `jp-k01-23-45678` and `JPK012345678` are the same code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isrc(String);

impl Isrc {
    pub const LEN: usize = 12;

    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if normalized.len() != Self::LEN || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(IdentifierError::MalformedIsrc(raw.to_string()));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Isrc {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Isrc {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Isrc> for String {
    fn from(value: Isrc) -> Self {
        value.0
    }
}

/// MusicBrainz recording identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mbid(Uuid);

impl Mbid {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|e| IdentifierError::MalformedMbid(raw.to_string(), e.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Mbid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for Mbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the form both APIs use in URLs
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Mbid {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Audio descriptors for one recording
///
/// Numeric fields are `None` when AcousticBrainz omitted them; they are never
/// defaulted to zero, so downstream averages are not skewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// Recording the descriptors were computed for
    pub mbid: Mbid,
    /// Tempo in beats per minute
    pub tempo: Option<f64>,
    /// Dominant peak of the BPM histogram
    pub bpm_histogram_first_peak: Option<f64>,
    /// Secondary peak of the BPM histogram
    pub bpm_histogram_second_peak: Option<f64>,
    /// Rhythmic-complexity index
    pub danceability: Option<f64>,
    /// Onsets per second
    pub onset_rate: Option<f64>,
    /// Perceptual loudness
    pub loudness: Option<f64>,
    /// Dynamic-range measure
    pub dynamic_complexity: Option<f64>,
    /// Harmonic key, e.g. "C#"
    pub key_key: Option<String>,
    /// Mode, "major" or "minor"
    pub key_scale: Option<String>,
    /// Verbatim response body, kept for re-derivation downstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<String>,
}

impl FeatureBundle {
    /// Bundle with no descriptors yet
    pub fn empty(mbid: Mbid) -> Self {
        Self {
            mbid,
            tempo: None,
            bpm_histogram_first_peak: None,
            bpm_histogram_second_peak: None,
            danceability: None,
            onset_rate: None,
            loudness: None,
            dynamic_complexity: None,
            key_key: None,
            key_scale: None,
            raw_json: None,
        }
    }
}

/// Lookup status persisted alongside each cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Resolved,
    NotFound,
}

impl LookupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::Resolved => "resolved",
            LookupStatus::NotFound => "not_found",
        }
    }
}

/// Completed ISRC lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub isrc: Isrc,
    /// `None` records a definitive "no match"
    pub mbid: Option<Mbid>,
    /// Recording title reported by MusicBrainz (informational)
    pub recording_title: Option<String>,
    /// First artist credit reported by MusicBrainz (informational)
    pub artist_name: Option<String>,
}

impl CacheEntry {
    pub fn resolved(isrc: Isrc, mbid: Mbid) -> Self {
        Self {
            isrc,
            mbid: Some(mbid),
            recording_title: None,
            artist_name: None,
        }
    }

    pub fn not_found(isrc: Isrc) -> Self {
        Self {
            isrc,
            mbid: None,
            recording_title: None,
            artist_name: None,
        }
    }

    pub fn status(&self) -> LookupStatus {
        if self.mbid.is_some() {
            LookupStatus::Resolved
        } else {
            LookupStatus::NotFound
        }
    }
}

/// One row of the upstream tracks table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub track_id: String,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    /// Raw code as extracted; may be blank or malformed
    pub isrc: Option<String>,
    pub popularity: Option<i64>,
}
