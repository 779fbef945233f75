//! jma-enrich: audio-feature enrichment
//!
//! Resolves upstream track ISRCs to MusicBrainz recordings, fetches
//! AcousticBrainz low-level descriptors for them, and persists both the
//! lookup cache and the features to SQLite.

pub mod cache;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod feature_fetcher;
pub mod rate_budget;
pub mod resolver;
pub mod retry;
pub mod services;
pub mod sink;
pub mod stats;
pub mod types;
pub mod utils;

pub use config::EnrichConfig;
pub use dispatcher::{DispatchOptions, Dispatcher, IdentifierOutcome, RunSummary};
pub use types::{CacheEntry, FeatureBundle, Isrc, Mbid, TrackRecord};
