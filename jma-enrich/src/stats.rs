//! Enrichment run counters
//!
//! Bumped concurrently by workers, snapshotted at batch boundaries and
//! zeroed at the start of every run.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counter identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// ISRC entered the per-identifier pipeline
    Attempted,
    /// Track had no usable ISRC and never reached the resolver
    Skipped,
    /// Resolver answered from cache (positive or negative)
    CacheHit,
    /// ISRC resolved to an MBID
    Resolved,
    /// MusicBrainz has no recording for the ISRC
    NotResolved,
    /// Features fetched and handed to the sink
    FeatureMatched,
    /// Recording has no AcousticBrainz analysis
    FeaturesMissing,
    /// Abandoned for this run after retries, at either stage
    FailedAfterRetry,
}

#[derive(Debug, Default)]
pub struct EnrichStats {
    attempted: AtomicUsize,
    skipped: AtomicUsize,
    cache_hits: AtomicUsize,
    resolved: AtomicUsize,
    not_resolved: AtomicUsize,
    feature_matched: AtomicUsize,
    features_missing: AtomicUsize,
    failed_after_retry: AtomicUsize,
}

impl EnrichStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: usize) {
        let slot = match counter {
            Counter::Attempted => &self.attempted,
            Counter::Skipped => &self.skipped,
            Counter::CacheHit => &self.cache_hits,
            Counter::Resolved => &self.resolved,
            Counter::NotResolved => &self.not_resolved,
            Counter::FeatureMatched => &self.feature_matched,
            Counter::FeaturesMissing => &self.features_missing,
            Counter::FailedAfterRetry => &self.failed_after_retry,
        };
        slot.fetch_add(n, Ordering::Relaxed);
    }

    /// Zero every counter
    pub fn reset(&self) {
        for slot in [
            &self.attempted,
            &self.skipped,
            &self.cache_hits,
            &self.resolved,
            &self.not_resolved,
            &self.feature_matched,
            &self.features_missing,
            &self.failed_after_retry,
        ] {
            slot.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            not_resolved: self.not_resolved.load(Ordering::Relaxed),
            feature_matched: self.feature_matched.load(Ordering::Relaxed),
            features_missing: self.features_missing.load(Ordering::Relaxed),
            failed_after_retry: self.failed_after_retry.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub attempted: usize,
    pub skipped: usize,
    pub cache_hits: usize,
    pub resolved: usize,
    pub not_resolved: usize,
    pub feature_matched: usize,
    pub features_missing: usize,
    pub failed_after_retry: usize,
}

impl StatsSnapshot {
    /// Identifiers that ended without features for any reason
    pub fn unmatched(&self) -> usize {
        self.not_resolved + self.features_missing + self.failed_after_retry
    }

    /// Feature matches as a percentage of attempted identifiers
    pub fn match_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.feature_matched as f64 / self.attempted as f64 * 100.0
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "attempted {} | cache hits {} | resolved {} | matched {} ({:.1}%) | unmatched {} | failed {} | skipped {}",
            self.attempted,
            self.cache_hits,
            self.resolved,
            self.feature_matched,
            self.match_rate(),
            self.unmatched(),
            self.failed_after_retry,
            self.skipped,
        )
    }
}
