//! Enrichment dispatcher
//!
//! # Architecture
//! - Identifiers are cut into batches of `batch_size`
//! - Within a batch, at most `workers` identifiers are in flight via
//!   `futures::stream::buffer_unordered(workers)`
//! - Each identifier runs Resolver → Feature Fetcher → Sink on its own
//! - When a batch drains, the sink flushes it in one transaction and a
//!   progress snapshot is logged
//! - Cancellation is checked between batches only; an in-flight batch always
//!   completes and flushes
//!
//! `workers = 1` is the sequential baseline; there is no separate code path.
//!
//! Counters are per run: each call to [`Dispatcher::run`] or
//! [`Dispatcher::run_identifiers`] starts from zero. The lookup cache and the
//! rate budget persist across runs on the same dispatcher.

use crate::cache::LookupCache;
use crate::config::EnrichConfig;
use crate::feature_fetcher::{FeatureFetch, FeatureFetcher};
use crate::rate_budget::RateBudget;
use crate::resolver::{Resolution, Resolver};
use crate::retry::RetryPolicy;
use crate::services::{AcousticBrainzClient, FeatureSource, MusicBrainzClient, RecordingLookup};
use crate::sink::ResultSink;
use crate::stats::{Counter, StatsSnapshot};
use crate::types::{IdentifierError, Isrc, TrackRecord};
use futures::stream::{self, StreamExt};
use jma_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Pool and retry parameters
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub workers: usize,
    pub batch_size: usize,
    pub requests_per_second: NonZeroU32,
    pub rate_limit_cooldown: Duration,
    pub retry: RetryPolicy,
    pub db_max_lock_wait_ms: u64,
}

impl DispatchOptions {
    pub fn from_config(config: &EnrichConfig) -> Result<Self> {
        Ok(Self {
            workers: config.workers,
            batch_size: config.batch_size,
            requests_per_second: config.global_rate()?,
            rate_limit_cooldown: config.rate_limit_cooldown(),
            retry: config.retry_policy(),
            db_max_lock_wait_ms: config.db_max_lock_wait_ms,
        })
    }
}

/// How one identifier ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierOutcome {
    Matched,
    NotResolved,
    FeaturesMissing,
    /// Abandoned for this run; retried on the next one
    Failed,
}

/// Result of a dispatcher run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub batches_completed: usize,
    pub batches_total: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct Dispatcher {
    resolver: Resolver,
    fetcher: FeatureFetcher,
    cache: Arc<LookupCache>,
    sink: Arc<ResultSink>,
    budget: Arc<RateBudget>,
    workers: usize,
    batch_size: usize,
}

impl Dispatcher {
    /// Wire the real HTTP clients from configuration
    pub async fn from_config(config: &EnrichConfig, pool: SqlitePool) -> Result<Self> {
        let lookup = Arc::new(MusicBrainzClient::new(&config.musicbrainz_settings()?)?);
        let source = Arc::new(AcousticBrainzClient::new(&config.acousticbrainz_settings()?)?);
        let options = DispatchOptions::from_config(config)?;
        Self::with_services(lookup, source, pool, options).await
    }

    /// Wire arbitrary service implementations
    ///
    /// Preloads the lookup cache from `pool`.
    pub async fn with_services(
        lookup: Arc<dyn RecordingLookup>,
        source: Arc<dyn FeatureSource>,
        pool: SqlitePool,
        options: DispatchOptions,
    ) -> Result<Self> {
        let cache = Arc::new(LookupCache::load(&pool).await?);
        let sink = Arc::new(ResultSink::new(pool, options.db_max_lock_wait_ms));
        let budget = Arc::new(RateBudget::new(
            options.requests_per_second,
            options.rate_limit_cooldown,
        ));

        let resolver = Resolver::new(
            lookup,
            cache.clone(),
            sink.clone(),
            budget.clone(),
            options.retry.clone(),
        );
        let fetcher = FeatureFetcher::new(source, budget.clone(), options.retry);

        Ok(Self {
            resolver,
            fetcher,
            cache,
            sink,
            budget,
            workers: options.workers.max(1),
            batch_size: options.batch_size.max(1),
        })
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    /// Enrich every track that carries a usable ISRC
    pub async fn run(&self, tracks: &[TrackRecord], cancel: &CancellationToken) -> Result<RunSummary> {
        let (identifiers, skipped) = pending_identifiers(tracks);

        tracing::info!(
            tracks = tracks.len(),
            identifiers = identifiers.len(),
            skipped,
            workers = self.workers,
            batch_size = self.batch_size,
            "Starting enrichment run"
        );

        self.run_batches(&identifiers, skipped, cancel).await
    }

    /// Enrich an already de-duplicated identifier list
    pub async fn run_identifiers(
        &self,
        identifiers: &[Isrc],
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        self.run_batches(identifiers, 0, cancel).await
    }

    async fn run_batches(
        &self,
        identifiers: &[Isrc],
        skipped: usize,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        self.sink.stats().reset();
        self.sink.stats().add(Counter::Skipped, skipped);

        let batches_total = identifiers.len().div_ceil(self.batch_size);
        let mut batches_completed = 0;
        let mut cancelled = false;

        for batch in identifiers.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                cancelled = true;
                tracing::info!(
                    batches_completed,
                    batches_total,
                    "Enrichment cancelled between batches"
                );
                break;
            }

            let outcomes: Vec<IdentifierOutcome> = stream::iter(batch)
                .map(|isrc| self.process_one(isrc))
                .buffer_unordered(self.workers)
                .collect()
                .await;

            let flushed = self.sink.flush().await?;
            batches_completed += 1;

            let matched = outcomes
                .iter()
                .filter(|o| **o == IdentifierOutcome::Matched)
                .count();
            let snapshot = self.sink.stats().snapshot();
            tracing::info!(
                batch = batches_completed,
                batches_total,
                identifiers = outcomes.len(),
                matched,
                feature_rows = flushed.bundles,
                cache_rows = flushed.cache_entries,
                progress = %snapshot.display_string(),
                "Batch complete"
            );
        }

        let summary = RunSummary {
            stats: self.sink.stats().snapshot(),
            batches_completed,
            batches_total,
            cancelled,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            batches_completed,
            batches_total,
            cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            rate_limit_pauses = self.budget.pause_count(),
            "Enrichment run finished"
        );

        Ok(summary)
    }

    /// Run one identifier through the whole pipeline
    ///
    /// Never fails: every ending is an outcome counted in the stats.
    pub async fn process_one(&self, isrc: &Isrc) -> IdentifierOutcome {
        let stats = self.sink.stats();
        stats.bump(Counter::Attempted);

        let mbid = match self.resolver.resolve(isrc).await {
            Resolution::Resolved { mbid, from_cache } => {
                if from_cache {
                    stats.bump(Counter::CacheHit);
                }
                stats.bump(Counter::Resolved);
                mbid
            }
            Resolution::NotFound { from_cache } => {
                if from_cache {
                    stats.bump(Counter::CacheHit);
                }
                stats.bump(Counter::NotResolved);
                return IdentifierOutcome::NotResolved;
            }
            Resolution::Failed(_) => {
                stats.bump(Counter::FailedAfterRetry);
                return IdentifierOutcome::Failed;
            }
        };

        match self.fetcher.fetch(&mbid).await {
            FeatureFetch::Features(bundle) => {
                self.sink.record(isrc, bundle);
                stats.bump(Counter::FeatureMatched);
                IdentifierOutcome::Matched
            }
            FeatureFetch::NotFound => {
                tracing::debug!(isrc = %isrc, mbid = %mbid, "No AcousticBrainz analysis");
                stats.bump(Counter::FeaturesMissing);
                IdentifierOutcome::FeaturesMissing
            }
            FeatureFetch::Failed(_) => {
                stats.bump(Counter::FailedAfterRetry);
                IdentifierOutcome::Failed
            }
        }
    }
}

/// Usable, de-duplicated ISRCs in input order, plus the count of skipped tracks
///
/// Tracks with a blank or malformed code are skipped. A repeated ISRC is not
/// counted as skipped: it is enriched once and every track sharing it benefits.
pub fn pending_identifiers(tracks: &[TrackRecord]) -> (Vec<Isrc>, usize) {
    let mut seen = HashSet::new();
    let mut identifiers = Vec::new();
    let mut skipped = 0;

    for track in tracks {
        let raw = track.isrc.as_deref().unwrap_or("");
        match Isrc::parse(raw) {
            Ok(isrc) => {
                if seen.insert(isrc.clone()) {
                    identifiers.push(isrc);
                }
            }
            Err(IdentifierError::Empty) => skipped += 1,
            Err(e) => {
                tracing::warn!(track_id = %track.track_id, error = %e, "Skipping track with malformed ISRC");
                skipped += 1;
            }
        }
    }

    (identifiers, skipped)
}
