//! ISRC → MBID resolution with a permanent cache
//!
//! Cache hit: answered without any network call, including cached misses.
//! Cache miss: one lookup (with retries); a definitive answer, found or not
//! found, is cached and queued for persistence before returning. A lookup
//! that exhausts its retries is not cached, so the next run tries again.

use crate::cache::LookupCache;
use crate::rate_budget::RateBudget;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::services::{RecordingLookup, ServiceError};
use crate::sink::ResultSink;
use crate::types::{CacheEntry, Isrc, Mbid};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { mbid: Mbid, from_cache: bool },
    NotFound { from_cache: bool },
    /// Gave up for this run
    Failed(ServiceError),
}

pub struct Resolver {
    lookup: Arc<dyn RecordingLookup>,
    cache: Arc<LookupCache>,
    sink: Arc<ResultSink>,
    budget: Arc<RateBudget>,
    policy: RetryPolicy,
}

impl Resolver {
    pub fn new(
        lookup: Arc<dyn RecordingLookup>,
        cache: Arc<LookupCache>,
        sink: Arc<ResultSink>,
        budget: Arc<RateBudget>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            lookup,
            cache,
            sink,
            budget,
            policy,
        }
    }

    pub async fn resolve(&self, isrc: &Isrc) -> Resolution {
        if let Some(cached) = self.cache.get(isrc) {
            tracing::trace!(isrc = %isrc, "Lookup cache hit");
            return match cached {
                Some(mbid) => Resolution::Resolved {
                    mbid,
                    from_cache: true,
                },
                None => Resolution::NotFound { from_cache: true },
            };
        }

        let subject = isrc.to_string();
        let result = call_with_retry(
            self.lookup.service_name(),
            &subject,
            &self.policy,
            &self.budget,
            || self.lookup.pace(),
            || self.lookup.lookup_isrc(isrc),
        )
        .await;

        match result {
            Ok(Some(found)) => {
                self.cache.insert(isrc.clone(), Some(found.mbid));
                self.sink.record_cache_entry(CacheEntry {
                    isrc: isrc.clone(),
                    mbid: Some(found.mbid),
                    recording_title: found.title,
                    artist_name: found.artist,
                });
                Resolution::Resolved {
                    mbid: found.mbid,
                    from_cache: false,
                }
            }
            Ok(None) => {
                self.cache.insert(isrc.clone(), None);
                self.sink.record_cache_entry(CacheEntry::not_found(isrc.clone()));
                Resolution::NotFound { from_cache: false }
            }
            Err(err) => {
                tracing::warn!(isrc = %isrc, error = %err, "ISRC lookup abandoned for this run");
                Resolution::Failed(err)
            }
        }
    }
}
