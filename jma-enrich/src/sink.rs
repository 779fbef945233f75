//! Result sink
//!
//! Workers hand over feature bundles and new cache entries as they finish;
//! both are buffered in memory and written together by [`ResultSink::flush`]
//! once the batch's workers are idle. A crash mid-batch therefore loses at
//! most that batch, and every upsert is keyed by ISRC so re-running is safe.

use crate::stats::EnrichStats;
use crate::types::{CacheEntry, FeatureBundle, Isrc};
use crate::utils::retry_on_lock;
use jma_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct PendingWrites {
    cache_entries: HashMap<Isrc, CacheEntry>,
    bundles: HashMap<Isrc, FeatureBundle>,
}

/// Rows written by one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub cache_entries: usize,
    pub bundles: usize,
}

pub struct ResultSink {
    db: SqlitePool,
    pending: Mutex<PendingWrites>,
    stats: EnrichStats,
    max_lock_wait_ms: u64,
}

impl ResultSink {
    pub fn new(db: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            pending: Mutex::new(PendingWrites::default()),
            stats: EnrichStats::new(),
            max_lock_wait_ms,
        }
    }

    /// Queue a feature bundle for the current batch
    pub fn record(&self, isrc: &Isrc, bundle: FeatureBundle) {
        self.lock().bundles.insert(isrc.clone(), bundle);
    }

    /// Queue a cache entry for the current batch
    pub fn record_cache_entry(&self, entry: CacheEntry) {
        self.lock().cache_entries.insert(entry.isrc.clone(), entry);
    }

    /// Queued (cache entries, bundles)
    pub fn pending_len(&self) -> (usize, usize) {
        let pending = self.lock();
        (pending.cache_entries.len(), pending.bundles.len())
    }

    pub fn stats(&self) -> &EnrichStats {
        &self.stats
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Write everything queued so far in one transaction
    ///
    /// Must only be called while no worker is recording; the dispatcher
    /// calls it between batches.
    pub async fn flush(&self) -> Result<FlushSummary> {
        let PendingWrites {
            cache_entries,
            bundles,
        } = std::mem::take(&mut *self.lock());

        let summary = FlushSummary {
            cache_entries: cache_entries.len(),
            bundles: bundles.len(),
        };

        if summary == FlushSummary::default() {
            return Ok(summary);
        }

        let entries: Vec<CacheEntry> = cache_entries.into_values().collect();
        let bundles: Vec<(Isrc, FeatureBundle)> = bundles.into_iter().collect();
        let written_at = chrono::Utc::now().to_rfc3339();

        retry_on_lock("batch flush", self.max_lock_wait_ms, || {
            crate::db::write_batch(&self.db, &entries, &bundles, &written_at)
        })
        .await?;

        tracing::debug!(
            cache_entries = summary.cache_entries,
            bundles = summary.bundles,
            "Batch flushed"
        );

        Ok(summary)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingWrites> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mbid;
    use tempfile::TempDir;

    async fn test_sink() -> (TempDir, ResultSink) {
        let temp_dir = TempDir::new().unwrap();
        let pool = jma_common::db::init_database(&temp_dir.path().join("sink.db"))
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        (temp_dir, ResultSink::new(pool, 1000))
    }

    fn isrc(code: &str) -> Isrc {
        Isrc::parse(code).unwrap()
    }

    fn mbid() -> Mbid {
        Mbid::parse("550e8400-e29b-41d4-a716-446655440000").unwrap()
    }

    #[tokio::test]
    async fn test_nothing_written_before_flush() {
        let (_dir, sink) = test_sink().await;
        sink.record_cache_entry(CacheEntry::resolved(isrc("JPA001234567"), mbid()));
        sink.record(&isrc("JPA001234567"), FeatureBundle::empty(mbid()));

        assert_eq!(sink.pending_len(), (1, 1));
        assert_eq!(crate::db::features::count(sink.db()).await.unwrap(), 0);

        let summary = sink.flush().await.unwrap();
        assert_eq!(summary, FlushSummary { cache_entries: 1, bundles: 1 });
        assert_eq!(sink.pending_len(), (0, 0));
        assert_eq!(crate::db::features::count(sink.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flush_is_upsert() {
        let (_dir, sink) = test_sink().await;
        let code = isrc("JPA001234567");

        let mut first = FeatureBundle::empty(mbid());
        first.tempo = Some(100.0);
        sink.record_cache_entry(CacheEntry::resolved(code.clone(), mbid()));
        sink.record(&code, first);
        sink.flush().await.unwrap();

        let mut second = FeatureBundle::empty(mbid());
        second.tempo = Some(101.5);
        sink.record(&code, second);
        sink.flush().await.unwrap();

        assert_eq!(crate::db::features::count(sink.db()).await.unwrap(), 1);
        let stored = crate::db::features::get(sink.db(), &code).await.unwrap().unwrap();
        assert_eq!(stored.tempo, Some(101.5));
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let (_dir, sink) = test_sink().await;
        assert_eq!(sink.flush().await.unwrap(), FlushSummary::default());
    }

    #[tokio::test]
    async fn test_negative_cache_entry_persisted() {
        let (_dir, sink) = test_sink().await;
        let code = isrc("JPA001234568");
        sink.record_cache_entry(CacheEntry::not_found(code.clone()));
        sink.flush().await.unwrap();

        assert_eq!(
            crate::db::cache_entries::get(sink.db(), &code).await.unwrap(),
            Some(None)
        );
    }
}
