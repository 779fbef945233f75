//! In-memory ISRC lookup cache
//!
//! Arena keyed by ISRC, preloaded from `isrc_mbid_cache` at startup and only
//! ever grown. A `None` value is a cached negative: the ISRC was looked up
//! and MusicBrainz had no recording for it.
//!
//! Persistence of new entries goes through the result sink so they land in
//! the same transaction as the batch's feature rows.

use crate::types::{Isrc, Mbid};
use jma_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct LookupCache {
    entries: Mutex<HashMap<Isrc, Option<Mbid>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Isrc, Option<Mbid>)>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }

    /// Preload from the persisted cache table
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let entries = crate::db::cache_entries::load_all(pool).await?;
        let cache = Self::from_entries(entries);
        tracing::info!(entries = cache.len(), "Lookup cache loaded");
        Ok(cache)
    }

    /// `None` = never looked up; `Some(None)` = known miss
    pub fn get(&self, isrc: &Isrc) -> Option<Option<Mbid>> {
        self.lock().get(isrc).copied()
    }

    /// Record a lookup outcome
    ///
    /// Concurrent writers for the same ISRC converge: last writer wins, and
    /// the values are the same answer from the same service.
    pub fn insert(&self, isrc: Isrc, mbid: Option<Mbid>) {
        self.lock().insert(isrc, mbid);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Isrc, Option<Mbid>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
