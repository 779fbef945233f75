//! Lock-contention retry for batch flushes
//!
//! The enrichment tables live in the same SQLite file other pipeline stages
//! write to. A flush that hits `database is locked` (or `SQLITE_BUSY`) after
//! the connection's own busy timeout is retried here, with a doubling pause,
//! until `db_max_lock_wait_ms` has passed since the first try. Anything other
//! than lock contention is returned to the caller on the spot: a constraint
//! or I/O failure will not go away by waiting.

use jma_common::{Error, Result};
use std::time::{Duration, Instant};

const FIRST_PAUSE: Duration = Duration::from_millis(10);
const LONGEST_PAUSE: Duration = Duration::from_millis(1000);

/// Run `write` until it stops failing on a held lock or `max_wait_ms` runs out
///
/// `write` must be safe to repeat: [`crate::db::write_batch`] rolls its
/// transaction back on failure, so a retry starts from a clean slate.
///
/// # Errors
/// * The first non-contention error from `write`
/// * [`Error::Internal`] once the lock is still held after `max_wait_ms`
pub async fn retry_on_lock<F, Fut, T>(what: &str, max_wait_ms: u64, mut write: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let started = Instant::now();
    let deadline = Duration::from_millis(max_wait_ms);
    let mut pause = FIRST_PAUSE;
    let mut tries = 0u32;

    loop {
        tries += 1;

        let err = match write().await {
            Ok(value) => {
                if tries > 1 {
                    tracing::debug!(
                        what,
                        tries,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Write went through once the lock was released"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_contention() => err,
            Err(err) => return Err(err),
        };

        let waited = started.elapsed();
        if waited >= deadline {
            tracing::error!(
                what,
                tries,
                waited_ms = waited.as_millis() as u64,
                max_wait_ms,
                error = %err,
                "Database still locked, giving up on write"
            );
            return Err(Error::Internal(format!(
                "{}: database still locked after {} tries over {} ms",
                what,
                tries,
                waited.as_millis()
            )));
        }

        tracing::warn!(
            what,
            tries,
            pause_ms = pause.as_millis() as u64,
            "Database locked by another writer, pausing before retry"
        );
        tokio::time::sleep(pause).await;
        pause = (pause * 2).min(LONGEST_PAUSE);
    }
}
