//! Pool-wide request budget
//!
//! Every outbound request from every worker awaits [`RateBudget::acquire`]
//! as its last step before sending, after the service's own pacing quota.
//! The budget combines:
//! - a token bucket capping the combined request rate across both services
//! - a pause gate: when either service answers with a rate-limit signal the
//!   whole pool stops issuing requests until the cool-down has elapsed
//!
//! Waiting on the budget suspends only the calling task.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateBudget {
    limiter: DefaultDirectRateLimiter,
    paused_until: Mutex<Option<Instant>>,
    default_cooldown: Duration,
    pauses: AtomicU64,
}

impl RateBudget {
    pub fn new(requests_per_second: NonZeroU32, default_cooldown: Duration) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
            paused_until: Mutex::new(None),
            default_cooldown,
            pauses: AtomicU64::new(0),
        }
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) {
        loop {
            if let Some(wait) = self.remaining_pause() {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Request budget paused, waiting");
                tokio::time::sleep(wait).await;
                continue;
            }

            self.limiter.until_ready().await;

            // A pause may have started while this task waited for a token
            if self.remaining_pause().is_none() {
                return;
            }
        }
    }

    /// Stop all new requests for `requested` (or the default cool-down)
    ///
    /// Overlapping pauses never shorten one already in force.
    /// Returns the cool-down applied.
    pub fn pause_for(&self, requested: Option<Duration>) -> Duration {
        let cooldown = requested.unwrap_or(self.default_cooldown);
        let until = Instant::now() + cooldown;

        {
            let mut paused_until = self
                .paused_until
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match *paused_until {
                Some(existing) if existing >= until => {}
                _ => *paused_until = Some(until),
            }
        }

        self.pauses.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            cooldown_ms = cooldown.as_millis() as u64,
            "Rate limit signalled, pausing all requests"
        );

        cooldown
    }

    /// Time left on the active pause, if any
    pub fn remaining_pause(&self) -> Option<Duration> {
        let paused_until = self
            .paused_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        paused_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Number of pauses triggered so far
    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }
}
