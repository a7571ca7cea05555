//! Process-wide throttle shared by every route

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

/// Global gate: a steady request quota plus a hard lock set by global 429s
pub struct GlobalThrottle {
    locked_until: Mutex<Option<Instant>>,
    quota: Option<DefaultDirectRateLimiter>,
}

impl GlobalThrottle {
    /// Throttle allowing `per_second` requests per second
    pub fn new(per_second: u32) -> Self {
        Self {
            locked_until: Mutex::new(None),
            quota: NonZeroU32::new(per_second).map(|n| RateLimiter::direct(Quota::per_second(n))),
        }
    }

    /// Throttle with no steady quota, only 429 locks
    pub fn unmetered() -> Self {
        Self {
            locked_until: Mutex::new(None),
            quota: None,
        }
    }

    /// Wait until a global send is permitted, taking one unit of quota
    pub async fn acquire(&self) {
        self.wait_unlocked().await;

        if let Some(quota) = &self.quota {
            quota.until_ready().await;
        }
    }

    /// Wait out any 429 lock without touching the quota
    pub async fn wait_unlocked(&self) {
        loop {
            let until = *self.locked_until.lock();
            match until {
                Some(until) if until > Instant::now() => sleep_until(until).await,
                _ => break,
            }
        }
    }

    /// Block every acquisition for `duration`
    ///
    /// A shorter lock never shortens one already in place.
    pub fn lock_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut locked = self.locked_until.lock();
        if locked.map_or(true, |current| current < until) {
            *locked = Some(until);
        }
        tracing::warn!(retry_after_ms = duration.as_millis() as u64, "Global rate limit hit");
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until
            .lock()
            .is_some_and(|until| until > Instant::now())
    }
}

impl std::fmt::Debug for GlobalThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalThrottle")
            .field("locked_until", &*self.locked_until.lock())
            .field("metered", &self.quota.is_some())
            .finish()
    }
}
