//! Per-route rate-limit bucket

use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep_until, Instant};

use super::headers::RateLimitHeaders;

#[derive(Debug, Default)]
pub struct BucketState {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
}

impl BucketState {
    /// How long a send must wait, if the bucket is drained
    fn wait_time(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > now => Some(reset_at - now),
            _ => None,
        }
    }

    fn refill(&mut self) {
        self.remaining = self.limit;
        self.reset_at = None;
    }
}

/// A rate-limit bucket shared by every route key mapped to it
///
/// The state lock is held for the whole request, so sends on one bucket
/// are serialized while unrelated buckets proceed independently.
#[derive(Debug)]
pub struct Bucket {
    key: String,
    hash: SyncMutex<Option<String>>,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            hash: SyncMutex::new(None),
            state: Mutex::new(BucketState::default()),
        }
    }

    /// Route key this bucket was first created for
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Canonical server-assigned hash, once discovered
    pub fn hash(&self) -> Option<String> {
        self.hash.lock().clone()
    }

    pub(crate) fn set_hash(&self, hash: &str) {
        *self.hash.lock() = Some(hash.to_string());
    }

    /// Take this bucket's slot, sleeping first if it is drained
    pub async fn acquire(&self) -> BucketGuard<'_> {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if let Some(wait) = state.wait_time(now) {
            tracing::warn!(
                bucket = %self.key,
                wait_ms = wait.as_millis() as u64,
                "Bucket exhausted, waiting for reset"
            );
            sleep_until(now + wait).await;
        }
        if state.reset_at.is_some_and(|reset_at| reset_at <= Instant::now()) {
            state.refill();
        }

        BucketGuard { state }
    }
}

/// Exclusive slot on a bucket for the duration of one request
pub struct BucketGuard<'a> {
    state: MutexGuard<'a, BucketState>,
}

impl BucketGuard<'_> {
    /// Record the limits reported by a response
    pub fn update(&mut self, headers: &RateLimitHeaders) {
        if let Some(limit) = headers.limit {
            self.state.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            self.state.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            self.state.reset_at = Some(Instant::now() + reset_after);
        }
    }

    /// Block the bucket for `duration` after a route-scoped 429
    pub fn exhaust_for(&mut self, duration: Duration) {
        let until = Instant::now() + duration;
        self.state.remaining = Some(0);
        if self.state.reset_at.map_or(true, |reset_at| reset_at < until) {
            self.state.reset_at = Some(until);
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.state.remaining
    }
}
