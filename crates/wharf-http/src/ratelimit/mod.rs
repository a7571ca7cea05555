//! Bucket-aware admission for REST requests
//!
//! Every attempt passes the global throttle, then its route bucket.
//! Buckets start out keyed by route shape and are merged once the
//! server reveals their canonical hash.

mod bucket;
mod global;
mod headers;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

pub use bucket::{Bucket, BucketGuard, BucketState};
pub use global::GlobalThrottle;
pub use headers::{RateLimitHeaders, Scope};

/// Outcome of recording a bucket's canonical hash
#[derive(Debug)]
pub enum Migration {
    /// This bucket is (now) the canonical one for the hash
    Adopted,
    /// Another route key got there first; use its bucket from now on
    Remapped(Arc<Bucket>),
}

#[derive(Debug, Default)]
struct BucketMap {
    by_route: HashMap<String, Arc<Bucket>>,
    by_hash: HashMap<String, Arc<Bucket>>,
}

#[derive(Debug)]
pub struct RateLimiter {
    global: GlobalThrottle,
    buckets: Mutex<BucketMap>,
}

impl RateLimiter {
    pub fn new(global: GlobalThrottle) -> Self {
        Self {
            global,
            buckets: Mutex::new(BucketMap::default()),
        }
    }

    #[inline]
    pub fn global(&self) -> &GlobalThrottle {
        &self.global
    }

    /// Bucket for a route key, created on first use
    pub fn bucket(&self, route_key: &str) -> Arc<Bucket> {
        let mut map = self.buckets.lock();
        if let Some(bucket) = map.by_route.get(route_key) {
            return Arc::clone(bucket);
        }
        let bucket = Arc::new(Bucket::new(route_key));
        map.by_route
            .insert(route_key.to_string(), Arc::clone(&bucket));
        bucket
    }

    /// Record that `current`, used for `route_key`, belongs to canonical bucket `hash`
    ///
    /// Runs as one upsert under the map lock, so two route keys racing to
    /// the same hash always end up sharing one bucket.
    pub fn migrate(&self, route_key: &str, hash: &str, current: &Arc<Bucket>) -> Migration {
        let mut map = self.buckets.lock();

        match map.by_hash.get(hash).cloned() {
            Some(canonical) if Arc::ptr_eq(&canonical, current) => Migration::Adopted,
            Some(canonical) => {
                tracing::debug!(
                    route = route_key,
                    bucket = hash,
                    canonical = canonical.key(),
                    "Merging route into canonical bucket"
                );
                map.by_route
                    .insert(route_key.to_string(), Arc::clone(&canonical));
                Migration::Remapped(canonical)
            }
            None => {
                current.set_hash(hash);
                map.by_hash.insert(hash.to_string(), Arc::clone(current));
                Migration::Adopted
            }
        }
    }

    /// Number of distinct bucket objects currently in use
    pub fn bucket_count(&self) -> usize {
        let map = self.buckets.lock();
        let mut seen: Vec<*const Bucket> = map.by_route.values().map(Arc::as_ptr).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}
