//! Time-bounded in-memory map and the fixed-window rate limiter built on it.
//!
//! Entries expire a fixed time after insertion. Expired entries are dropped
//! when their key is touched and by [`TtlCache::sweep`], which the daemon runs
//! periodically.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.lock().insert(key, Entry { value, expires_at });
    }

    /// Replace the live value for `key` with `f(current)`.
    ///
    /// A live entry keeps its original expiry; a missing or expired one
    /// starts a fresh TTL. Returns the new value and its expiry.
    pub fn upsert(&self, key: K, f: impl FnOnce(Option<&V>) -> V) -> (V, Instant) {
        let now = Instant::now();
        let mut entries = self.lock();
        let live = entries.get(&key).filter(|entry| entry.expires_at > now);
        let (value, expires_at) = match live {
            Some(entry) => (f(Some(&entry.value)), entry.expires_at),
            None => (f(None), now + self.ttl),
        };
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at,
            },
        );
        (value, expires_at)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Entries currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-client fixed-window request limiter.
pub struct RateLimiter {
    limit: u32,
    windows: TtlCache<String, u32>,
}

impl RateLimiter {
    /// Allow `limit` requests per `window` per client. A limit of 0 disables
    /// limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            windows: TtlCache::new(window),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Count a request from `client`.
    ///
    /// `Err` carries the time until the client's window resets.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        if !self.is_enabled() {
            return Ok(());
        }
        let (count, resets_at) = self
            .windows
            .upsert(client.to_string(), |count| count.map_or(1, |c| c.saturating_add(1)));
        if count > self.limit {
            Err(resets_at.saturating_duration_since(Instant::now()))
        } else {
            Ok(())
        }
    }

    pub fn sweep(&self) -> usize {
        self.windows.sweep()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty(), "expired entry is dropped on access");
    }

    #[test]
    fn upsert_keeps_the_original_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let (first, expires) = cache.upsert("k", |v| v.copied().unwrap_or(0) + 1);
        let (second, expires_again) = cache.upsert("k", |v| v.copied().unwrap_or(0) + 1);
        assert_eq!((first, second), (1, 2));
        assert_eq!(expires, expires_again);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("old", 1);
        std::thread::sleep(Duration::from_millis(30));
        cache.insert("new", 2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get(&"new"), Some(2));
    }

    #[test]
    fn limiter_blocks_after_limit_within_window() {
        let limiter = RateLimiter::per_minute(2);
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
        let retry = limiter.check("1.2.3.4").unwrap_err();
        assert!(retry <= Duration::from_secs(60));

        // Other clients have their own window.
        assert!(limiter.check("5.6.7.8").is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn limiter_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("c").is_ok());
        assert!(limiter.check("c").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("c").is_ok());
    }

    #[test]
    fn zero_limit_disables_limiting() {
        let limiter = RateLimiter::per_minute(0);
        for _ in 0..1000 {
            assert!(limiter.check("c").is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
