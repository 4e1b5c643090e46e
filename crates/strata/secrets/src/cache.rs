//! Read-through secret cache with single-flight fetches
//!
//! Cached reads go straight to a sharded map and never wait on a fetch.
//! On a miss, the first caller for a key becomes the leader and runs the
//! fetch; later callers for the same key block until the leader publishes
//! its result. Fetches for different keys never wait on each other.
//!
//! Lock order is always `in_flight` then `entries`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{Result, SecretError};
use crate::value::SecretValue;

type CacheKey = (String, String);

/// A cached secret.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub provider: String,
    pub secret_id: String,
    pub value: SecretValue,
    pub fetched_at: DateTime<Utc>,
}

/// A fetch in progress, shared between its leader and any waiters.
struct InFlight {
    result: Mutex<Option<Result<SecretValue>>>,
    done: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<SecretValue>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<SecretValue> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

/// Secret cache keyed by `(provider, secret_id)`.
#[derive(Default)]
pub struct SecretCache {
    entries: DashMap<CacheKey, CacheEntry>,
    in_flight: Mutex<HashMap<CacheKey, Arc<InFlight>>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value or run `fetch` exactly once per miss.
    ///
    /// Failed fetches are handed to every waiting caller but never cached.
    pub fn get_or_fetch<F>(&self, provider: &str, secret_id: &str, fetch: F) -> Result<SecretValue>
    where
        F: FnOnce() -> Result<SecretValue>,
    {
        let key = (provider.to_string(), secret_id.to_string());
        if let Some(entry) = self.entries.get(&key) {
            trace!(provider, secret = secret_id, "Secret cache hit");
            return Ok(entry.value.clone());
        }

        let (flight, leader) = {
            let mut flights = self.in_flight.lock();
            if let Some(entry) = self.entries.get(&key) {
                return Ok(entry.value.clone());
            }
            match flights.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(InFlight::new());
                    flights.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            debug!(provider, secret = secret_id, "Waiting on in-flight secret fetch");
            return flight.wait();
        }

        debug!(provider, secret = secret_id, "Fetching secret");
        let mut guard = FlightGuard {
            cache: self,
            key: &key,
            flight: &flight,
            finished: false,
        };
        let result = fetch();
        guard.finish(result.clone());
        result
    }

    /// Drop a cached value. An in-flight fetch for the key still answers
    /// its waiters but its result is not cached.
    pub fn invalidate(&self, provider: &str, secret_id: &str) -> bool {
        let key = (provider.to_string(), secret_id.to_string());
        let mut flights = self.in_flight.lock();
        let was_in_flight = flights.remove(&key).is_some();
        let was_cached = self.entries.remove(&key).is_some();
        debug!(provider, secret = secret_id, was_cached, "Invalidated secret");
        was_cached || was_in_flight
    }

    /// Drop every cached value for a provider.
    pub fn invalidate_provider(&self, provider: &str) -> usize {
        let mut flights = self.in_flight.lock();
        flights.retain(|(p, _), _| p != provider);
        let before = self.entries.len();
        self.entries.retain(|(p, _), _| p != provider);
        let removed = before.saturating_sub(self.entries.len());
        debug!(provider, removed, "Invalidated provider secrets");
        removed
    }

    pub fn entry(&self, provider: &str, secret_id: &str) -> Option<CacheEntry> {
        self.entries
            .get(&(provider.to_string(), secret_id.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish(&self, key: &CacheKey, flight: &Arc<InFlight>, result: Result<SecretValue>) {
        {
            let mut flights = self.in_flight.lock();
            let registered = flights
                .get(key)
                .map_or(false, |current| Arc::ptr_eq(current, flight));
            if registered {
                flights.remove(key);
                if let Ok(value) = &result {
                    self.entries.insert(
                        key.clone(),
                        CacheEntry {
                            provider: key.0.clone(),
                            secret_id: key.1.clone(),
                            value: value.clone(),
                            fetched_at: Utc::now(),
                        },
                    );
                }
            }
        }
        flight.complete(result);
    }
}

/// Publishes the leader's result, or a failure if the fetch unwinds.
struct FlightGuard<'a> {
    cache: &'a SecretCache,
    key: &'a CacheKey,
    flight: &'a Arc<InFlight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(&mut self, result: Result<SecretValue>) {
        self.finished = true;
        self.cache.publish(self.key, self.flight, result);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let err = SecretError::unavailable(&self.key.0, "secret fetch panicked");
            self.cache.publish(self.key, self.flight, Err(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;

    fn secret(value: &str) -> SecretValue {
        SecretValue::new([("value".to_string(), value.to_string())].into())
    }

    #[test]
    fn test_second_read_is_cached() {
        let cache = SecretCache::new();
        let fetches = AtomicUsize::new(0);
        let fetch = || {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(secret("a"))
        };

        cache.get_or_fetch("mem", "db", fetch).unwrap();
        cache.get_or_fetch("mem", "db", fetch).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(cache.entry("mem", "db").is_some());

        assert!(cache.invalidate("mem", "db"));
        cache.get_or_fetch("mem", "db", fetch).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = SecretCache::new();
        let err = cache.get_or_fetch("mem", "db", || Err(SecretError::unavailable("mem", "down")));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let value = cache.get_or_fetch("mem", "db", || Ok(secret("b"))).unwrap();
        assert_eq!(value.single(), Some("b"));
    }

    #[test]
    fn test_concurrent_callers_share_one_fetch() {
        let cache = SecretCache::new();
        let fetches = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let value = cache
                        .get_or_fetch("mem", "db", || {
                            fetches.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(100));
                            Ok(secret("shared"))
                        })
                        .unwrap();
                    assert_eq!(value.single(), Some("shared"));
                });
            }
        });

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_fetch_independently() {
        let cache = SecretCache::new();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        std::thread::scope(|s| {
            let shared = &cache;
            let slow = s.spawn(move || {
                shared.get_or_fetch("mem", "slow", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(secret("slow"))
                })
            });

            started_rx.recv().unwrap();
            // the slow fetch is still blocked; another key must not wait for it
            let fast = cache.get_or_fetch("mem", "fast", || Ok(secret("fast")));
            assert_eq!(fast.unwrap().single(), Some("fast"));

            release_tx.send(()).unwrap();
            assert_eq!(slow.join().unwrap().unwrap().single(), Some("slow"));
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_during_fetch_skips_caching() {
        let cache = SecretCache::new();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        std::thread::scope(|s| {
            let shared = &cache;
            let leader = s.spawn(move || {
                shared.get_or_fetch("mem", "db", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(secret("stale"))
                })
            });

            started_rx.recv().unwrap();
            assert!(cache.invalidate("mem", "db"));
            release_tx.send(()).unwrap();
            assert_eq!(leader.join().unwrap().unwrap().single(), Some("stale"));
        });

        assert!(cache.entry("mem", "db").is_none());
        let fresh = cache.get_or_fetch("mem", "db", || Ok(secret("fresh"))).unwrap();
        assert_eq!(fresh.single(), Some("fresh"));
    }

    #[test]
    fn test_panicking_fetch_releases_waiters() {
        let cache = SecretCache::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_fetch("mem", "db", || panic!("backend bug"))
        }));
        assert!(outcome.is_err());

        let value = cache.get_or_fetch("mem", "db", || Ok(secret("ok"))).unwrap();
        assert_eq!(value.single(), Some("ok"));
    }

    #[test]
    fn test_invalidate_provider() {
        let cache = SecretCache::new();
        cache.get_or_fetch("a", "one", || Ok(secret("1"))).unwrap();
        cache.get_or_fetch("a", "two", || Ok(secret("2"))).unwrap();
        cache.get_or_fetch("b", "one", || Ok(secret("3"))).unwrap();

        assert_eq!(cache.invalidate_provider("a"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.entry("b", "one").is_some());
    }
}
