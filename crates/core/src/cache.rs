//! In-process TTL cache for upstream responses.
//!
//! Entries are replaced, never merged. A failed fetch leaves the previous
//! entry (fresh or stale) exactly as it was.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use meridian_common::types::normalize_address;
use meridian_common::Chain;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// TTL cache keyed by a typed request signature.
///
/// The lock is never held across an await; concurrent misses on the same key
/// may both fetch, and the last write wins.
#[derive(Debug)]
pub struct ResponseCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for ResponseCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K, V> ResponseCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    /// Value for `key` regardless of expiry.
    pub fn peek_stale(&self, key: &K) -> Option<V> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock().insert(key, entry);
    }

    /// Return the cached value, or run `fetch` and store its result for `ttl`.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = fetch().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_fresh(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  KEYS
// ═══════════════════════════════════════════════════════════════════════

/// Lower-cased, sorted, de-duplicated address list.
pub fn canonical_addresses<S: AsRef<str>>(addresses: &[S]) -> Vec<String> {
    let mut out: Vec<String> = addresses
        .iter()
        .map(|a| normalize_address(a.as_ref()))
        .filter(|a| !a.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Price lookup signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub chain: Chain,
    pub addresses: Vec<String>,
    pub currency: String,
}

impl PriceKey {
    pub fn new<S: AsRef<str>>(chain: Chain, addresses: &[S], currency: &str) -> Self {
        Self {
            chain,
            addresses: canonical_addresses(addresses),
            currency: currency.trim().to_uppercase(),
        }
    }
}

/// Per-address token metadata lookup signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenLookupKey {
    pub chain: Chain,
    pub addresses: Vec<String>,
}

impl TokenLookupKey {
    pub fn new<S: AsRef<str>>(chain: Chain, addresses: &[S]) -> Self {
        Self {
            chain,
            addresses: canonical_addresses(addresses),
        }
    }
}
