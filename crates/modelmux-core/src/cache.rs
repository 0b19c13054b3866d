//! Response cache
//!
//! Fingerprint-keyed, TTL-bounded cache of provider responses on a sharded
//! concurrent map. Expired entries read as misses and are removed lazily on
//! lookup; a background sweeper can purge them in bulk. When `max_entries`
//! is exceeded the least recently accessed entry is evicted.

use crate::fingerprint::Fingerprint;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default time-to-live for cached responses
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default entry bound
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A cached provider response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Completion text, returned byte-for-byte on a hit
    pub content: String,
    /// Provider that originally produced it
    pub provider: String,
}

struct CacheEntry {
    value: CachedResponse,
    created_at: Instant,
    ttl: Duration,
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        // a TTL past the clock's range never expires
        self.created_at
            .checked_add(self.ttl)
            .is_some_and(|expires_at| now >= expires_at)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
    /// Live plus not-yet-purged entries
    pub entries: usize,
    /// Entries evicted to respect `max_entries`
    pub evictions: u64,
    /// Entries removed after their TTL
    pub expirations: u64,
    /// `hits / (hits + misses)`, 0.0 before any lookup
    pub hit_rate: f64,
}

/// Fingerprint → response cache
pub struct ResponseCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    default_ttl: Duration,
    max_entries: usize,
    access_clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_ENTRIES)
    }
}

impl ResponseCache {
    /// Create a cache
    #[must_use]
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            max_entries: max_entries.max(1),
            access_clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// TTL applied by [`insert`](Self::insert)
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a live entry
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CachedResponse> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(fingerprint) {
            if !entry.is_expired(now) {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                let value = entry.value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }
        }

        // Only remove if still expired; a concurrent set may have refreshed it.
        if self
            .entries
            .remove_if(fingerprint, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %fingerprint, "expired cache entry removed");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value under the default TTL
    pub fn insert(&self, fingerprint: Fingerprint, value: CachedResponse) {
        self.set(fingerprint, value, self.default_ttl);
    }

    /// Store a value, replacing any existing entry atomically
    ///
    /// A zero TTL stores nothing.
    pub fn set(&self, fingerprint: Fingerprint, value: CachedResponse, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
            last_access: AtomicU64::new(self.tick()),
        };
        self.entries.insert(fingerprint.clone(), entry);

        if self.entries.len() > self.max_entries {
            self.evict_lru(&fingerprint);
        }
    }

    fn evict_lru(&self, keep: &Fingerprint) {
        while self.entries.len() > self.max_entries {
            let victim = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());

            let Some(victim) = victim else { break };
            if self.entries.remove(&victim).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %victim, "cache entry evicted");
            }
        }
    }

    /// Remove one entry
    pub fn remove(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Remove every entry; counters are kept
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of stored entries, including expired ones not yet purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            entries: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Spawn a task that purges expired entries every `interval`
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            info!(removed, "purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
