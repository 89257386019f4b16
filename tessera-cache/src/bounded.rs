//! Generic thread-safe LRU cache with per-entry TTL.
//!
//! [`BoundedCache`] is a fixed-capacity key/value store. Recency is refreshed
//! by both reads and writes, eviction is strict least-recently-used, and
//! entries may expire after a time-to-live. All operations on one instance
//! are serialized by a single mutex: `get` is a mutating operation (it
//! updates recency and counters), so there is no read-only fast path.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::error::{CacheError, Result};

/// A single cache entry and its bookkeeping.
///
/// Entries are owned exclusively by their cache and mutated only under the
/// cache lock; they never escape through the public API.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    ttl: Option<Duration>,
    size_bytes: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now > self.created_at + ttl,
            None => false,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count += 1;
    }
}

/// Point-in-time statistics for a [`BoundedCache`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expired: u64,
    pub total_size_bytes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
    total_size_bytes: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Recency order: front is least recently used, back is most recent.
    order: VecDeque<K>,
    counters: Counters,
}

/// Thread-safe LRU cache with TTL support and eviction accounting.
///
/// # Example
///
/// ```
/// use tessera_cache::BoundedCache;
///
/// let cache: BoundedCache<String, u32> = BoundedCache::new(2, None).unwrap();
/// cache.put("a".into(), 1, None);
/// cache.put("b".into(), 2, None);
/// cache.put("c".into(), 3, None);
/// assert_eq!(cache.get(&"a".into()), None);
/// assert_eq!(cache.get(&"c".into()), Some(3));
/// ```
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_size: usize,
    default_ttl: Option<Duration>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
{
    /// Create a cache holding at most `max_size` entries.
    ///
    /// `default_ttl` applies to entries inserted without an explicit TTL;
    /// `None` means such entries never expire.
    pub fn new(max_size: usize, default_ttl: Option<Duration>) -> Result<Self> {
        if max_size == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                counters: Counters::default(),
            }),
            max_size,
            default_ttl,
        })
    }

    /// Look up a value, refreshing its recency on a hit.
    ///
    /// An entry found expired is removed and accounted as `expired` rather
    /// than as a plain miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.counters.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            if let Some(entry) = inner.entries.remove(key) {
                inner.counters.total_size_bytes =
                    inner.counters.total_size_bytes.saturating_sub(entry.size_bytes);
            }
            forget(&mut inner.order, key);
            inner.counters.expired += 1;
            return None;
        }

        let value = match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                entry.value.clone()
            }
            None => {
                inner.counters.misses += 1;
                return None;
            }
        };
        promote(&mut inner.order, key);
        inner.counters.hits += 1;
        Some(value)
    }

    /// Insert a value, evicting least-recently-used entries past capacity.
    ///
    /// `ttl` falls back to the cache's default TTL when `None`. The entry's
    /// approximate serialized size is recorded for accounting; a size
    /// computation failure is tolerated as size zero and never fails the
    /// write.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let size_bytes = serde_json::to_vec(&value)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);

        let mut inner = self.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.counters.total_size_bytes =
                inner.counters.total_size_bytes.saturating_sub(old.size_bytes);
            forget(&mut inner.order, &key);
        }

        let entry = CacheEntry {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl: ttl.or(self.default_ttl),
            size_bytes,
        };
        inner.counters.total_size_bytes += size_bytes;
        inner.entries.insert(key.clone(), entry);
        inner.order.push_back(key);

        while inner.entries.len() > self.max_size {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.counters.evictions += 1;
                inner.counters.total_size_bytes =
                    inner.counters.total_size_bytes.saturating_sub(evicted.size_bytes);
                debug!(cache_size = inner.entries.len(), "evicted LRU entry");
            }
        }
    }

    /// Remove an entry, returning whether it was present.
    pub fn delete(&self, key: &K) -> bool {
        let mut inner = self.lock();
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.counters.total_size_bytes =
                    inner.counters.total_size_bytes.saturating_sub(entry.size_bytes);
                forget(&mut inner.order, key);
                true
            }
            None => false,
        }
    }

    /// Remove all entries and reset statistics.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.counters = Counters::default();
    }

    /// Remove every currently-expired entry regardless of recency.
    ///
    /// Intended for background sweeps; returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired_keys: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            if let Some(entry) = inner.entries.remove(key) {
                inner.counters.total_size_bytes =
                    inner.counters.total_size_bytes.saturating_sub(entry.size_bytes);
                inner.counters.expired += 1;
            }
            forget(&mut inner.order, key);
        }

        expired_keys.len()
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let counters = &inner.counters;
        let total_requests = counters.hits + counters.misses;
        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: counters.hits,
            misses: counters.misses,
            hit_rate: if total_requests > 0 {
                counters.hits as f64 / total_requests as f64
            } else {
                0.0
            },
            evictions: counters.evictions,
            expired: counters.expired,
            total_size_bytes: counters.total_size_bytes,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of entries this cache will hold.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // A poisoned lock only means another thread panicked mid-operation; the
    // cache is advisory state, so recover the guard rather than propagate.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn promote<K: Eq + Clone>(order: &mut VecDeque<K>, key: &K) {
    forget(order, key);
    order.push_back(key.clone());
}

fn forget<K: Eq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(position) = order.iter().position(|candidate| candidate == key) {
        order.remove(position);
    }
}
