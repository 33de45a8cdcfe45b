//! Time-expiring memoization of query results.
//!
//! The cache is the only shared mutable structure in the engine. It is a
//! low-contention map guarded by a single mutex; entries expire after a
//! fixed TTL and are evicted lazily when a lookup finds them stale. Nothing
//! is persisted: the cache vanishes with the process.

use crate::types::{GridCell, Variable};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Typed composite cache key: one variant per cached operation, carrying the
/// exact ordered parameter set.
///
/// Two logically identical queries always produce the same key, and
/// distinct operations can never collide, unlike the stringified-argument
/// hashing this replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    TimeSeries {
        variable: Variable,
        start_year: i32,
        end_year: i32,
    },
    Climatology {
        variable: Variable,
        start_year: i32,
        end_year: i32,
    },
    Spatial {
        variable: Variable,
        month: u32,
        start_year: i32,
        end_year: i32,
    },
    Statistics {
        variable: Variable,
        start_year: i32,
        end_year: i32,
    },
    LocalityTimeSeries {
        variable: Variable,
        cell: GridCell,
        start_year: i32,
        end_year: i32,
    },
    LocalityStatistics {
        variable: Variable,
        cell: GridCell,
        start_year: i32,
        end_year: i32,
    },
}

/// Cache observability counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    /// Live entries at snapshot time, stale ones included.
    pub entries: usize,
}

struct CacheEntry<V> {
    value: V,
    created_at: SystemTime,
}

impl<V> CacheEntry<V> {
    /// An entry is valid strictly below the TTL; at or past it, the entry
    /// counts as absent.
    fn is_expired_at(&self, now: SystemTime, ttl: Duration) -> bool {
        match now.duration_since(self.created_at) {
            Ok(age) => age >= ttl,
            // created_at in the future (clock moved): treat as fresh.
            Err(_) => false,
        }
    }
}

/// TTL-expiring memo table keyed by [`QueryKey`].
///
/// Values are cloned out on hit, so `V` is typically a cheap-to-clone
/// result struct. The table is unbounded by design: the key space is the
/// finite set of distinct queries against a fixed dataset.
pub struct ResultCache<V> {
    entries: Mutex<FxHashMap<QueryKey, CacheEntry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a key as of now. Stale entries count as misses and are
    /// removed.
    pub fn get(&self, key: &QueryKey) -> Option<V> {
        self.get_at(key, SystemTime::now())
    }

    /// Look up a key as of a specific instant. Exposed so expiry behavior
    /// can be exercised without sleeping.
    pub fn get_at(&self, key: &QueryKey, now: SystemTime) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now, self.ttl) => {
                entries.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or refresh an entry, stamping it with the current time.
    pub fn put(&self, key: QueryKey, value: V) {
        self.put_at(key, value, SystemTime::now());
    }

    /// Insert with an explicit creation timestamp (test hook, same pattern
    /// as `get_at`).
    pub fn put_at(&self, key: QueryKey, value: V, created_at: SystemTime) {
        let mut entries = self.entries.lock();
        entries.insert(key, CacheEntry { value, created_at });
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
