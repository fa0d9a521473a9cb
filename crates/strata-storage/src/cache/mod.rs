//! Reference-counted cache.
//!
//! [`RefCountCache`] keeps a resource resident for as long as somebody
//! holds a reference to it. There is no replacement policy: a resource is
//! written back and dropped the moment its count returns to zero, and an
//! admission that would exceed the capacity fails with
//! [`StorageError::CacheFull`].
//!
//! ```text
//!   get(k) ──► resident? ──yes──► refs[k] += 1 ──► Arc<V>
//!                 │
//!                 no ──► loading by another thread? ──yes──► sleep, retry
//!                 │
//!                 no ──► full? ──yes──► CacheFull
//!                 │
//!                 no ──► mark loading, unlock, source.load(k), relock
//!
//!   release(k) ──► refs[k] -= 1 ──► zero? ──► source.evict(k, v)
//! ```
//!
//! Loading happens outside the cache lock, so a slow disk read does not
//! block hits on other keys.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{StorageError, StorageResult};

/// How long a caller sleeps while another thread loads the same key.
const LOAD_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Loads and writes back the resources held by a [`RefCountCache`].
pub trait CacheSource: Send + Sync {
    /// The cached resource.
    type Value: Send + Sync;

    /// Produces the resource for `key`.
    fn load(&self, key: u64) -> StorageResult<Self::Value>;

    /// Called when the last reference to `value` is released, or when the
    /// cache closes.
    fn evict(&self, key: u64, value: &Self::Value) -> StorageResult<()>;
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of gets answered from memory.
    pub hits: AtomicU64,
    /// Number of gets that loaded from the source.
    pub misses: AtomicU64,
    /// Number of resources written back and dropped.
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Returns the hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

struct CacheState<V> {
    entries: HashMap<u64, Arc<V>>,
    refs: HashMap<u64, usize>,
    loading: HashSet<u64>,
    /// Resident entries plus in-flight loads.
    count: usize,
}

/// A cache whose entries live exactly as long as they are referenced.
pub struct RefCountCache<S: CacheSource> {
    source: S,
    /// Maximum resident entries; 0 means unbounded.
    capacity: usize,
    state: Mutex<CacheState<S::Value>>,
    stats: CacheStats,
}

impl<S: CacheSource> RefCountCache<S> {
    /// Creates a cache over `source`. A `capacity` of 0 means unbounded.
    pub fn new(source: S, capacity: usize) -> Self {
        Self {
            source,
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                refs: HashMap::new(),
                loading: HashSet::new(),
                count: 0,
            }),
            stats: CacheStats::default(),
        }
    }

    /// Returns the source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the capacity (0 = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the reference count of `key`.
    pub fn ref_count(&self, key: u64) -> usize {
        self.state.lock().refs.get(&key).copied().unwrap_or(0)
    }

    /// Returns the cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns the resource for `key`, loading it if needed, and takes a
    /// reference to it.
    pub fn get(&self, key: u64) -> StorageResult<Arc<S::Value>> {
        loop {
            let mut state = self.state.lock();
            if state.loading.contains(&key) {
                drop(state);
                thread::sleep(LOAD_RETRY_INTERVAL);
                continue;
            }

            if let Some(value) = state.entries.get(&key).cloned() {
                *state.refs.entry(key).or_insert(0) += 1;
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }

            if self.capacity > 0 && state.count >= self.capacity {
                return Err(StorageError::CacheFull {
                    capacity: self.capacity,
                });
            }
            state.count += 1;
            state.loading.insert(key);
            break;
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let loaded = self.source.load(key);

        let mut state = self.state.lock();
        state.loading.remove(&key);
        match loaded {
            Ok(value) => {
                let value = Arc::new(value);
                state.entries.insert(key, Arc::clone(&value));
                state.refs.insert(key, 1);
                Ok(value)
            }
            Err(e) => {
                state.count -= 1;
                Err(e)
            }
        }
    }

    /// Drops one reference to `key`. The last release evicts it.
    ///
    /// Eviction runs under the cache lock, so a concurrent `get` of the
    /// same key cannot read the source before the write-back finishes.
    pub fn release(&self, key: u64) -> StorageResult<()> {
        let mut state = self.state.lock();
        let remaining = match state.refs.get_mut(&key) {
            Some(refs) => {
                *refs -= 1;
                *refs
            }
            None => return Ok(()),
        };
        if remaining > 0 {
            return Ok(());
        }

        state.refs.remove(&key);
        state.count -= 1;
        if let Some(value) = state.entries.remove(&key) {
            trace!(key, "evicting");
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            self.source.evict(key, &value)?;
        }
        Ok(())
    }

    /// Evicts every resident entry regardless of its count.
    ///
    /// All entries are attempted; the first error is returned.
    pub fn close(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        let mut first_err = None;
        let entries: Vec<(u64, Arc<S::Value>)> = state.entries.drain().collect();
        for (key, value) in entries {
            if let Err(e) = self.source.evict(key, &value) {
                first_err.get_or_insert(e);
            }
        }
        state.refs.clear();
        state.count = state.loading.len();
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: CacheSource> std::fmt::Debug for RefCountCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefCountCache")
            .field("capacity", &self.capacity)
            .field("resident", &self.len())
            .finish()
    }
}
