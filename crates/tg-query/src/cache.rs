//! Bounded insertion-ordered caches.
//!
//! Each cache is an independent `Mutex`-guarded map with FIFO eviction: when
//! full, the oldest-inserted entry goes.  Values are handed out as `Arc`s so
//! a hit never clones the payload and never holds the lock past the lookup.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub name: String,
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
}

struct Inner<K, V> {
    map: FxHashMap<K, Arc<V>>,
    order: VecDeque<K>,
    hits: u64,
    misses: u64,
}

pub struct BoundedCache<K, V> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    /// `capacity` is clamped to at least 1.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                map: FxHashMap::default(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    // A panic while holding the lock leaves the map consistent (every
    // mutation is a single insert/remove), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.lock();
        match inner.map.get(key).cloned() {
            Some(v) => {
                inner.hits += 1;
                Some(v)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert, evicting the oldest entry if full.  Replacing an existing key
    /// keeps its original insertion position.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let mut inner = self.lock();
        if inner.map.insert(key.clone(), Arc::clone(&value)).is_none() {
            inner.order.push_back(key);
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                }
            }
        }
        value
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            name: self.name.to_string(),
            capacity: self.capacity,
            len: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
