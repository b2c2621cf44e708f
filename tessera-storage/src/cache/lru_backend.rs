//! Default capacity-bounded map backed by the `lru` crate.
//!
//! Entries are evicted least-recently-used first. `get` refreshes recency,
//! `has` and `keys` do not.

use std::fmt::Display;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use tessera_core::{CapacityConfig, EvictHook};

use super::traits::{BoundedMap, EntityMap, MapFactory, MetadataMap, RecordMap};

/// LRU map honouring a [`CapacityConfig`].
pub struct LruMap<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
    on_evict: Option<EvictHook>,
    evictions: u64,
}

impl<K: Hash + Eq, V> LruMap<K, V> {
    /// Create a map from a capacity configuration.
    ///
    /// A `max_entries` of 0 is clamped to 1; validated settings never
    /// produce it, but per-call capacities are not validated.
    pub fn new(config: &CapacityConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
            on_evict: config.on_evict.clone(),
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}

impl<K, V> BoundedMap<K, V> for LruMap<K, V>
where
    K: Hash + Eq + Clone + Display + Send + Sync,
    V: Send + Sync,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    fn set(&mut self, key: K, value: V) {
        // `push` hands back either the replaced entry for `key` or the evicted LRU entry.
        if let Some((displaced, _)) = self.inner.push(key.clone(), value) {
            if displaced != key {
                self.evictions += 1;
                if let Some(hook) = &self.on_evict {
                    hook(&displaced.to_string());
                }
            }
        }
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn has(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    fn keys(&self) -> Vec<K> {
        self.inner.iter().map(|(k, _)| k.clone()).collect()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn evictions(&self) -> u64 {
        self.evictions
    }
}

/// [`MapFactory`] producing [`LruMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruMapFactory;

impl MapFactory for LruMapFactory {
    fn entity_map(&self, config: &CapacityConfig) -> EntityMap {
        Box::new(LruMap::new(config))
    }

    fn record_map(&self, config: &CapacityConfig) -> RecordMap {
        Box::new(LruMap::new(config))
    }

    fn metadata_map(&self, config: &CapacityConfig) -> MetadataMap {
        Box::new(LruMap::new(config))
    }
}
