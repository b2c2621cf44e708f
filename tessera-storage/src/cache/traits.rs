//! Capacity-bounded map traits and cache statistics.
//!
//! The tiers never implement eviction themselves. Every map they hold is a
//! [`BoundedMap`] built by an injected [`MapFactory`], so the capacity and
//! eviction policy is decided entirely outside the cache.

use serde_json::Value;
use tessera_core::{CapacityConfig, EntityId, Fingerprint, RequestRecord, ResponseMetadata};

/// A key-value map with a maximum size and its own eviction policy.
///
/// # Implementation Requirements
///
/// - `set` may evict other entries to stay within capacity
/// - `get` may count as a use for recency-based policies, hence `&mut self`
/// - `has` must not affect eviction order
/// - Implementations must be `Send + Sync` so tiers can be shared across tasks
pub trait BoundedMap<K, V>: Send + Sync {
    /// Look up a value.
    fn get(&mut self, key: &K) -> Option<&V>;

    /// Insert or replace a value.
    fn set(&mut self, key: K, value: V);

    /// Remove a value, returning it if present.
    fn delete(&mut self, key: &K) -> Option<V>;

    /// Remove every entry.
    fn clear(&mut self);

    /// Check presence without touching eviction order.
    fn has(&self, key: &K) -> bool;

    /// All keys currently held.
    fn keys(&self) -> Vec<K>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries removed by the capacity policy so far.
    fn evictions(&self) -> u64;
}

/// Data-tier map: entity id to entity body.
pub type EntityMap = Box<dyn BoundedMap<EntityId, Value>>;

/// Request-tier map: fingerprint to id-shape record.
pub type RecordMap = Box<dyn BoundedMap<Fingerprint, RequestRecord>>;

/// Metadata map, keyed identically to its [`RecordMap`].
pub type MetadataMap = Box<dyn BoundedMap<Fingerprint, ResponseMetadata>>;

/// Builds the maps the tiers need from a capacity configuration.
pub trait MapFactory: Send + Sync {
    fn entity_map(&self, config: &CapacityConfig) -> EntityMap;

    fn record_map(&self, config: &CapacityConfig) -> RecordMap;

    fn metadata_map(&self, config: &CapacityConfig) -> MetadataMap;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Reads served from the tiers.
    pub hits: u64,
    /// Reads that fell through to the fetcher.
    pub misses: u64,
    /// Calls that skipped the cache because a rule failed.
    pub bypasses: u64,
    /// Misses caused by a request record pointing at an absent entity.
    pub stale_references: u64,
    /// Entries removed by capacity policies across all maps.
    pub evictions: u64,
    /// Entities currently held in the data tier.
    pub entity_count: u64,
    /// Request records currently held in the request tier.
    pub request_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
