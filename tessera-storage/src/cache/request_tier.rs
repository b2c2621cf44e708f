//! Request tier: per request key, fingerprint to id-shape record, plus a
//! parallel metadata map under the same fingerprints.

use std::collections::HashMap;

use tessera_core::{CapacityConfig, Fingerprint, RequestRecord, ResponseMetadata};

use super::traits::{MapFactory, MetadataMap, RecordMap};

/// The two maps owned by one request key.
pub struct RequestMaps {
    pub records: RecordMap,
    pub metadata: MetadataMap,
}

impl RequestMaps {
    fn new(config: &CapacityConfig, factory: &dyn MapFactory) -> Self {
        Self {
            records: factory.record_map(config),
            metadata: factory.metadata_map(config),
        }
    }

    fn clear(&mut self) {
        self.records.clear();
        self.metadata.clear();
    }
}

/// Id-shapes and metadata for every request key seen so far.
#[derive(Default)]
pub struct RequestTier {
    keys: HashMap<String, RequestMaps>,
}

impl RequestTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_key(&self, request_key: &str) -> bool {
        self.keys.contains_key(request_key)
    }

    pub fn ensure_key(&mut self, request_key: &str, config: &CapacityConfig, factory: &dyn MapFactory) {
        if !self.keys.contains_key(request_key) {
            self.keys
                .insert(request_key.to_string(), RequestMaps::new(config, factory));
        }
    }

    pub fn maps_mut(&mut self, request_key: &str) -> Option<&mut RequestMaps> {
        self.keys.get_mut(request_key)
    }

    pub fn record(&mut self, request_key: &str, hash: &Fingerprint) -> Option<&RequestRecord> {
        self.keys.get_mut(request_key)?.records.get(hash)
    }

    pub fn metadata(&mut self, request_key: &str, hash: &Fingerprint) -> Option<&ResponseMetadata> {
        self.keys.get_mut(request_key)?.metadata.get(hash)
    }

    /// Remove one fingerprint's record and metadata.
    pub fn remove(&mut self, request_key: &str, hash: &Fingerprint) {
        if let Some(maps) = self.keys.get_mut(request_key) {
            maps.records.delete(hash);
            maps.metadata.delete(hash);
        }
    }

    /// Empty one request key's maps, keeping the maps themselves.
    pub fn clear_key(&mut self, request_key: &str) {
        if let Some(maps) = self.keys.get_mut(request_key) {
            maps.clear();
        }
    }

    /// Drop every request key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn request_count(&self) -> usize {
        self.keys.values().map(|m| m.records.len()).sum()
    }

    pub fn evictions(&self) -> u64 {
        self.keys
            .values()
            .map(|m| m.records.evictions() + m.metadata.evictions())
            .sum()
    }
}
