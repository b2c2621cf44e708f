//! Data tier: one bounded map per entity type, keyed by entity id.

use std::collections::HashMap;

use serde_json::Value;
use tessera_core::{CapacityConfig, EntityId};

use super::traits::{EntityMap, MapFactory};

/// Latest known representation of every cached entity.
#[derive(Default)]
pub struct DataTier {
    maps: HashMap<String, EntityMap>,
}

impl DataTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_type(&self, entity_type: &str) -> bool {
        self.maps.contains_key(entity_type)
    }

    /// Create `entity_type`'s map if it does not exist yet.
    pub fn ensure_type(&mut self, entity_type: &str, config: &CapacityConfig, factory: &dyn MapFactory) {
        if !self.maps.contains_key(entity_type) {
            self.maps
                .insert(entity_type.to_string(), factory.entity_map(config));
        }
    }

    pub fn get(&mut self, entity_type: &str, id: &EntityId) -> Option<&Value> {
        self.maps.get_mut(entity_type)?.get(id)
    }

    pub fn contains(&self, entity_type: &str, id: &EntityId) -> bool {
        self.maps
            .get(entity_type)
            .map(|m| m.has(id))
            .unwrap_or(false)
    }

    /// Insert or replace an entity. Returns `false` if the type has no map.
    pub fn upsert(&mut self, entity_type: &str, id: EntityId, entity: Value) -> bool {
        match self.maps.get_mut(entity_type) {
            Some(map) => {
                map.set(id, entity);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, entity_type: &str, id: &EntityId) -> Option<Value> {
        self.maps.get_mut(entity_type)?.delete(id)
    }

    /// Empty one type's map, keeping the map itself.
    pub fn clear_type(&mut self, entity_type: &str) {
        if let Some(map) = self.maps.get_mut(entity_type) {
            map.clear();
        }
    }

    /// Drop every type's map.
    pub fn clear(&mut self) {
        self.maps.clear();
    }

    pub fn entity_types(&self) -> Vec<String> {
        self.maps.keys().cloned().collect()
    }

    pub fn entity_count(&self) -> usize {
        self.maps.values().map(|m| m.len()).sum()
    }

    pub fn evictions(&self) -> u64 {
        self.maps.values().map(|m| m.evictions()).sum()
    }
}
