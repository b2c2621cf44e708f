//! Tier store: reconstitution, the write/decompose path and invalidation.
//!
//! # Referential consistency
//!
//! Request records and entities evict independently, so a record can
//! outlive the entities it points at. [`TierStore::load`] rebuilds a body
//! only when *every* referenced entity is still present; a single dangling
//! id turns the whole read into a miss. A partially rebuilt body is never
//! returned.

use std::sync::Arc;

use serde_json::{Map, Value};
use tessera_core::{
    BodyRoot, CacheSettings, CapacityConfig, ConfigError, EntityId, FetchResponse, Fingerprint,
    IdRef, IdShape, RequestRecord, ResponseMetadata, TesseraResult,
};
use tracing::debug;

use super::data_tier::DataTier;
use super::request_tier::RequestTier;
use super::traits::{CacheStats, MapFactory};

/// A body rebuilt from the tiers together with its metadata slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstituted {
    pub body: Value,
    pub metadata: ResponseMetadata,
}

/// Why a reconstitution attempt missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    UnknownRequestKey,
    NoRecord,
    NoMetadata,
    UnknownEntityType(String),
    /// The record references an entity that is no longer in the data tier.
    StaleReference { entity_type: String, id: EntityId },
}

/// Both tiers plus the settings and factory needed to grow them.
pub struct TierStore {
    settings: Arc<CacheSettings>,
    factory: Arc<dyn MapFactory>,
    data: DataTier,
    requests: RequestTier,
    stats: CacheStats,
}

impl TierStore {
    /// Create a store, eagerly building data maps for configured types.
    pub fn new(settings: Arc<CacheSettings>, factory: Arc<dyn MapFactory>) -> Self {
        let mut data = DataTier::new();
        for entity_type in settings.data_types.keys() {
            if let Some(capacity) = settings.data_capacity(entity_type) {
                data.ensure_type(entity_type, capacity, factory.as_ref());
            }
        }

        Self {
            settings,
            factory,
            data,
            requests: RequestTier::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn has_request_key(&self, request_key: &str) -> bool {
        self.requests.has_key(request_key)
    }

    // ========================================================================
    // RECONSTITUTION
    // ========================================================================

    /// Rebuild the response cached for `(request_key, hash)`.
    pub fn load(&mut self, request_key: &str, hash: &Fingerprint) -> Option<Reconstituted> {
        match self.try_load(request_key, hash) {
            Ok(found) => {
                self.stats.hits += 1;
                Some(found)
            }
            Err(reason) => {
                self.stats.misses += 1;
                if let MissReason::StaleReference { entity_type, id } = &reason {
                    self.stats.stale_references += 1;
                    debug!(
                        request_key,
                        fingerprint = %hash,
                        entity_type = %entity_type,
                        id = %id,
                        "request record references an evicted entity"
                    );
                }
                None
            }
        }
    }

    /// Reconstitution without bookkeeping, reporting why it missed.
    pub fn try_load(
        &mut self,
        request_key: &str,
        hash: &Fingerprint,
    ) -> Result<Reconstituted, MissReason> {
        let maps = self
            .requests
            .maps_mut(request_key)
            .ok_or(MissReason::UnknownRequestKey)?;
        let record = maps.records.get(hash).cloned().ok_or(MissReason::NoRecord)?;
        let metadata = maps.metadata.get(hash).cloned().ok_or(MissReason::NoMetadata)?;

        let mut fields = Map::new();
        for (entity_type, id_ref) in record.shape.iter() {
            if !self.data.has_type(entity_type) {
                return Err(MissReason::UnknownEntityType(entity_type.clone()));
            }
            let value = match id_ref {
                IdRef::Scalar(id) => self.entity_or_stale(entity_type, id)?,
                IdRef::Sequence(ids) => Value::Array(
                    ids.iter()
                        .map(|id| self.entity_or_stale(entity_type, id))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            fields.insert(entity_type.clone(), value);
        }

        let body = match &record.root {
            BodyRoot::Keyed => Value::Object(fields),
            BodyRoot::Inline { entity_type } => {
                fields.remove(entity_type).ok_or(MissReason::NoRecord)?
            }
        };

        Ok(Reconstituted { body, metadata })
    }

    fn entity_or_stale(&mut self, entity_type: &str, id: &EntityId) -> Result<Value, MissReason> {
        self.data
            .get(entity_type, id)
            .cloned()
            .ok_or_else(|| MissReason::StaleReference {
                entity_type: entity_type.to_string(),
                id: id.clone(),
            })
    }

    /// Stored metadata for a request, without checking its entities.
    pub fn metadata(&mut self, request_key: &str, hash: &Fingerprint) -> Option<ResponseMetadata> {
        self.requests.metadata(request_key, hash).cloned()
    }

    /// Read one entity from the data tier.
    pub fn entity(&mut self, entity_type: &str, id: &EntityId) -> Option<Value> {
        self.data.get(entity_type, id).cloned()
    }

    pub fn contains_entity(&self, entity_type: &str, id: &EntityId) -> bool {
        self.data.contains(entity_type, id)
    }

    // ========================================================================
    // WRITE / DECOMPOSE
    // ========================================================================

    /// Store a (formatted) response under `(request_key, hash)`.
    ///
    /// Every map the write needs must exist or be constructible from
    /// `request_capacity` / the settings; otherwise nothing is modified and
    /// a `MissingRequestCapacity` or `MissingDataCapacity` error is returned.
    pub fn write(
        &mut self,
        request_key: &str,
        hash: &Fingerprint,
        response: &FetchResponse,
        request_capacity: Option<&CapacityConfig>,
    ) -> TesseraResult<()> {
        let groups = match entity_groups(request_key, &response.body) {
            Some(groups) => groups,
            None => {
                debug!(request_key, fingerprint = %hash, "response body is not decomposable, skipping cache write");
                return Ok(());
            }
        };

        // Resolve every missing map before touching either tier.
        let request_capacity = if self.requests.has_key(request_key) {
            None
        } else {
            Some(
                request_capacity
                    .or(self.settings.default_request_capacity.as_ref())
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingRequestCapacity {
                        request_key: request_key.to_string(),
                    })?,
            )
        };
        let mut data_capacities = Vec::new();
        for (entity_type, _) in &groups.fields {
            if !self.data.has_type(entity_type) {
                let capacity = self.settings.data_capacity(entity_type).cloned().ok_or_else(|| {
                    ConfigError::MissingDataCapacity {
                        entity_type: entity_type.clone(),
                    }
                })?;
                data_capacities.push((entity_type.clone(), capacity));
            }
        }

        if let Some(capacity) = request_capacity {
            self.requests
                .ensure_key(request_key, &capacity, self.factory.as_ref());
        }
        for (entity_type, capacity) in &data_capacities {
            self.data
                .ensure_type(entity_type, capacity, self.factory.as_ref());
        }

        match self.derive_record(&groups) {
            Some(record) => {
                if let Some(maps) = self.requests.maps_mut(request_key) {
                    maps.metadata
                        .set(hash.clone(), ResponseMetadata::from(response.metadata.clone()));
                    maps.records.set(hash.clone(), record);
                }
            }
            None => {
                debug!(request_key, fingerprint = %hash, "response contains entities without ids, request record not stored");
            }
        }

        for (entity_type, value) in &groups.fields {
            self.upsert_entities(entity_type, value);
        }

        Ok(())
    }

    fn derive_record(&self, groups: &EntityGroups<'_>) -> Option<RequestRecord> {
        let mut shape = IdShape::new();
        for (entity_type, value) in &groups.fields {
            let id_ref = IdRef::derive(value, self.settings.id_property(entity_type))?;
            shape.insert(entity_type.clone(), id_ref);
        }
        Some(RequestRecord {
            shape,
            root: groups.root.clone(),
        })
    }

    /// Upsert one entity or an array of entities. Entities without an id are skipped.
    fn upsert_entities(&mut self, entity_type: &str, value: &Value) -> usize {
        let id_property = self.settings.id_property(entity_type).to_string();
        let items: &[Value] = match value {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        let mut stored = 0;
        for item in items {
            if let Some(id) = EntityId::of_entity(item, &id_property) {
                if self.data.upsert(entity_type, id, item.clone()) {
                    stored += 1;
                }
            }
        }
        stored
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Drop every entity of every type.
    pub fn clear_data(&mut self) {
        self.data.clear();
    }

    /// Empty one type's map (creating it empty if it is configurable).
    pub fn clear_data_type(&mut self, entity_type: &str) {
        if self.data.has_type(entity_type) {
            self.data.clear_type(entity_type);
        } else if let Some(capacity) = self.settings.data_capacity(entity_type).cloned() {
            self.data
                .ensure_type(entity_type, &capacity, self.factory.as_ref());
        }
    }

    /// Push externally known entities (one or an array) into a type's map.
    pub fn upsert_data(&mut self, entity_type: &str, data: &Value) -> TesseraResult<usize> {
        if !self.data.has_type(entity_type) {
            let capacity = self.settings.data_capacity(entity_type).cloned().ok_or_else(|| {
                ConfigError::MissingDataCapacity {
                    entity_type: entity_type.to_string(),
                }
            })?;
            self.data
                .ensure_type(entity_type, &capacity, self.factory.as_ref());
        }
        Ok(self.upsert_entities(entity_type, data))
    }

    /// Remove entities given as an id, an entity object, or an array of either.
    ///
    /// Request records are left alone; any that pointed at a removed entity
    /// will miss on their next read.
    pub fn delete_data(&mut self, entity_type: &str, target: &Value) -> usize {
        if !self.data.has_type(entity_type) {
            return 0;
        }
        let id_property = self.settings.id_property(entity_type).to_string();
        let targets: &[Value] = match target {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        targets
            .iter()
            .filter_map(|t| match t {
                Value::Object(_) => EntityId::of_entity(t, &id_property),
                other => EntityId::from_value(other),
            })
            .filter(|id| self.data.remove(entity_type, id).is_some())
            .count()
    }

    pub fn delete_entity(&mut self, entity_type: &str, id: &EntityId) -> bool {
        self.data.remove(entity_type, id).is_some()
    }

    /// Drop every request record and metadata slot.
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// Empty every record under one request key.
    pub fn clear_request_key(&mut self, request_key: &str) {
        self.requests.clear_key(request_key);
    }

    /// Remove the record at one fingerprint.
    pub fn delete_request(&mut self, request_key: &str, hash: &Fingerprint) {
        self.requests.remove(request_key, hash);
    }

    /// Point a request at a different set of entities without re-fetching.
    ///
    /// A bare-array root is kept only when `shape` still names its entity
    /// type; otherwise the body becomes keyed by type. A missing metadata
    /// slot is filled with [`ResponseMetadata::Empty`] so the override is
    /// servable. Returns `false` if the request key has never been seen.
    pub fn override_request(&mut self, request_key: &str, hash: &Fingerprint, shape: IdShape) -> bool {
        let Some(maps) = self.requests.maps_mut(request_key) else {
            return false;
        };
        // An inline root only survives if the new shape still names its type.
        let root = match maps.records.get(hash).map(|r| r.root.clone()) {
            Some(BodyRoot::Inline { entity_type }) if shape.get(&entity_type).is_some() => {
                BodyRoot::Inline { entity_type }
            }
            _ => BodyRoot::Keyed,
        };
        maps.records.set(hash.clone(), RequestRecord { shape, root });
        if !maps.metadata.has(hash) {
            maps.metadata.set(hash.clone(), ResponseMetadata::Empty);
        }
        true
    }

    // ========================================================================
    // STATS
    // ========================================================================

    pub fn record_bypass(&mut self) {
        self.stats.bypasses += 1;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            evictions: self.data.evictions() + self.requests.evictions(),
            entity_count: self.data.entity_count() as u64,
            request_count: self.requests.request_count() as u64,
            ..self.stats.clone()
        }
    }
}

/// A response body split into `(entity type, entity or array)` fields.
struct EntityGroups<'a> {
    fields: Vec<(String, &'a Value)>,
    root: BodyRoot,
}

/// Split a body by entity type. Bare arrays are grouped under `request_key`.
fn entity_groups<'a>(request_key: &str, body: &'a Value) -> Option<EntityGroups<'a>> {
    match body {
        Value::Object(map) => Some(EntityGroups {
            fields: map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            root: BodyRoot::Keyed,
        }),
        Value::Array(_) => Some(EntityGroups {
            fields: vec![(request_key.to_string(), body)],
            root: BodyRoot::Inline {
                entity_type: request_key.to_string(),
            },
        }),
        _ => None,
    }
}
