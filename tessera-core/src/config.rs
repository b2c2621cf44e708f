//! Configuration types

use crate::entity::DEFAULT_ID_PROPERTY;
use crate::error::{ConfigError, TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default maximum entries for a capacity-bounded map.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Callback invoked with the textual key of an evicted entry.
pub type EvictHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Construction parameters for one capacity-bounded map.
#[derive(Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    pub max_entries: usize,
    #[serde(skip)]
    pub on_evict: Option<EvictHook>,
}

impl CapacityConfig {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            on_evict: None,
        }
    }

    /// Register a callback run whenever the capacity policy evicts an entry.
    pub fn with_on_evict<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(hook));
        self
    }

    fn validate(&self, field: &str) -> TesseraResult<()> {
        if self.max_entries == 0 {
            return Err(TesseraError::Config(ConfigError::InvalidValue {
                field: format!("{}.max_entries", field),
                value: self.max_entries.to_string(),
                reason: "max_entries must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl fmt::Debug for CapacityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapacityConfig")
            .field("max_entries", &self.max_entries)
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

/// Per-entity-type overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeConfig {
    /// Property holding the entity id (defaults to `id`).
    pub id_property: Option<String>,
    /// Capacity of this type's data-tier map (defaults to the data default).
    pub cache: Option<CapacityConfig>,
}

impl TypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_property(mut self, property: impl Into<String>) -> Self {
        self.id_property = Some(property.into());
        self
    }

    pub fn with_cache(mut self, cache: CapacityConfig) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Process-wide construction parameters for a normalized cache.
///
/// Settings are checked once by [`CacheSettings::validate`]; the cache does
/// not re-validate them at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Capacity for data-tier maps of types without their own `cache`.
    pub default_data_capacity: Option<CapacityConfig>,
    /// Capacity for request-tier maps when a call supplies none.
    pub default_request_capacity: Option<CapacityConfig>,
    /// Per-type id property and capacity overrides.
    pub data_types: HashMap<String, TypeConfig>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_data_capacity: Some(CapacityConfig::default()),
            default_request_capacity: Some(CapacityConfig::default()),
            data_types: HashMap::new(),
        }
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with no default capacities: every request key and entity
    /// type must be given an explicit capacity before it can be written.
    pub fn without_capacity_defaults() -> Self {
        Self {
            default_data_capacity: None,
            default_request_capacity: None,
            data_types: HashMap::new(),
        }
    }

    pub fn with_data_capacity(mut self, capacity: CapacityConfig) -> Self {
        self.default_data_capacity = Some(capacity);
        self
    }

    pub fn with_request_capacity(mut self, capacity: CapacityConfig) -> Self {
        self.default_request_capacity = Some(capacity);
        self
    }

    pub fn with_type(mut self, entity_type: impl Into<String>, config: TypeConfig) -> Self {
        self.data_types.insert(entity_type.into(), config);
        self
    }

    /// Property holding ids for `entity_type`.
    pub fn id_property(&self, entity_type: &str) -> &str {
        self.data_types
            .get(entity_type)
            .and_then(|t| t.id_property.as_deref())
            .unwrap_or(DEFAULT_ID_PROPERTY)
    }

    /// Capacity for `entity_type`'s data-tier map, if one is resolvable.
    pub fn data_capacity(&self, entity_type: &str) -> Option<&CapacityConfig> {
        self.data_types
            .get(entity_type)
            .and_then(|t| t.cache.as_ref())
            .or(self.default_data_capacity.as_ref())
    }

    /// Validate the settings.
    ///
    /// Validates:
    /// - every `max_entries` is greater than 0
    /// - every `id_property` override is non-empty
    pub fn validate(&self) -> TesseraResult<()> {
        if let Some(capacity) = &self.default_data_capacity {
            capacity.validate("default_data_capacity")?;
        }
        if let Some(capacity) = &self.default_request_capacity {
            capacity.validate("default_request_capacity")?;
        }

        for (name, type_config) in &self.data_types {
            if let Some(capacity) = &type_config.cache {
                capacity.validate(&format!("data_types.{}.cache", name))?;
            }
            if let Some(property) = &type_config.id_property {
                if property.is_empty() {
                    return Err(TesseraError::Config(ConfigError::InvalidValue {
                        field: format!("data_types.{}.id_property", name),
                        value: String::new(),
                        reason: "id_property must not be empty".to_string(),
                    }));
                }
            }
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TESSERA_DATA_MAX_ENTRIES`: default data-tier capacity (default: 500)
    /// - `TESSERA_REQUEST_MAX_ENTRIES`: default request-tier capacity (default: 500)
    pub fn from_env() -> Self {
        let data_max = std::env::var("TESSERA_DATA_MAX_ENTRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        let request_max = std::env::var("TESSERA_REQUEST_MAX_ENTRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);

        Self {
            default_data_capacity: Some(CapacityConfig::new(data_max)),
            default_request_capacity: Some(CapacityConfig::new(request_max)),
            data_types: HashMap::new(),
        }
    }

    /// Parse and validate settings from TOML.
    ///
    /// ```toml
    /// [default_data_capacity]
    /// max_entries = 1000
    ///
    /// [data_types.users]
    /// id_property = "uuid"
    /// cache = { max_entries = 50 }
    /// ```
    pub fn from_toml_str(input: &str) -> TesseraResult<Self> {
        let settings: Self = toml::from_str(input).map_err(|e| {
            TesseraError::Config(ConfigError::Parse {
                reason: e.to_string(),
            })
        })?;
        settings.validate()?;
        Ok(settings)
    }
}

// =============================================================================
// TESTS
// =============================================================================
