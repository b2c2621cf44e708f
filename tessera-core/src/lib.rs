//! Tessera Core - Data Model
//!
//! Pure data structures shared by the normalized response cache: entity
//! identity, id-shapes, request records, metadata slots, parameter
//! fingerprints, configuration and errors. No I/O and no async here; the
//! tiers and the read-through front end live in `tessera-storage`.

pub mod config;
pub mod entity;
pub mod error;
pub mod fingerprint;
pub mod shape;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::{CacheSettings, CapacityConfig, EvictHook, TypeConfig, DEFAULT_MAX_ENTRIES};
pub use entity::{EntityId, EntityType, DEFAULT_ID_PROPERTY};
pub use error::{ConfigError, RequestError, StorageError, TesseraError, TesseraResult};
pub use fingerprint::{canonical_json, Fingerprint};
pub use shape::{BodyRoot, FetchResponse, IdRef, IdShape, RequestRecord, ResponseMetadata};

/// Positional call parameters handed to a fetcher.
pub type Params = Vec<serde_json::Value>;
