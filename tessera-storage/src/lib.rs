//! Tessera Storage - Normalized Response Cache
//!
//! Caches the results of remote read operations by entity rather than by
//! response. See the [`cache`] module for the tier layout and the
//! referential-consistency guarantee.

pub mod cache;

// Re-export cache types for callers
pub use cache::{
    fetcher_fn, BoundedMap, CacheStats, CachedResponse, FnFetcher, LruMap, LruMapFactory,
    MapFactory, MissReason, NormalizedCache, Reconstituted, RequestOptions, ResponseFetcher,
    ResponseSource, TierStore,
};

pub use tessera_core::{
    CacheSettings, CapacityConfig, EntityId, FetchResponse, Fingerprint, IdRef, IdShape,
    ResponseMetadata, TesseraError, TesseraResult, TypeConfig,
};
