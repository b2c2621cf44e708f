//! Two-tier normalized cache.
//!
//! This module splits fetched responses into individually cached entities
//! and remembers, per request, only the *shape* of what was returned.
//!
//! # Tiers
//!
//! - **Data tier**: one bounded map per entity type, keyed by entity id.
//! - **Request tier**: one bounded map per request key, keyed by parameter
//!   fingerprint, holding id-shapes; plus a parallel metadata map.
//!
//! Both tiers evict independently. A read rebuilds the response from the
//! current entity state and treats any dangling id as a full miss, so a
//! response with holes is never served.
//!
//! # Example
//!
//! ```ignore
//! let cache = NormalizedCache::new(CacheSettings::default());
//! let list_users = fetcher_fn("listUsers", |params| async move { api::list_users(params).await });
//!
//! let read = cache.get(&list_users, &[json!({"page": 1})], &RequestOptions::new()).await?;
//! if read.was_cache_hit() {
//!     tracing::debug!("served from tiers");
//! }
//!
//! // Entities can be pushed or evicted independently of requests.
//! cache.reset_data(Some("users"), Some(&json!({"id": 1, "name": "ada"})))?;
//! cache.delete_data("users", &json!(2))?;
//! ```

pub mod data_tier;
pub mod fetcher;
pub mod lru_backend;
pub mod options;
pub mod read_through;
pub mod request_tier;
pub mod response;
pub mod store;
pub mod traits;

pub use data_tier::DataTier;
pub use fetcher::{fetcher_fn, FnFetcher, ResponseFetcher};
pub use lru_backend::{LruMap, LruMapFactory};
pub use options::{RequestOptions, Rule, Transform};
pub use read_through::NormalizedCache;
pub use request_tier::{RequestMaps, RequestTier};
pub use response::{CachedResponse, ResponseSource};
pub use store::{MissReason, Reconstituted, TierStore};
pub use traits::{BoundedMap, CacheStats, EntityMap, MapFactory, MetadataMap, RecordMap};
