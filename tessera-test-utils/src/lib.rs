//! Tessera Test Utilities
//!
//! Shared test infrastructure for the Tessera workspace:
//! - Proptest generators for entities, ids and parameter lists
//! - Fetchers that count calls, fail on demand, or serve fixed lists
//! - Test fixtures for common scenarios
//! - Custom assertions for cache reads and errors

// Re-export core types for convenience
pub use tessera_core::{
    CacheSettings, CapacityConfig, ConfigError, EntityId, FetchResponse, Fingerprint, IdRef,
    IdShape, RequestError, ResponseMetadata, StorageError, TesseraError, TesseraResult,
    TypeConfig,
};
pub use tessera_storage::{CachedResponse, NormalizedCache, RequestOptions, ResponseFetcher};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

// ============================================================================
// TEST FETCHERS
// ============================================================================

/// Error type for test fetchers: either a cache-side error or a remote failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TestError {
    Cache(TesseraError),
    Remote(String),
}

impl From<TesseraError> for TestError {
    fn from(e: TesseraError) -> Self {
        TestError::Cache(e)
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Cache(e) => write!(f, "cache: {}", e),
            TestError::Remote(msg) => write!(f, "remote: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}

/// Fetcher that serves a fixed response and records every call.
#[derive(Debug, Clone)]
pub struct MockFetcher {
    name: Option<String>,
    response: FetchResponse,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl MockFetcher {
    pub fn new(name: impl Into<String>, response: FetchResponse) -> Self {
        Self {
            name: Some(name.into()),
            response,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A fetcher without a name; reads need an explicit request key.
    pub fn anonymous(response: FetchResponse) -> Self {
        Self {
            name: None,
            ..Self::new("", response)
        }
    }

    /// Number of times `fetch` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Parameters of every call, in order.
    pub fn seen_params(&self) -> Vec<Vec<Value>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResponseFetcher for MockFetcher {
    type Error = TestError;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn fetch(&self, params: &[Value]) -> Result<FetchResponse, TestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(params.to_vec());
        }
        Ok(self.response.clone())
    }
}

/// Fetcher that always fails with a remote error.
#[derive(Debug, Clone)]
pub struct FailingFetcher {
    name: String,
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingFetcher {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseFetcher for FailingFetcher {
    type Error = TestError;

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    async fn fetch(&self, _params: &[Value]) -> Result<FetchResponse, TestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TestError::Remote(self.message.clone()))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate an integer or string entity id.
    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        prop_oneof![
            (0i64..10_000).prop_map(EntityId::Int),
            "[a-z][a-z0-9]{0,11}".prop_map(EntityId::Text),
        ]
    }

    /// Generate a JSON leaf value.
    pub fn arb_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        ]
    }

    /// Generate an arbitrary JSON value up to a small depth.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Generate a positional parameter list.
    pub fn arb_params() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(arb_json(), 0..4)
    }

    /// Generate one entity carrying `id` under the default id property.
    pub fn arb_entity(id: EntityId) -> impl Strategy<Value = Value> {
        ("[a-z]{1,10}", any::<u16>()).prop_map(move |(name, rank)| {
            json!({ "id": id.to_value(), "name": name, "rank": rank })
        })
    }

    /// Generate a list of entities with distinct integer ids.
    pub fn arb_entity_list(max: usize) -> impl Strategy<Value = Vec<Value>> {
        prop::collection::btree_set(0i64..1_000, 0..max).prop_flat_map(|ids| {
            ids.into_iter()
                .map(|id| arb_entity(EntityId::Int(id)))
                .collect::<Vec<_>>()
        })
    }

    /// Generate a keyed body: one to three entity types mapped to lists.
    pub fn arb_keyed_body() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{3,8}", arb_entity_list(6), 1..4).prop_map(|types| {
            Value::Object(
                types
                    .into_iter()
                    .map(|(entity_type, entities)| (entity_type, Value::Array(entities)))
                    .collect(),
            )
        })
    }

    /// Generate a capacity between 1 and `max` entries.
    pub fn arb_capacity(max: usize) -> impl Strategy<Value = CapacityConfig> {
        (1..=max).prop_map(CapacityConfig::new)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Request key used by [`list_fetcher`].
    pub const LIST_KEY: &str = "apiGet";

    /// Cache with default (500-entry) capacities.
    pub fn default_cache() -> NormalizedCache {
        NormalizedCache::new(CacheSettings::default())
    }

    /// Cache with small capacities, for eviction tests.
    pub fn small_cache(max_entries: usize) -> NormalizedCache {
        NormalizedCache::new(
            CacheSettings::without_capacity_defaults()
                .with_data_capacity(CapacityConfig::new(max_entries))
                .with_request_capacity(CapacityConfig::new(max_entries)),
        )
    }

    /// Metadata attached by the list fixtures.
    pub fn json_headers() -> Value {
        json!({ "content-type": "application/json" })
    }

    /// A bare list of two entities, ids 0 and 1.
    pub fn two_items() -> Value {
        json!([{ "id": 0 }, { "id": 1 }])
    }

    /// Fetcher named [`LIST_KEY`] serving [`two_items`] with JSON headers.
    pub fn list_fetcher() -> MockFetcher {
        MockFetcher::new(
            LIST_KEY,
            FetchResponse::new(two_items()).with_metadata(json_headers()),
        )
    }

    /// A keyed body holding a user list and a single team.
    pub fn users_and_team() -> Value {
        json!({
            "users": [
                { "id": 1, "name": "ada" },
                { "id": 2, "name": "grace" }
            ],
            "team": { "id": "core", "size": 2 }
        })
    }

    /// Fetcher named `listUsers` serving [`users_and_team`].
    pub fn users_fetcher() -> MockFetcher {
        MockFetcher::new("listUsers", FetchResponse::new(users_and_team()))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for cache reads and errors.

    use super::*;

    /// Assert that a read was served from the tiers.
    #[track_caller]
    pub fn assert_hit<E: fmt::Debug>(result: &Result<CachedResponse, E>) {
        match result {
            Ok(read) => assert!(read.was_cache_hit(), "Expected cache hit, got miss: {:?}", read),
            Err(e) => panic!("Expected cache hit, got Err: {:?}", e),
        }
    }

    /// Assert that a read went to the fetcher.
    #[track_caller]
    pub fn assert_miss<E: fmt::Debug>(result: &Result<CachedResponse, E>) {
        match result {
            Ok(read) => assert!(read.was_cache_miss(), "Expected cache miss, got hit: {:?}", read),
            Err(e) => panic!("Expected cache miss, got Err: {:?}", e),
        }
    }

    /// Assert that a read failed with `MissingKey`.
    #[track_caller]
    pub fn assert_missing_key<T: fmt::Debug>(result: &Result<T, TestError>) {
        match result {
            Err(TestError::Cache(TesseraError::Request(RequestError::MissingKey))) => {}
            other => panic!("Expected MissingKey error, got: {:?}", other),
        }
    }

    /// Assert that a result is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: fmt::Debug>(result: &TesseraResult<T>) {
        match result {
            Err(TesseraError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a read failed because `request_key` has no capacity.
    #[track_caller]
    pub fn assert_missing_request_capacity<T: fmt::Debug>(
        result: &Result<T, TestError>,
        request_key: &str,
    ) {
        match result {
            Err(TestError::Cache(TesseraError::Config(ConfigError::MissingRequestCapacity {
                request_key: key,
            }))) => assert_eq!(key, request_key, "Wrong request key in error"),
            other => panic!(
                "Expected MissingRequestCapacity for {:?}, got: {:?}",
                request_key, other
            ),
        }
    }

    /// Assert that a read failed with the fetcher's own error.
    #[track_caller]
    pub fn assert_remote_error<T: fmt::Debug>(result: &Result<T, TestError>, message: &str) {
        match result {
            Err(TestError::Remote(m)) => assert_eq!(m, message),
            other => panic!("Expected remote error {:?}, got: {:?}", message, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
