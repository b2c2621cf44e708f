//! Read-through front end of the normalized cache.
//!
//! [`NormalizedCache::get`] routes a call through the tiers: resolve the
//! request key, fingerprint the parameters, try reconstitution, and on a
//! miss call the fetcher and hand the result to the write path.
//!
//! # Write ordering
//!
//! The fetched response is returned as soon as the fetcher resolves. The
//! write path runs as a spawned task on the current tokio runtime and is
//! not awaited, so a second `get` issued before that task runs can still
//! miss and fetch again. [`NormalizedCache::flush_writes`] waits for every
//! outstanding write. Identical in-flight requests are not coalesced.

use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};

use serde_json::{Map, Value};
use tessera_core::{
    CacheSettings, ConfigError, EntityId, FetchResponse, Fingerprint, IdShape, RequestError,
    ResponseMetadata, StorageError, TesseraError, TesseraResult,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::fetcher::ResponseFetcher;
use super::lru_backend::LruMapFactory;
use super::options::RequestOptions;
use super::response::CachedResponse;
use super::store::{Reconstituted, TierStore};
use super::traits::{CacheStats, MapFactory};

/// Normalized response cache.
///
/// One instance is created per application with its settings; clones share
/// the same tiers.
///
/// # Example
///
/// ```ignore
/// let cache = NormalizedCache::new(CacheSettings::default());
/// let list_users = fetcher_fn("listUsers", |params| async move { api.list_users(params).await });
///
/// let options = RequestOptions::new().format(|body| json!({ "users": body }));
/// let first = cache.get(&list_users, &[json!({"page": 1})], &options).await?;
/// let again = cache.get(&list_users, &[json!({"page": 1})], &options).await?;
/// assert!(again.was_cache_hit());
/// ```
#[derive(Clone)]
pub struct NormalizedCache {
    store: Arc<RwLock<TierStore>>,
    settings: Arc<CacheSettings>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl NormalizedCache {
    /// Create a cache backed by LRU maps.
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_factory(settings, Arc::new(LruMapFactory))
    }

    /// Create a cache whose maps are built by `factory`.
    pub fn with_factory(settings: CacheSettings, factory: Arc<dyn MapFactory>) -> Self {
        let settings = Arc::new(settings);
        let store = TierStore::new(Arc::clone(&settings), factory);
        Self {
            store: Arc::new(RwLock::new(store)),
            settings,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the cache settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn store(&self) -> TesseraResult<RwLockWriteGuard<'_, TierStore>> {
        self.store
            .write()
            .map_err(|_| TesseraError::Storage(StorageError::LockPoisoned))
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Return the cached response for `params`, or fetch and cache it.
    ///
    /// Fails with `MissingKey` if neither `options.name` nor the fetcher's
    /// name is set, and with `MissingRequestCapacity` (before fetching) if
    /// the request key is new and no capacity is available for it. The
    /// capacity check runs before the body is known, so it applies even to
    /// calls whose body turns out to be a scalar that would never be
    /// written. Fetch errors are returned unchanged and leave the tiers
    /// untouched.
    ///
    /// If any rule rejects `params`, the tiers are neither read nor written.
    pub async fn get<F>(
        &self,
        fetcher: &F,
        params: &[Value],
        options: &RequestOptions,
    ) -> Result<CachedResponse, F::Error>
    where
        F: ResponseFetcher,
    {
        let request_key = options
            .name
            .clone()
            .or_else(|| fetcher.name().map(str::to_string))
            .ok_or(TesseraError::Request(RequestError::MissingKey))?;
        let hash = Fingerprint::of(params);

        if !options.rules_pass(params) {
            debug!(request_key = %request_key, fingerprint = %hash, "rule rejected parameters, bypassing cache");
            self.store()?.record_bypass();
            let response = fetcher.fetch(params).await?;
            return Ok(CachedResponse::from_fetcher(response));
        }

        {
            let mut store = self.store()?;
            if let Some(found) = store.load(&request_key, &hash) {
                debug!(request_key = %request_key, fingerprint = %hash, "cache hit");
                let body = options.apply_unformat(found.body);
                return Ok(CachedResponse::from_cache(body, found.metadata));
            }
            if !store.has_request_key(&request_key)
                && options.cache.is_none()
                && self.settings.default_request_capacity.is_none()
            {
                return Err(
                    TesseraError::from(ConfigError::MissingRequestCapacity { request_key }).into(),
                );
            }
        }

        debug!(request_key = %request_key, fingerprint = %hash, "cache miss, fetching");
        let response = fetcher.fetch(params).await?;

        let formatted = FetchResponse {
            body: options.apply_format(response.body.clone()),
            metadata: response.metadata.clone(),
        };
        self.schedule_write(request_key, hash, formatted, options);

        Ok(CachedResponse::from_fetcher(response))
    }

    /// Return one entity directly from the data tier, or fall back to [`get`](Self::get).
    ///
    /// A direct hit is wrapped as `{ entity_type: entity }`, passed through
    /// `options.unformat`, and never touches the request tier or the fetcher.
    pub async fn get_by_id<F>(
        &self,
        entity_type: &str,
        id: impl Into<EntityId>,
        fetcher: &F,
        params: &[Value],
        options: &RequestOptions,
    ) -> Result<CachedResponse, F::Error>
    where
        F: ResponseFetcher,
    {
        let id = id.into();
        let entity = self.store()?.entity(entity_type, &id);
        if let Some(entity) = entity {
            debug!(entity_type, id = %id, "direct entity hit");
            let mut wrapped = Map::new();
            wrapped.insert(entity_type.to_string(), entity);
            let body = options.apply_unformat(Value::Object(wrapped));
            return Ok(CachedResponse::from_cache(body, ResponseMetadata::Empty));
        }

        self.get(fetcher, params, options).await
    }

    /// Rebuild the response cached for `(request_key, hash)`, if servable.
    ///
    /// Hit and miss counters are left to [`get`](Self::get).
    pub fn load_from_cache(
        &self,
        request_key: &str,
        hash: &Fingerprint,
    ) -> TesseraResult<Option<Reconstituted>> {
        Ok(self.store()?.try_load(request_key, hash).ok())
    }

    /// Reconstituted body for a request (before `unformat`), if servable.
    pub fn body(&self, request_key: &str, params: &[Value]) -> TesseraResult<Option<Value>> {
        let hash = Fingerprint::of(params);
        Ok(self.load_from_cache(request_key, &hash)?.map(|r| r.body))
    }

    /// Stored metadata slot for a request, if one exists.
    pub fn head(
        &self,
        request_key: &str,
        params: &[Value],
    ) -> TesseraResult<Option<ResponseMetadata>> {
        let hash = Fingerprint::of(params);
        Ok(self.store()?.metadata(request_key, &hash))
    }

    /// Read one entity from the data tier.
    pub fn entity(&self, entity_type: &str, id: impl Into<EntityId>) -> TesseraResult<Option<Value>> {
        Ok(self.store()?.entity(entity_type, &id.into()))
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Decompose `response` into the tiers under `(request_key, hash)`.
    pub fn set_caches(
        &self,
        request_key: &str,
        hash: &Fingerprint,
        response: &FetchResponse,
        options: &RequestOptions,
    ) -> TesseraResult<()> {
        self.store()?
            .write(request_key, hash, response, options.cache.as_ref())
    }

    fn schedule_write(
        &self,
        request_key: String,
        hash: Fingerprint,
        response: FetchResponse,
        options: &RequestOptions,
    ) {
        let store = Arc::clone(&self.store);
        let capacity = options.cache.clone();
        let write = move || {
            let result = match store.write() {
                Ok(mut store) => store.write(&request_key, &hash, &response, capacity.as_ref()),
                Err(_) => Err(TesseraError::Storage(StorageError::LockPoisoned)),
            };
            if let Err(e) = result {
                warn!(request_key = %request_key, fingerprint = %hash, error = %e, "cache write failed");
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move { write() });
                if let Ok(mut pending) = self.pending.lock() {
                    pending.retain(|t| !t.is_finished());
                    pending.push(task);
                }
            }
            // No runtime to defer onto: write before returning.
            Err(_) => write(),
        }
    }

    /// Wait for every background write started by [`get`](Self::get).
    pub async fn flush_writes(&self) {
        let tasks: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "cache write task did not complete");
            }
        }
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Reset the data tier.
    ///
    /// - no type: drop every entity of every type
    /// - type, no data: empty that type's map
    /// - type and data (one entity or an array): upsert into that type
    pub fn reset_data(&self, entity_type: Option<&str>, data: Option<&Value>) -> TesseraResult<()> {
        let mut store = self.store()?;
        match (entity_type, data) {
            (None, _) => store.clear_data(),
            (Some(entity_type), None) => store.clear_data_type(entity_type),
            (Some(entity_type), Some(data)) => {
                store.upsert_data(entity_type, data)?;
            }
        }
        Ok(())
    }

    /// Reset the request tier.
    ///
    /// - no key: drop every request record and metadata slot
    /// - key, no params: empty that key
    /// - key and params, no ids: delete the record at that fingerprint
    /// - key, params and ids: overwrite the id-shape at that fingerprint
    pub fn reset_requests(
        &self,
        request_key: Option<&str>,
        params: Option<&[Value]>,
        ids: Option<IdShape>,
    ) -> TesseraResult<()> {
        let mut store = self.store()?;
        match (request_key, params, ids) {
            (None, _, _) => store.clear_requests(),
            (Some(request_key), None, _) => store.clear_request_key(request_key),
            (Some(request_key), Some(params), None) => {
                store.delete_request(request_key, &Fingerprint::of(params))
            }
            (Some(request_key), Some(params), Some(shape)) => {
                if !store.override_request(request_key, &Fingerprint::of(params), shape) {
                    debug!(request_key, "override ignored, request key never cached");
                }
            }
        }
        Ok(())
    }

    /// Remove entities (an id, an entity, or an array of either) from a type.
    ///
    /// Request records are not touched; reads that referenced a removed
    /// entity miss and re-fetch. Returns the number of entities removed.
    pub fn delete_data(&self, entity_type: &str, data: &Value) -> TesseraResult<usize> {
        Ok(self.store()?.delete_data(entity_type, data))
    }

    /// Get cache statistics.
    pub fn stats(&self) -> TesseraResult<CacheStats> {
        Ok(self.store()?.stats())
    }
}
