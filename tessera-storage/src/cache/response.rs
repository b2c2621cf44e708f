//! Responses handed back to callers of the cache.
//!
//! Hits and misses present the same shape; [`CachedResponse`] records which
//! one it was so callers can tell without comparing bodies.

use serde_json::Value;
use tessera_core::{FetchResponse, ResponseMetadata};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Rebuilt from the request and data tiers.
    Cache,
    /// Returned by the fetcher on this call.
    Fetcher,
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    body: Value,
    metadata: ResponseMetadata,
    source: ResponseSource,
}

impl CachedResponse {
    /// Create a response from a cache hit.
    pub fn from_cache(body: Value, metadata: ResponseMetadata) -> Self {
        Self {
            body,
            metadata,
            source: ResponseSource::Cache,
        }
    }

    /// Create a response from a fetcher call (cache miss).
    pub fn from_fetcher(response: FetchResponse) -> Self {
        Self {
            body: response.body,
            metadata: ResponseMetadata::from(response.metadata),
            source: ResponseSource::Fetcher,
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the wrapper and return the body.
    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn into_parts(self) -> (Value, ResponseMetadata) {
        (self.body, self.metadata)
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// Check if this was a cache hit.
    pub fn was_cache_hit(&self) -> bool {
        self.source == ResponseSource::Cache
    }

    /// Check if this was a cache miss (fetched on this call).
    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit()
    }

    /// Transform the body, keeping metadata and source.
    pub fn map_body<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Value,
    {
        Self {
            body: f(self.body),
            ..self
        }
    }
}
