//! Per-call options for [`NormalizedCache::get`](super::NormalizedCache::get).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tessera_core::CapacityConfig;

/// Predicate over call parameters. Returning `false` bypasses the cache.
pub type Rule = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Body transform applied around the tiers.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Options recognised by a cached read.
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Request key; overrides the fetcher's own name.
    pub name: Option<String>,
    /// All must pass for the cache to be consulted or written.
    pub rules: Vec<Rule>,
    /// Applied to a fetched body before it is decomposed into the tiers.
    pub format: Option<Transform>,
    /// Applied to a reconstituted body before it is returned.
    pub unformat: Option<Transform>,
    /// Capacity for this request key's maps when they are first created.
    pub cache: Option<CapacityConfig>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn format<F>(mut self, format: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.format = Some(Arc::new(format));
        self
    }

    pub fn unformat<F>(mut self, unformat: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.unformat = Some(Arc::new(unformat));
        self
    }

    pub fn cache(mut self, capacity: CapacityConfig) -> Self {
        self.cache = Some(capacity);
        self
    }

    /// True if every rule accepts `params`.
    pub fn rules_pass(&self, params: &[Value]) -> bool {
        self.rules.iter().all(|rule| rule(params))
    }

    pub(crate) fn apply_format(&self, body: Value) -> Value {
        match &self.format {
            Some(format) => format(body),
            None => body,
        }
    }

    pub(crate) fn apply_unformat(&self, body: Value) -> Value {
        match &self.unformat {
            Some(unformat) => unformat(body),
            None => body,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .field("format", &self.format.is_some())
            .field("unformat", &self.unformat.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}
