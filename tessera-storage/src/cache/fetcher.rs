//! Fetcher contract: the caller-supplied read operation behind the cache.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tessera_core::{FetchResponse, TesseraError};

/// A remote read operation whose results the cache normalizes.
///
/// The fetcher's error type carries cache-side failures too (missing key,
/// missing capacity), so it must convert from [`TesseraError`]. Fetch
/// failures themselves are returned to the caller unchanged.
#[async_trait]
pub trait ResponseFetcher: Send + Sync {
    type Error: From<TesseraError> + Send;

    /// Default request key for this fetcher. `None` for anonymous fetchers.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Perform the read with positional parameters.
    async fn fetch(&self, params: &[Value]) -> Result<FetchResponse, Self::Error>;
}

/// Adapts an async closure into a [`ResponseFetcher`].
pub struct FnFetcher<F> {
    name: Option<String>,
    f: F,
}

impl<F> FnFetcher<F> {
    pub fn named(name: impl Into<String>, f: F) -> Self {
        Self {
            name: Some(name.into()),
            f,
        }
    }

    /// A fetcher with no name; calls need `RequestOptions::named` to be cacheable.
    pub fn anonymous(f: F) -> Self {
        Self { name: None, f }
    }
}

/// Shorthand for [`FnFetcher::named`].
pub fn fetcher_fn<F>(name: impl Into<String>, f: F) -> FnFetcher<F> {
    FnFetcher::named(name, f)
}

#[async_trait]
impl<F, Fut, R, E> ResponseFetcher for FnFetcher<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<FetchResponse> + Send + 'static,
    E: From<TesseraError> + Send + 'static,
{
    type Error = E;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn fetch(&self, params: &[Value]) -> Result<FetchResponse, E> {
        (self.f)(params.to_vec()).await.map(Into::into)
    }
}

impl<F> fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFetcher").field("name", &self.name).finish()
    }
}
