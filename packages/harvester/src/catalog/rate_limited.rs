//! Rate-limited catalog wrapper.
//!
//! Wraps any CatalogFetcher implementation with rate limiting using the
//! governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::PageFetchError;
use crate::traits::catalog::CatalogFetcher;
use crate::types::item::RawEntry;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A catalog wrapper that waits for a permit before every page fetch.
///
/// Retries of the same page go through the limiter as well.
pub struct RateLimitedCatalog<C: CatalogFetcher> {
    inner: C,
    limiter: Arc<DefaultRateLimiter>,
}

impl<C: CatalogFetcher> RateLimitedCatalog<C> {
    /// Create a new rate-limited catalog. A rate of zero is treated as one
    /// request per second.
    pub fn new(catalog: C, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32)),
        );
        Self {
            inner: catalog,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// The wrapped catalog.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CatalogFetcher> CatalogFetcher for RateLimitedCatalog<C> {
    async fn fetch(&self, page: u32) -> Result<Option<Vec<RawEntry>>, PageFetchError> {
        self.limiter.until_ready().await;
        self.inner.fetch(page).await
    }
}

/// Extension trait for easy rate limiting.
pub trait CatalogExt: CatalogFetcher + Sized {
    /// Wrap this catalog with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedCatalog<Self> {
        RateLimitedCatalog::new(self, requests_per_second)
    }
}

impl<C: CatalogFetcher + Sized> CatalogExt for C {}
