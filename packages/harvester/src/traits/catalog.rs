//! Catalog fetcher trait.

use async_trait::async_trait;

use crate::error::PageFetchError;
use crate::types::item::RawEntry;

/// Fetches one page of the paginated catalog.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetch and parse page `page` (1-based).
    ///
    /// Returns `Ok(None)` when the page has no listings, meaning the catalog
    /// has ended. Errors are transient from the caller's point of view and
    /// may be retried.
    async fn fetch(&self, page: u32) -> Result<Option<Vec<RawEntry>>, PageFetchError>;
}
