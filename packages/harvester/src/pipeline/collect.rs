//! Page collection: fetch, validate, enrich.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PageFetchError;
use crate::pipeline::enrich::ItemEnricher;
use crate::traits::analyzer::VisionAnalyzer;
use crate::traits::catalog::CatalogFetcher;
use crate::traits::image::ImageSource;
use crate::types::item::{Item, RawEntry};

/// Items collected from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageItems {
    /// Enriched items in listing order
    pub items: Vec<Item>,

    /// Entries dropped for a missing or malformed rating
    pub dropped: usize,
}

impl PageItems {
    /// Items that got the sentinel enrichment.
    pub fn unavailable(&self) -> usize {
        self.items.iter().filter(|i| i.enrichment_unavailable()).count()
    }
}

/// What collecting one page produced.
#[derive(Debug)]
pub enum PageOutcome {
    /// The page was fetched (possibly with zero valid items)
    Items(PageItems),

    /// Every fetch attempt failed; the page contributes nothing
    Skipped {
        attempts: u32,
        error: PageFetchError,
    },

    /// The catalog has no more pages
    EndOfCatalog,
}

/// Turns a catalog page into enriched items.
pub struct PageCollector<C, S, A> {
    catalog: C,
    enricher: ItemEnricher<S, A>,
    retries: u32,
    backoff: Duration,
}

impl<C, S, A> PageCollector<C, S, A>
where
    C: CatalogFetcher,
    S: ImageSource,
    A: VisionAnalyzer,
{
    /// Create a collector with no retries.
    pub fn new(catalog: C, enricher: ItemEnricher<S, A>) -> Self {
        Self {
            catalog,
            enricher,
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Retry failed fetches `retries` more times, sleeping `backoff`,
    /// `2 * backoff`, `4 * backoff`, ... in between.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }

    /// Collect page `page`.
    pub async fn collect(&self, page: u32) -> PageOutcome {
        let entries = match self.fetch_with_retry(page).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                info!(page, "Catalog has no more pages");
                return PageOutcome::EndOfCatalog;
            }
            Err((attempts, error)) => {
                warn!(page, attempts, error = %error, "Skipping page after final attempt");
                return PageOutcome::Skipped { attempts, error };
            }
        };

        let total = entries.len();
        let valid = validate_entries(page, entries);
        let dropped = total - valid.len();

        let mut items = Vec::with_capacity(valid.len());
        for item in valid {
            items.push(self.enricher.enrich(item).await);
        }

        let collected = PageItems { items, dropped };
        debug!(
            page,
            items = collected.items.len(),
            dropped,
            unavailable = collected.unavailable(),
            "Collected page"
        );
        PageOutcome::Items(collected)
    }

    async fn fetch_with_retry(
        &self,
        page: u32,
    ) -> Result<Option<Vec<RawEntry>>, (u32, PageFetchError)> {
        let attempts = self.retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            match self.catalog.fetch(page).await {
                Ok(entries) => return Ok(entries),
                Err(e) if attempt >= attempts => return Err((attempt, e)),
                Err(e) => {
                    let delay = self
                        .backoff
                        .saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        page,
                        attempt,
                        attempts,
                        error = %e,
                        "Page fetch failed, backing off {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Apply the rating predicate, keeping listing order.
fn validate_entries(page: u32, entries: Vec<RawEntry>) -> Vec<Item> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.id.clone();
            let item = entry.validate();
            if item.is_none() {
                debug!(page, item_id = %id, "Dropping entry without a valid rating");
            }
            item
        })
        .collect()
}
