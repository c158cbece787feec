//! Run summary returned by the driver.

use serde::Serialize;

use crate::types::batch::BatchRange;

/// What a pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Batches collected and persisted in this run
    pub batches_completed: Vec<BatchRange>,

    /// Batches whose artifact already existed
    pub batches_skipped: Vec<BatchRange>,

    /// Pages fetched successfully
    pub pages_fetched: u32,

    /// Pages given up on after the last retry
    pub pages_skipped: Vec<u32>,

    /// Rows written to batch artifacts (and the master)
    pub items_written: usize,

    /// Entries dropped for a missing or malformed rating
    pub items_dropped: usize,

    /// Rows written with the sentinel enrichment
    pub items_unavailable: usize,

    /// Whether the catalog reported no more pages
    pub catalog_ended: bool,
}

impl RunReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} batches completed, {} skipped; {} pages fetched, {} skipped; {} rows written ({} without enrichment), {} dropped for rating{}",
            self.batches_completed.len(),
            self.batches_skipped.len(),
            self.pages_fetched,
            self.pages_skipped.len(),
            self.items_written,
            self.items_unavailable,
            self.items_dropped,
            if self.catalog_ended { "; catalog end reached" } else { "" },
        )
    }
}
