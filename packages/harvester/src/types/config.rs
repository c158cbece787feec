//! Configuration for a harvest run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HarvestError;
use crate::types::batch::BatchPlan;

/// Configuration for the harvesting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// First catalog page (1-based). Default: 1.
    pub start_page: u32,

    /// Pages per batch. Default: 100.
    pub batch_size: u32,

    /// Optional page ceiling (inclusive). Default: none, run until the
    /// catalog reports no more pages.
    pub max_page: Option<u32>,

    /// Extra attempts after a failed page fetch. Default: 3.
    pub page_retries: u32,

    /// Base delay between page fetch attempts, doubled per attempt.
    /// Default: 2s.
    pub retry_backoff: Duration,

    /// Budget for one vision analysis call. Default: 60s.
    pub analyzer_timeout: Duration,

    /// Directory holding one artifact per batch.
    pub paginated_dir: PathBuf,

    /// Cumulative master artifact.
    pub master_path: PathBuf,

    /// Scratch directory for temporary label images.
    pub image_dir: PathBuf,

    /// File name prefix of batch artifacts.
    pub batch_prefix: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::new().with_output_dir("outputs")
    }
}

impl HarvestConfig {
    /// Create a config with default values and empty paths.
    fn new() -> Self {
        Self {
            start_page: 1,
            batch_size: 100,
            max_page: None,
            page_retries: 3,
            retry_backoff: Duration::from_secs(2),
            analyzer_timeout: Duration::from_secs(60),
            paginated_dir: PathBuf::new(),
            master_path: PathBuf::new(),
            image_dir: PathBuf::new(),
            batch_prefix: "beers".to_string(),
        }
    }

    /// Place every artifact under `dir` (`paginated/`, `master.csv`,
    /// `label_images/`).
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.paginated_dir = dir.join("paginated");
        self.master_path = dir.join("master.csv");
        self.image_dir = dir.join("label_images");
        self
    }

    /// Set the first page.
    pub fn with_start_page(mut self, page: u32) -> Self {
        self.start_page = page;
        self
    }

    /// Set the batch width.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the page ceiling.
    pub fn with_max_page(mut self, page: u32) -> Self {
        self.max_page = Some(page);
        self
    }

    /// Set retry count and base backoff for page fetches.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.page_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Set the analyzer timeout.
    pub fn with_analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.analyzer_timeout = timeout;
        self
    }

    /// Set the batch artifact prefix.
    pub fn with_batch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.batch_prefix = prefix.into();
        self
    }

    /// Reject settings the batch plan cannot work with.
    pub fn validate(&self) -> Result<(), HarvestError> {
        let invalid = |reason: &str| {
            Err(HarvestError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.start_page == 0 {
            return invalid("start_page is 1-based and must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if matches!(self.max_page, Some(max) if max < self.start_page) {
            return invalid("max_page must not be below start_page");
        }
        if self.batch_prefix.is_empty() || self.batch_prefix.contains(['/', '\\']) {
            return invalid("batch_prefix must be a plain, non-empty file name prefix");
        }
        Ok(())
    }

    /// Batch partition described by this config.
    pub fn plan(&self) -> BatchPlan {
        BatchPlan::new(self.start_page, self.batch_size, self.max_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.start_page, 1);
        assert_eq!(config.master_path, PathBuf::from("outputs/master.csv"));
        assert_eq!(config.paginated_dir, PathBuf::from("outputs/paginated"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = HarvestConfig::default().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(HarvestError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_ceiling_below_start() {
        let config = HarvestConfig::default().with_start_page(10).with_max_page(5);
        assert!(config.validate().is_err());

        let config = HarvestConfig::default().with_start_page(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = HarvestConfig::default().with_max_page(1676);
        let json = serde_json::to_string(&config).unwrap();
        let back: HarvestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
