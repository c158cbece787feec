//! Top-level batch loop.

use tracing::{debug, info};

use crate::error::{HarvestError, PersistenceError, Result};
use crate::pipeline::collect::{PageCollector, PageOutcome};
use crate::pipeline::enrich::ItemEnricher;
use crate::pipeline::images::ImageLifecycleManager;
use crate::pipeline::persist::{BatchPersistor, FinalizeOutcome};
use crate::traits::analyzer::VisionAnalyzer;
use crate::traits::catalog::CatalogFetcher;
use crate::traits::image::ImageSource;
use crate::traits::store::TabularStore;
use crate::types::batch::{BatchPlan, BatchRange};
use crate::types::config::HarvestConfig;
use crate::types::item::{Record, ENRICHMENT_UNAVAILABLE};
use crate::types::report::RunReport;

/// Where a batch stands in the run.
#[derive(Debug)]
enum BatchState {
    /// Not yet checked against existing artifacts
    Pending(BatchRange),

    /// An artifact already covers the batch, or its first pages
    Skipped { remainder: Option<BatchRange> },

    /// Pages are being fetched
    Collecting(BatchRange),

    /// Pages collected, artifact not yet written
    Persisting {
        range: BatchRange,
        records: Vec<Record>,
        catalog_ended: bool,
    },

    /// Artifact written (or found written) this run
    Completed { catalog_ended: bool },

    /// No more batches
    Done,
}

/// Runs batches in order until the catalog ends or the page ceiling is hit.
///
/// Re-running after an interruption replays from batch 0; batches with an
/// artifact are skipped without touching the catalog.
pub struct PipelineDriver<C, S, A, T> {
    collector: PageCollector<C, S, A>,
    persistor: BatchPersistor<T>,
    plan: BatchPlan,
}

impl<C, S, A, T> PipelineDriver<C, S, A, T>
where
    C: CatalogFetcher,
    S: ImageSource,
    A: VisionAnalyzer,
    T: TabularStore,
{
    /// Assemble a driver from its collaborators.
    pub fn new(
        collector: PageCollector<C, S, A>,
        persistor: BatchPersistor<T>,
        plan: BatchPlan,
    ) -> Self {
        Self {
            collector,
            persistor,
            plan,
        }
    }

    /// Wire the whole pipeline from `config`.
    pub fn from_config(
        config: &HarvestConfig,
        catalog: C,
        images: S,
        analyzer: A,
        store: T,
    ) -> Result<Self> {
        config.validate()?;

        let enricher = ItemEnricher::new(
            ImageLifecycleManager::new(images, &config.image_dir),
            analyzer,
            config.analyzer_timeout,
        );
        let collector = PageCollector::new(catalog, enricher)
            .with_retries(config.page_retries, config.retry_backoff);
        let persistor = BatchPersistor::from_config(store, config);

        Ok(Self::new(collector, persistor, config.plan()))
    }

    /// Access the persistor (status and rebuild use it directly).
    pub fn persistor(&self) -> &BatchPersistor<T> {
        &self.persistor
    }

    /// Run until done.
    ///
    /// Fails only on storage errors. The failed batch has no artifact, so
    /// the next run redoes it.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        self.persistor.init_master()?;

        let mut batches = self.plan.iter();
        let mut next_batch = || match batches.next() {
            Some((index, range)) => {
                debug!(index, batch = %range, "Next batch");
                BatchState::Pending(range)
            }
            None => BatchState::Done,
        };

        let mut state = next_batch();
        loop {
            state = match state {
                BatchState::Done => break,
                BatchState::Completed { catalog_ended: true } => BatchState::Done,
                BatchState::Skipped {
                    remainder: Some(rest),
                } => BatchState::Pending(rest),
                BatchState::Skipped { remainder: None }
                | BatchState::Completed { catalog_ended: false } => next_batch(),
                other => self.step(other, &mut report).await?,
            };
        }

        info!(summary = %report.summary(), "Run finished");
        Ok(report)
    }

    /// Advance a working state by one transition.
    async fn step(&self, state: BatchState, report: &mut RunReport) -> Result<BatchState> {
        let next = match state {
            BatchState::Pending(range) => {
                let found = self
                    .persistor
                    .find_completed(range)
                    .map_err(|e| persistence_failed(range, e))?;

                match found {
                    Some(found) => {
                        info!(batch = %range, artifact = %found, "Batch already complete, skipping");
                        report.batches_skipped.push(found);

                        // Pages past a shorter artifact are collected as their own range
                        let remainder = (found.end < range.end)
                            .then(|| BatchRange::new(found.end + 1, range.end));
                        BatchState::Skipped { remainder }
                    }
                    None => {
                        info!(batch = %range, "Starting batch");
                        BatchState::Collecting(range)
                    }
                }
            }

            BatchState::Collecting(range) => self.collect_batch(range, report).await,

            BatchState::Persisting {
                range,
                records,
                catalog_ended,
            } => {
                let outcome = self
                    .persistor
                    .finalize(range, &records)
                    .map_err(|e| persistence_failed(range, e))?;

                match outcome {
                    FinalizeOutcome::Written { rows } => {
                        let unavailable = records
                            .iter()
                            .filter(|r| r.enrichment == ENRICHMENT_UNAVAILABLE)
                            .count();
                        report.batches_completed.push(range);
                        report.items_written += rows;
                        report.items_unavailable += unavailable;
                        info!(batch = %range, rows, unavailable, "Batch completed");
                    }
                    FinalizeOutcome::AlreadyComplete => {
                        report.batches_skipped.push(range);
                    }
                }
                BatchState::Completed { catalog_ended }
            }

            terminal => terminal,
        };
        Ok(next)
    }

    /// Fetch every page of `range` in order.
    async fn collect_batch(&self, range: BatchRange, report: &mut RunReport) -> BatchState {
        let mut records = Vec::new();

        for page in range.pages() {
            match self.collector.collect(page).await {
                PageOutcome::Items(collected) => {
                    report.pages_fetched += 1;
                    report.items_dropped += collected.dropped;
                    records.extend(collected.items.into_iter().map(Record::from));
                }
                PageOutcome::Skipped { .. } => {
                    report.pages_skipped.push(page);
                }
                PageOutcome::EndOfCatalog => {
                    report.catalog_ended = true;
                    return match range.truncated(page.saturating_sub(1)) {
                        Some(truncated) => {
                            info!(batch = %range, artifact = %truncated, "Catalog ended inside batch");
                            BatchState::Persisting {
                                range: truncated,
                                records,
                                catalog_ended: true,
                            }
                        }
                        None => {
                            info!(batch = %range, "Catalog ended before batch");
                            BatchState::Done
                        }
                    };
                }
            }
        }

        BatchState::Persisting {
            range,
            records,
            catalog_ended: false,
        }
    }
}

fn persistence_failed(range: BatchRange, source: PersistenceError) -> HarvestError {
    HarvestError::Persistence {
        start: range.start,
        end: range.end,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{MockAnalyzer, MockCatalog, MockImageSource};
    use crate::types::item::RawEntry;
    use std::path::Path;
    use std::time::Duration;

    type TestDriver = PipelineDriver<MockCatalog, MockImageSource, MockAnalyzer, MemoryStore>;

    fn config(dir: &Path) -> HarvestConfig {
        HarvestConfig::default()
            .with_output_dir(dir)
            .with_batch_size(2)
            .with_retries(1, Duration::ZERO)
    }

    fn driver(config: &HarvestConfig, catalog: MockCatalog, store: MemoryStore) -> TestDriver {
        PipelineDriver::from_config(
            config,
            catalog,
            MockImageSource::new().with_default_image(b"JPEG".to_vec()),
            MockAnalyzer::new().with_response("green"),
            store,
        )
        .unwrap()
    }

    fn page(ids: &[&str]) -> Vec<RawEntry> {
        ids.iter()
            .map(|id| RawEntry::new(*id, *id).with_rating("4.2"))
            .collect()
    }

    #[tokio::test]
    async fn test_catalog_end_truncates_final_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let catalog = MockCatalog::new()
            .with_page(1, page(&["a"]))
            .with_page(2, page(&["b"]))
            .with_page(3, page(&["c"]))
            .with_last_page(3);
        let store = MemoryStore::new();

        let report = driver(&config, catalog, store.clone()).run().await.unwrap();

        assert_eq!(
            report.batches_completed,
            vec![BatchRange::new(1, 2), BatchRange::new(3, 3)]
        );
        assert!(report.catalog_ended);
        assert_eq!(report.items_written, 3);
        assert!(store
            .get(&config.paginated_dir.join("beers_3_3.csv"))
            .is_some());
    }

    #[tokio::test]
    async fn test_catalog_end_on_batch_boundary_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let catalog = MockCatalog::new()
            .with_page(1, page(&["a"]))
            .with_page(2, page(&["b"]))
            .with_last_page(2);
        let store = MemoryStore::new();

        let report = driver(&config, catalog, store.clone()).run().await.unwrap();

        assert_eq!(report.batches_completed, vec![BatchRange::new(1, 2)]);
        assert!(report.catalog_ended);
        // master plus one batch artifact
        assert_eq!(store.table_count(), 2);
    }

    #[tokio::test]
    async fn test_resume_after_catalog_end_probes_next_page_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let catalog = MockCatalog::new()
            .with_page(1, page(&["a"]))
            .with_page(2, page(&["b"]))
            .with_page(3, page(&["c"]))
            .with_last_page(3);
        let store = MemoryStore::new();

        driver(&config, catalog.clone(), store.clone()).run().await.unwrap();
        catalog.clear_calls();

        let report = driver(&config, catalog.clone(), store.clone()).run().await.unwrap();

        assert!(report.batches_completed.is_empty());
        assert_eq!(
            report.batches_skipped,
            vec![BatchRange::new(1, 2), BatchRange::new(3, 3)]
        );
        assert!(report.catalog_ended);
        assert_eq!(catalog.fetched_pages(), vec![4]);
        // master plus two batch artifacts
        assert_eq!(store.table_count(), 3);
    }

    #[tokio::test]
    async fn test_raised_max_page_collects_remaining_pages() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MockCatalog::generated(10, 1);
        let store = MemoryStore::new();

        let capped = config(dir.path()).with_batch_size(4).with_max_page(6);
        let report = driver(&capped, catalog.clone(), store.clone()).run().await.unwrap();
        assert_eq!(
            report.batches_completed,
            vec![BatchRange::new(1, 4), BatchRange::new(5, 6)]
        );
        assert!(!report.catalog_ended);
        catalog.clear_calls();

        let uncapped = config(dir.path()).with_batch_size(4);
        let report = driver(&uncapped, catalog.clone(), store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(
            report.batches_skipped,
            vec![BatchRange::new(1, 4), BatchRange::new(5, 6)]
        );
        assert_eq!(
            report.batches_completed,
            vec![BatchRange::new(7, 8), BatchRange::new(9, 10)]
        );
        assert!(report.catalog_ended);
        assert_eq!(catalog.fetched_pages(), vec![7, 8, 9, 10, 11]);

        let master = store.get(&uncapped.master_path).unwrap();
        assert_eq!(master.len(), 10);
    }

    #[tokio::test]
    async fn test_max_page_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_max_page(3);
        let catalog = MockCatalog::new().with_last_page(100);

        let report = driver(&config, catalog.clone(), MemoryStore::new())
            .run()
            .await
            .unwrap();

        assert_eq!(report.pages_fetched, 3);
        assert!(!report.catalog_ended);
        assert_eq!(catalog.fetched_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_batch_size(0);

        let result = PipelineDriver::from_config(
            &config,
            MockCatalog::new(),
            MockImageSource::new(),
            MockAnalyzer::new(),
            MemoryStore::new(),
        );
        assert!(matches!(result, Err(HarvestError::InvalidConfig { .. })));
    }
}
