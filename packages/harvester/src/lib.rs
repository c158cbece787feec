//! Batch-resumable catalog harvesting.
//!
//! Walks a paginated catalog in fixed-size batches of pages, enriches every
//! rated listing with a vision-model description of its label image, and
//! writes one artifact per batch plus a cumulative master artifact.
//!
//! # Architecture
//!
//! ```text
//! PipelineDriver        batch state machine, resume by artifact existence
//!   ├─ BatchPersistor   artifact writes (stage + rename) and master appends
//!   └─ PageCollector    fetch with retries, rating filter
//!        └─ ItemEnricher            never fails, sentinel on error
//!             └─ ImageLifecycleManager   scoped temp image per item
//! ```
//!
//! Collaborators sit behind traits ([`CatalogFetcher`], [`ImageSource`],
//! [`VisionAnalyzer`], [`TabularStore`]) so the pipeline can run against
//! mocks from [`testing`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use harvester::{CsvStore, HarvestConfig, HttpCatalog, HttpImageSource, LlavaAnalyzer, PipelineDriver};
//! use ollama_client::OllamaClient;
//!
//! let config = HarvestConfig::default().with_max_page(250);
//! let analyzer = LlavaAnalyzer::new(OllamaClient::default(), "llava:7b")
//!     .ensure_model()
//!     .await?;
//!
//! let driver = PipelineDriver::from_config(
//!     &config,
//!     HttpCatalog::new()?,
//!     HttpImageSource::new()?,
//!     analyzer,
//!     CsvStore::new(),
//! )?;
//!
//! let report = driver.run().await?;
//! println!("{}", report.summary());
//! ```

pub mod analyzers;
pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    AnalysisError, HarvestError, ImageFetchError, PageFetchError, PersistenceError,
};
pub use traits::{
    analyzer::VisionAnalyzer, catalog::CatalogFetcher, image::ImageSource, store::TabularStore,
};
pub use types::{
    batch::{BatchPlan, BatchRange},
    config::HarvestConfig,
    item::{Enrichment, Item, RawEntry, Record, ENRICHMENT_UNAVAILABLE},
    report::RunReport,
};

// Re-export pipeline components
pub use pipeline::{
    BatchPersistor, FinalizeOutcome, ImageLifecycleManager, ItemEnricher, PageCollector,
    PageItems, PageOutcome, PipelineDriver, TempImage,
};

// Re-export production collaborators
pub use analyzers::{LabelAnalysis, LlavaAnalyzer};
pub use catalog::{CatalogExt, HttpCatalog, HttpImageSource, RateLimitedCatalog};
pub use stores::{CsvStore, MemoryStore};
