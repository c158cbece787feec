//! The harvesting pipeline, leaves first.
//!
//! - [`images`]: one scoped temporary image per enriched item
//! - [`enrich`]: analyzer call with timeout, sentinel on failure
//! - [`collect`]: page fetch with retries and the rating filter
//! - [`persist`]: batch artifacts and master appends
//! - [`driver`]: the batch state machine

pub mod collect;
pub mod driver;
pub mod enrich;
pub mod images;
pub mod persist;

pub use collect::{PageCollector, PageItems, PageOutcome};
pub use driver::PipelineDriver;
pub use enrich::ItemEnricher;
pub use images::{ImageLifecycleManager, TempImage};
pub use persist::{BatchPersistor, FinalizeOutcome};
