//! Typed errors for the harvester library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only
//! [`PersistenceError`] (wrapped in [`HarvestError`]) ever reaches the
//! caller of the pipeline; the other kinds are recovered where they occur.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed source error from an HTTP client or other collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Image download or staging failed.
///
/// Recovered by the enricher: the item keeps its row with a sentinel
/// enrichment value.
#[derive(Debug, Error)]
pub enum ImageFetchError {
    /// Transport-level failure
    #[error("HTTP error fetching image {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Non-2xx response
    #[error("HTTP {status} fetching image {url}")]
    Status { url: String, status: u16 },

    /// Response had no content
    #[error("empty image body: {url}")]
    Empty { url: String },

    /// Could not write the temporary image file
    #[error("failed to stage image {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Vision analysis failed or timed out.
///
/// Recovered by the enricher, never surfaced past it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Vision service unreachable or returned an error
    #[error("vision service error: {0}")]
    Service(#[source] BoxError),

    /// Analyzer exceeded its time budget
    #[error("vision analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Model answered but nothing usable could be parsed
    #[error("unusable analysis response: {0}")]
    Unparseable(String),

    /// No suitable vision model installed
    #[error("no vision model available (wanted {wanted})")]
    ModelUnavailable { wanted: String },

    /// Could not read the local image
    #[error("failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Catalog page could not be fetched or parsed.
///
/// Retried by the page collector; after the last attempt the page is
/// skipped and recorded in the run report.
#[derive(Debug, Error)]
pub enum PageFetchError {
    /// Transport-level failure
    #[error("HTTP error fetching page {page}: {source}")]
    Http {
        page: u32,
        #[source]
        source: BoxError,
    },

    /// Non-2xx response
    #[error("HTTP {status} fetching page {page}")]
    Status { page: u32, status: u16 },

    /// Body could not be interpreted as a listing
    #[error("failed to parse page {page}: {reason}")]
    Parse { page: u32, reason: String },
}

/// Writing a batch artifact or the master artifact failed.
///
/// Fatal: the driver halts without advancing past the failed batch.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Destination already exists (no-clobber write)
    #[error("artifact already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failure
    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Errors that halt a pipeline run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Storage failed while finalizing a batch
    #[error("persistence failed for pages {start}-{end}: {source}")]
    Persistence {
        start: u32,
        end: u32,
        #[source]
        source: PersistenceError,
    },

    /// Storage failed outside of a batch (master init, rebuild)
    #[error("storage error: {0}")]
    Storage(#[from] PersistenceError),

    /// Configuration rejected before any work started
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Result type alias for pipeline runs.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for storage operations.
pub type PersistResult<T> = std::result::Result<T, PersistenceError>;
