//! Tabular storage trait.
//!
//! Destinations are file paths. Implementations must make `write`
//! all-or-nothing: a destination is either absent or holds every record.

use std::path::{Path, PathBuf};

use crate::error::PersistResult;
use crate::types::item::Record;

/// Row storage for batch and master artifacts.
pub trait TabularStore: Send + Sync {
    /// Whether `dest` exists.
    fn exists(&self, dest: &Path) -> PersistResult<bool>;

    /// Create `dest` holding exactly `records`.
    ///
    /// Fails with `PersistenceError::AlreadyExists` instead of overwriting.
    fn write(&self, dest: &Path, records: &[Record]) -> PersistResult<()>;

    /// Append `records` to `dest`, creating it when missing.
    fn append(&self, dest: &Path, records: &[Record]) -> PersistResult<()>;

    /// Read every record of `dest`.
    fn read(&self, dest: &Path) -> PersistResult<Vec<Record>>;

    /// Atomically replace `dest` (or create it) with `records`.
    fn replace(&self, dest: &Path, records: &[Record]) -> PersistResult<()>;

    /// Destinations stored directly under `dir`.
    fn list(&self, dir: &Path) -> PersistResult<Vec<PathBuf>>;
}
