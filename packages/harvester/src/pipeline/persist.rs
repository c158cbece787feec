//! Batch artifacts and the master artifact.
//!
//! A batch is complete exactly when its artifact exists. Artifacts are
//! written with no-clobber semantics through [`TabularStore::write`], which
//! stages and renames, so an artifact is never visible half-written. The
//! master rows for a batch are appended right after its artifact lands.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PersistResult, PersistenceError};
use crate::traits::store::TabularStore;
use crate::types::batch::BatchRange;
use crate::types::config::HarvestConfig;
use crate::types::item::Record;

/// Result of [`BatchPersistor::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Artifact written and rows appended to the master
    Written { rows: usize },

    /// Artifact was already there; nothing was written
    AlreadyComplete,
}

/// Resume checks and writes for batch artifacts.
pub struct BatchPersistor<T> {
    store: T,
    paginated_dir: PathBuf,
    master_path: PathBuf,
    prefix: String,
}

impl<T: TabularStore> BatchPersistor<T> {
    /// Create a persistor writing `{prefix}_{start}_{end}.csv` files under
    /// `paginated_dir` and appending to `master_path`.
    pub fn new(
        store: T,
        paginated_dir: impl Into<PathBuf>,
        master_path: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            paginated_dir: paginated_dir.into(),
            master_path: master_path.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a persistor for the locations in `config`.
    pub fn from_config(store: T, config: &HarvestConfig) -> Self {
        Self::new(
            store,
            &config.paginated_dir,
            &config.master_path,
            &config.batch_prefix,
        )
    }

    /// Path of the artifact for `range`.
    pub fn artifact_path(&self, range: BatchRange) -> PathBuf {
        self.paginated_dir.join(range.artifact_name(&self.prefix))
    }

    /// Path of the master artifact.
    pub fn master_path(&self) -> &Path {
        &self.master_path
    }

    /// Whether the artifact for exactly `range` exists.
    pub fn is_complete(&self, range: BatchRange) -> PersistResult<bool> {
        self.store.exists(&self.artifact_path(range))
    }

    /// Find the artifact that covers the start of `range`.
    ///
    /// Returns `range` itself when its artifact exists, or an artifact with
    /// the same start that reaches at least as far. Otherwise returns the
    /// longest shorter artifact `[start, e]`, which covers only part of the
    /// batch: an earlier run hit its page ceiling or the catalog end there.
    /// The caller collects the remaining pages.
    pub fn find_completed(&self, range: BatchRange) -> PersistResult<Option<BatchRange>> {
        if self.is_complete(range)? {
            return Ok(Some(range));
        }

        let same_start: Vec<BatchRange> = self
            .completed_batches()?
            .into_iter()
            .filter(|found| found.start == range.start)
            .collect();

        let covering = same_start
            .iter()
            .filter(|found| found.end >= range.end)
            .min()
            .copied();
        Ok(covering.or_else(|| same_start.into_iter().max()))
    }

    /// Create the master artifact (header only) if it is missing.
    pub fn init_master(&self) -> PersistResult<()> {
        if !self.store.exists(&self.master_path)? {
            self.store.append(&self.master_path, &[])?;
            debug!(path = %self.master_path.display(), "Created master artifact");
        }
        Ok(())
    }

    /// Write the artifact for `range`, then append the same rows to the
    /// master.
    ///
    /// Both writes happen before this returns. If the artifact already
    /// exists it is left untouched and the master is not appended to.
    pub fn finalize(
        &self,
        range: BatchRange,
        records: &[Record],
    ) -> PersistResult<FinalizeOutcome> {
        let path = self.artifact_path(range);

        match self.store.write(&path, records) {
            Ok(()) => {}
            Err(PersistenceError::AlreadyExists { .. }) => {
                warn!(batch = %range, path = %path.display(), "Batch artifact appeared before write, leaving it as is");
                return Ok(FinalizeOutcome::AlreadyComplete);
            }
            Err(e) => return Err(e),
        }

        self.store.append(&self.master_path, records)?;

        debug!(batch = %range, rows = records.len(), path = %path.display(), "Finalized batch");
        Ok(FinalizeOutcome::Written {
            rows: records.len(),
        })
    }

    /// Every batch artifact on disk, in page order.
    pub fn completed_batches(&self) -> PersistResult<Vec<BatchRange>> {
        let mut ranges: Vec<BatchRange> = self
            .store
            .list(&self.paginated_dir)?
            .iter()
            .filter_map(|path| path.file_name()?.to_str())
            .filter_map(|name| BatchRange::from_artifact_name(&self.prefix, name))
            .collect();
        ranges.sort();
        Ok(ranges)
    }

    /// Number of rows in the master artifact (0 when missing).
    pub fn master_rows(&self) -> PersistResult<usize> {
        if !self.store.exists(&self.master_path)? {
            return Ok(0);
        }
        Ok(self.store.read(&self.master_path)?.len())
    }

    /// Replace the master with the concatenation of every batch artifact in
    /// page order. Returns the number of rows written.
    pub fn rebuild_master(&self) -> PersistResult<usize> {
        let mut rows = Vec::new();
        for range in self.completed_batches()? {
            rows.extend(self.store.read(&self.artifact_path(range))?);
        }

        self.store.replace(&self.master_path, &rows)?;
        info!(path = %self.master_path.display(), rows = rows.len(), "Rebuilt master artifact");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            name: id.to_uppercase(),
            rating: 4.0,
            enrichment: String::new(),
        }
    }

    fn persistor(store: MemoryStore) -> BatchPersistor<MemoryStore> {
        BatchPersistor::new(store, "out/paginated", "out/master.csv", "beers")
    }

    #[test]
    fn test_finalize_writes_artifact_then_master() {
        let store = MemoryStore::new();
        let persistor = persistor(store.clone());
        let range = BatchRange::new(1, 100);

        persistor.init_master().unwrap();
        assert!(!persistor.is_complete(range).unwrap());

        let outcome = persistor.finalize(range, &[record("a"), record("b")]).unwrap();

        assert_eq!(outcome, FinalizeOutcome::Written { rows: 2 });
        assert!(persistor.is_complete(range).unwrap());
        assert_eq!(
            store.get(Path::new("out/paginated/beers_1_100.csv")).unwrap().len(),
            2
        );
        assert_eq!(persistor.master_rows().unwrap(), 2);
    }

    #[test]
    fn test_finalize_existing_artifact_is_untouched() {
        let store = MemoryStore::new();
        let persistor = persistor(store.clone());
        let range = BatchRange::new(1, 100);

        persistor.finalize(range, &[record("a")]).unwrap();
        let outcome = persistor.finalize(range, &[record("z")]).unwrap();

        assert_eq!(outcome, FinalizeOutcome::AlreadyComplete);
        assert_eq!(
            store.get(&persistor.artifact_path(range)).unwrap(),
            vec![record("a")]
        );
        assert_eq!(persistor.master_rows().unwrap(), 1);
    }

    #[test]
    fn test_find_completed_prefers_nominal_then_truncated() {
        let persistor = persistor(MemoryStore::new());
        let range = BatchRange::new(201, 300);

        assert_eq!(persistor.find_completed(range).unwrap(), None);

        persistor.finalize(BatchRange::new(201, 240), &[]).unwrap();
        persistor.finalize(BatchRange::new(101, 150), &[]).unwrap();
        assert_eq!(
            persistor.find_completed(range).unwrap(),
            Some(BatchRange::new(201, 240))
        );

        persistor.finalize(range, &[]).unwrap();
        assert_eq!(persistor.find_completed(range).unwrap(), Some(range));
    }

    #[test]
    fn test_find_completed_accepts_wider_artifact() {
        let persistor = persistor(MemoryStore::new());
        persistor.finalize(BatchRange::new(1, 100), &[]).unwrap();

        // A lower ceiling than the run that wrote the artifact
        assert_eq!(
            persistor.find_completed(BatchRange::new(1, 40)).unwrap(),
            Some(BatchRange::new(1, 100))
        );
        assert_eq!(persistor.find_completed(BatchRange::new(2, 40)).unwrap(), None);
    }

    #[test]
    fn test_init_master_keeps_existing_rows() {
        let persistor = persistor(MemoryStore::new());
        persistor.finalize(BatchRange::new(1, 1), &[record("a")]).unwrap();

        persistor.init_master().unwrap();
        assert_eq!(persistor.master_rows().unwrap(), 1);
    }

    #[test]
    fn test_rebuild_master_uses_page_order() {
        let store = MemoryStore::new();
        let persistor = persistor(store.clone());

        persistor.finalize(BatchRange::new(101, 200), &[record("c")]).unwrap();
        persistor
            .finalize(BatchRange::new(1, 100), &[record("a"), record("b")])
            .unwrap();
        store
            .append(Path::new("out/master.csv"), &[record("c")])
            .unwrap();

        assert_eq!(persistor.master_rows().unwrap(), 4);
        assert_eq!(persistor.rebuild_master().unwrap(), 3);

        let ids: Vec<_> = store
            .get(Path::new("out/master.csv"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_completed_batches_ignores_foreign_files() {
        let store = MemoryStore::new();
        let persistor = persistor(store.clone());

        store.write(Path::new("out/paginated/notes.csv"), &[]).unwrap();
        persistor.finalize(BatchRange::new(1, 10), &[]).unwrap();

        assert_eq!(
            persistor.completed_batches().unwrap(),
            vec![BatchRange::new(1, 10)]
        );
    }
}
