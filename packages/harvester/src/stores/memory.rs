//! In-memory storage implementation for testing and development.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{PersistResult, PersistenceError};
use crate::traits::store::TabularStore;
use crate::types::item::Record;

/// In-memory tabular storage keyed by destination path.
///
/// Clones share the same underlying map, so a test can keep a handle
/// while the pipeline owns another. Data is lost when the last handle
/// is dropped.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<BTreeMap<PathBuf, Vec<Record>>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records at `dest`, if present.
    pub fn get(&self, dest: &Path) -> Option<Vec<Record>> {
        self.tables.read().unwrap().get(dest).cloned()
    }

    /// Number of stored destinations.
    pub fn table_count(&self) -> usize {
        self.tables.read().unwrap().len()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.tables.write().unwrap().clear();
    }
}

impl TabularStore for MemoryStore {
    fn exists(&self, dest: &Path) -> PersistResult<bool> {
        Ok(self.tables.read().unwrap().contains_key(dest))
    }

    fn write(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        let mut tables = self.tables.write().unwrap();
        if tables.contains_key(dest) {
            return Err(PersistenceError::AlreadyExists {
                path: dest.to_path_buf(),
            });
        }
        tables.insert(dest.to_path_buf(), records.to_vec());
        Ok(())
    }

    fn append(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        self.tables
            .write()
            .unwrap()
            .entry(dest.to_path_buf())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    fn read(&self, dest: &Path) -> PersistResult<Vec<Record>> {
        self.get(dest).ok_or_else(|| {
            PersistenceError::io(
                dest,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such table"),
            )
        })
    }

    fn replace(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        self.tables
            .write()
            .unwrap()
            .insert(dest.to_path_buf(), records.to_vec());
        Ok(())
    }

    fn list(&self, dir: &Path) -> PersistResult<Vec<PathBuf>> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect())
    }
}
