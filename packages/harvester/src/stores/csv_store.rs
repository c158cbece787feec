//! CSV file storage.
//!
//! Every whole-file write is staged in a temporary file next to the
//! destination, fsynced, and renamed into place, so a crash never leaves a
//! half-written artifact under its final name.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{PersistResult, PersistenceError};
use crate::traits::store::TabularStore;
use crate::types::item::Record;

/// CSV-backed [`TabularStore`] with header `id,name,rating,enrichment`.
#[derive(Debug, Clone, Default)]
pub struct CsvStore;

impl CsvStore {
    /// Create a new CSV store.
    pub fn new() -> Self {
        Self
    }

    /// Encode records (optionally with header) into a byte buffer.
    fn encode(dest: &Path, records: &[Record], header: bool) -> PersistResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        if header {
            writer
                .write_record(Record::HEADER)
                .map_err(|e| PersistenceError::csv(dest, e))?;
        }
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| PersistenceError::csv(dest, e))?;
        }

        writer
            .into_inner()
            .map_err(|e| PersistenceError::io(dest, e.into_error()))
    }

    /// Write records to a synced temp file in the destination's directory.
    fn stage(dest: &Path, records: &[Record]) -> PersistResult<NamedTempFile> {
        let dir = parent_dir(dest);
        fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

        let bytes = Self::encode(dest, records, true)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| PersistenceError::io(dir, e))?;

        staged
            .write_all(&bytes)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| PersistenceError::io(staged.path(), e))?;

        Ok(staged)
    }
}

impl TabularStore for CsvStore {
    fn exists(&self, dest: &Path) -> PersistResult<bool> {
        dest.try_exists().map_err(|e| PersistenceError::io(dest, e))
    }

    fn write(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        if self.exists(dest)? {
            return Err(PersistenceError::AlreadyExists {
                path: dest.to_path_buf(),
            });
        }

        let staged = Self::stage(dest, records)?;
        staged.persist_noclobber(dest).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                PersistenceError::AlreadyExists {
                    path: dest.to_path_buf(),
                }
            } else {
                PersistenceError::io(dest, e.error)
            }
        })?;
        sync_dir(parent_dir(dest));

        debug!(path = %dest.display(), rows = records.len(), "Wrote CSV artifact");
        Ok(())
    }

    fn append(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        let dir = parent_dir(dest);
        fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dest)
            .map_err(|e| PersistenceError::io(dest, e))?;

        let is_new = file
            .metadata()
            .map_err(|e| PersistenceError::io(dest, e))?
            .len()
            == 0;

        // One buffered write per append keeps the rows of a batch together
        let bytes = Self::encode(dest, records, is_new)?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| PersistenceError::io(dest, e))?;

        debug!(path = %dest.display(), rows = records.len(), "Appended CSV rows");
        Ok(())
    }

    fn read(&self, dest: &Path) -> PersistResult<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(dest)
            .map_err(|e| PersistenceError::csv(dest, e))?;

        reader
            .deserialize()
            .collect::<Result<Vec<Record>, _>>()
            .map_err(|e| PersistenceError::csv(dest, e))
    }

    fn replace(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        let staged = Self::stage(dest, records)?;
        staged
            .persist(dest)
            .map_err(|e| PersistenceError::io(dest, e.error))?;
        sync_dir(parent_dir(dest));
        Ok(())
    }

    fn list(&self, dir: &Path) -> PersistResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::io(dir, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| PersistenceError::io(entry.path(), e))?
                .is_file();
            if is_file {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn parent_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Persist the rename itself. Not every platform can open a directory.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "Could not sync directory after rename");
    }
}
