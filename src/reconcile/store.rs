//! The shared pending-result store.
//!
//! Writers never coordinate. Every read may race a concurrent write, so
//! readers tolerate missing and half-written records.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::reconcile::pending::{PendingHeader, PendingResult};

pub trait PendingStore: Send + Sync {
    /// Writes a record, replacing any record with the same id.
    fn persist(&self, result: &PendingResult) -> Result<(), StoreError>;

    /// Returns every record currently readable.
    fn read_all(&self) -> Result<Vec<PendingResult>, StoreError>;

    /// Removes a record. Removing a missing record succeeds.
    fn clear(&self, id: &str) -> Result<(), StoreError>;

    /// Returns the identifying fields of every record.
    fn read_headers(&self) -> Result<Vec<PendingHeader>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|r| PendingHeader {
                source_kind: Some(r.source_kind()),
                id: r.id,
                captured_at: r.captured_at,
            })
            .collect())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PendingResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Vec<PendingResult>> {
        // A panicking writer cannot leave a half-pushed Vec behind
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PendingStore for MemoryStore {
    fn persist(&self, result: &PendingResult) -> Result<(), StoreError> {
        let mut records = self.records();
        records.retain(|r| r.id != result.id);
        records.push(result.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<PendingResult>, StoreError> {
        Ok(self.records().clone())
    }

    fn clear(&self, id: &str) -> Result<(), StoreError> {
        self.records().retain(|r| r.id != id);
        Ok(())
    }
}

/// One JSON file per record in a directory.
///
/// Records are written to a temp file in the same directory and renamed into
/// place, so readers never see a torn `.json` file written by this store.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let safe: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn record_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                // Cleared by another reader between listing and reading
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("Failed to read {}: {}", path.display(), e);
                }
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Skipping unreadable record {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl PendingStore for FileStore {
    fn persist(&self, result: &PendingResult) -> Result<(), StoreError> {
        let path = self.path_for(&result.id);
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, result)?;
            writer.flush()?;
        }
        tmp.persist(&path)?;
        log::debug!("Persisted pending result {} to {}", result.id, path.display());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<PendingResult>, StoreError> {
        Ok(self
            .record_files()?
            .iter()
            .filter_map(|path| Self::read_file(path))
            .collect())
    }

    fn clear(&self, id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_headers(&self) -> Result<Vec<PendingHeader>, StoreError> {
        Ok(self
            .record_files()?
            .iter()
            .filter_map(|path| Self::read_file(path))
            .collect())
    }
}

/// Removes records captured more than `max_age` before `now`.
///
/// Returns how many were removed.
pub fn prune_stale(
    store: &dyn PendingStore,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut removed = 0;
    for header in store.read_headers()? {
        if header.captured_at < cutoff {
            log::info!(
                "Pruning stale pending result {} from {}",
                header.id,
                header.captured_at
            );
            store.clear(&header.id)?;
            removed += 1;
        }
    }
    Ok(removed)
}
