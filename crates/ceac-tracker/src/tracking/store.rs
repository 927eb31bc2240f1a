//! Status history persistence.
//!
//! The file store keeps the whole history in one JSON document and rewrites it
//! on every append. That is fine for a handful of polls a day; it is also the
//! ceiling, since each append costs a full read and a full write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::domain::{StatusHistory, StatusRecord};

/// Storage abstraction so the tracker can be exercised in isolation.
///
/// Implementations are not expected to tolerate concurrent writers.
pub trait StatusStore: Send + Sync {
    /// Returns an empty history when nothing has been persisted yet.
    fn load(&self) -> Result<StatusHistory, StoreError>;

    /// Load, append `record`, and persist the full history.
    fn append(&self, record: StatusRecord) -> Result<(), StoreError>;

    fn last(&self) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.load()?.last().cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read status history at {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("status history at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write status history at {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode status history: {0}")]
    Encode(#[source] serde_json::Error),
    /// For stores not backed by a local file, whose failures carry no path.
    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a reader
    /// sees either the previous document or the new one.
    fn persist(&self, history: &StatusHistory) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(history).map_err(StoreError::Encode)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(|err| self.write_error(err))?;
        staged
            .write_all(&encoded)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|err| self.write_error(err))?;
        staged
            .persist(&self.path)
            .map_err(|err| self.write_error(err.error))?;
        Ok(())
    }
}

impl StatusStore for JsonFileStore {
    fn load(&self) -> Result<StatusHistory, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StatusHistory::default())
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn append(&self, record: StatusRecord) -> Result<(), StoreError> {
        let mut history = self.load()?;
        history.push(record);
        self.persist(&history)
    }
}
