use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use serde::Serialize;
use thiserror::Error;

use crate::config::PROCESSED_FILE_NAME;

/// Identifiers already handed to the downstream consumer
pub type ProcessedSet = BTreeSet<String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a JSON array of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize processed set: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a mark-processed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    AlreadyMarked,
}

/// Durable processed-set backed by one JSON array document.
///
/// No file locking: two runs writing at once can lose an update.
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    path: PathBuf,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional location inside a work directory
    pub fn in_work_dir(work_dir: &Path) -> Self {
        Self::new(work_dir.join(PROCESSED_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the processed set, logging and returning an empty set on any failure
    pub fn load(&self) -> ProcessedSet {
        match self.try_load() {
            Ok(set) => set,
            Err(e) => {
                error!("Error loading processed filenames: {}", e);
                ProcessedSet::new()
            }
        }
    }

    /// Load the processed set, creating an empty document if none exists yet
    pub fn try_load(&self) -> Result<ProcessedSet, StoreError> {
        if !self.path.exists() {
            info!(
                "{} does not exist. Creating a new one at {}",
                PROCESSED_FILE_NAME,
                self.path.display()
            );
            let empty = ProcessedSet::new();
            self.save(&empty)?;
            return Ok(empty);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let members: Vec<String> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!("Loaded {} processed filenames from {}", members.len(), self.path.display());
        Ok(members.into_iter().collect())
    }

    /// Replace the document with `members`.
    ///
    /// Writes a sibling temp file and renames it over the target so a crash
    /// never leaves a half-written array behind.
    pub fn save(&self, members: &ProcessedSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        members.serialize(&mut ser)?;

        let tmp_path = self.temp_path();
        fs::write(&tmp_path, &buf).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!("Saved {} processed filenames to {}", members.len(), self.path.display());
        Ok(())
    }

    /// Add one identifier. The only operation that mutates the store.
    ///
    /// Uses the strict loader so a corrupt document is reported rather than
    /// replaced by a single-entry array.
    pub fn mark_processed(&self, identifier: &str) -> Result<MarkOutcome, StoreError> {
        let mut members = self.try_load()?;

        if members.contains(identifier) {
            info!("File '{}' is already marked as processed.", identifier);
            return Ok(MarkOutcome::AlreadyMarked);
        }

        members.insert(identifier.to_string());
        self.save(&members)?;
        info!("File '{}' has been marked as processed.", identifier);
        Ok(MarkOutcome::Marked)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| PROCESSED_FILE_NAME.into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}
