use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::completion::{Clock, CompletionDetector, FileProbe, StdFileProbe, TokioClock};
use crate::config::{SourceMode, WatchConfig};
use crate::reconcile::ReconcileError;
use crate::server::ServerScanner;

/// One observed recording, not yet checked against the processed set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingCandidate {
    /// Basename (folder mode) or server-reported filename
    pub identifier: String,
    /// Full path, folder mode only
    pub source_path: Option<PathBuf>,
}

impl RecordingCandidate {
    pub fn from_server(filename: impl Into<String>) -> Self {
        Self {
            identifier: filename.into(),
            source_path: None,
        }
    }
}

/// Why a recording-looking file was left out of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TemporaryFile,
    StillWriting,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TemporaryFile => write!(f, "sync tool temporary file"),
            SkipReason::StillWriting => write!(f, "file still being written"),
        }
    }
}

/// Candidates of one scan, in scan order
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub candidates: Vec<RecordingCandidate>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.identifier.as_str())
    }
}

/// Produces candidate recordings. Failures are logged and degrade to an
/// empty or partial result; nothing is returned as an error.
#[async_trait]
pub trait SourceScanner: Send + Sync {
    async fn scan(&self) -> ScanResult;
}

/// Pick the scanner for the configured source mode.
///
/// A missing watch folder is a configuration error and aborts the run.
pub fn scanner_for(cfg: &WatchConfig) -> Result<Box<dyn SourceScanner>, ReconcileError> {
    match &cfg.source {
        SourceMode::Folder { watch_dir } => {
            if !watch_dir.exists() {
                return Err(ReconcileError::WatchDirMissing(watch_dir.clone()));
            }
            Ok(Box::new(FolderScanner::new(
                watch_dir.clone(),
                cfg.recording_extensions.clone(),
                CompletionDetector::new(cfg.completion.clone()),
            )))
        }
        SourceMode::Server { base_url } => Ok(Box::new(ServerScanner::new(
            base_url,
            cfg.http_timeout_secs,
            cfg.list_limit,
        ))),
    }
}

/// Recursive walk of a watch directory
pub struct FolderScanner<C = TokioClock, P = StdFileProbe> {
    root: PathBuf,
    extensions: Vec<String>,
    detector: CompletionDetector<C, P>,
}

impl<C: Clock, P: FileProbe> FolderScanner<C, P> {
    pub fn new(root: PathBuf, extensions: Vec<String>, detector: CompletionDetector<C, P>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        Self {
            root,
            extensions,
            detector,
        }
    }

    fn is_recording(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Walk the root and keep finished, non-temporary recordings
    pub async fn scan_folder(&self) -> ScanResult {
        let mut result = ScanResult::default();
        let mut files_checked = 0usize;

        info!("Scanning directory: {}", self.root.display());

        // Hidden entries below the root (.stversions/, .hidden.m2ts) are never recordings
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();

            // Skip directories
            if !path.is_file() || !self.is_recording(path) {
                continue;
            }
            files_checked += 1;

            let skip = if self.detector.is_temporary(path) {
                Some(SkipReason::TemporaryFile)
            } else if !self.detector.is_complete(path).await {
                Some(SkipReason::StillWriting)
            } else {
                None
            };
            if let Some(reason) = skip {
                debug!("Skipped {}: {}", path.display(), reason);
                result.skipped.push((path.to_path_buf(), reason));
                continue;
            }

            let identifier = entry.file_name().to_string_lossy().into_owned();
            debug!("Found finished recording: {}", path.display());
            result.candidates.push(RecordingCandidate {
                identifier,
                source_path: Some(path.to_path_buf()),
            });
        }

        info!(
            "Finished scanning {}: {} recordings checked, {} finished, {} skipped",
            self.root.display(),
            files_checked,
            result.candidates.len(),
            result.skipped.len()
        );
        result
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[async_trait]
impl<C: Clock, P: FileProbe> SourceScanner for FolderScanner<C, P> {
    async fn scan(&self) -> ScanResult {
        self.scan_folder().await
    }
}
