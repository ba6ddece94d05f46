use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::config::WatchConfig;
use crate::scan::{scanner_for, RecordingCandidate, SourceScanner};
use crate::store::{ProcessedSet, ProcessedStore};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Watch folder '{}' does not exist.", .0.display())]
    WatchDirMissing(PathBuf),
}

/// Candidates not yet in `processed`, first occurrence only, scan order kept
pub fn diff(candidates: &[RecordingCandidate], processed: &ProcessedSet) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|c| c.identifier.as_str())
        .filter(|id| !processed.contains(*id))
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Load the store, scan, and return identifiers still to be processed.
/// Never mutates the store.
pub async fn unprocessed(store: &ProcessedStore, scanner: &dyn SourceScanner) -> Vec<String> {
    let processed = store.load();
    scan_and_diff(&processed, scanner).await
}

/// Full run for a configuration: store under `work_dir`, scanner by source mode.
///
/// The store is loaded (and created if absent) before the source is checked.
pub async fn reconcile(cfg: &WatchConfig) -> Result<Vec<String>, ReconcileError> {
    let store = ProcessedStore::new(cfg.processed_store_path());
    let processed = store.load();
    let scanner = scanner_for(cfg)?;
    Ok(scan_and_diff(&processed, scanner.as_ref()).await)
}

async fn scan_and_diff(processed: &ProcessedSet, scanner: &dyn SourceScanner) -> Vec<String> {
    debug!("{} identifiers already processed", processed.len());

    let result = scanner.scan().await;
    let pending = diff(&result.candidates, processed);

    info!(
        "{} candidates, {} skipped, {} not yet processed",
        result.candidates.len(),
        result.skipped.len(),
        pending.len()
    );
    pending
}
