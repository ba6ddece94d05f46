pub mod config;
pub mod store;
pub mod completion;
pub mod scan;
pub mod server;
pub mod reconcile;

pub use config::{SourceMode, WatchConfig};
pub use store::{MarkOutcome, ProcessedSet, ProcessedStore, StoreError};
pub use completion::{CompletionDetector, CompletionPolicy};
pub use scan::{scanner_for, FolderScanner, RecordingCandidate, ScanResult, SkipReason, SourceScanner};
pub use server::ServerScanner;
pub use reconcile::{reconcile, unprocessed, ReconcileError};
