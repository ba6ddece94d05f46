use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::completion::CompletionPolicy;

/// File name of the processed-set document inside the work directory
pub const PROCESSED_FILE_NAME: &str = "processed_filenames.json";

/// Recording server used when no watch folder is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8888";

/// Where candidate recordings come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceMode {
    /// Recursively walk a local directory
    Folder { watch_dir: PathBuf },
    /// Ask a recording server for its finished recordings
    Server { base_url: String },
}

impl Default for SourceMode {
    fn default() -> Self {
        SourceMode::Server {
            base_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

/// Configuration for a single reconcile or mark-processed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory holding processed_filenames.json
    pub work_dir: PathBuf,
    /// Scan strategy
    pub source: SourceMode,
    /// Recording file extensions picked up in folder mode (case-insensitive, no dot)
    pub recording_extensions: Vec<String>,
    /// Finished-write heuristic used in folder mode
    pub completion: CompletionPolicy,
    /// Timeout for the recording server request
    pub http_timeout_secs: u64,
    /// Page size requested from the recording server
    pub list_limit: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl WatchConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            work_dir: default_work_dir(),
            source: SourceMode::default(),
            recording_extensions: vec!["m2ts".to_string()],
            completion: CompletionPolicy::default(),
            http_timeout_secs: 5,
            list_limit: 1000,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Overlay WORKDIR, WATCHDIR and EPGSTATION_URL.
    ///
    /// A non-blank WATCHDIR selects folder mode; a blank one selects server mode.
    /// EPGSTATION_URL only matters once server mode is in effect.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(work_dir) = lookup("WORKDIR").filter(|v| !v.trim().is_empty()) {
            self.work_dir = PathBuf::from(work_dir);
        }

        let server_url = lookup("EPGSTATION_URL").filter(|v| !v.trim().is_empty());

        match lookup("WATCHDIR").map(|v| v.trim().to_string()) {
            Some(dir) if !dir.is_empty() => {
                self.source = SourceMode::Folder {
                    watch_dir: PathBuf::from(dir),
                };
            }
            Some(_) => {
                if !matches!(self.source, SourceMode::Server { .. }) {
                    self.source = SourceMode::default();
                }
            }
            None => {}
        }

        if let (SourceMode::Server { base_url }, Some(url)) = (&mut self.source, server_url) {
            *base_url = url;
        }
    }

    /// Full path of the processed-set document
    pub fn processed_store_path(&self) -> PathBuf {
        self.work_dir.join(PROCESSED_FILE_NAME)
    }
}

fn default_work_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("work")
}
