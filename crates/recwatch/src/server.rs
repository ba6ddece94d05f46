use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;

use crate::scan::{RecordingCandidate, ScanResult, SourceScanner};

/// Response of `GET /api/recorded`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordedList {
    #[serde(default)]
    pub records: Vec<RecordedItem>,
}

/// One recorded programme
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordedItem {
    #[serde(rename = "videoFiles", default)]
    pub video_files: Vec<VideoFile>,
}

/// One encoded or raw file attached to a recording
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoFile {
    pub id: Option<u64>,
    pub filename: Option<String>,
}

impl RecordedList {
    /// Filenames in response order; files without a filename are dropped
    pub fn filenames(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| r.video_files.iter())
            .filter_map(|v| match &v.filename {
                Some(name) => Some(name.clone()),
                None => {
                    debug!("Skipping video file without filename (id {:?})", v.id);
                    None
                }
            })
            .collect()
    }
}

/// Lists finished recordings from the recording server.
///
/// The server only reports finished files, so no completion check applies.
pub struct ServerScanner {
    client: Client,
    base_url: String,
    timeout: Duration,
    limit: u32,
}

impl ServerScanner {
    pub fn new(base_url: &str, timeout_secs: u64, limit: u32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            limit,
        }
    }

    pub fn recorded_url(&self) -> String {
        format!("{}/api/recorded", self.base_url)
    }

    /// Fetch the recorded list, propagating transport, status and decode errors
    pub async fn fetch_recorded(&self) -> Result<RecordedList> {
        let url = self.recorded_url();
        let limit = self.limit.to_string();
        debug!("GET {} (limit {})", url, limit);

        let resp = self
            .client
            .get(&url)
            .query(&[("isHalfWidth", "false"), ("offset", "0"), ("limit", limit.as_str())])
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to reach recording server: {}", url))?
            .error_for_status()
            .with_context(|| format!("Recording server returned an error: {}", url))?;

        resp.json::<RecordedList>()
            .await
            .with_context(|| format!("Failed to parse recorded list from {}", url))
    }
}

#[async_trait]
impl SourceScanner for ServerScanner {
    async fn scan(&self) -> ScanResult {
        match self.fetch_recorded().await {
            Ok(list) => {
                let candidates: Vec<_> = list
                    .filenames()
                    .into_iter()
                    .map(RecordingCandidate::from_server)
                    .collect();
                info!(
                    "Recording server reported {} records, {} files",
                    list.records.len(),
                    candidates.len()
                );
                ScanResult {
                    candidates,
                    skipped: Vec::new(),
                }
            }
            Err(e) => {
                error!("Error fetching recorded programs: {:#}", e);
                ScanResult::default()
            }
        }
    }
}
