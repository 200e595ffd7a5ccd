use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::music::model::DownloadOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    #[serde(default)]
    pub prefer_high_quality: bool,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default)]
    pub download: DownloadOptions,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Entry cap for each map of the in-process resource store.
    #[serde(default = "default_memory_cache_entries")]
    pub memory_cache_entries: usize,
}

const fn default_discovery_timeout_ms() -> u64 {
    20_000
}
const fn default_http_timeout_ms() -> u64 {
    15_000
}
const fn default_retries() -> u32 {
    2
}
const fn default_memory_cache_entries() -> usize {
    512
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout_ms(),
            prefer_high_quality: false,
            download_dir: default_download_dir(),
            download: DownloadOptions::default(),
            http_timeout_ms: default_http_timeout_ms(),
            retries: default_retries(),
            memory_cache_entries: default_memory_cache_entries(),
        }
    }
}

impl ResolverConfig {
    /// Parses settings persisted by the host. Missing fields take defaults.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
