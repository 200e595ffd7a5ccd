use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::DownloadError;
use crate::config::ResolverConfig;

/// Filesystem side of a download.
pub trait FileStore: Send + Sync + 'static {
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn write_text(&self, path: &Path, text: &str) -> impl Future<Output = Result<(), DownloadError>> + Send;

    /// Downloads `url` into `path`, returning the number of bytes written.
    fn fetch_to_file(&self, url: &str, path: &Path) -> impl Future<Output = Result<u64, DownloadError>> + Send;

    fn rename(&self, from: &Path, to: &Path) -> impl Future<Output = Result<(), DownloadError>> + Send;

    /// Regular files directly inside `dir`; a missing directory is empty.
    fn list_dir(&self, dir: &Path) -> impl Future<Output = Result<Vec<PathBuf>, DownloadError>> + Send;
}

/// [`FileStore`] over the local disk, fetching with `reqwest`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    http: Client,
    timeout: Duration,
    retries: u32,
}

impl LocalFileStore {
    pub fn new(cfg: &ResolverConfig) -> Result<Self, DownloadError> {
        let http = Client::builder()
            .user_agent("chaos-resolver/0.1")
            .timeout(cfg.http_timeout())
            .build()?;
        Ok(Self::with_client(http, cfg))
    }

    pub fn with_client(http: Client, cfg: &ResolverConfig) -> Self {
        Self {
            http,
            timeout: cfg.http_timeout(),
            retries: cfg.retries,
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }
}

/// Pause before retry `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(match attempt {
        0 | 1 => 200,
        2 => 500,
        _ => 1200,
    })
}

async fn discard(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %tmp.display(), error = %e, "could not remove partial download");
        }
    }
}

impl LocalFileStore {
    /// Streams one response body into `tmp`. On error `tmp` may hold a partial body.
    async fn fetch_once(&self, url: &str, tmp: &Path) -> Result<u64, DownloadError> {
        let resp = self.http.get(url).timeout(self.timeout).send().await?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(DownloadError::Status(status));
        }

        let mut body = resp.bytes_stream();
        let mut out = tokio::fs::File::create(tmp).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk: Bytes = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

fn part_path(p: &Path) -> PathBuf {
    p.with_extension(format!(
        "{}.part",
        p.extension().and_then(|s| s.to_str()).unwrap_or_default()
    ))
}

impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<(), DownloadError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text.as_bytes()).await?;
        Ok(())
    }

    async fn fetch_to_file(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        if path.as_os_str().is_empty() {
            return Err(DownloadError::Other("empty out_path".to_string()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = part_path(path);
        let mut last_err: Option<DownloadError> = None;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }
            match self.fetch_once(url, &tmp).await {
                Ok(written) => {
                    if tokio::fs::try_exists(path).await.unwrap_or(false) {
                        tokio::fs::remove_file(path).await?;
                    }
                    if let Err(e) = tokio::fs::rename(&tmp, path).await {
                        discard(&tmp).await;
                        return Err(e.into());
                    }
                    return Ok(written);
                }
                Err(e) => {
                    debug!(attempt, url = %url, error = %e, "download attempt failed");
                    discard(&tmp).await;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DownloadError::Other("download failed".to_string())))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), DownloadError> {
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
        let mut rd = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            if entry.file_type().await?.is_file() {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }
}
