use thiserror::Error;

use crate::resolve::error::ResolveError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download is disabled")]
    Disabled,
    #[error("write permission denied")]
    PermissionDenied,
    #[error("file already exists: {0}")]
    FileExists(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata write failed: {0}")]
    MetadataWriteFailed(String),
    #[error("metadata read failed: {0}")]
    MetadataReadFailed(String),
    #[error("other error: {0}")]
    Other(String),
}
