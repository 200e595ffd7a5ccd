use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::Tag;
use reqwest::Client;
use tracing::warn;

use super::error::DownloadError;
use super::util::is_http_url;
use crate::music::model::{Quality, TrackTags};

/// Reads and writes embedded tags of downloaded files.
pub trait MetadataWriter: Send + Sync + 'static {
    fn write_metadata(&self, path: &Path, tags: &TrackTags) -> impl Future<Output = Result<(), DownloadError>> + Send;

    fn read_metadata(&self, path: &Path) -> impl Future<Output = Result<TrackTags, DownloadError>> + Send;
}

/// [`MetadataWriter`] backed by `lofty`. The cover is downloaded and embedded
/// as the front cover; the quality goes into the comment field.
#[derive(Debug, Clone)]
pub struct LoftyTagger {
    http: Client,
    timeout: Duration,
}

impl LoftyTagger {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn fetch_cover(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let resp = self.http.get(url).timeout(self.timeout).send().await?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(DownloadError::Status(status));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn write_tags_blocking(path: &Path, tags: &TrackTags, cover: Option<Vec<u8>>) -> Result<(), String> {
    let mut tagged_file = read_from_path(path).map_err(|e| format!("failed to read tags: {e}"))?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| format!("no writable tag available for {tag_type:?}"))?;

    if !tags.name.trim().is_empty() {
        tag.set_title(tags.name.trim().to_string());
    }
    if !tags.singer.trim().is_empty() {
        tag.set_artist(tags.singer.trim().to_string());
    }
    if let Some(q) = tags.quality {
        tag.set_comment(q.as_str().to_string());
    }
    if let Some(data) = cover {
        let mut pic = Picture::from_reader(&mut Cursor::new(data)).map_err(|e| format!("bad cover image: {e}"))?;
        pic.set_pic_type(PictureType::CoverFront);
        tag.push_picture(pic);
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| format!("failed to write tags: {e}"))
}

fn read_tags_blocking(path: &Path) -> Result<TrackTags, String> {
    let tagged_file = read_from_path(path).map_err(|e| format!("failed to read tags: {e}"))?;
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(TrackTags::default());
    };
    Ok(TrackTags {
        singer: tag.artist().map(|s| s.to_string()).unwrap_or_default(),
        name: tag.title().map(|s| s.to_string()).unwrap_or_default(),
        cover_url: None,
        quality: tag.comment().and_then(|s| s.parse::<Quality>().ok()),
    })
}

impl MetadataWriter for LoftyTagger {
    async fn write_metadata(&self, path: &Path, tags: &TrackTags) -> Result<(), DownloadError> {
        let cover = match tags.cover_url.as_deref().filter(|u| is_http_url(u)) {
            Some(url) => match self.fetch_cover(url).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(url = %url, error = %e, "cover download failed, tagging without it");
                    None
                }
            },
            None => None,
        };

        let path: PathBuf = path.to_path_buf();
        let tags = tags.clone();
        tokio::task::spawn_blocking(move || write_tags_blocking(&path, &tags, cover))
            .await
            .map_err(|e| DownloadError::Other(format!("tag task failed: {e}")))?
            .map_err(DownloadError::MetadataWriteFailed)
    }

    async fn read_metadata(&self, path: &Path) -> Result<TrackTags, DownloadError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_tags_blocking(&path))
            .await
            .map_err(|e| DownloadError::Other(format!("tag task failed: {e}")))?
            .map_err(DownloadError::MetadataReadFailed)
    }
}
