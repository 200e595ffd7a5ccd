pub mod error;
pub mod fs;
pub mod permission;
pub mod tags;
pub mod util;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::events::{DownloadEvent, EventHub};
use crate::music::api::SourceApi;
use crate::music::model::{DownloadOptions, Quality, SongDescriptor, TrackTags};
use crate::music::quality::{DownloadableQuality, downloadable_qualities};
use crate::music::store::ResourceStore;
use crate::resolve::{ResolveOptions, Resolver};

use error::DownloadError;
use fs::FileStore;
use permission::PermissionGate;
use tags::MetadataWriter;
use util::{
    build_track_path, file_extension_from_url, is_http_url, lyric_path_for, now_unix_ms, track_file_stem,
    with_stem_suffix,
};

const FALLBACK_FAILURE_MESSAGE: &str = "failed to obtain download link";

const AUDIO_EXTS: &[&str] = &["mp3", "flac", "ape", "wav", "m4a", "ogg", "aac", "opus"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedTrack {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric_path: Option<PathBuf>,
    pub quality: Quality,
    /// The song whose source actually served the audio.
    pub source_song: SongDescriptor,
    pub bytes: u64,
}

/// Downloads a song to disk: stream URL and cover through the resolver, then
/// audio, optional `.lrc`, and tags.
pub struct Downloader<A, S, F, M, P> {
    resolver: Arc<Resolver<A, S>>,
    files: Arc<F>,
    tagger: Arc<M>,
    permission: Arc<P>,
    events: Arc<EventHub>,
    dir: PathBuf,
    defaults: DownloadOptions,
}

impl<A, S, F, M, P> Downloader<A, S, F, M, P>
where
    A: SourceApi,
    S: ResourceStore,
    F: FileStore,
    M: MetadataWriter,
    P: PermissionGate,
{
    pub fn new(
        resolver: Arc<Resolver<A, S>>,
        files: Arc<F>,
        tagger: Arc<M>,
        permission: Arc<P>,
        events: Arc<EventHub>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            files,
            tagger,
            permission,
            events,
            dir: dir.into(),
            defaults: DownloadOptions::default(),
        }
    }

    /// Downloads into `cfg.download_dir` with `cfg.download` as the default options.
    pub fn from_config(
        resolver: Arc<Resolver<A, S>>,
        files: Arc<F>,
        tagger: Arc<M>,
        permission: Arc<P>,
        events: Arc<EventHub>,
        cfg: &ResolverConfig,
    ) -> Self {
        Self {
            defaults: cfg.download,
            ..Self::new(resolver, files, tagger, permission, events, cfg.download_dir.clone())
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_options(&self) -> &DownloadOptions {
        &self.defaults
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Qualities offered for an explicit download of `song`.
    pub fn qualities(&self, song: &SongDescriptor) -> Vec<DownloadableQuality> {
        downloadable_qualities(self.resolver.capabilities(), song)
    }

    /// Runs one download and reports the outcome on the event hub.
    ///
    /// `quality` overrides the selector; the file name carries the requested
    /// quality when given, otherwise the one the source served.
    pub async fn download(
        &self,
        song: &SongDescriptor,
        options: &DownloadOptions,
        quality: Option<Quality>,
    ) -> Result<DownloadedTrack, DownloadError> {
        self.events.emit(DownloadEvent::Started {
            song_id: song.id.clone(),
            name: song.name.clone(),
        });

        let res = self.run(song, options, quality).await;
        match &res {
            Ok(track) => {
                info!(song_id = %song.id, path = %track.path.display(), bytes = track.bytes, "download finished");
                self.events.emit(DownloadEvent::Succeeded {
                    song_id: song.id.clone(),
                    name: song.name.clone(),
                    path: track.path.to_string_lossy().into_owned(),
                });
            }
            Err(e) => {
                warn!(song_id = %song.id, error = %e, "download failed");
                let message = e.to_string();
                let message = if message.trim().is_empty() {
                    FALLBACK_FAILURE_MESSAGE.to_string()
                } else {
                    message
                };
                self.events.emit(DownloadEvent::Failed {
                    song_id: song.id.clone(),
                    name: song.name.clone(),
                    message,
                });
            }
        }
        res
    }

    /// [`Self::download`] with the configured default options.
    pub async fn download_default(
        &self,
        song: &SongDescriptor,
        quality: Option<Quality>,
    ) -> Result<DownloadedTrack, DownloadError> {
        self.download(song, &self.defaults, quality).await
    }

    async fn run(
        &self,
        song: &SongDescriptor,
        options: &DownloadOptions,
        quality: Option<Quality>,
    ) -> Result<DownloadedTrack, DownloadError> {
        if !options.enabled {
            return Err(DownloadError::Disabled);
        }

        let url_opts = ResolveOptions {
            quality,
            ..Default::default()
        };
        let pic_opts = ResolveOptions::default();
        let (url, pic) = futures_util::future::try_join(
            self.resolver.music_url(song, &url_opts),
            self.resolver.pic_url(song, &pic_opts),
        )
        .await?;

        if !self.permission.request_write_permission().await {
            return Err(DownloadError::PermissionDenied);
        }

        let file_quality = quality.unwrap_or(url.quality);
        let serving = &url.source_song;
        let stem = track_file_stem(&serving.name, &serving.singer, file_quality);
        let ext = file_extension_from_url(&url.url);
        let mut path = build_track_path(&self.dir, &stem, &ext);
        let mut lyric_path = lyric_path_for(&path);

        if self.files.exists(&path).await {
            if options.skip_if_exists {
                return Err(DownloadError::FileExists(path.to_string_lossy().into_owned()));
            }
            (path, lyric_path) = free_suffixed(self.files.as_ref(), &path, &lyric_path, now_unix_ms()).await;
            debug!(path = %path.display(), "target exists, writing under a new name");
        }

        let audio = self.files.fetch_to_file(&url.url, &path);
        let lyric = self.write_lyric(song, &lyric_path, options.write_lyric_file);
        let (audio, lyric_written) = futures_util::future::join(audio, lyric).await;
        let bytes = audio?;

        let tags = TrackTags {
            singer: song.singer.clone(),
            name: song.name.clone(),
            cover_url: Some(pic.url).filter(|u| is_http_url(u)),
            quality: Some(file_quality),
        };
        if let Err(e) = self.tagger.write_metadata(&path, &tags).await {
            warn!(path = %path.display(), error = %e, "metadata write failed");
        }

        Ok(DownloadedTrack {
            path,
            lyric_path: lyric_written.then_some(lyric_path),
            quality: file_quality,
            source_song: url.source_song,
            bytes,
        })
    }

    /// Best effort; returns whether a lyric file was written.
    async fn write_lyric(&self, song: &SongDescriptor, path: &Path, enabled: bool) -> bool {
        if !enabled {
            return false;
        }
        let lyric = match self.resolver.lyric_info(song, &ResolveOptions::default()).await {
            Ok(l) => l,
            Err(e) => {
                debug!(song_id = %song.id, error = %e, "no lyric for download");
                return false;
            }
        };
        match self.files.write_text(path, &lyric.lyric.lyric).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "lyric file write failed");
                false
            }
        }
    }

    /// Audio files in the download directory as local songs, named from their
    /// tags when present and from the file name otherwise.
    pub async fn list_downloads(&self) -> Result<Vec<SongDescriptor>, DownloadError> {
        let mut out = Vec::new();
        for path in self.files.list_dir(&self.dir).await? {
            let Some(ext) = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_ascii_lowercase())
                .filter(|e| AUDIO_EXTS.contains(&e.as_str()))
            else {
                continue;
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let tags = match self.tagger.read_metadata(&path).await {
                Ok(t) => t,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "unreadable tags");
                    TrackTags::default()
                }
            };
            let name = if tags.name.trim().is_empty() { stem.clone() } else { tags.name };
            out.push(SongDescriptor::local(
                stem,
                name,
                tags.singer,
                path.to_string_lossy().into_owned(),
                ext,
            ));
        }
        Ok(out)
    }
}

/// First `_{n}` suffix, counting up from `start`, free for both the audio and
/// the lyric file.
async fn free_suffixed<F: FileStore>(files: &F, path: &Path, lyric: &Path, start: u64) -> (PathBuf, PathBuf) {
    let mut n = start;
    loop {
        let suffix = n.to_string();
        let audio = with_stem_suffix(path, &suffix);
        let lrc = with_stem_suffix(lyric, &suffix);
        if !files.exists(&audio).await && !files.exists(&lrc).await {
            return (audio, lrc);
        }
        n += 1;
    }
}
