#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chaos_resolver::ResolverConfig;
use chaos_resolver::download::error::DownloadError;
use chaos_resolver::download::fs::FileStore;
use chaos_resolver::download::permission::PermissionGate;
use chaos_resolver::download::tags::MetadataWriter;
use chaos_resolver::music::api::SourceApi;
use chaos_resolver::music::capability::CapabilityTable;
use chaos_resolver::music::error::SourceError;
use chaos_resolver::music::model::{LyricInfo, MusicUrl, Quality, SearchQuery, SongDescriptor, TrackTags};
use chaos_resolver::music::store::MemoryStore;
use chaos_resolver::resolve::Resolver;

pub fn song(source: &str, id: &str) -> SongDescriptor {
    SongDescriptor::online(source, id, "Song", "Singer")
        .with_quality(Quality::K128, Some("3.2M"))
        .with_quality(Quality::K320, Some("8.1M"))
}

pub fn caps() -> Arc<CapabilityTable> {
    Arc::new(CapabilityTable::from_entries([
        ("kw", vec![Quality::K128, Quality::K320]),
        ("kg", vec![Quality::K128, Quality::K320]),
        ("tx", vec![Quality::K128, Quality::K320, Quality::Flac]),
    ]))
}

/// Scripted provider layer. Sources without a script answer `Unsupported`.
#[derive(Default)]
pub struct FakeApi {
    urls: Mutex<HashMap<String, Result<String, SourceError>>>,
    pics: Mutex<HashMap<String, Result<String, SourceError>>>,
    lyrics: Mutex<HashMap<String, Result<LyricInfo, SourceError>>>,
    search_result: Mutex<Option<Result<Vec<SongDescriptor>, SourceError>>>,
    search_delay: Mutex<Duration>,
    search_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(self, source: &str, res: Result<&str, SourceError>) -> Self {
        self.urls.lock().unwrap().insert(source.to_string(), res.map(str::to_string));
        self
    }

    pub fn pic(self, source: &str, res: Result<&str, SourceError>) -> Self {
        self.pics.lock().unwrap().insert(source.to_string(), res.map(str::to_string));
        self
    }

    pub fn lyric(self, source: &str, res: Result<LyricInfo, SourceError>) -> Self {
        self.lyrics.lock().unwrap().insert(source.to_string(), res);
        self
    }

    pub fn search(self, res: Result<Vec<SongDescriptor>, SourceError>) -> Self {
        self.set_search(res);
        self
    }

    pub fn set_search(&self, res: Result<Vec<SongDescriptor>, SourceError>) {
        *self.search_result.lock().unwrap() = Some(res);
    }

    pub fn set_search_delay(&self, d: Duration) {
        *self.search_delay.lock().unwrap() = d;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// `"{kind}:{source}"`, plus `":{quality}"` for url requests.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unsupported<T>(source: &str) -> Result<T, SourceError> {
    Err(SourceError::Unsupported(source.to_string()))
}

impl SourceApi for FakeApi {
    async fn music_url(&self, song: &SongDescriptor, quality: Quality) -> Result<MusicUrl, SourceError> {
        self.record(format!("url:{}:{quality}", song.source));
        let res = self.urls.lock().unwrap().get(&song.source).cloned();
        let url = res.unwrap_or_else(|| unsupported(&song.source))?;
        Ok(MusicUrl { url, quality })
    }

    async fn pic_url(&self, song: &SongDescriptor) -> Result<String, SourceError> {
        self.record(format!("pic:{}", song.source));
        let res = self.pics.lock().unwrap().get(&song.source).cloned();
        res.unwrap_or_else(|| unsupported(&song.source))
    }

    async fn lyric(&self, song: &SongDescriptor) -> Result<LyricInfo, SourceError> {
        self.record(format!("lyric:{}", song.source));
        let res = self.lyrics.lock().unwrap().get(&song.source).cloned();
        res.unwrap_or_else(|| unsupported(&song.source))
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SongDescriptor>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.search_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let res = self.search_result.lock().unwrap().clone();
        res.unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn resolver(api: FakeApi) -> (Arc<FakeApi>, Arc<MemoryStore>, Resolver<FakeApi, MemoryStore>) {
    let api = Arc::new(api);
    let cfg = ResolverConfig::default();
    let store = Arc::new(MemoryStore::from_config(&cfg));
    let r = Resolver::new(Arc::clone(&api), Arc::clone(&store), caps(), &cfg);
    (api, store, r)
}

/// In-memory filesystem.
#[derive(Default)]
pub struct FakeFiles {
    pub existing: Mutex<HashSet<PathBuf>>,
    pub texts: Mutex<HashMap<PathBuf, String>>,
    pub fetched: Mutex<Vec<(String, PathBuf)>>,
    pub fail_fetch: Mutex<bool>,
}

impl FakeFiles {
    pub fn with_existing(path: impl Into<PathBuf>) -> Self {
        let f = Self::default();
        f.existing.lock().unwrap().insert(path.into());
        f
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn text(&self, path: &Path) -> Option<String> {
        self.texts.lock().unwrap().get(path).cloned()
    }
}

impl FileStore for FakeFiles {
    async fn exists(&self, path: &Path) -> bool {
        self.existing.lock().unwrap().contains(path)
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<(), DownloadError> {
        self.texts.lock().unwrap().insert(path.to_path_buf(), text.to_string());
        self.existing.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }

    async fn fetch_to_file(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(DownloadError::Status(403));
        }
        self.fetched.lock().unwrap().push((url.to_string(), path.to_path_buf()));
        self.existing.lock().unwrap().insert(path.to_path_buf());
        Ok(1024)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), DownloadError> {
        let mut g = self.existing.lock().unwrap();
        g.remove(from);
        g.insert(to.to_path_buf());
        Ok(())
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
        let g = self.existing.lock().unwrap();
        let mut out: Vec<PathBuf> = g.iter().filter(|p| p.parent() == Some(dir)).cloned().collect();
        out.sort();
        Ok(out)
    }
}

#[derive(Default)]
pub struct FakeTagger {
    pub written: Mutex<Vec<(PathBuf, TrackTags)>>,
    pub stored: Mutex<HashMap<PathBuf, TrackTags>>,
    pub fail: Mutex<bool>,
}

impl FakeTagger {
    pub fn written(&self) -> Vec<(PathBuf, TrackTags)> {
        self.written.lock().unwrap().clone()
    }
}

impl MetadataWriter for FakeTagger {
    async fn write_metadata(&self, path: &Path, tags: &TrackTags) -> Result<(), DownloadError> {
        if *self.fail.lock().unwrap() {
            return Err(DownloadError::MetadataWriteFailed("read-only".to_string()));
        }
        self.written.lock().unwrap().push((path.to_path_buf(), tags.clone()));
        self.stored.lock().unwrap().insert(path.to_path_buf(), tags.clone());
        Ok(())
    }

    async fn read_metadata(&self, path: &Path) -> Result<TrackTags, DownloadError> {
        self.stored
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| DownloadError::MetadataReadFailed("no tags".to_string()))
    }
}

pub struct DenyAll;

impl PermissionGate for DenyAll {
    async fn request_write_permission(&self) -> bool {
        false
    }
}
