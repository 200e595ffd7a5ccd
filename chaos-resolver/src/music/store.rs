use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use hashlink::LinkedHashMap;

use super::error::StoreError;
use crate::config::ResolverConfig;
use super::model::{LyricInfo, Quality, SongDescriptor};

/// Persisted resource cache. The storage format belongs to the host.
pub trait ResourceStore: Send + Sync + 'static {
    /// Alternate-source list saved for `song_id`; empty when unknown.
    fn alternates(&self, song_id: &str) -> impl Future<Output = Vec<SongDescriptor>> + Send;

    fn save_alternates(
        &self,
        song_id: &str,
        list: &[SongDescriptor],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn cached_url(
        &self,
        song: &SongDescriptor,
        quality: Quality,
    ) -> impl Future<Output = Option<String>> + Send;

    fn save_url(
        &self,
        song: &SongDescriptor,
        quality: Quality,
        url: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn cached_lyric(&self, song: &SongDescriptor) -> impl Future<Output = Option<LyricInfo>> + Send;

    fn save_lyric(
        &self,
        song: &SongDescriptor,
        lyric: &LyricInfo,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Insertion/access ordered map that evicts the least recently used entry.
#[derive(Debug)]
pub struct LruMap<K, V> {
    max_entries: usize,
    map: LinkedHashMap<K, V>,
}

impl<K: Eq + Hash, V> LruMap<K, V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            map: LinkedHashMap::new(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V>
    where
        K: Clone,
        V: Clone,
    {
        let v = self.map.remove(key)?;
        let out = v.clone();
        self.map.insert(key.clone(), v);
        Some(out)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.remove(&key);
        self.map.insert(key, value);
        while self.map.len() > self.max_entries {
            if self.map.pop_front().is_none() {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[derive(Debug)]
struct MemoryInner {
    alternates: LruMap<String, Vec<SongDescriptor>>,
    urls: LruMap<String, String>,
    lyrics: LruMap<String, LyricInfo>,
}

/// In-process [`ResourceStore`] for hosts without persistence (and for tests).
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

fn song_key(song: &SongDescriptor) -> String {
    format!("{}_{}", song.source, song.id)
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                alternates: LruMap::new(max_entries),
                urls: LruMap::new(max_entries),
                lyrics: LruMap::new(max_entries),
            }),
        }
    }

    /// Sized by `memory_cache_entries`.
    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self::new(cfg.memory_cache_entries)
    }

    fn with<R>(&self, f: impl FnOnce(&mut MemoryInner) -> R) -> R {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    pub fn clear(&self) {
        self.with(|s| {
            s.alternates.clear();
            s.urls.clear();
            s.lyrics.clear();
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(512)
    }
}

impl ResourceStore for MemoryStore {
    async fn alternates(&self, song_id: &str) -> Vec<SongDescriptor> {
        let key = song_id.to_string();
        self.with(|s| s.alternates.get(&key)).unwrap_or_default()
    }

    async fn save_alternates(&self, song_id: &str, list: &[SongDescriptor]) -> Result<(), StoreError> {
        let list = list.to_vec();
        self.with(|s| s.alternates.insert(song_id.to_string(), list));
        Ok(())
    }

    async fn cached_url(&self, song: &SongDescriptor, quality: Quality) -> Option<String> {
        let key = format!("{}_{quality}", song_key(song));
        self.with(|s| s.urls.get(&key))
    }

    async fn save_url(&self, song: &SongDescriptor, quality: Quality, url: &str) -> Result<(), StoreError> {
        let key = format!("{}_{quality}", song_key(song));
        self.with(|s| s.urls.insert(key, url.to_string()));
        Ok(())
    }

    async fn cached_lyric(&self, song: &SongDescriptor) -> Option<LyricInfo> {
        let key = song_key(song);
        self.with(|s| s.lyrics.get(&key))
    }

    async fn save_lyric(&self, song: &SongDescriptor, lyric: &LyricInfo) -> Result<(), StoreError> {
        let key = song_key(song);
        let lyric = lyric.clone();
        self.with(|s| s.lyrics.insert(key, lyric));
        Ok(())
    }
}
