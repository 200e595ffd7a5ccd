use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source id used for files that live on disk rather than behind a provider.
pub const LOCAL_SOURCE: &str = "local";

/// Audio fidelity tiers a provider may offer.
///
/// The derived ordering only keeps maps stable; it is not a fidelity ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "128k")]
    K128,
    #[serde(rename = "192k")]
    K192,
    #[serde(rename = "320k")]
    K320,
    #[serde(rename = "flac")]
    Flac,
    #[serde(rename = "ape")]
    Ape,
    #[serde(rename = "wav")]
    Wav,
    #[serde(rename = "flac24bit")]
    Flac24bit,
}

impl Quality {
    pub const ALL: [Quality; 7] = [
        Self::K128,
        Self::K192,
        Self::K320,
        Self::Flac,
        Self::Ape,
        Self::Wav,
        Self::Flac24bit,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::K128 => "128k",
            Self::K192 => "192k",
            Self::K320 => "320k",
            Self::Flac => "flac",
            Self::Ape => "ape",
            Self::Wav => "wav",
            Self::Flac24bit => "flac24bit",
        }
    }

    pub const fn is_lossless(self) -> bool {
        matches!(self, Self::Flac | Self::Ape | Self::Wav | Self::Flac24bit)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == v)
            .ok_or_else(|| format!("unknown quality: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInfo {
    #[serde(rename = "type")]
    pub quality: Quality,
    /// Human readable size hint from the provider (e.g. "9.2M").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeta {
    #[serde(default)]
    pub qualitys: Vec<QualityInfo>,
    /// Availability flags keyed by quality, as reported by the provider.
    #[serde(default, rename = "_qualitys")]
    pub quality_flags: BTreeMap<Quality, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMeta {
    pub file_path: String,
    pub ext: String,
    /// The online song this file was downloaded from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Box<SongDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SongMeta {
    Online(OnlineMeta),
    Local(LocalMeta),
}

/// Identity of one song on one source. Treated as read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDescriptor {
    pub id: String,
    pub name: String,
    pub singer: String,
    #[serde(default)]
    pub album_name: String,
    /// Duration label such as "03:45".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    pub source: String,
    pub meta: SongMeta,
}

impl SongDescriptor {
    pub fn online(
        source: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        singer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            singer: singer.into(),
            album_name: String::new(),
            interval: None,
            source: source.into(),
            meta: SongMeta::Online(OnlineMeta::default()),
        }
    }

    pub fn local(
        id: impl Into<String>,
        name: impl Into<String>,
        singer: impl Into<String>,
        file_path: impl Into<String>,
        ext: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            singer: singer.into(),
            album_name: String::new(),
            interval: None,
            source: LOCAL_SOURCE.to_string(),
            meta: SongMeta::Local(LocalMeta {
                file_path: file_path.into(),
                ext: ext.into(),
                origin: None,
            }),
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = album.into();
        self
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    /// Marks `quality` as available. No-op for local songs.
    pub fn with_quality(mut self, quality: Quality, size: Option<&str>) -> Self {
        if let SongMeta::Online(meta) = &mut self.meta {
            meta.quality_flags.insert(quality, true);
            meta.qualitys.retain(|q| q.quality != quality);
            meta.qualitys.push(QualityInfo {
                quality,
                size: size.map(|s| s.to_string()),
            });
        }
        self
    }

    pub fn with_pic_url(mut self, url: impl Into<String>) -> Self {
        if let SongMeta::Online(meta) = &mut self.meta {
            meta.pic_url = Some(url.into());
        }
        self
    }

    pub fn with_origin(mut self, origin: SongDescriptor) -> Self {
        if let SongMeta::Local(meta) = &mut self.meta {
            meta.origin = Some(Box::new(origin));
        }
        self
    }

    pub fn is_local(&self) -> bool {
        matches!(self.meta, SongMeta::Local(_))
    }

    pub fn online_meta(&self) -> Option<&OnlineMeta> {
        match &self.meta {
            SongMeta::Online(m) => Some(m),
            SongMeta::Local(_) => None,
        }
    }

    pub fn has_quality(&self, quality: Quality) -> bool {
        self.online_meta()
            .and_then(|m| m.quality_flags.get(&quality).copied())
            .unwrap_or(false)
    }

    pub fn pic_url(&self) -> Option<&str> {
        self.online_meta()
            .and_then(|m| m.pic_url.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Key under which alternate-source discovery is deduplicated.
    ///
    /// Local files are namespaced so they never collide with a remote song that
    /// happens to share the same id.
    pub fn discovery_key(&self) -> String {
        if self.is_local() {
            format!("{LOCAL_SOURCE}_{}", self.id)
        } else {
            format!("{}_{}", self.source, self.id)
        }
    }

    /// Normalized search input used to look the song up on other sources.
    pub fn search_query(&self) -> SearchQuery {
        let basis = match &self.meta {
            SongMeta::Local(LocalMeta {
                origin: Some(origin),
                ..
            }) => origin.as_ref(),
            _ => self,
        };
        SearchQuery {
            name: basis.name.trim().to_string(),
            singer: basis.singer.trim().to_string(),
            source: basis.source.clone(),
            album_name: basis.album_name.trim().to_string(),
            interval: basis.interval.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub name: String,
    pub singer: String,
    pub source: String,
    pub album_name: String,
    pub interval: String,
}

/// Stream URL as returned by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicUrl {
    pub url: String,
    #[serde(rename = "type")]
    pub quality: Quality,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricInfo {
    pub lyric: String,
    /// Translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlyric: Option<String>,
    /// Romanization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rlyric: Option<String>,
    /// Word-level timed lyric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lxlyric: Option<String>,
}

impl LyricInfo {
    pub fn new(lyric: impl Into<String>) -> Self {
        Self {
            lyric: lyric.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUrl {
    pub url: String,
    pub source_song: SongDescriptor,
    pub quality: Quality,
    pub served_from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPic {
    pub url: String,
    pub source_song: SongDescriptor,
    pub served_from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLyric {
    pub lyric: LyricInfo,
    pub source_song: SongDescriptor,
    pub served_from_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOptions {
    #[serde(default)]
    pub write_lyric_file: bool,
    #[serde(default)]
    pub skip_if_exists: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            write_lyric_file: false,
            skip_if_exists: false,
            enabled: default_enabled(),
        }
    }
}

/// Tags written to (and read back from) a downloaded audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTags {
    pub singer: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_serde_uses_provider_names() {
        let v = serde_json::to_value(Quality::Flac24bit).unwrap();
        assert_eq!(v, serde_json::json!("flac24bit"));
        let q: Quality = serde_json::from_value(serde_json::json!("320k")).unwrap();
        assert_eq!(q, Quality::K320);
        assert_eq!("FLAC".parse::<Quality>().unwrap(), Quality::Flac);
        assert!("999k".parse::<Quality>().is_err());
    }

    #[test]
    fn discovery_key_namespaces_local_songs() {
        let online = SongDescriptor::online("kw", "42", "Song", "Singer");
        let local = SongDescriptor::local("42", "Song", "Singer", "/music/a.mp3", "mp3");
        assert_eq!(online.discovery_key(), "kw_42");
        assert_eq!(local.discovery_key(), "local_42");
    }

    #[test]
    fn local_search_query_prefers_origin() {
        let origin = SongDescriptor::online("tx", "9", "Origin", "Artist")
            .with_album("Album")
            .with_interval("03:21");
        let local = SongDescriptor::local("f1", "file name", "", "/m/f1.flac", "flac")
            .with_origin(origin);
        let q = local.search_query();
        assert_eq!(q.name, "Origin");
        assert_eq!(q.source, "tx");
        assert_eq!(q.album_name, "Album");
        assert_eq!(q.interval, "03:21");
    }

    #[test]
    fn online_meta_deserializes_capability_map() {
        let song: SongDescriptor = serde_json::from_value(serde_json::json!({
            "id": "1",
            "name": "n",
            "singer": "s",
            "source": "kg",
            "meta": {
                "kind": "online",
                "qualitys": [{ "type": "128k", "size": "3.1M" }],
                "_qualitys": { "128k": true, "320k": false },
                "picUrl": "http://img/1.jpg"
            }
        }))
        .unwrap();
        assert!(song.has_quality(Quality::K128));
        assert!(!song.has_quality(Quality::K320));
        assert!(!song.has_quality(Quality::Flac));
        assert_eq!(song.pic_url(), Some("http://img/1.jpg"));
    }
}
