use std::future::Future;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::music::model::LyricInfo;

/// Sources whose lyrics are expected to carry a romanization track.
const ROMANIZED_SOURCES: &[&str] = &["wy", "kg"];

fn time_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The fraction is optional: `[1:02]` counts as a timestamp too.
    RE.get_or_init(|| Regex::new(r"\[\d{1,2}:\d{1,2}(?:[.:]\d{1,4})?\]").expect("time tag regex"))
}

/// True when `lyric` contains at least one LRC timestamp such as `[01:02.34]`.
///
/// Providers sometimes answer with a placeholder ("no lyrics yet") instead of an
/// error; those payloads have no timestamps.
pub fn has_time_tag(lyric: &str) -> bool {
    time_tag_re().is_match(lyric)
}

/// Whether a lyric read back from the resource store is complete enough to be
/// served without refetching.
pub fn is_cached_lyric_usable(source: &str, info: &LyricInfo) -> bool {
    if !has_time_tag(&info.lyric) || info.tlyric.is_none() {
        return false;
    }
    info.rlyric.is_some() || !ROMANIZED_SOURCES.contains(&source)
}

/// External simplified-to-traditional converter.
pub trait TextConverter: Send + Sync {
    fn convert(&self, text: &str) -> impl Future<Output = String> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLyricInfo {
    pub lyric: String,
    pub tlyric: String,
    pub rlyric: String,
    pub lxlyric: String,
    /// Unconverted copy, kept for re-rendering when the setting changes.
    pub raw: LyricInfo,
}

async fn convert_field<C: TextConverter>(converter: &C, field: Option<&str>) -> String {
    match field {
        Some(s) if !s.is_empty() => converter.convert(s).await,
        _ => String::new(),
    }
}

/// Builds the lyric shown by the player, converting every track when a
/// converter is supplied.
pub async fn build_lyric_info<C: TextConverter>(info: LyricInfo, converter: Option<&C>) -> PlayerLyricInfo {
    let Some(c) = converter else {
        return PlayerLyricInfo {
            lyric: info.lyric.clone(),
            tlyric: info.tlyric.clone().unwrap_or_default(),
            rlyric: info.rlyric.clone().unwrap_or_default(),
            lxlyric: info.lxlyric.clone().unwrap_or_default(),
            raw: info,
        };
    };

    let (lyric, tlyric, rlyric, lxlyric) = futures_util::join!(
        convert_field(c, Some(info.lyric.as_str())),
        convert_field(c, info.tlyric.as_deref()),
        convert_field(c, info.rlyric.as_deref()),
        convert_field(c, info.lxlyric.as_deref()),
    );
    PlayerLyricInfo {
        lyric,
        tlyric,
        rlyric,
        lxlyric,
        raw: info,
    }
}
