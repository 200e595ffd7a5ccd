use serde::{Deserialize, Serialize};

use super::capability::CapabilityTable;
use super::model::{Quality, SongDescriptor};

/// Picks the quality to request for `song`.
///
/// An explicit `requested` quality always wins. Otherwise playback uses `128k`,
/// and only steps up to `320k` when the user prefers high quality and both the
/// source adapter and the song itself advertise it. Lossless tiers are never
/// chosen implicitly.
pub fn select_quality(
    prefer_high: bool,
    table: &CapabilityTable,
    song: &SongDescriptor,
    requested: Option<Quality>,
) -> Quality {
    if let Some(q) = requested {
        return q;
    }
    if prefer_high && song.has_quality(Quality::K320) && table.supports(&song.source, Quality::K320) {
        Quality::K320
    } else {
        Quality::K128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Normal,
    High,
    Lossless,
    HiRes,
}

impl QualityTier {
    pub const fn of(q: Quality) -> Self {
        match q {
            Quality::K128 | Quality::K192 => Self::Normal,
            Quality::K320 => Self::High,
            Quality::Flac | Quality::Ape | Quality::Wav => Self::Lossless,
            Quality::Flac24bit => Self::HiRes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableQuality {
    pub quality: Quality,
    pub tier: QualityTier,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

pub fn quality_label(q: Quality) -> String {
    match QualityTier::of(q) {
        QualityTier::HiRes => "Lossless FLAC Hires".to_string(),
        QualityTier::Lossless => format!("Lossless {}", q.as_str().to_ascii_uppercase()),
        QualityTier::High => format!("High {}", q.as_str().to_ascii_uppercase()),
        QualityTier::Normal => format!("Normal {}", q.as_str().to_ascii_uppercase()),
    }
}

/// Qualities the user can pick for an explicit download: the song's own list,
/// restricted to what its source adapter declares, in the song's order.
pub fn downloadable_qualities(table: &CapabilityTable, song: &SongDescriptor) -> Vec<DownloadableQuality> {
    let Some(meta) = song.online_meta() else {
        return Vec::new();
    };
    let Some(supported) = table.qualities(&song.source) else {
        return Vec::new();
    };
    meta.qualitys
        .iter()
        .filter(|info| supported.contains(&info.quality))
        .map(|info| DownloadableQuality {
            quality: info.quality,
            tier: QualityTier::of(info.quality),
            label: quality_label(info.quality),
            size: info
                .size
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_uppercase),
        })
        .collect()
}
