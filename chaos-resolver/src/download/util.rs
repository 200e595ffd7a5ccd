use std::path::{Path, PathBuf};

use crate::music::model::Quality;

pub const DEFAULT_EXT: &str = "mp3";

// Keep this simple and deterministic; hosts list downloads by these names.
pub fn sanitize_component(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    // Windows forbidden: <>:"/\\|?* + ASCII control chars.
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let bad = matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || (ch as u32) < 0x20;
        out.push(if bad { '_' } else { ch });
    }

    let out = out.trim().trim_end_matches('.').trim().to_string();
    if out.is_empty() {
        "unknown".to_string()
    } else if out.chars().count() > 150 {
        out.chars().take(150).collect()
    } else {
        out
    }
}

/// Extension from the last path segment of `url`, ignoring query and fragment.
pub fn file_extension_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.split_once("://").map_or(path, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXT.to_string(),
    }
}

/// `{name}-{singer}-{quality}`, each part sanitized.
pub fn track_file_stem(name: &str, singer: &str, quality: Quality) -> String {
    format!(
        "{}-{}-{}",
        sanitize_component(name),
        sanitize_component(singer),
        quality.as_str()
    )
}

pub fn build_track_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    dir.join(format!("{stem}.{}", ext.trim().trim_start_matches('.')))
}

/// Lyric file living next to `audio`.
pub fn lyric_path_for(audio: &Path) -> PathBuf {
    audio.with_extension("lrc")
}

/// Appends `_{suffix}` to the file stem, keeping the extension.
pub fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let file = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(file)
}

pub fn is_http_url(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("http://") || s.starts_with("https://")
}

pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_forbidden_chars() {
        assert_eq!(sanitize_component(" a/b:c? "), "a_b_c_");
        assert_eq!(sanitize_component("   "), "unknown");
        assert_eq!(sanitize_component("..."), "unknown");
        assert_eq!(sanitize_component("x\u{1}y"), "x_y");
    }

    #[test]
    fn extension_ignores_query_and_host() {
        assert_eq!(file_extension_from_url("http://a.com/x/song.FLAC?k=1.2"), "flac");
        assert_eq!(file_extension_from_url("https://a.com/x/song.m4a#t"), "m4a");
        assert_eq!(file_extension_from_url("https://a.com/stream?id=1"), "mp3");
        assert_eq!(file_extension_from_url("https://cdn.example.com"), "mp3");
        assert_eq!(file_extension_from_url("https://a.com/x/.hidden"), "mp3");
    }

    #[test]
    fn builds_paths() {
        let stem = track_file_stem("Song/1", "Singer", Quality::K320);
        assert_eq!(stem, "Song_1-Singer-320k");
        let p = build_track_path(Path::new("/m"), &stem, "flac");
        assert_eq!(p, PathBuf::from("/m/Song_1-Singer-320k.flac"));
        assert_eq!(lyric_path_for(&p), PathBuf::from("/m/Song_1-Singer-320k.lrc"));
        assert_eq!(
            with_stem_suffix(&p, "1700000000000"),
            PathBuf::from("/m/Song_1-Singer-320k_1700000000000.flac")
        );
    }
}
