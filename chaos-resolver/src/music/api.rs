use std::future::Future;

use super::error::SourceError;
use super::model::{LyricInfo, MusicUrl, Quality, SearchQuery, SongDescriptor};

/// Provider adapter layer. Implementations dispatch on `song.source`.
///
/// Rate limiting must surface as [`SourceError::TooManyRequests`], and a source
/// with no adapter as [`SourceError::Unsupported`].
pub trait SourceApi: Send + Sync + 'static {
    fn music_url(
        &self,
        song: &SongDescriptor,
        quality: Quality,
    ) -> impl Future<Output = Result<MusicUrl, SourceError>> + Send;

    fn pic_url(&self, song: &SongDescriptor) -> impl Future<Output = Result<String, SourceError>> + Send;

    fn lyric(&self, song: &SongDescriptor) -> impl Future<Output = Result<LyricInfo, SourceError>> + Send;

    /// Finds the same song on other sources, best match first.
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Vec<SongDescriptor>, SourceError>> + Send;
}
