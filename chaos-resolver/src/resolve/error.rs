use thiserror::Error;

use crate::music::error::SourceError;

/// Errors that escape the resolver. `Clone` because one discovery result is
/// shared by every caller waiting on the same song.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("find music timeout")]
    DiscoveryTimeout,
    #[error("find music failed: {0}")]
    DiscoveryFailed(String),
    /// Every candidate was tried or ineligible.
    #[error("toggle source failed")]
    ToggleSourceFailed,
    #[error("too many requests")]
    RateLimited,
    #[error("lyric has no timestamp tags")]
    MalformedLyric,
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ResolveError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Source(SourceError::TooManyRequests)
        )
    }
}
