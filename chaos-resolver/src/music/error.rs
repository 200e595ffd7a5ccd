use thiserror::Error;

/// Failure reported by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Provider-wide throttle. Never retried against another source.
    #[error("too many requests")]
    TooManyRequests,
    #[error("unsupported source: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

impl SourceError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::TooManyRequests)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),
}
