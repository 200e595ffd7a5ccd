pub mod candidates;
pub mod chain;
pub mod error;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ResolverConfig;
use crate::music::api::SourceApi;
use crate::music::capability::CapabilityTable;
use crate::music::model::{Quality, ResolvedLyric, ResolvedPic, ResolvedUrl, SongDescriptor};
use crate::music::quality::select_quality;
use crate::music::store::ResourceStore;

use candidates::CandidateCache;
use chain::{LyricKind, MusicUrlKind, PicKind, Start};
pub use chain::TriedSources;
use error::ResolveError;

/// Called with each candidate right before it is attempted.
pub type ToggleObserver = Arc<dyn Fn(&SongDescriptor) + Send + Sync>;

#[derive(Clone)]
pub struct ResolveOptions {
    /// Explicit quality; `None` lets the selector decide per candidate.
    pub quality: Option<Quality>,
    /// Skip every cache read (discovery still dedups in-flight searches).
    pub force_refresh: bool,
    pub allow_fallback: bool,
    pub on_toggle: Option<ToggleObserver>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            quality: None,
            force_refresh: false,
            allow_fallback: true,
            on_toggle: None,
        }
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("quality", &self.quality)
            .field("force_refresh", &self.force_refresh)
            .field("allow_fallback", &self.allow_fallback)
            .field("on_toggle", &self.on_toggle.is_some())
            .finish()
    }
}

impl ResolveOptions {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    pub fn on_toggle(mut self, f: impl Fn(&SongDescriptor) + Send + Sync + 'static) -> Self {
        self.on_toggle = Some(Arc::new(f));
        self
    }
}

/// Resolves stream URLs, covers and lyrics, falling back to the same song on
/// other sources when the requested one fails.
pub struct Resolver<A, S> {
    pub(crate) api: Arc<A>,
    pub(crate) store: Arc<S>,
    capabilities: Arc<CapabilityTable>,
    candidates: CandidateCache<A, S>,
    prefer_high_quality: AtomicBool,
}

impl<A: SourceApi, S: ResourceStore> Resolver<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>, capabilities: Arc<CapabilityTable>, cfg: &ResolverConfig) -> Self {
        let candidates = CandidateCache::new(Arc::clone(&api), Arc::clone(&store), cfg.discovery_timeout());
        Self {
            api,
            store,
            capabilities,
            candidates,
            prefer_high_quality: AtomicBool::new(cfg.prefer_high_quality),
        }
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn candidates(&self) -> &CandidateCache<A, S> {
        &self.candidates
    }

    pub fn prefer_high_quality(&self) -> bool {
        self.prefer_high_quality.load(Ordering::Relaxed)
    }

    pub fn set_prefer_high_quality(&self, on: bool) {
        self.prefer_high_quality.store(on, Ordering::Relaxed);
    }

    /// Quality playback would request for `song` with the current preference.
    pub fn play_quality(&self, song: &SongDescriptor) -> Quality {
        select_quality(self.prefer_high_quality(), &self.capabilities, song, None)
    }

    pub async fn music_url(&self, song: &SongDescriptor, opts: &ResolveOptions) -> Result<ResolvedUrl, ResolveError> {
        let mut tried = TriedSources::new();
        self.run_chain(&MusicUrlKind, Start::Primary(song), opts, &mut tried)
            .await
    }

    pub async fn pic_url(&self, song: &SongDescriptor, opts: &ResolveOptions) -> Result<ResolvedPic, ResolveError> {
        let mut tried = TriedSources::new();
        self.run_chain(&PicKind, Start::Primary(song), opts, &mut tried).await
    }

    pub async fn lyric_info(&self, song: &SongDescriptor, opts: &ResolveOptions) -> Result<ResolvedLyric, ResolveError> {
        let mut tried = TriedSources::new();
        self.run_chain(&LyricKind, Start::Primary(song), opts, &mut tried).await
    }

    /// Tries `candidates` in order; sources already in `tried` are skipped.
    pub async fn other_source_music_url(
        &self,
        candidates: Vec<SongDescriptor>,
        opts: &ResolveOptions,
        tried: &mut TriedSources,
    ) -> Result<ResolvedUrl, ResolveError> {
        self.run_chain(&MusicUrlKind, Start::Candidates(candidates), opts, tried)
            .await
    }

    pub async fn other_source_pic_url(
        &self,
        candidates: Vec<SongDescriptor>,
        opts: &ResolveOptions,
        tried: &mut TriedSources,
    ) -> Result<ResolvedPic, ResolveError> {
        self.run_chain(&PicKind, Start::Candidates(candidates), opts, tried)
            .await
    }

    pub async fn other_source_lyric_info(
        &self,
        candidates: Vec<SongDescriptor>,
        opts: &ResolveOptions,
        tried: &mut TriedSources,
    ) -> Result<ResolvedLyric, ResolveError> {
        self.run_chain(&LyricKind, Start::Candidates(candidates), opts, tried)
            .await
    }
}
