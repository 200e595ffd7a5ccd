use std::collections::HashSet;
use std::future::Future;

use tracing::{debug, info, warn};

use super::error::ResolveError;
use super::{ResolveOptions, Resolver};
use crate::lyrics::util::{has_time_tag, is_cached_lyric_usable};
use crate::music::api::SourceApi;
use crate::music::model::{Quality, ResolvedLyric, ResolvedPic, ResolvedUrl, SongDescriptor};
use crate::music::quality::select_quality;
use crate::music::store::ResourceStore;

/// Sources already attempted within one fallback chain.
#[derive(Debug, Clone, Default)]
pub struct TriedSources {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl TriedSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `source` was already recorded.
    pub fn insert(&mut self, source: &str) -> bool {
        if !self.seen.insert(source.to_string()) {
            return false;
        }
        self.order.push(source.to_string());
        true
    }

    pub fn contains(&self, source: &str) -> bool {
        self.seen.contains(source)
    }

    /// Sources in the order they were first recorded.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}

/// One resource type the fallback chain can resolve.
pub(crate) trait ChainKind<A: SourceApi, S: ResourceStore>: Sync {
    /// Per-candidate request parameters (the quality for stream URLs).
    type Plan: Send + Sync;
    type Output: Send;

    const NAME: &'static str;

    /// `None` skips an alternate candidate without a network call.
    fn plan(&self, r: &Resolver<A, S>, song: &SongDescriptor, opts: &ResolveOptions) -> Option<Self::Plan>;

    /// Plan for the caller's own song, which is never skipped.
    fn plan_primary(&self, r: &Resolver<A, S>, song: &SongDescriptor, opts: &ResolveOptions) -> Self::Plan;

    fn cached(
        &self,
        r: &Resolver<A, S>,
        song: &SongDescriptor,
        plan: &Self::Plan,
    ) -> impl Future<Output = Option<Self::Output>> + Send;

    fn fetch(
        &self,
        r: &Resolver<A, S>,
        song: &SongDescriptor,
        plan: &Self::Plan,
    ) -> impl Future<Output = Result<Self::Output, ResolveError>> + Send;
}

pub(crate) struct MusicUrlKind;
pub(crate) struct PicKind;
pub(crate) struct LyricKind;

impl<A: SourceApi, S: ResourceStore> ChainKind<A, S> for MusicUrlKind {
    type Plan = Quality;
    type Output = ResolvedUrl;

    const NAME: &'static str = "music_url";

    fn plan(&self, r: &Resolver<A, S>, song: &SongDescriptor, opts: &ResolveOptions) -> Option<Quality> {
        if !r.capabilities().is_supported(&song.source) {
            return None;
        }
        let quality = self.plan_primary(r, song, opts);
        song.has_quality(quality).then_some(quality)
    }

    fn plan_primary(&self, r: &Resolver<A, S>, song: &SongDescriptor, opts: &ResolveOptions) -> Quality {
        select_quality(r.prefer_high_quality(), r.capabilities(), song, opts.quality)
    }

    async fn cached(&self, r: &Resolver<A, S>, song: &SongDescriptor, plan: &Quality) -> Option<ResolvedUrl> {
        let url = r.store.cached_url(song, *plan).await?;
        Some(ResolvedUrl {
            url,
            source_song: song.clone(),
            quality: *plan,
            served_from_cache: true,
        })
    }

    async fn fetch(
        &self,
        r: &Resolver<A, S>,
        song: &SongDescriptor,
        plan: &Quality,
    ) -> Result<ResolvedUrl, ResolveError> {
        let res = r.api.music_url(song, *plan).await?;
        if let Err(e) = r.store.save_url(song, res.quality, &res.url).await {
            warn!(source = %song.source, song_id = %song.id, error = %e, "failed to cache music url");
        }
        Ok(ResolvedUrl {
            url: res.url,
            source_song: song.clone(),
            quality: res.quality,
            served_from_cache: false,
        })
    }
}

impl<A: SourceApi, S: ResourceStore> ChainKind<A, S> for PicKind {
    type Plan = ();
    type Output = ResolvedPic;

    const NAME: &'static str = "pic_url";

    // Cover lookups do not consult the capability table.
    fn plan(&self, _r: &Resolver<A, S>, _song: &SongDescriptor, _opts: &ResolveOptions) -> Option<()> {
        Some(())
    }

    fn plan_primary(&self, _r: &Resolver<A, S>, _song: &SongDescriptor, _opts: &ResolveOptions) {}

    async fn cached(&self, _r: &Resolver<A, S>, song: &SongDescriptor, _plan: &()) -> Option<ResolvedPic> {
        let url = song.pic_url()?;
        Some(ResolvedPic {
            url: url.to_string(),
            source_song: song.clone(),
            served_from_cache: true,
        })
    }

    async fn fetch(&self, r: &Resolver<A, S>, song: &SongDescriptor, _plan: &()) -> Result<ResolvedPic, ResolveError> {
        let url = r.api.pic_url(song).await?;
        Ok(ResolvedPic {
            url,
            source_song: song.clone(),
            served_from_cache: false,
        })
    }
}

impl<A: SourceApi, S: ResourceStore> ChainKind<A, S> for LyricKind {
    type Plan = ();
    type Output = ResolvedLyric;

    const NAME: &'static str = "lyric";

    fn plan(&self, _r: &Resolver<A, S>, _song: &SongDescriptor, _opts: &ResolveOptions) -> Option<()> {
        Some(())
    }

    fn plan_primary(&self, _r: &Resolver<A, S>, _song: &SongDescriptor, _opts: &ResolveOptions) {}

    async fn cached(&self, r: &Resolver<A, S>, song: &SongDescriptor, _plan: &()) -> Option<ResolvedLyric> {
        let lyric = r.store.cached_lyric(song).await?;
        if !is_cached_lyric_usable(&song.source, &lyric) {
            return None;
        }
        Some(ResolvedLyric {
            lyric,
            source_song: song.clone(),
            served_from_cache: true,
        })
    }

    async fn fetch(&self, r: &Resolver<A, S>, song: &SongDescriptor, _plan: &()) -> Result<ResolvedLyric, ResolveError> {
        let lyric = r.api.lyric(song).await?;
        if !has_time_tag(&lyric.lyric) {
            return Err(ResolveError::MalformedLyric);
        }
        if let Err(e) = r.store.save_lyric(song, &lyric).await {
            warn!(source = %song.source, song_id = %song.id, error = %e, "failed to cache lyric");
        }
        Ok(ResolvedLyric {
            lyric,
            source_song: song.clone(),
            served_from_cache: false,
        })
    }
}

/// Where the chain takes its candidates from.
pub(crate) enum Start<'a> {
    /// The caller's song first, then (if allowed) discovered alternates.
    Primary(&'a SongDescriptor),
    /// A ready-made candidate list; no discovery.
    Candidates(Vec<SongDescriptor>),
}

impl<A: SourceApi, S: ResourceStore> Resolver<A, S> {
    pub(crate) async fn run_chain<K: ChainKind<A, S>>(
        &self,
        kind: &K,
        start: Start<'_>,
        opts: &ResolveOptions,
        tried: &mut TriedSources,
    ) -> Result<K::Output, ResolveError> {
        let (mut queue, mut pending_discovery) = match start {
            Start::Primary(song) => {
                tried.insert(&song.source);
                match self.attempt(kind, song, &kind.plan_primary(self, song, opts), opts).await {
                    Ok(out) => return Ok(out),
                    Err(e) if e.is_rate_limited() => return Err(ResolveError::RateLimited),
                    Err(e) if !opts.allow_fallback => return Err(e),
                    Err(e) => {
                        info!(kind = K::NAME, source = %song.source, error = %e, "primary source failed, looking for alternates");
                        (Vec::new(), Some((song, e)))
                    }
                }
            }
            Start::Candidates(list) => (list, None),
        };

        let mut idx = 0;
        loop {
            if idx >= queue.len() {
                // The alternate list is fetched at most once per chain.
                let Some((song, primary_err)) = pending_discovery.take() else {
                    debug!(kind = K::NAME, tried = ?tried.order(), "no candidate left");
                    return Err(ResolveError::ToggleSourceFailed);
                };
                queue = self.candidates.discover(song, false).await?;
                if queue.is_empty() {
                    // Nothing to switch to: the provider's own failure is the answer.
                    return Err(primary_err);
                }
                idx = 0;
                continue;
            }
            let candidate = &queue[idx];
            idx += 1;

            if !tried.insert(&candidate.source) {
                continue;
            }
            let Some(plan) = kind.plan(self, candidate, opts) else {
                debug!(kind = K::NAME, source = %candidate.source, "candidate not eligible, skipped");
                continue;
            };

            match self.attempt(kind, candidate, &plan, opts).await {
                Ok(out) => return Ok(out),
                Err(e) if e.is_rate_limited() => return Err(ResolveError::RateLimited),
                Err(e) => {
                    debug!(kind = K::NAME, source = %candidate.source, error = %e, "candidate failed");
                }
            }
        }
    }

    async fn attempt<K: ChainKind<A, S>>(
        &self,
        kind: &K,
        song: &SongDescriptor,
        plan: &K::Plan,
        opts: &ResolveOptions,
    ) -> Result<K::Output, ResolveError> {
        if let Some(cb) = &opts.on_toggle {
            cb(song);
        }
        if !opts.force_refresh {
            if let Some(hit) = kind.cached(self, song, plan).await {
                debug!(kind = K::NAME, source = %song.source, song_id = %song.id, "served from cache");
                return Ok(hit);
            }
        }
        debug!(kind = K::NAME, source = %song.source, song_id = %song.id, "requesting");
        kind.fetch(self, song, plan).await
    }
}
