use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use super::error::ResolveError;
use crate::music::api::SourceApi;
use crate::music::model::SongDescriptor;
use crate::music::store::ResourceStore;

type Discovery = Shared<BoxFuture<'static, Result<Vec<SongDescriptor>, ResolveError>>>;

struct InFlight {
    ticket: u64,
    fut: Discovery,
}

type InFlightMap = Arc<Mutex<HashMap<String, InFlight>>>;

fn lock(map: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Finds the same song on other sources, at most one search per song at a time.
pub struct CandidateCache<A, S> {
    api: Arc<A>,
    store: Arc<S>,
    timeout: Duration,
    in_flight: InFlightMap,
    next_ticket: AtomicU64,
}

impl<A: SourceApi, S: ResourceStore> CandidateCache<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>, timeout: Duration) -> Self {
        Self {
            api,
            store,
            timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Alternate candidates for `song`, best match first.
    ///
    /// Without `force_refresh` a non-empty persisted list is returned as is.
    /// Otherwise a search runs (or an in-flight one for the same song is joined)
    /// and a non-empty result replaces the persisted list.
    pub async fn discover(
        &self,
        song: &SongDescriptor,
        force_refresh: bool,
    ) -> Result<Vec<SongDescriptor>, ResolveError> {
        if !force_refresh {
            let cached = self.store.alternates(&song.id).await;
            if !cached.is_empty() {
                debug!(song_id = %song.id, count = cached.len(), "alternate sources from store");
                return Ok(cached);
            }
        }
        self.join_or_start(song).await
    }

    pub fn is_in_flight(&self, song: &SongDescriptor) -> bool {
        lock(&self.in_flight).contains_key(&song.discovery_key())
    }

    /// Forgets every pending discovery. Tasks already running still finish, but
    /// new callers start fresh searches.
    pub fn clear(&self) {
        lock(&self.in_flight).clear();
    }

    fn join_or_start(&self, song: &SongDescriptor) -> Discovery {
        let key = song.discovery_key();
        // Check and insert under one guard with no await in between.
        let mut map = lock(&self.in_flight);
        if let Some(entry) = map.get(&key) {
            debug!(key = %key, "joining in-flight discovery");
            return entry.fut.clone();
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.timeout;
        let query = song.search_query();
        let song_id = song.id.clone();
        let task_key = key.clone();

        // Runs detached so the slot is released even if every waiter goes away.
        let task = tokio::spawn(async move {
            debug!(key = %task_key, name = %query.name, singer = %query.singer, "discovering alternate sources");
            let res = match tokio::time::timeout(timeout, api.search(&query)).await {
                Ok(Ok(list)) => Ok(list),
                Ok(Err(e)) => Err(ResolveError::DiscoveryFailed(e.to_string())),
                Err(_) => Err(ResolveError::DiscoveryTimeout),
            };

            if let Ok(list) = &res {
                if !list.is_empty() {
                    if let Err(e) = store.save_alternates(&song_id, list).await {
                        warn!(song_id = %song_id, error = %e, "failed to persist alternate sources");
                    }
                }
            }

            let mut map = lock(&in_flight);
            if map.get(&task_key).is_some_and(|e| e.ticket == ticket) {
                map.remove(&task_key);
            }
            drop(map);

            match &res {
                Ok(list) => debug!(key = %task_key, count = list.len(), "discovery settled"),
                Err(e) => warn!(key = %task_key, error = %e, "discovery failed"),
            }
            res
        });

        let fut = async move {
            match task.await {
                Ok(res) => res,
                Err(e) => Err(ResolveError::DiscoveryFailed(format!("discovery task aborted: {e}"))),
            }
        }
        .boxed()
        .shared();

        map.insert(
            key,
            InFlight {
                ticket,
                fut: fut.clone(),
            },
        );
        fut
    }
}
