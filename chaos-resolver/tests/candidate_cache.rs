mod common;

use std::sync::Arc;
use std::time::Duration;

use chaos_resolver::ResolveError;
use chaos_resolver::music::error::SourceError;
use chaos_resolver::music::model::SongDescriptor;
use chaos_resolver::music::store::{MemoryStore, ResourceStore};
use chaos_resolver::resolve::candidates::CandidateCache;

use common::{FakeApi, song};

fn cache(api: FakeApi, timeout: Duration) -> (Arc<FakeApi>, Arc<MemoryStore>, CandidateCache<FakeApi, MemoryStore>) {
    let api = Arc::new(api);
    let store = Arc::new(MemoryStore::new(16));
    let c = CandidateCache::new(Arc::clone(&api), Arc::clone(&store), timeout);
    (api, store, c)
}

#[tokio::test]
async fn empty_search_result_is_not_persisted() {
    let (api, store, c) = cache(FakeApi::new().search(Ok(Vec::new())), Duration::from_secs(20));
    let s = song("kw", "1");

    let found = c.discover(&s, false).await.expect("discover");
    assert!(found.is_empty());
    assert!(store.alternates("1").await.is_empty());

    // Nothing cached, so the next call searches again.
    c.discover(&s, false).await.expect("discover");
    assert_eq!(api.search_calls(), 2);
}

#[tokio::test]
async fn non_empty_result_is_persisted_and_reused() {
    let alts = vec![song("kg", "2"), song("tx", "3")];
    let (api, store, c) = cache(FakeApi::new().search(Ok(alts.clone())), Duration::from_secs(20));
    let s = song("kw", "1");

    assert_eq!(c.discover(&s, false).await.unwrap(), alts);
    assert_eq!(store.alternates("1").await, alts);

    assert_eq!(c.discover(&s, false).await.unwrap(), alts);
    assert_eq!(api.search_calls(), 1);
    assert!(!c.is_in_flight(&s));
}

#[tokio::test]
async fn force_refresh_bypasses_persisted_list() {
    let (api, store, c) = cache(
        FakeApi::new().search(Ok(vec![song("tx", "3")])),
        Duration::from_secs(20),
    );
    store.save_alternates("1", &[song("kg", "2")]).await.unwrap();
    let s = song("kw", "1");

    let cached = c.discover(&s, false).await.unwrap();
    assert_eq!(cached[0].source, "kg");
    assert_eq!(api.search_calls(), 0);

    let fresh = c.discover(&s, true).await.unwrap();
    assert_eq!(fresh[0].source, "tx");
    assert_eq!(api.search_calls(), 1);
    assert_eq!(store.alternates("1").await[0].source, "tx");
}

#[tokio::test]
async fn concurrent_callers_share_one_search() {
    let api = FakeApi::new().search(Ok(vec![song("kg", "2")]));
    api.set_search_delay(Duration::from_millis(50));
    let (api, _store, c) = cache(api, Duration::from_secs(20));
    let s = song("kw", "1");

    let (a, b) = tokio::join!(c.discover(&s, false), c.discover(&s, false));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(api.search_calls(), 1);
}

#[tokio::test]
async fn local_and_online_songs_with_same_id_do_not_share_discovery() {
    let api = FakeApi::new().search(Ok(vec![song("kg", "2")]));
    api.set_search_delay(Duration::from_millis(20));
    let (api, _store, c) = cache(api, Duration::from_secs(20));
    let online = song("kw", "1");
    let local = SongDescriptor::local("1", "Song", "Singer", "/m/1.mp3", "mp3");

    let (a, b) = tokio::join!(c.discover(&online, true), c.discover(&local, true));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(api.search_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_frees_the_slot() {
    let api = FakeApi::new().search(Ok(vec![song("kg", "2")]));
    api.set_search_delay(Duration::from_secs(60));
    let (api, store, c) = cache(api, Duration::from_secs(20));
    let s = song("kw", "1");

    let err = c.discover(&s, false).await.unwrap_err();
    assert_eq!(err, ResolveError::DiscoveryTimeout);
    assert!(!c.is_in_flight(&s));
    assert!(store.alternates("1").await.is_empty());

    api.set_search_delay(Duration::ZERO);
    let found = c.discover(&s, false).await.expect("retry after timeout");
    assert_eq!(found.len(), 1);
    assert_eq!(api.search_calls(), 2);
}

#[tokio::test]
async fn search_failure_is_reported_and_slot_released() {
    let (api, _store, c) = cache(
        FakeApi::new().search(Err(SourceError::failed("network down"))),
        Duration::from_secs(20),
    );
    let s = song("kw", "1");

    let err = c.discover(&s, false).await.unwrap_err();
    assert!(matches!(err, ResolveError::DiscoveryFailed(ref m) if m.contains("network down")));
    assert!(!c.is_in_flight(&s));

    api.set_search(Ok(vec![song("tx", "3")]));
    assert_eq!(c.discover(&s, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn dropped_waiter_does_not_wedge_discovery() {
    let api = FakeApi::new().search(Ok(vec![song("kg", "2")]));
    api.set_search_delay(Duration::from_millis(30));
    let (api, _store, c) = cache(api, Duration::from_secs(20));
    let s = song("kw", "1");

    // Give up on the first caller before the search settles.
    let abandoned = tokio::time::timeout(Duration::from_millis(5), c.discover(&s, false)).await;
    assert!(abandoned.is_err());

    let found = c.discover(&s, false).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(api.search_calls(), 1);
    assert!(!c.is_in_flight(&s));
}
