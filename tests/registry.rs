mod common;

use assert_matches::assert_matches;
use futures::{StreamExt, stream};
use mockall::predicate::eq;
use pretty_assertions::assert_eq;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{
    FakeAnnouncer, FakeTransport, TransportCall, entry, eventually, init, mocks::MockResolver,
    voice_channel,
};
use tunebot::commands::music::{
    audio_sources::{PlayOutcome, Resolution, queue_request},
    utils::{
        error::MusicError,
        playback::{PlayerStatus, Volume},
        session::{EnqueueOutcome, Session, SessionHandle},
        session_registry::SessionRegistry,
    },
};

fn guild() -> GuildId {
    GuildId::new(99)
}

fn spawner(transport: &Arc<FakeTransport>, spawned: &Arc<AtomicUsize>) -> impl FnOnce() -> SessionHandle {
    let transport = transport.clone();
    let spawned = spawned.clone();
    move || {
        spawned.fetch_add(1, Ordering::SeqCst);
        Session::spawn(transport, FakeAnnouncer::new(), Volume::default())
    }
}

#[tokio::test]
async fn sessions_are_started_once_per_guild() {
    init();
    let registry = SessionRegistry::new();
    let transport = FakeTransport::new();
    let spawned = Arc::new(AtomicUsize::new(0));

    let first = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await
        .unwrap();
    let second = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await
        .unwrap();

    assert!(first.same_session(&second));
    assert_eq!(spawned.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn a_session_that_cannot_connect_is_discarded() {
    init();
    let registry = SessionRegistry::new();
    let transport = FakeTransport::new();
    transport.refuse_connect();
    let spawned = Arc::new(AtomicUsize::new(0));

    let result = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await;

    assert_matches!(result, Err(MusicError::Transport(_)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn stop_forgets_the_session() {
    init();
    let registry = SessionRegistry::new();
    let transport = FakeTransport::new();
    let spawned = Arc::new(AtomicUsize::new(0));

    let session = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await
        .unwrap();
    session.enqueue(entry("A")).await.unwrap();

    registry.stop(guild()).await.unwrap();

    assert!(registry.get(guild()).is_none());
    assert_matches!(registry.require(guild()), Err(MusicError::NotConnected));
    assert_eq!(registry.stop(guild()).await, Err(MusicError::NotConnected));
    assert_eq!(session.snapshot().await.unwrap().status, PlayerStatus::Idle);
}

#[tokio::test]
async fn a_play_racing_a_stop_gets_a_fresh_connection() {
    init();
    let registry = SessionRegistry::new();
    let transport = FakeTransport::new();
    let spawned = Arc::new(AtomicUsize::new(0));

    let old = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await
        .unwrap();
    old.enqueue(entry("A")).await.unwrap();
    transport.slow_disconnect();

    let (stopped, started) = tokio::join!(
        registry.stop(guild()),
        registry.get_or_start(guild(), voice_channel(), spawner(&transport, &spawned)),
    );
    stopped.unwrap();
    let fresh = started.unwrap();

    // The old session leaves the call before the new one joins it.
    assert!(transport.calls().ends_with(&[
        TransportCall::Stop,
        TransportCall::Disconnect,
        TransportCall::Connect(voice_channel()),
    ]));
    assert!(!fresh.same_session(&old));
    assert!(registry.get(guild()).is_some_and(|current| current.same_session(&fresh)));
    assert_eq!(fresh.enqueue(entry("B")).await, Ok(EnqueueOutcome::Started));
}

#[tokio::test]
async fn play_requests_start_then_queue() {
    init();
    let registry = SessionRegistry::new();
    let transport = FakeTransport::new();
    let spawned = Arc::new(AtomicUsize::new(0));
    let session = registry
        .get_or_start(guild(), voice_channel(), spawner(&transport, &spawned))
        .await
        .unwrap();

    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .with(eq("first song"), eq("tester"))
        .times(1)
        .returning(|_, requested_by| Ok(Resolution::Track(entry("A").requested_by(requested_by))));
    resolver
        .expect_resolve()
        .with(eq("second song"), eq("tester"))
        .times(1)
        .returning(|_, _| Ok(Resolution::Track(entry("B"))));

    let first = queue_request(&resolver, &session, "first song", "tester").await;
    assert_eq!(first, Ok(PlayOutcome::Started(entry("A").requested_by("tester"))));

    let second = queue_request(&resolver, &session, "second song", "tester").await;
    assert_eq!(
        second,
        Ok(PlayOutcome::Queued {
            entry: entry("B"),
            position: 1,
        })
    );
}

#[tokio::test]
async fn resolution_failures_leave_the_queue_alone() {
    init();
    let transport = FakeTransport::new();
    let session = Session::spawn(transport.clone(), FakeAnnouncer::new(), Volume::default());
    session.connect(voice_channel()).await.unwrap();

    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|query, _| Err(MusicError::Resolution(format!("No results for '{}'", query))));

    let result = queue_request(&resolver, &session, "asdfghjkl", "tester").await;

    assert_eq!(
        result,
        Err(MusicError::Resolution("No results for 'asdfghjkl'".to_string()))
    );
    assert!(transport.play_attempts().is_empty());
    assert_eq!(session.snapshot().await.unwrap().status, PlayerStatus::Idle);
}

#[tokio::test]
async fn playlists_are_handed_to_the_session() {
    init();
    let transport = FakeTransport::new();
    let session = Session::spawn(transport.clone(), FakeAnnouncer::new(), Volume::default());
    session.connect(voice_channel()).await.unwrap();

    let mut resolver = MockResolver::new();
    resolver.expect_resolve().times(1).returning(|_, _| {
        Ok(Resolution::Playlist {
            title: "Road trip".to_string(),
            entries: stream::iter(vec![Ok(entry("A")), Ok(entry("B"))]).boxed(),
        })
    });

    let outcome = queue_request(
        &resolver,
        &session,
        "https://www.youtube.com/playlist?list=PL1",
        "tester",
    )
    .await;
    assert_eq!(
        outcome,
        Ok(PlayOutcome::Playlist {
            title: "Road trip".to_string()
        })
    );

    let handle = session.clone();
    eventually(|| {
        let handle = handle.clone();
        async move { handle.snapshot().await.unwrap().upcoming.len() == 1 }
    })
    .await;
    assert_eq!(transport.play_attempts(), vec!["A"]);
}
