//! Common test utilities and fakes
//! Shared by the integration tests that drive a voice session without Discord.

#![allow(dead_code)]

pub mod mocks;

use async_trait::async_trait;
use serenity::model::id::ChannelId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing::Level;

use tunebot::commands::music::utils::{
    announcer::{PlaybackAnnouncer, PlaybackEvent},
    error::{MusicError, MusicResult},
    playback::Volume,
    queue::QueueEntry,
    session::{CompletionSignal, Session, SessionHandle, SessionSnapshot, TrackOutcome},
    voice::VoiceTransport,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

pub fn voice_channel() -> ChannelId {
    ChannelId::new(4242)
}

pub fn entry(title: &str) -> QueueEntry {
    QueueEntry::new(format!("https://www.youtube.com/watch?v={}", title), title)
}

/// What the session asked the voice side to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect(ChannelId),
    Play { title: String, volume: f32 },
    Pause,
    Resume,
    Stop,
    Disconnect,
    SetVolume(f32),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<TransportCall>,
    failing: HashSet<String>,
    refuse_connect: bool,
    refuse_volume: bool,
    slow_disconnect: bool,
    connected: Option<ChannelId>,
    current: Option<CompletionSignal>,
}

/// In-memory voice transport. Tracks only end when the test says so.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every attempt to start `title` fail.
    pub fn fail_on(&self, title: &str) {
        self.state.lock().unwrap().failing.insert(title.to_string());
    }

    pub fn refuse_connect(&self) {
        self.state.lock().unwrap().refuse_connect = true;
    }

    pub fn refuse_volume(&self) {
        self.state.lock().unwrap().refuse_volume = true;
    }

    /// Make leaving the channel take a while, leaving room for other calls to interleave.
    pub fn slow_disconnect(&self) {
        self.state.lock().unwrap().slow_disconnect = true;
    }

    /// Lose the voice call, as when the bot is kicked from the channel.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = None;
        state.current = None;
    }

    pub fn connected(&self) -> Option<ChannelId> {
        self.state.lock().unwrap().connected
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Titles of every play attempt, in order.
    pub fn play_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Play { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn current_signal(&self) -> Option<CompletionSignal> {
        self.state.lock().unwrap().current.clone()
    }

    /// Report the current track as played to the end.
    pub fn finish_current(&self) {
        let signal = self.state.lock().unwrap().current.take();
        signal
            .expect("a track should be playing")
            .notify(TrackOutcome::Finished);
    }

    /// Report the current track as broken mid-playback.
    pub fn fail_current(&self, reason: &str) {
        let signal = self.state.lock().unwrap().current.take();
        signal
            .expect("a track should be playing")
            .notify(TrackOutcome::Failed(reason.to_string()));
    }

    fn record(&self, call: TransportCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.record(TransportCall::Connect(channel_id));
        let mut state = self.state.lock().unwrap();
        if state.refuse_connect {
            return Err(MusicError::Transport("channel is full".to_string()));
        }
        state.connected = Some(channel_id);
        Ok(())
    }

    async fn play(
        &self,
        entry: &QueueEntry,
        volume: f32,
        on_complete: CompletionSignal,
    ) -> MusicResult<()> {
        self.record(TransportCall::Play {
            title: entry.title.clone(),
            volume,
        });
        let mut state = self.state.lock().unwrap();
        if state.connected.is_none() {
            return Err(MusicError::NotConnected);
        }
        if state.failing.contains(&entry.title) {
            return Err(MusicError::Transport(format!("cannot open {}", entry.title)));
        }
        state.current = Some(on_complete);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        self.record(TransportCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> MusicResult<()> {
        self.record(TransportCall::Resume);
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        self.record(TransportCall::Stop);
        self.state.lock().unwrap().current = None;
        Ok(())
    }

    async fn disconnect(&self) -> MusicResult<()> {
        let slow = self.state.lock().unwrap().slow_disconnect;
        if slow {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        self.record(TransportCall::Disconnect);
        let mut state = self.state.lock().unwrap();
        state.connected = None;
        state.current = None;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.record(TransportCall::SetVolume(volume));
        if self.state.lock().unwrap().refuse_volume {
            return Err(MusicError::Transport("mixer unavailable".to_string()));
        }
        Ok(())
    }
}

/// Collects announced events.
#[derive(Default)]
pub struct FakeAnnouncer {
    events: Mutex<Vec<PlaybackEvent>>,
}

impl FakeAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::TrackFailed { entry, .. } => Some(entry.title),
                _ => None,
            })
            .collect()
    }
}

impl PlaybackAnnouncer for FakeAnnouncer {
    fn announce(&self, event: PlaybackEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A session wired to fakes.
pub struct Harness {
    pub handle: SessionHandle,
    pub transport: Arc<FakeTransport>,
    pub announcer: Arc<FakeAnnouncer>,
}

impl Harness {
    pub fn new() -> Self {
        init();
        let transport = FakeTransport::new();
        let announcer = FakeAnnouncer::new();
        let handle = Session::spawn(transport.clone(), announcer.clone(), Volume::default());
        Self {
            handle,
            transport,
            announcer,
        }
    }

    /// A session already sitting in [`voice_channel`].
    pub async fn connected() -> Self {
        let harness = Self::new();
        harness
            .handle
            .connect(voice_channel())
            .await
            .expect("fake transport connects");
        harness
    }

    /// Snapshot taken after every message posted so far has been handled.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot().await.expect("session is running")
    }

    pub async fn now_playing(&self) -> Option<String> {
        self.snapshot().await.now_playing.map(|entry| entry.title)
    }

    pub async fn upcoming(&self) -> Vec<String> {
        self.snapshot()
            .await
            .upcoming
            .iter()
            .map(|entry| entry.title.clone())
            .collect()
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
