//! A voice session: one actor task owning the queue and playback state of a guild.
//!
//! Every mutation goes through the session's mailbox and is applied on the actor task, one
//! message at a time. Commands talk to it through a [`SessionHandle`]; the voice transport
//! reports finished tracks by posting a [`SessionMessage::TrackEnded`] into the same mailbox,
//! so completion handling is serialized with everything else.

use futures::StreamExt;
use futures::stream::BoxStream;
use serenity::model::id::ChannelId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::announcer::{PlaybackAnnouncer, PlaybackEvent};
use super::error::{MusicError, MusicResult};
use super::playback::{PlaybackState, PlayerStatus, Volume};
use super::queue::{QueueEntry, QueueSnapshot, QueueStore};
use super::voice::VoiceTransport;

/// Entries of a playlist, produced as they are resolved.
pub type EntryStream = BoxStream<'static, MusicResult<QueueEntry>>;

type Reply<T> = oneshot::Sender<MusicResult<T>>;

/// How a started track came to an end.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Finished,
    Failed(String),
}

/// Handed to the voice transport with every started track; posts the track's completion
/// back into the owning session's mailbox.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    mailbox: mpsc::UnboundedSender<SessionMessage>,
    track_id: u64,
}

impl CompletionSignal {
    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn notify(&self, outcome: TrackOutcome) {
        let message = SessionMessage::TrackEnded {
            track_id: self.track_id,
            outcome,
        };
        if self.mailbox.send(message).is_err() {
            debug!("Session already closed, dropping completion of track {}", self.track_id);
        }
    }
}

/// Result of adding a single entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The session was idle and the entry started right away.
    Started,
    /// The entry waits at this 1-based position.
    Queued { position: usize },
}

/// Read-only view of a session for display.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: PlayerStatus,
    pub now_playing: Option<QueueEntry>,
    pub upcoming: QueueSnapshot,
    pub volume: Volume,
    pub channel_id: Option<ChannelId>,
}

impl SessionSnapshot {
    /// What a guild without a session looks like.
    pub fn idle(volume: Volume) -> Self {
        Self {
            status: PlayerStatus::Idle,
            now_playing: None,
            upcoming: QueueStore::new().peek_all(),
            volume,
            channel_id: None,
        }
    }
}

pub enum SessionMessage {
    Connect {
        channel_id: ChannelId,
        reply: Reply<()>,
    },
    Enqueue {
        entry: QueueEntry,
        reply: Reply<EnqueueOutcome>,
    },
    EnqueuePlaylist {
        title: String,
        entries: EntryStream,
        reply: Reply<()>,
    },
    Ingested {
        ingest_id: u64,
        entry: QueueEntry,
    },
    IngestFinished {
        ingest_id: u64,
        title: String,
        added: usize,
        failed: usize,
    },
    TrackEnded {
        track_id: u64,
        outcome: TrackOutcome,
    },
    Pause {
        reply: Reply<QueueEntry>,
    },
    Resume {
        reply: Reply<QueueEntry>,
    },
    TogglePause {
        reply: Reply<PlayerStatus>,
    },
    Skip {
        reply: Reply<QueueEntry>,
    },
    Stop {
        reply: Reply<()>,
    },
    SetVolume {
        percent: i64,
        reply: Reply<Volume>,
    },
    NudgeVolume {
        delta: i64,
        reply: Reply<Volume>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    mailbox: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    /// Whether both handles talk to the same session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.mailbox.same_channel(&other.mailbox)
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionMessage) -> MusicResult<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(build(reply))
            .map_err(|_| MusicError::SessionClosed)?;
        response.await.map_err(|_| MusicError::SessionClosed)?
    }

    /// Join `channel_id`, rejoining if the call was lost and moving over if the session
    /// sits in another channel.
    pub async fn connect(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.request(|reply| SessionMessage::Connect { channel_id, reply })
            .await
    }

    pub async fn enqueue(&self, entry: QueueEntry) -> MusicResult<EnqueueOutcome> {
        self.request(|reply| SessionMessage::Enqueue { entry, reply })
            .await
    }

    /// Hand a playlist to the session; its entries are ingested in the background.
    pub async fn enqueue_playlist(&self, title: String, entries: EntryStream) -> MusicResult<()> {
        self.request(|reply| SessionMessage::EnqueuePlaylist {
            title,
            entries,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> MusicResult<QueueEntry> {
        self.request(|reply| SessionMessage::Pause { reply }).await
    }

    pub async fn resume(&self) -> MusicResult<QueueEntry> {
        self.request(|reply| SessionMessage::Resume { reply }).await
    }

    pub async fn toggle_pause(&self) -> MusicResult<PlayerStatus> {
        self.request(|reply| SessionMessage::TogglePause { reply })
            .await
    }

    /// Skip the current track, returning it.
    pub async fn skip(&self) -> MusicResult<QueueEntry> {
        self.request(|reply| SessionMessage::Skip { reply }).await
    }

    pub async fn stop(&self) -> MusicResult<()> {
        self.request(|reply| SessionMessage::Stop { reply }).await
    }

    pub async fn set_volume(&self, percent: i64) -> MusicResult<Volume> {
        self.request(|reply| SessionMessage::SetVolume { percent, reply })
            .await
    }

    pub async fn nudge_volume(&self, delta: i64) -> MusicResult<Volume> {
        self.request(|reply| SessionMessage::NudgeVolume { delta, reply })
            .await
    }

    pub async fn snapshot(&self) -> MusicResult<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(SessionMessage::Snapshot { reply })
            .map_err(|_| MusicError::SessionClosed)?;
        response.await.map_err(|_| MusicError::SessionClosed)
    }
}

/// State owned by the actor task.
pub struct Session {
    queue: QueueStore,
    playback: PlaybackState,
    transport: Arc<dyn VoiceTransport>,
    announcer: Arc<dyn PlaybackAnnouncer>,
    channel_id: Option<ChannelId>,
    next_track_id: u64,
    next_ingest_id: u64,
    ingests: HashMap<u64, JoinHandle<()>>,
    // Weak so the actor does not keep its own mailbox open.
    mailbox: mpsc::WeakUnboundedSender<SessionMessage>,
}

impl Session {
    /// Start a session actor on the current runtime.
    ///
    /// The actor runs until every [`SessionHandle`] (and every outstanding completion signal
    /// or ingest task) has been dropped.
    pub fn spawn(
        transport: Arc<dyn VoiceTransport>,
        announcer: Arc<dyn PlaybackAnnouncer>,
        volume: Volume,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            queue: QueueStore::new(),
            playback: PlaybackState::new(volume),
            transport,
            announcer,
            channel_id: None,
            next_track_id: 0,
            next_ingest_id: 0,
            ingests: HashMap::new(),
            mailbox: tx.downgrade(),
        };
        tokio::spawn(session.run(rx));
        SessionHandle { mailbox: tx }
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<SessionMessage>) {
        debug!("Session actor started");
        while let Some(message) = mailbox.recv().await {
            self.handle(message).await;
        }
        self.abort_ingests();
        debug!("Session actor finished");
    }

    async fn handle(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Connect { channel_id, reply } => {
                let _ = reply.send(self.connect(channel_id).await);
            }
            SessionMessage::Enqueue { entry, reply } => {
                let _ = reply.send(self.enqueue(entry).await);
            }
            SessionMessage::EnqueuePlaylist {
                title,
                entries,
                reply,
            } => {
                let _ = reply.send(self.start_ingest(title, entries));
            }
            SessionMessage::Ingested { ingest_id, entry } => {
                self.ingested(ingest_id, entry).await;
            }
            SessionMessage::IngestFinished {
                ingest_id,
                title,
                added,
                failed,
            } => {
                if self.ingests.remove(&ingest_id).is_some() {
                    info!("Playlist '{}' ingested: {} added, {} failed", title, added, failed);
                    self.announcer.announce(PlaybackEvent::PlaylistQueued {
                        title,
                        added,
                        failed,
                    });
                }
            }
            SessionMessage::TrackEnded { track_id, outcome } => {
                self.track_ended(track_id, outcome).await;
            }
            SessionMessage::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            SessionMessage::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            SessionMessage::TogglePause { reply } => {
                let result = match self.playback.status() {
                    PlayerStatus::Paused => self.resume().await,
                    _ => self.pause().await,
                };
                let _ = reply.send(result.map(|_| self.playback.status()));
            }
            SessionMessage::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            SessionMessage::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(Ok(()));
            }
            SessionMessage::SetVolume { percent, reply } => {
                let result = match Volume::from_percent(percent) {
                    Ok(volume) => self.apply_volume(volume).await,
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            SessionMessage::NudgeVolume { delta, reply } => {
                let volume = self.playback.volume().nudged(delta);
                let _ = reply.send(self.apply_volume(volume).await);
            }
            SessionMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Always forwarded: the transport knows whether its call is still live.
    async fn connect(&mut self, channel_id: ChannelId) -> MusicResult<()> {
        self.transport.connect(channel_id).await?;
        self.channel_id = Some(channel_id);
        Ok(())
    }

    async fn enqueue(&mut self, entry: QueueEntry) -> MusicResult<EnqueueOutcome> {
        if self.channel_id.is_none() {
            return Err(MusicError::NotConnected);
        }

        // An idle session always has an empty queue, so the entry goes straight to the transport.
        if self.playback.status() == PlayerStatus::Idle {
            self.start(entry).await?;
            return Ok(EnqueueOutcome::Started);
        }

        self.queue.enqueue(entry);
        Ok(EnqueueOutcome::Queued {
            position: self.queue.len(),
        })
    }

    fn start_ingest(&mut self, title: String, mut entries: EntryStream) -> MusicResult<()> {
        if self.channel_id.is_none() {
            return Err(MusicError::NotConnected);
        }
        let mailbox = self.mailbox.upgrade().ok_or(MusicError::SessionClosed)?;

        self.next_ingest_id += 1;
        let ingest_id = self.next_ingest_id;
        info!("Starting ingest {} for playlist '{}'", ingest_id, title);

        let task = tokio::spawn(async move {
            let (mut added, mut failed) = (0, 0);
            while let Some(item) = entries.next().await {
                match item {
                    Ok(entry) => {
                        if mailbox
                            .send(SessionMessage::Ingested { ingest_id, entry })
                            .is_err()
                        {
                            return;
                        }
                        added += 1;
                    }
                    Err(err) => {
                        warn!("Skipping playlist entry: {}", err);
                        failed += 1;
                    }
                }
            }
            let _ = mailbox.send(SessionMessage::IngestFinished {
                ingest_id,
                title,
                added,
                failed,
            });
        });

        self.ingests.insert(ingest_id, task);
        Ok(())
    }

    async fn ingested(&mut self, ingest_id: u64, entry: QueueEntry) {
        if !self.ingests.contains_key(&ingest_id) {
            debug!("Dropping '{}' from cancelled ingest {}", entry.title, ingest_id);
            return;
        }

        if self.playback.status() == PlayerStatus::Idle {
            if let Err(err) = self.start(entry.clone()).await {
                self.report_failure(entry, &err);
            }
        } else {
            self.queue.enqueue(entry);
        }
    }

    async fn track_ended(&mut self, track_id: u64, outcome: TrackOutcome) {
        if !self.playback.is_current(track_id) {
            debug!("Ignoring completion of stale track {}", track_id);
            return;
        }

        let finished = self.playback.ended();
        if let (TrackOutcome::Failed(reason), Some(finished)) = (outcome, finished) {
            self.report_failure(finished.entry, &MusicError::Transport(reason));
        }
        self.advance().await;
    }

    /// Pick the next playable entry, discarding entries that fail to start.
    ///
    /// Makes at most one attempt per entry queued when called.
    async fn advance(&mut self) {
        let attempts = self.queue.len();
        for _ in 0..attempts {
            let Ok(entry) = self.queue.dequeue() else {
                break;
            };
            match self.start(entry.clone()).await {
                Ok(()) => return,
                Err(err) => self.report_failure(entry, &err),
            }
        }

        info!("Queue exhausted, session is idle");
        self.playback.idle();
        self.announcer.announce(PlaybackEvent::QueueFinished);
    }

    async fn start(&mut self, entry: QueueEntry) -> MusicResult<()> {
        self.next_track_id += 1;
        let track_id = self.next_track_id;
        let mailbox = self.mailbox.upgrade().ok_or(MusicError::SessionClosed)?;
        let signal = CompletionSignal { mailbox, track_id };

        self.transport
            .play(&entry, self.playback.volume().gain(), signal)
            .await?;

        info!("Now playing '{}' (track {})", entry.title, track_id);
        self.playback.started(track_id, entry.clone());
        self.announcer.announce(PlaybackEvent::NowPlaying(entry));
        Ok(())
    }

    async fn pause(&mut self) -> MusicResult<QueueEntry> {
        // Validate before touching the transport.
        match self.playback.status() {
            PlayerStatus::Playing => {}
            PlayerStatus::Paused => return Err(MusicError::AlreadyPaused),
            _ => return Err(MusicError::NothingPlaying),
        }
        self.transport.pause().await?;
        self.playback.pause().cloned()
    }

    async fn resume(&mut self) -> MusicResult<QueueEntry> {
        match self.playback.status() {
            PlayerStatus::Paused => {}
            PlayerStatus::Playing => return Err(MusicError::NotPaused),
            _ => return Err(MusicError::NothingPlaying),
        }
        self.transport.resume().await?;
        self.playback.resume().cloned()
    }

    async fn skip(&mut self) -> MusicResult<QueueEntry> {
        let skipped = match self.playback.status() {
            PlayerStatus::Playing | PlayerStatus::Paused => self
                .playback
                .ended()
                .map(|now| now.entry)
                .ok_or(MusicError::NothingPlaying)?,
            _ => return Err(MusicError::NothingPlaying),
        };

        if let Err(err) = self.transport.stop().await {
            warn!("Failed to stop '{}' while skipping: {}", skipped.title, err);
        }
        self.advance().await;
        Ok(skipped)
    }

    async fn stop(&mut self) {
        self.abort_ingests();
        self.queue.clear();
        self.playback.idle();

        if let Err(err) = self.transport.stop().await {
            warn!("Failed to stop playback: {}", err);
        }
        if self.channel_id.take().is_some() {
            if let Err(err) = self.transport.disconnect().await {
                warn!("Failed to leave voice channel: {}", err);
            }
        }
        info!("Session stopped");
    }

    /// Stores `volume` once the current track (if any) has taken it.
    async fn apply_volume(&mut self, volume: Volume) -> MusicResult<Volume> {
        if self.playback.current().is_some() {
            self.transport.set_volume(volume.gain()).await?;
        }
        self.playback.set_volume(volume);
        Ok(volume)
    }

    fn abort_ingests(&mut self) {
        for (ingest_id, task) in self.ingests.drain() {
            debug!("Cancelling ingest {}", ingest_id);
            task.abort();
        }
    }

    fn report_failure(&self, entry: QueueEntry, err: &MusicError) {
        warn!("Failed to play '{}': {}", entry.title, err);
        self.announcer.announce(PlaybackEvent::TrackFailed {
            entry,
            reason: err.to_string(),
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.playback.status(),
            now_playing: self.playback.current().map(|now| now.entry.clone()),
            upcoming: self.queue.peek_all(),
            volume: self.playback.volume(),
            channel_id: self.channel_id,
        }
    }
}
