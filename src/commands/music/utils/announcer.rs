//! Outbound notifications from a session to the text channel it was started from.

use serenity::all::{ChannelId, CreateEmbed, CreateMessage, Http};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use super::{embedded_messages, queue::QueueEntry, reaction_controls::ReactionControl};

/// Something the session wants the users to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NowPlaying(QueueEntry),
    TrackFailed { entry: QueueEntry, reason: String },
    QueueFinished,
    PlaylistQueued {
        title: String,
        added: usize,
        failed: usize,
    },
}

/// Receives playback events. Implementations must not block: the session calls this
/// from its actor task.
pub trait PlaybackAnnouncer: Send + Sync {
    fn announce(&self, event: PlaybackEvent);
}

/// Posts playback events as embeds in a Discord text channel.
///
/// Events are posted one at a time by a worker task, in the order they were announced.
pub struct ChannelAnnouncer {
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self::with_poster(move |event| {
            let http = http.clone();
            async move { post_event(&http, channel_id, event).await }
        })
    }

    /// Start the worker with a custom way of posting each event.
    pub fn with_poster<F, Fut>(post: F) -> Self
    where
        F: Fn(PlaybackEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (events, mut pending) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                post(event).await;
            }
        });
        Self { events }
    }
}

impl PlaybackAnnouncer for ChannelAnnouncer {
    fn announce(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            warn!("Announcer worker is gone, dropping playback update");
        }
    }
}

fn embed_for(event: &PlaybackEvent) -> CreateEmbed {
    match event {
        PlaybackEvent::NowPlaying(entry) => embedded_messages::now_playing(entry),
        PlaybackEvent::TrackFailed { entry, reason } => embedded_messages::track_failed(entry, reason),
        PlaybackEvent::QueueFinished => embedded_messages::queue_finished(),
        PlaybackEvent::PlaylistQueued {
            title,
            added,
            failed,
        } => embedded_messages::playlist_queued(title, *added, *failed),
    }
}

async fn post_event(http: &Http, channel_id: ChannelId, event: PlaybackEvent) {
    let message = CreateMessage::new().embed(embed_for(&event));
    let sent = match channel_id.send_message(http, message).await {
        Ok(sent) => sent,
        Err(e) => {
            warn!("Failed to post playback update in {}: {}", channel_id, e);
            return;
        }
    };

    // Seed the transport controls on every now-playing message
    if let PlaybackEvent::NowPlaying(_) = event {
        for control in ReactionControl::ALL {
            if let Err(e) = sent.react(http, control.reaction()).await {
                warn!("Failed to add {} reaction: {}", control.emoji(), e);
                break;
            }
        }
    }
}
