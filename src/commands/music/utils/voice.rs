//! The voice transport port and its songbird-backed implementation.

use serenity::async_trait;
use serenity::client::Context as SerenityContext;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::input::{Input, YoutubeDl};
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{Event, EventContext, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{MusicError, MusicResult};
use super::queue::QueueEntry;
use super::session::{CompletionSignal, TrackOutcome};

/// Everything a session needs from the voice side. Completion of a started track is
/// reported through the [`CompletionSignal`] handed to [`VoiceTransport::play`].
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel_id: ChannelId) -> MusicResult<()>;

    /// Start `entry`, replacing whatever is playing.
    async fn play(
        &self,
        entry: &QueueEntry,
        volume: f32,
        on_complete: CompletionSignal,
    ) -> MusicResult<()>;

    async fn pause(&self) -> MusicResult<()>;

    async fn resume(&self) -> MusicResult<()>;

    async fn stop(&self) -> MusicResult<()>;

    async fn disconnect(&self) -> MusicResult<()>;

    async fn set_volume(&self, volume: f32) -> MusicResult<()>;
}

/// Get the Songbird voice client from the context
pub async fn get_songbird(ctx: &SerenityContext) -> MusicResult<Arc<Songbird>> {
    songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
}

/// Get the voice channel ID that the user is currently in
pub fn get_user_voice_channel(
    ctx: &SerenityContext,
    guild_id: GuildId,
    user_id: UserId,
) -> MusicResult<ChannelId> {
    let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

    let voice_state = guild
        .voice_states
        .get(&user_id)
        .ok_or(MusicError::UserNotInVoiceChannel)?;

    voice_state
        .channel_id
        .ok_or(MusicError::UserNotInVoiceChannel)
}

/// Plays tracks into one guild's voice call through songbird.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http_client: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http_client: reqwest::Client) -> Self {
        Self {
            manager,
            guild_id,
            http_client,
            current: Mutex::new(None),
        }
    }

    fn input_for(&self, entry: &QueueEntry) -> Input {
        match entry.search_terms() {
            Some(terms) => {
                YoutubeDl::new_search(self.http_client.clone(), terms.to_string()).into()
            }
            None => YoutubeDl::new(self.http_client.clone(), entry.source_uri.clone()).into(),
        }
    }

    async fn with_current<F>(&self, action: F) -> MusicResult<()>
    where
        F: FnOnce(&TrackHandle) -> Result<(), songbird::error::ControlError>,
    {
        let current = self.current.lock().await;
        let track = current.as_ref().ok_or(MusicError::NothingPlaying)?;
        action(track).map_err(|e| MusicError::Transport(e.to_string()))
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, channel_id: ChannelId) -> MusicResult<()> {
        // Only a live call in the same channel counts; a kicked bot keeps a call with no channel.
        if let Some(call) = self.manager.get(self.guild_id) {
            let current = call.lock().await.current_channel();
            if current == Some(songbird::id::ChannelId::from(channel_id)) {
                debug!("Already in channel {} in guild {}", channel_id, self.guild_id);
                return Ok(());
            }
        }

        info!("Joining channel {} in guild {}", channel_id, self.guild_id);
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| MusicError::Transport(format!("Failed to join voice channel: {}", e)))?;
        Ok(())
    }

    async fn play(
        &self,
        entry: &QueueEntry,
        volume: f32,
        on_complete: CompletionSignal,
    ) -> MusicResult<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(MusicError::NotConnected)?;

        let track = Track::from(self.input_for(entry)).volume(volume);
        let handle = {
            let mut handler = call.lock().await;
            handler.play_only(track)
        };
        debug!(
            "Track handle created for: {} (track {})",
            entry.title,
            on_complete.track_id()
        );

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        signal: on_complete.clone(),
                    },
                )
                .map_err(|e| MusicError::Transport(e.to_string()))?;
        }

        *self.current.lock().await = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        self.with_current(|track| track.pause()).await
    }

    async fn resume(&self) -> MusicResult<()> {
        self.with_current(|track| track.play()).await
    }

    async fn stop(&self) -> MusicResult<()> {
        let Some(track) = self.current.lock().await.take() else {
            return Ok(());
        };
        match track.stop() {
            Ok(()) | Err(songbird::error::ControlError::Finished) => Ok(()),
            Err(e) => Err(MusicError::Transport(e.to_string())),
        }
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.current.lock().await.take();

        if self.manager.get(self.guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }
        info!("Leaving voice channel in guild {}", self.guild_id);
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::Transport(format!("Failed to leave voice channel: {}", e)))
    }

    async fn set_volume(&self, volume: f32) -> MusicResult<()> {
        match self.with_current(|track| track.set_volume(volume)).await {
            // Nothing to apply it to; the session passes the volume to the next track.
            Err(MusicError::NothingPlaying) => Ok(()),
            other => other,
        }
    }
}

/// Songbird event handler forwarding the end (or failure) of a track to its session.
struct TrackEndNotifier {
    signal: CompletionSignal,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            let outcome = match tracks.first().map(|(state, _)| &state.playing) {
                Some(PlayMode::Errored(err)) => {
                    warn!("Track errored during playback: {}", err);
                    TrackOutcome::Failed(err.to_string())
                }
                _ => TrackOutcome::Finished,
            };
            self.signal.notify(outcome);
        }
        None
    }
}
