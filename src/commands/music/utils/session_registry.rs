use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::{MusicError, MusicResult};
use super::session::SessionHandle;

/// Live voice sessions, one per guild.
///
/// Starting and stopping a guild's session are serialized, so a session is never started
/// while the previous one is still leaving the guild's voice call.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    lifecycles: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lifecycle(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.lifecycles.entry(guild_id).or_default().clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Look up the guild's session, requiring one to exist.
    pub fn require(&self, guild_id: GuildId) -> MusicResult<SessionHandle> {
        self.get(guild_id).ok_or(MusicError::NotConnected)
    }

    /// Return the guild's session connected to `channel_id`, starting one with `spawn` if
    /// there is none. A session created here that fails to connect is discarded again.
    pub async fn get_or_start<F>(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        spawn: F,
    ) -> MusicResult<SessionHandle>
    where
        F: FnOnce() -> SessionHandle,
    {
        let lifecycle = self.lifecycle(guild_id);
        let _guard = lifecycle.lock().await;

        let (handle, created) = match self.get(guild_id) {
            Some(handle) => (handle, false),
            None => {
                // Replaces a closed handle left behind by a session that exited.
                let fresh = spawn();
                self.sessions.insert(guild_id, fresh.clone());
                (fresh, true)
            }
        };

        if created {
            info!("Started voice session for guild {}", guild_id);
        }

        if let Err(err) = handle.connect(channel_id).await {
            if created {
                warn!("New session for guild {} failed to connect: {}", guild_id, err);
                self.remove_if_same(guild_id, &handle);
            }
            return Err(err);
        }
        Ok(handle)
    }

    fn remove_if_same(&self, guild_id: GuildId, handle: &SessionHandle) {
        self.sessions
            .remove_if(&guild_id, |_, existing| existing.same_session(handle));
    }

    /// Stop the guild's session and forget it once it has left the voice channel.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        let lifecycle = self.lifecycle(guild_id);
        let _guard = lifecycle.lock().await;

        let handle = self.require(guild_id)?;
        handle.stop().await?;
        self.remove_if_same(guild_id, &handle);
        info!("Stopped voice session for guild {}", guild_id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
