//! Process configuration read from the environment (and `.env` via `dotenv`).

use std::env;

use crate::commands::music::{
    audio_sources::spotify::SpotifyCredentials,
    utils::{
        error::{MusicError, MusicResult},
        playback::Volume,
    },
};

const DEFAULT_PREFIX: &str = "!";

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub discord_token: String,
    pub command_prefix: String,
    pub default_volume: Volume,
    pub spotify: Option<SpotifyCredentials>,
}

impl BotConfig {
    pub fn from_env() -> MusicResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> MusicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN")
            .ok_or_else(|| MusicError::Config("DISCORD_TOKEN not set".to_string()))?;

        let command_prefix = var("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let default_volume = match var("DEFAULT_VOLUME") {
            Some(raw) => {
                let percent = raw.trim().parse::<i64>().map_err(|_| {
                    MusicError::Config(format!("DEFAULT_VOLUME must be a whole number, got '{}'", raw))
                })?;
                Volume::from_percent(percent)
                    .map_err(|e| MusicError::Config(format!("DEFAULT_VOLUME: {}", e)))?
            }
            None => Volume::default(),
        };

        let spotify = match (var("SPOTIFY_CLIENT_ID"), var("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Ok(Self {
            discord_token,
            command_prefix,
            default_volume,
            spotify,
        })
    }
}
