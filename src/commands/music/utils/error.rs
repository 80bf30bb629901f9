use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    #[error("The queue is empty")]
    EmptyQueue,

    #[error("Failed to resolve track: {0}")]
    Resolution(String),

    #[error("Voice transport error: {0}")]
    Transport(String),

    #[error("Volume {value}% is out of range, must be within {bounds:?}")]
    VolumeOutOfRange {
        value: i64,
        bounds: RangeInclusive<i64>,
    },

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("The track is already paused")]
    AlreadyPaused,

    #[error("The track is not paused")]
    NotPaused,

    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("The voice session has already ended")]
    SessionClosed,

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;
