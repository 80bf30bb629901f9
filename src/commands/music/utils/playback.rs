//! Playback state owned by a single voice session.

use std::fmt;
use std::ops::RangeInclusive;

use super::error::{MusicError, MusicResult};
use super::queue::QueueEntry;

/// Accepted volume range in percent.
pub const VOLUME_BOUNDS: RangeInclusive<i64> = 0..=100;

/// Where the continuation state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
    /// Transient: a track finished and the next one has not been picked yet.
    Ended,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// Playback volume as a gain in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    pub const FULL: Volume = Volume(1.0);

    /// Validates a percentage and converts it into a gain.
    pub fn from_percent(percent: i64) -> MusicResult<Self> {
        if !VOLUME_BOUNDS.contains(&percent) {
            return Err(MusicError::VolumeOutOfRange {
                value: percent,
                bounds: VOLUME_BOUNDS,
            });
        }
        Ok(Volume(percent as f32 / 100.0))
    }

    pub fn gain(self) -> f32 {
        self.0
    }

    pub fn percent(self) -> i64 {
        (self.0 * 100.0).round() as i64
    }

    /// Shift by `delta` percent, saturating at the bounds.
    pub fn nudged(self, delta: i64) -> Self {
        let percent = (self.percent() + delta).clamp(*VOLUME_BOUNDS.start(), *VOLUME_BOUNDS.end());
        Volume(percent as f32 / 100.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::FULL
    }
}

/// The track currently handed to the voice transport.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    /// Identifies the track in completion signals.
    pub track_id: u64,
    pub entry: QueueEntry,
}

#[derive(Debug)]
pub struct PlaybackState {
    status: PlayerStatus,
    current: Option<NowPlaying>,
    volume: Volume,
}

impl PlaybackState {
    pub fn new(volume: Volume) -> Self {
        Self {
            status: PlayerStatus::Idle,
            current: None,
            volume,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn current(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current.as_ref().map(|now| now.entry.title.as_str())
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Whether `track_id` is the track the session is waiting on.
    pub fn is_current(&self, track_id: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|now| now.track_id == track_id)
    }

    pub fn started(&mut self, track_id: u64, entry: QueueEntry) {
        self.current = Some(NowPlaying { track_id, entry });
        self.status = PlayerStatus::Playing;
    }

    /// Clears the current track, returning it.
    pub fn ended(&mut self) -> Option<NowPlaying> {
        self.status = PlayerStatus::Ended;
        self.current.take()
    }

    pub fn idle(&mut self) {
        self.current = None;
        self.status = PlayerStatus::Idle;
    }

    pub fn pause(&mut self) -> MusicResult<&QueueEntry> {
        match self.status {
            PlayerStatus::Playing => {
                self.status = PlayerStatus::Paused;
                self.current_entry()
            }
            PlayerStatus::Paused => Err(MusicError::AlreadyPaused),
            PlayerStatus::Idle | PlayerStatus::Ended => Err(MusicError::NothingPlaying),
        }
    }

    pub fn resume(&mut self) -> MusicResult<&QueueEntry> {
        match self.status {
            PlayerStatus::Paused => {
                self.status = PlayerStatus::Playing;
                self.current_entry()
            }
            PlayerStatus::Playing => Err(MusicError::NotPaused),
            PlayerStatus::Idle | PlayerStatus::Ended => Err(MusicError::NothingPlaying),
        }
    }

    pub fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
    }

    fn current_entry(&self) -> MusicResult<&QueueEntry> {
        self.current
            .as_ref()
            .map(|now| &now.entry)
            .ok_or(MusicError::NothingPlaying)
    }
}
