//! Turning what a user typed into queue entries.
//!
//! [`TrackResolver`] is the port the play command depends on. [`SourceResolver`] is the
//! production implementation, dispatching Spotify links to the Spotify Web API and
//! everything else (search terms, YouTube links and playlists) to `yt-dlp`.

/// Submodule resolving Spotify tracks, playlists and albums.
pub mod spotify;
/// Submodule resolving searches and links through `yt-dlp`.
pub mod youtube;

use serenity::async_trait;
use std::fmt;
use tracing::info;
use url::Url;

use crate::commands::music::utils::{
    error::{MusicError, MusicResult},
    queue::QueueEntry,
    session::{EnqueueOutcome, EntryStream, SessionHandle},
};
use spotify::SpotifyApi;
use youtube::YoutubeApi;

/// What a query resolved to.
pub enum Resolution {
    Track(QueueEntry),
    /// A playlist whose entries arrive as they are resolved.
    Playlist { title: String, entries: EntryStream },
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Track(entry) => f.debug_tuple("Track").field(entry).finish(),
            Resolution::Playlist { title, .. } => f
                .debug_struct("Playlist")
                .field("title", title)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolves user queries into playable entries.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Resolution>;
}

/// A utility struct providing general helper functions related to audio sources.
pub struct AudioSource;

impl AudioSource {
    /// Performs a basic check if the input string can be parsed as a URL.
    /// Does not validate if the URL is actually reachable or supported by any specific API.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input).is_ok()
    }
}

/// Resolver used by the bot: Spotify when configured, `yt-dlp` for everything else.
pub struct SourceResolver {
    youtube: YoutubeApi,
    spotify: Option<SpotifyApi>,
}

impl SourceResolver {
    pub fn new(youtube: YoutubeApi, spotify: Option<SpotifyApi>) -> Self {
        Self { youtube, spotify }
    }
}

#[async_trait]
impl TrackResolver for SourceResolver {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Resolution> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::Resolution(
                "Tell me what to play: a link or some search terms".to_string(),
            ));
        }

        if SpotifyApi::is_spotify_url(query) {
            let spotify = self.spotify.as_ref().ok_or_else(|| {
                MusicError::Config("Spotify credentials are not configured".to_string())
            })?;
            return spotify.resolve(query, requested_by).await;
        }

        self.youtube.resolve(query, requested_by).await
    }
}

/// What the play command did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started(QueueEntry),
    Queued { entry: QueueEntry, position: usize },
    Playlist { title: String },
}

/// Resolve `query` and hand the result to `session`.
///
/// Resolution happens on the caller's task; the session only ever sees finished entries.
pub async fn queue_request(
    resolver: &dyn TrackResolver,
    session: &SessionHandle,
    query: &str,
    requested_by: &str,
) -> MusicResult<PlayOutcome> {
    match resolver.resolve(query, requested_by).await? {
        Resolution::Track(entry) => {
            info!("Resolved '{}' to '{}'", query, entry.title);
            match session.enqueue(entry.clone()).await? {
                EnqueueOutcome::Started => Ok(PlayOutcome::Started(entry)),
                EnqueueOutcome::Queued { position } => Ok(PlayOutcome::Queued { entry, position }),
            }
        }
        Resolution::Playlist { title, entries } => {
            info!("Resolved '{}' to playlist '{}'", query, title);
            session.enqueue_playlist(title.clone(), entries).await?;
            Ok(PlayOutcome::Playlist { title })
        }
    }
}
