//! Resolves Spotify links through the Spotify Web API.
//! Handles authentication (client credentials flow), URL parsing and pagination. Spotify
//! does not serve audio, so every track becomes a deferred YouTube search.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use serenity::async_trait;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Resolution, TrackResolver};
use crate::commands::music::utils::{
    error::{MusicError, MusicResult},
    queue::QueueEntry,
    session::EntryStream,
};

/// Result type specific to Spotify API operations.
pub type SpotifyResult<T> = Result<T, MusicError>;

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com";
const PAGE_SIZE: usize = 50;

/// Matches track, playlist and album links as well as `spotify:` URIs.
static SPOTIFY_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?://)?open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?|spotify:)(track|playlist|album)[/:]([a-zA-Z0-9]+)(?:\?.*)?$",
    )
    .expect("Spotify URL regex is valid")
});

/// What a Spotify link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Playlist,
    Album,
}

/// Represents basic track information retrieved from Spotify.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotifyTrack {
    pub name: String,
    pub artists: Vec<String>,
    pub duration: Option<Duration>,
}

impl SpotifyTrack {
    fn from_json(track: &Value) -> SpotifyResult<Self> {
        let name = track["name"]
            .as_str()
            .ok_or_else(|| MusicError::ExternalApi("Missing track name".to_string()))?
            .to_string();

        let artists = track["artists"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let duration = track["duration_ms"].as_u64().map(Duration::from_millis);

        Ok(SpotifyTrack {
            name,
            artists,
            duration,
        })
    }

    /// Creates a YouTube search query from the track details
    /// (e.g., "Track Name by Artist1, Artist2 audio").
    pub fn youtube_search_query(&self) -> String {
        format!("{} by {} audio", self.name, self.artists.join(", "))
    }

    pub fn display_title(&self) -> String {
        if self.artists.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.artists.join(", "), self.name)
        }
    }

    pub fn into_entry(self) -> QueueEntry {
        QueueEntry::deferred_search(&self.youtube_search_query(), self.display_title())
            .with_duration(self.duration)
    }
}

/// Represents the response from Spotify's token endpoint.
#[derive(Debug, Deserialize)]
struct SpotifyToken {
    access_token: String,
    expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    /// Considers the token expired 30 seconds before its actual expiry time.
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        self.created_at.elapsed() > expiry.saturating_sub(Duration::from_secs(30))
    }
}

/// Application credentials for the client credentials flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Spotify Web API client with a cached access token.
pub struct SpotifyApi {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    token: Mutex<Option<SpotifyToken>>,
    accounts_base: String,
    api_base: String,
}

impl SpotifyApi {
    pub fn new(http: reqwest::Client, credentials: SpotifyCredentials) -> Self {
        Self::with_endpoints(http, credentials, ACCOUNTS_BASE, API_BASE)
    }

    /// Client talking to alternative endpoints, e.g. a local mock server.
    pub fn with_endpoints(
        http: reqwest::Client,
        credentials: SpotifyCredentials,
        accounts_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            token: Mutex::new(None),
            accounts_base: accounts_base.into(),
            api_base: api_base.into(),
        }
    }

    /// Checks if the provided URL is a Spotify track, playlist or album link.
    pub fn is_spotify_url(url: &str) -> bool {
        SPOTIFY_URL_REGEX.is_match(url)
    }

    /// Splits a Spotify link into what it points at and the id.
    pub fn parse_url(url: &str) -> Option<(SpotifyKind, String)> {
        let captures = SPOTIFY_URL_REGEX.captures(url)?;
        let kind = match captures.get(1)?.as_str() {
            "track" => SpotifyKind::Track,
            "playlist" => SpotifyKind::Playlist,
            "album" => SpotifyKind::Album,
            _ => return None,
        };
        Some((kind, captures.get(2)?.as_str().to_string()))
    }

    /// Retrieves a valid access token, requesting a new one when the cached token is
    /// missing or about to expire.
    async fn access_token(&self) -> SpotifyResult<String> {
        let mut token_lock = self.token.lock().await;

        if let Some(token) = &*token_lock {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting a new Spotify access token");
        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApi(format!("Failed to request Spotify token: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let token = response.json::<SpotifyToken>().await.map_err(|e| {
            MusicError::ExternalApi(format!("Failed to parse Spotify token: {}", e))
        })?;

        let access_token = token.access_token.clone();
        *token_lock = Some(token);
        Ok(access_token)
    }

    /// Fetches a single track by id.
    pub async fn get_track(&self, track_id: &str) -> SpotifyResult<SpotifyTrack> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/tracks/{}", self.api_base, track_id);
        let track = get_json(&self.http, &url, &token).await?;
        SpotifyTrack::from_json(&track)
    }

    /// Title of a playlist or album together with its track count.
    async fn collection_header(
        &self,
        kind: SpotifyKind,
        id: &str,
        token: &str,
    ) -> SpotifyResult<(String, u64)> {
        let (url, total_pointer) = match kind {
            SpotifyKind::Playlist => (
                format!("{}/v1/playlists/{}?fields=name,tracks.total", self.api_base, id),
                "/tracks/total",
            ),
            _ => (format!("{}/v1/albums/{}", self.api_base, id), "/total_tracks"),
        };
        let header = get_json(&self.http, &url, token).await?;

        let name = header["name"].as_str().unwrap_or("Spotify playlist").to_string();
        let total = header.pointer(total_pointer).and_then(Value::as_u64).unwrap_or(0);
        Ok((name, total))
    }

    /// Every track of a playlist or album, fetched page by page as the stream is polled.
    fn collection_tracks(
        &self,
        kind: SpotifyKind,
        id: &str,
        token: String,
        requested_by: &str,
    ) -> EntryStream {
        let first_page = match kind {
            SpotifyKind::Playlist => format!(
                "{}/v1/playlists/{}/tracks?limit={}",
                self.api_base, id, PAGE_SIZE
            ),
            _ => format!("{}/v1/albums/{}/tracks?limit={}", self.api_base, id, PAGE_SIZE),
        };
        let http = self.http.clone();
        let requested_by = requested_by.to_string();

        stream::try_unfold(Some(first_page), move |next| {
            let http = http.clone();
            let token = token.clone();
            let requested_by = requested_by.clone();
            async move {
                let Some(url) = next else {
                    return Ok(None);
                };
                let page = get_json(&http, &url, &token).await?;
                let entries: Vec<MusicResult<QueueEntry>> = page_tracks(&page, kind)
                    .into_iter()
                    .map(|track| track.map(|t| t.into_entry().requested_by(requested_by.clone())))
                    .collect();
                let next = page["next"].as_str().map(str::to_string);
                Ok::<_, MusicError>(Some((entries, next)))
            }
        })
        .map_ok(stream::iter)
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl TrackResolver for SpotifyApi {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Resolution> {
        info!("Resolving Spotify link: {}", query);
        let (kind, id) = Self::parse_url(query)
            .ok_or_else(|| MusicError::Resolution("Invalid Spotify URL".to_string()))?;

        if kind == SpotifyKind::Track {
            let track = self.get_track(&id).await?;
            return Ok(Resolution::Track(track.into_entry().requested_by(requested_by)));
        }

        let token = self.access_token().await?;
        let (title, total) = self.collection_header(kind, &id, &token).await?;
        if total == 0 {
            return Err(MusicError::Resolution(format!("'{}' has no tracks", title)));
        }
        info!("Spotify collection '{}' has {} tracks", title, total);

        let entries = self.collection_tracks(kind, &id, token, requested_by);
        Ok(Resolution::Playlist { title, entries })
    }
}

/// Tracks listed on one page. Local playlist files (no Spotify id) are left out.
fn page_tracks(page: &Value, kind: SpotifyKind) -> Vec<SpotifyResult<SpotifyTrack>> {
    let Some(items) = page["items"].as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match kind {
            SpotifyKind::Playlist => item.get("track").filter(|t| t.is_object()),
            _ => Some(item),
        })
        .filter(|track| !track["id"].is_null())
        .map(SpotifyTrack::from_json)
        .collect()
}

async fn get_json(http: &reqwest::Client, url: &str, token: &str) -> SpotifyResult<Value> {
    let response = http
        .get(url)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .send()
        .await
        .map_err(|e| MusicError::ExternalApi(format!("Failed to request {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| MusicError::ExternalApi(format!("Failed to parse Spotify response: {}", e)))
}

async fn api_error(response: reqwest::Response) -> MusicError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Cannot read response".to_string());
    MusicError::ExternalApi(format!("Spotify API error: {} - {}", status, text))
}
