//! Resolves search terms, YouTube links and YouTube playlists through the `yt-dlp`
//! command-line tool.

use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use serenity::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::{AudioSource, Resolution, TrackResolver};
use crate::commands::music::utils::{
    error::{MusicError, MusicResult},
    queue::QueueEntry,
};

const YTDLP: &str = "yt-dlp";

/// Resolves queries by shelling out to `yt-dlp`.
#[derive(Debug, Default, Clone)]
pub struct YoutubeApi;

#[async_trait]
impl TrackResolver for YoutubeApi {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Resolution> {
        if !AudioSource::is_url(query) {
            let entry = Self::search(query).await?;
            return Ok(Resolution::Track(entry.requested_by(requested_by)));
        }

        if Self::is_playlist_url(query) {
            let (title, entries) = Self::playlist(query).await?;
            let requested_by = requested_by.to_string();
            let entries = stream::iter(entries)
                .map(move |entry| entry.map(|e| e.requested_by(requested_by.clone())))
                .boxed();
            return Ok(Resolution::Playlist { title, entries });
        }

        let entry = Self::single(query).await?;
        Ok(Resolution::Track(entry.requested_by(requested_by)))
    }
}

impl YoutubeApi {
    /// Checks if the input is a YouTube playlist page.
    pub fn is_playlist_url(query: &str) -> bool {
        match Url::parse(query) {
            Ok(url) => {
                url.host_str().is_some_and(|host| {
                    host == "www.youtube.com" || host == "youtube.com" || host == "music.youtube.com"
                }) && url.path().starts_with("/playlist")
            }
            Err(_) => false,
        }
    }

    /// First search result for `terms`.
    pub async fn search(terms: &str) -> MusicResult<QueueEntry> {
        info!("Searching YouTube for: {}", terms);
        let search_param = format!("ytsearch1:{}", terms);
        let stdout = run_ytdlp(&["-j", "--no-playlist", &search_param]).await?;
        if stdout.trim().is_empty() {
            return Err(MusicError::Resolution(format!("No results for '{}'", terms)));
        }
        parse_track(&stdout)
    }

    /// Metadata of a single linked video. Playlist parameters on the link are ignored.
    pub async fn single(url: &str) -> MusicResult<QueueEntry> {
        info!("Fetching YouTube metadata for URL: {}", url);
        let stdout = run_ytdlp(&["-j", "--no-playlist", url]).await?;
        parse_track(&stdout)
    }

    /// Title and entries of a playlist, listed without resolving every video.
    pub async fn playlist(url: &str) -> MusicResult<(String, Vec<MusicResult<QueueEntry>>)> {
        info!("Fetching YouTube playlist: {}", url);
        let stdout = run_ytdlp(&["--flat-playlist", "-J", url]).await?;
        parse_playlist(&stdout)
    }
}

async fn run_ytdlp(args: &[&str]) -> MusicResult<String> {
    debug!("Running {} {:?}", YTDLP, args);
    let output = Command::new(YTDLP)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| MusicError::Resolution(format!("Failed to run {}: {}", YTDLP, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("unknown error")
            .trim()
            .to_string();
        return Err(MusicError::Resolution(reason));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_json(raw: &str) -> MusicResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| MusicError::Resolution(format!("Failed to parse video metadata: {}", e)))
}

fn duration_of(value: &Value) -> Option<Duration> {
    value["duration"]
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Converts the output of `yt-dlp -j` into a queue entry.
pub fn parse_track(raw: &str) -> MusicResult<QueueEntry> {
    // Searches may print one object per line; the first one wins.
    let first = raw
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    let metadata = parse_json(first)?;

    let url = metadata["webpage_url"]
        .as_str()
        .or_else(|| metadata["original_url"].as_str())
        .ok_or_else(|| MusicError::Resolution("Video metadata has no page URL".to_string()))?;

    let title = metadata["title"].as_str().unwrap_or("Unknown Title");

    Ok(QueueEntry::new(url, title).with_duration(duration_of(&metadata)))
}

/// Converts the output of `yt-dlp --flat-playlist -J` into a playlist title and its
/// entries. Entries that cannot be played are kept as errors so they can be counted.
pub fn parse_playlist(raw: &str) -> MusicResult<(String, Vec<MusicResult<QueueEntry>>)> {
    let playlist = parse_json(raw)?;
    let title = playlist["title"]
        .as_str()
        .unwrap_or("Untitled playlist")
        .to_string();

    let entries: Vec<MusicResult<QueueEntry>> = playlist["entries"]
        .as_array()
        .map(|items| items.iter().map(playlist_entry).collect())
        .unwrap_or_default();

    if entries.is_empty() {
        return Err(MusicError::Resolution(format!("Playlist '{}' is empty", title)));
    }
    Ok((title, entries))
}

fn playlist_entry(item: &Value) -> MusicResult<QueueEntry> {
    let title = item["title"].as_str().unwrap_or("Unknown Title");

    let url = match (item["url"].as_str(), item["id"].as_str()) {
        (Some(url), _) if AudioSource::is_url(url) => url.to_string(),
        (_, Some(id)) => format!("https://www.youtube.com/watch?v={}", id),
        _ => {
            return Err(MusicError::Resolution(format!(
                "Playlist entry '{}' has no link",
                title
            )));
        }
    };

    Ok(QueueEntry::new(url, title).with_duration(duration_of(item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("https://www.youtube.com/playlist?list=PL123", true ; "playlist page")]
    #[test_case("https://music.youtube.com/playlist?list=PL123", true ; "music playlist page")]
    #[test_case("https://www.youtube.com/watch?v=abc&list=PL123", false ; "video inside playlist")]
    #[test_case("https://youtu.be/abc", false ; "short link")]
    #[test_case("lofi beats", false ; "search terms")]
    fn detects_playlist_urls(query: &str, expected: bool) {
        assert_eq!(YoutubeApi::is_playlist_url(query), expected);
    }

    #[test]
    fn parses_single_video() {
        let raw = r#"{"title":"Song","webpage_url":"https://www.youtube.com/watch?v=abc","duration":212.0,"url":"https://rr1.googlevideo.com/stream"}"#;
        let entry = parse_track(raw).unwrap();

        assert_eq!(entry.source_uri, "https://www.youtube.com/watch?v=abc");
        assert_eq!(entry.title, "Song");
        assert_eq!(entry.duration, Some(Duration::from_secs(212)));
    }

    #[test_case("-5" ; "negative")]
    #[test_case("1e300" ; "beyond any duration")]
    fn unusable_durations_are_dropped(duration: &str) {
        let raw = format!(
            r#"{{"title":"Song","webpage_url":"https://www.youtube.com/watch?v=abc","duration":{}}}"#,
            duration
        );
        assert_eq!(parse_track(&raw).unwrap().duration, None);
    }

    #[test]
    fn takes_first_line_of_search_output() {
        let raw = "{\"title\":\"First\",\"webpage_url\":\"https://www.youtube.com/watch?v=1\"}\n{\"title\":\"Second\",\"webpage_url\":\"https://www.youtube.com/watch?v=2\"}\n";
        assert_eq!(parse_track(raw).unwrap().title, "First");
    }

    #[test]
    fn missing_page_url_is_a_resolution_error() {
        assert_matches!(parse_track(r#"{"title":"Song"}"#), Err(MusicError::Resolution(_)));
    }

    #[test]
    fn garbage_is_a_resolution_error() {
        assert_matches!(parse_track("not json"), Err(MusicError::Resolution(_)));
    }

    #[test]
    fn parses_flat_playlist() {
        let raw = r#"{
            "title": "Mix",
            "entries": [
                {"id": "a1", "title": "One", "url": "https://www.youtube.com/watch?v=a1", "duration": 61},
                {"id": "b2", "title": "Two"},
                {"title": "[Deleted video]"}
            ]
        }"#;
        let (title, entries) = parse_playlist(raw).unwrap();

        assert_eq!(title, "Mix");
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].as_ref().unwrap().duration,
            Some(Duration::from_secs(61))
        );
        assert_eq!(
            entries[1].as_ref().unwrap().source_uri,
            "https://www.youtube.com/watch?v=b2"
        );
        assert_matches!(entries[2], Err(MusicError::Resolution(_)));
    }

    #[test]
    fn empty_playlist_is_rejected() {
        let raw = r#"{"title": "Nothing", "entries": []}"#;
        assert_matches!(parse_playlist(raw), Err(MusicError::Resolution(_)));
    }
}
