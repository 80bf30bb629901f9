use poise::CreateReply;
use serenity::all::{CreateEmbed, CreateEmbedFooter};

use super::{
    error::MusicError,
    format_duration,
    playback::{PlayerStatus, Volume},
    queue::{QueueEntry, QueueSnapshot},
    session::SessionSnapshot,
};

const GREEN: u32 = 0x00ff00;
const RED: u32 = 0xff0000;

/// Number of upcoming entries listed before the rest are summarised.
const QUEUE_PAGE: usize = 15;

fn entry_link(entry: &QueueEntry) -> String {
    format!("[{}]({})", entry.title, entry.display_url())
}

fn duration_label(entry: &QueueEntry) -> String {
    entry
        .duration
        .map(format_duration)
        .unwrap_or_else(|| "Unknown duration".to_string())
}

/// Red embed describing what went wrong
pub fn error_embed(description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Error")
        .description(description)
        .color(RED)
}

/// Ephemeral reply for a failed music command
pub fn error(err: &MusicError) -> CreateReply {
    CreateReply::default()
        .embed(error_embed(err.to_string()))
        .ephemeral(true)
}

/// Reply for a query that could not be resolved
pub fn resolution_failed(err: &MusicError) -> CreateReply {
    CreateReply::default().embed(error_embed(format!("Error occurred: {}", err)))
}

/// Create an embed for when a song is now playing
pub fn now_playing(entry: &QueueEntry) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("🎵 Now Playing")
        .description(entry_link(entry))
        .field("Duration", format!("`{}`", duration_label(entry)), true)
        .color(GREEN);

    if let Some(requested_by) = &entry.requested_by {
        embed = embed.field("Requested by", requested_by, true);
    }
    embed
}

/// Reply for a request that started playing right away; the now-playing card follows.
pub fn started_playing(entry: &QueueEntry) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("▶️ Starting")
            .description(format!("Starting {}", entry_link(entry)))
            .color(GREEN),
    )
}

/// Create a reply for when a song is added to the queue
pub fn added_to_queue(entry: &QueueEntry, position: usize) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Added to Queue")
            .description(format!("Added to queue: **{}**", entry.title))
            .field("Duration", format!("`{}`", duration_label(entry)), true)
            .field("Position", format!("`#{}`", position), true)
            .color(GREEN),
    )
}

pub fn playlist_accepted(title: &str) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("📋 Queueing Playlist")
            .description(format!("Adding tracks from **{}**", title))
            .color(GREEN),
    )
}

pub fn playlist_queued(title: &str, added: usize, failed: usize) -> CreateEmbed {
    let mut description = format!("Added `{}` tracks from **{}**", added, title);
    if failed > 0 {
        description.push_str(&format!("\n`{}` tracks could not be resolved", failed));
    }
    CreateEmbed::new()
        .title("📋 Playlist Queued")
        .description(description)
        .color(GREEN)
}

pub fn track_failed(entry: &QueueEntry, reason: &str) -> CreateEmbed {
    error_embed(format!("Failed to play: **{}**\nError: {}", entry.title, reason))
}

pub fn queue_finished() -> CreateEmbed {
    CreateEmbed::new()
        .title("📭 Queue Finished")
        .description("The queue is empty.")
        .color(GREEN)
}

pub fn paused(entry: &QueueEntry) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏸️ Paused")
            .description(format!("Paused {}", entry_link(entry)))
            .color(GREEN),
    )
}

pub fn resumed(entry: &QueueEntry) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("▶️ Resumed")
            .description(format!("Resumed {}", entry_link(entry)))
            .color(GREEN),
    )
}

pub fn toggled(status: PlayerStatus) -> CreateEmbed {
    let (title, description) = match status {
        PlayerStatus::Paused => ("⏸️ Paused", "Playback paused"),
        _ => ("▶️ Resumed", "Playback resumed"),
    };
    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(GREEN)
}

pub fn skipped(entry: &QueueEntry) -> CreateEmbed {
    CreateEmbed::new()
        .title("⏭️ Skipped")
        .description(format!("Skipped {}", entry_link(entry)))
        .color(GREEN)
}

pub fn stopped() -> CreateEmbed {
    CreateEmbed::new()
        .title("⏹️ Stopped")
        .description("Stopped playback, cleared the queue and left the voice channel")
        .color(GREEN)
}

pub fn volume_set(volume: Volume) -> CreateEmbed {
    CreateEmbed::new()
        .title("🔊 Volume")
        .description(format!("Volume set to `{}%`", volume.percent()))
        .color(GREEN)
}

/// Create the reply for the queue command
pub fn music_queue(snapshot: &SessionSnapshot) -> CreateReply {
    let mut description = String::new();

    match &snapshot.now_playing {
        Some(entry) => {
            let marker = if snapshot.status == PlayerStatus::Paused {
                "⏸️ Paused"
            } else {
                "🎵 Now Playing"
            };
            description.push_str(&format!("**{}**\n{}\n\n", marker, entry_link(entry)));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    description.push_str(&queue_listing(&snapshot.upcoming));

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Music Queue")
            .description(description)
            .footer(CreateEmbedFooter::new(format!(
                "Volume {}%",
                snapshot.volume.percent()
            )))
            .color(GREEN),
    )
}

/// Numbered listing of upcoming tracks.
pub fn queue_listing(upcoming: &QueueSnapshot) -> String {
    if upcoming.is_empty() {
        return "The queue is empty.".to_string();
    }

    let mut listing = format!("Current Queue ({} tracks):\n", upcoming.len());
    for (index, entry) in upcoming.iter().take(QUEUE_PAGE).enumerate() {
        listing.push_str(&format!("{}. {}", index + 1, entry.title));
        if let Some(duration) = entry.duration {
            listing.push_str(&format!(" `{}`", format_duration(duration)));
        }
        listing.push('\n');
    }

    if upcoming.len() > QUEUE_PAGE {
        listing.push_str(&format!("…and {} more\n", upcoming.len() - QUEUE_PAGE));
    }

    let total = upcoming.total_duration();
    if total.as_secs() > 0 {
        listing.push_str(&format!("Total Length: `{}`", format_duration(total)));
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::queue::QueueStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn store(titles: &[&str]) -> QueueStore {
        let mut queue = QueueStore::new();
        for title in titles {
            queue.enqueue(QueueEntry::new("https://example.com", *title));
        }
        queue
    }

    #[test]
    fn empty_queue_listing() {
        assert_eq!(queue_listing(&QueueStore::new().peek_all()), "The queue is empty.");
    }

    #[test]
    fn listing_numbers_entries_from_one() {
        let listing = queue_listing(&store(&["first", "second"]).peek_all());
        assert_eq!(listing, "Current Queue (2 tracks):\n1. first\n2. second\n");
    }

    #[test]
    fn listing_includes_durations_and_total() {
        let mut queue = QueueStore::new();
        queue.enqueue(
            QueueEntry::new("https://example.com/a", "a")
                .with_duration(Some(Duration::from_secs(125))),
        );
        queue.enqueue(
            QueueEntry::new("https://example.com/b", "b")
                .with_duration(Some(Duration::from_secs(3600))),
        );

        let listing = queue_listing(&queue.peek_all());
        assert_eq!(
            listing,
            "Current Queue (2 tracks):\n1. a `2:05`\n2. b `1:00:00`\nTotal Length: `1:02:05`"
        );
    }

    #[test]
    fn long_listings_are_truncated() {
        let titles: Vec<String> = (1..=20).map(|i| format!("track {}", i)).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();

        let listing = queue_listing(&store(&refs).peek_all());
        assert!(listing.contains("15. track 15\n"));
        assert!(!listing.contains("16. track 16"));
        assert!(listing.ends_with("…and 5 more\n"));
    }
}
