//! FIFO store of pending tracks for a single voice session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::error::{MusicError, MusicResult};

/// Prefix marking a `source_uri` as a search that is resolved when the entry starts playing.
pub const SEARCH_PREFIX: &str = "ytsearch:";

/// A resolved, playable reference with its display title.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Link handed to the voice transport, or a deferred search (see [`SEARCH_PREFIX`]).
    pub source_uri: String,
    pub title: String,
    pub duration: Option<Duration>,
    /// The name of the user who requested the track.
    pub requested_by: Option<String>,
}

impl QueueEntry {
    pub fn new(source_uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            title: title.into(),
            duration: None,
            requested_by: None,
        }
    }

    /// Creates an entry whose source is looked up on YouTube at play time.
    pub fn deferred_search(terms: &str, title: impl Into<String>) -> Self {
        Self::new(format!("{}{}", SEARCH_PREFIX, terms), title)
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn requested_by(mut self, name: impl Into<String>) -> Self {
        self.requested_by = Some(name.into());
        self
    }

    /// The search terms of a deferred entry, `None` for direct links.
    pub fn search_terms(&self) -> Option<&str> {
        self.source_uri.strip_prefix(SEARCH_PREFIX)
    }

    /// Link suitable for display, `#` when the entry is still a search.
    pub fn display_url(&self) -> &str {
        if self.search_terms().is_some() {
            "#"
        } else {
            &self.source_uri
        }
    }
}

/// Ordered queue of pending entries. Entries leave only from the front and join only at the back.
#[derive(Debug, Default)]
pub struct QueueStore {
    entries: VecDeque<Arc<QueueEntry>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track to the back of the queue
    pub fn enqueue(&mut self, entry: QueueEntry) {
        self.entries.push_back(Arc::new(entry));
    }

    /// Remove and return the front entry
    pub fn dequeue(&mut self) -> MusicResult<QueueEntry> {
        self.entries
            .pop_front()
            .map(Arc::unwrap_or_clone)
            .ok_or(MusicError::EmptyQueue)
    }

    /// Take a snapshot of the pending entries for display.
    pub fn peek_all(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.iter().cloned().collect(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Point-in-time view of a queue. Iterating does not consume it, so it can be walked
/// any number of times, and later queue mutations are not reflected.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    entries: Arc<[Arc<QueueEntry>]>,
}

impl QueueSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.entries.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of known durations; entries without one are skipped.
    pub fn total_duration(&self) -> Duration {
        self.iter().filter_map(|entry| entry.duration).sum()
    }
}
