// ==========================================
// QUEUE MODULE
// ==========================================
// The value types the player works with:
// - Track: one playable YouTube video
// - Queue: the ordered list of upcoming tracks
//
// The queue is bounded (MAX_QUEUE_SIZE) and never holds the same
// video twice. Front of the queue = plays next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::QueueError;

// Upper bound on queued tracks.
pub const MAX_QUEUE_SIZE: usize = 50;

// Low-water mark: below this many queued tracks, autoplay replenishes.
pub const MIN_QUEUE_SIZE: usize = 3;

// ==========================================
// TRACK STRUCT
// ==========================================
// video_id doubles as the general track id. Two tracks are the same
// track when their ids match, whatever the rest of the metadata says
// (search results and recommendations describe the same video with
// slightly different titles or thumbnails).
//
// artist is the channel name, thumbnail a URL.
// added_at is when the track entered the player (search, playlist or
// recommendation), not when it was uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        thumbnail: impl Into<String>,
    ) -> Self {
        Track {
            video_id: video_id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: thumbnail.into(),
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.video_id
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.video_id == other.video_id
    }
}

impl Eq for Track {}

// ==========================================
// QUEUE STRUCT
// ==========================================
// VecDeque because the common operations are push_back (enqueue) and
// pop_front (play next). Reordering and removal by id are O(n), which
// is fine with at most 50 entries.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Queue {
            tracks: VecDeque::with_capacity(MAX_QUEUE_SIZE),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.iter().any(|t| t.video_id == id)
    }

    // ==========================================
    // ADDING TRACKS: push()
    // ==========================================
    // Appends to the back. Rejected when the id is already queued or the
    // queue is at MAX_QUEUE_SIZE; the queue is left untouched either way.
    pub fn push(&mut self, track: Track) -> Result<usize, QueueError> {
        if self.contains(&track.video_id) {
            return Err(QueueError::Duplicate(track.video_id));
        }
        if self.tracks.len() >= MAX_QUEUE_SIZE {
            return Err(QueueError::Full(MAX_QUEUE_SIZE));
        }
        self.tracks.push_back(track);
        Ok(self.tracks.len() - 1)
    }

    // Appends as many tracks as fit, skipping duplicates.
    // Returns how many were actually added.
    pub fn extend_capped<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let mut added = 0;
        for track in tracks {
            if self.tracks.len() >= MAX_QUEUE_SIZE {
                break;
            }
            if self.push(track).is_ok() {
                added += 1;
            }
        }
        added
    }

    // Replaces the whole queue, with the same dedup and cap rules as push().
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks.clear();
        self.extend_capped(tracks);
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    // Removes every entry with this id, returns how many went away.
    // Thanks to the dedup rule that is 0 or 1, but callers don't rely on it.
    pub fn remove_id(&mut self, id: &str) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.video_id != id);
        before - self.tracks.len()
    }

    // ==========================================
    // REORDERING: move_item()
    // ==========================================
    // Extract-and-reinsert, the way a drag-and-drop list behaves:
    // - Queue: [A, B, C, D]
    // - move_item(0, 3)
    // - Queue: [B, C, D, A]
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        let len = self.tracks.len();
        if from >= len {
            return Err(QueueError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(QueueError::IndexOutOfRange { index: to, len });
        }
        if let Some(track) = self.tracks.remove(from) {
            self.tracks.insert(to, track);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn front(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // How many more tracks fit before the cap.
    pub fn space_left(&self) -> usize {
        MAX_QUEUE_SIZE.saturating_sub(self.tracks.len())
    }
}
