// Recently played tracks.
// Most recent first, bounded, and a track appears at most once: playing
// it again moves it to the front instead of adding a second entry.

use std::collections::VecDeque;

use super::queue::Track;

pub const MAX_RECENTLY_PLAYED: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct RecentlyPlayed {
    tracks: VecDeque<Track>,
}

impl RecentlyPlayed {
    pub fn new() -> Self {
        RecentlyPlayed {
            tracks: VecDeque::with_capacity(MAX_RECENTLY_PLAYED),
        }
    }

    // Rebuilds history from persisted state. The stored list may have been
    // written by an older build or edited by hand, so the usual rules are
    // re-applied instead of trusting it.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let mut history = RecentlyPlayed::new();
        for track in tracks {
            if history.contains(&track.video_id) {
                continue;
            }
            if history.tracks.len() >= MAX_RECENTLY_PLAYED {
                break;
            }
            history.tracks.push_back(track);
        }
        history
    }

    // Records a play. Returns false when the track already was the most
    // recent entry, in which case nothing changed and nothing needs saving.
    pub fn record(&mut self, track: Track) -> bool {
        if self.tracks.front().is_some_and(|t| t.video_id == track.video_id) {
            return false;
        }
        self.tracks.retain(|t| t.video_id != track.video_id);
        self.tracks.push_front(track);
        self.tracks.truncate(MAX_RECENTLY_PLAYED);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.iter().any(|t| t.video_id == id)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, id, "Artist", "")
    }

    fn ids(history: &RecentlyPlayed) -> Vec<&str> {
        history.iter().map(|t| t.id()).collect()
    }

    #[test]
    fn most_recent_first_without_duplicates() {
        let mut history = RecentlyPlayed::new();
        for id in ["a", "b", "c", "a"] {
            history.record(track(id));
        }
        assert_eq!(ids(&history), vec!["a", "c", "b"]);
    }

    #[test]
    fn repeated_front_entry_is_a_no_op() {
        let mut history = RecentlyPlayed::new();
        assert!(history.record(track("a")));
        assert!(!history.record(track("a")));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn bounded_to_max_entries() {
        let mut history = RecentlyPlayed::new();
        for i in 0..(MAX_RECENTLY_PLAYED + 5) {
            history.record(track(&i.to_string()));
        }
        assert_eq!(history.len(), MAX_RECENTLY_PLAYED);
        // The oldest five fell off the back
        assert_eq!(history.iter().last().map(|t| t.id()), Some("5"));
    }

    #[test]
    fn from_tracks_reapplies_rules() {
        let mut stored: Vec<Track> = (0..30).map(|i| track(&i.to_string())).collect();
        stored.insert(1, track("0"));
        let history = RecentlyPlayed::from_tracks(stored);
        assert_eq!(history.len(), MAX_RECENTLY_PLAYED);
        assert_eq!(ids(&history)[..3], ["0", "1", "2"]);
    }
}
