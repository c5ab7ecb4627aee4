// Durable local state.
//
// Two independent JSON files in the data directory:
//   recently_played.json  the playback history (see player::history)
//   search_history.json   the last searches typed in the UI
//
// Loading is forgiving: a missing or corrupt file is an empty history.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::player::queue::Track;
use crate::youtube::types::SearchFilters;

pub const RECENTLY_PLAYED_FILE: &str = "recently_played.json";
pub const SEARCH_HISTORY_FILE: &str = "search_history.json";

pub const MAX_SEARCH_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub query: String,
    pub filters: SearchFilters,
    pub timestamp: DateTime<Utc>,
}

// Most recent first, one entry per query, at most MAX_SEARCH_HISTORY.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHistory {
    entries: Vec<SearchEntry>,
}

impl SearchHistory {
    pub fn new() -> Self {
        SearchHistory::default()
    }

    pub fn record(&mut self, query: &str, filters: SearchFilters) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.entries.retain(|entry| entry.query != query);
        self.entries.insert(
            0,
            SearchEntry {
                query: query.to_string(),
                filters,
                timestamp: Utc::now(),
            },
        );
        self.entries.truncate(MAX_SEARCH_HISTORY);
    }

    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&SearchEntry> {
        self.entries.get(index)
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

    // Re-applies the rules to data read from disk
    fn normalized(mut self) -> Self {
        let mut seen: Vec<String> = Vec::new();
        self.entries.retain(|entry| {
            if seen.contains(&entry.query) {
                false
            } else {
                seen.push(entry.query.clone());
                true
            }
        });
        self.entries.truncate(MAX_SEARCH_HISTORY);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    // Creates the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(LocalStore { dir })
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    // Write to a temp file first so a crash can't leave half a file
    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = self.dir.join(format!("{file}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.dir.join(file))?;
        Ok(())
    }

    pub fn load_recently_played(&self) -> Vec<Track> {
        match self.read(RECENTLY_PLAYED_FILE) {
            Ok(tracks) => tracks.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable recently played history");
                Vec::new()
            }
        }
    }

    pub fn save_recently_played(&self, tracks: &[Track]) -> Result<(), StoreError> {
        self.write(RECENTLY_PLAYED_FILE, &tracks)
    }

    pub fn load_search_history(&self) -> SearchHistory {
        match self.read::<SearchHistory>(SEARCH_HISTORY_FILE) {
            Ok(history) => history.unwrap_or_default().normalized(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable search history");
                SearchHistory::new()
            }
        }
    }

    pub fn save_search_history(&self, history: &SearchHistory) -> Result<(), StoreError> {
        self.write(SEARCH_HISTORY_FILE, history)
    }
}
