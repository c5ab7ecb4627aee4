// Durable local state on a real (temporary) directory.

use std::fs;

use ytqueue::player::history::MAX_RECENTLY_PLAYED;
use ytqueue::storage::{LocalStore, SearchHistory, MAX_SEARCH_HISTORY, RECENTLY_PLAYED_FILE, SEARCH_HISTORY_FILE};
use ytqueue::youtube::types::{DurationFilter, SearchFilters};
use ytqueue::Track;

#[test]
fn recently_played_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();
    let tracks = vec![
        Track::new("b", "Song b", "Band", "https://i.ytimg.com/vi/b/mqdefault.jpg"),
        Track::new("a", "Song a", "Band", "https://i.ytimg.com/vi/a/mqdefault.jpg"),
    ];

    store.save_recently_played(&tracks).unwrap();
    let loaded = store.load_recently_played();

    assert_eq!(loaded, tracks);
    assert_eq!(loaded[0].title, "Song b");
    assert_eq!(loaded[0].added_at, tracks[0].added_at);
}

#[test]
fn corrupt_history_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();
    fs::write(dir.path().join(RECENTLY_PLAYED_FILE), "[{ not json").unwrap();
    fs::write(dir.path().join(SEARCH_HISTORY_FILE), "42").unwrap();

    assert!(store.load_recently_played().is_empty());
    assert!(store.load_search_history().is_empty());
}

#[test]
fn oversized_history_is_trimmed_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();
    let tracks: Vec<Track> = (0..30).map(|i| Track::new(format!("v{i}"), "t", "a", "")).collect();
    store.save_recently_played(&tracks).unwrap();

    let history = ytqueue::player::history::RecentlyPlayed::from_tracks(store.load_recently_played());
    assert_eq!(history.len(), MAX_RECENTLY_PLAYED);
    assert_eq!(history.iter().next().map(Track::id), Some("v0"));
}

#[test]
fn search_history_round_trips_with_filters() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();

    let mut history = SearchHistory::new();
    let filters = SearchFilters {
        duration: DurationFilter::Short,
        ..SearchFilters::default()
    };
    history.record("synthwave", filters);
    history.record("lofi", SearchFilters::default());
    store.save_search_history(&history).unwrap();

    let loaded = store.load_search_history();
    assert_eq!(loaded, history);
    assert_eq!(loaded.entries()[1].filters.duration, DurationFilter::Short);
}

#[test]
fn hand_edited_search_history_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();
    let entry = |q: &str| {
        format!(r#"{{"query":"{q}","filters":{{"type":"video","duration":"any","sortBy":"relevance"}},"timestamp":"2024-03-01T10:00:00Z"}}"#)
    };
    let entries: Vec<String> = ["a", "a"]
        .into_iter()
        .chain(["b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l"])
        .map(entry)
        .collect();
    fs::write(dir.path().join(SEARCH_HISTORY_FILE), format!("[{}]", entries.join(","))).unwrap();

    let loaded = store.load_search_history();
    assert_eq!(loaded.len(), MAX_SEARCH_HISTORY);
    assert_eq!(loaded.entries()[0].query, "a");
    assert_eq!(loaded.entries()[1].query, "b");
}
