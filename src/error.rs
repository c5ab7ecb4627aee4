// Error types for every library concern.
// The binary wraps these in anyhow; the engine logs them and keeps going.

use thiserror::Error;

// Queue/cursor operations that were rejected. The public engine API turns
// these into silent no-ops, they exist so the transitions stay testable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("index {index} is out of range for a queue of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("track {0} is already queued")]
    Duplicate(String),

    #[error("queue is full ({0} tracks)")]
    Full(usize),

    #[error("track {0} is not in the queue")]
    NotQueued(String),

    #[error("queue is empty")]
    Empty,
}

// A failed recommendation load, as recorded in the player state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecommendError {
    #[error("Failed to load recommendations: {0}")]
    Failed(String),
}

// One tier of the recommendation pipeline could not produce tracks.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("{0} is not available without an API key")]
    Unavailable(&'static str),
}

// YouTube Data API failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("YouTube API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("no API key configured")]
    MissingKey,
}

impl ApiError {
    // Quota exhaustion and key problems come back as 400/401/403 and are
    // worth retrying through the scraper.
    pub fn is_quota_or_auth(&self) -> bool {
        matches!(self, ApiError::Status { status: 400 | 401 | 403, .. } | ApiError::MissingKey)
    }
}

// Failures of a user-initiated search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Query parameter is required")]
    EmptyQuery,

    #[error("No results found")]
    NotFound,
}

impl SearchError {
    // HTTP-style status for callers that want one.
    pub fn status(&self) -> u16 {
        match self {
            SearchError::EmptyQuery => 400,
            SearchError::NotFound => 404,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("results page returned {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Playlist not found: {0}")]
    NotFound(String),

    #[error("Playlist store returned {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no audio output device available")]
    NoOutput,

    #[error("failed to fetch audio: {0}")]
    Extract(#[from] ExtractError),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run yt-dlp: {0}. Is yt-dlp installed?")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp failed: {0}")]
    Failed(String),

    #[error("yt-dlp produced no audio file for {0}")]
    Missing(String),

    #[error("not a YouTube video id: {0:?}")]
    InvalidId(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
