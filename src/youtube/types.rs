// Wire shapes shared by the API client, the scraper and the search cache.
//
// A search result always looks like
//   { id: { videoId | playlistId | channelId },
//     snippet: { title, channelTitle, thumbnails: { medium: { url } } } }
// no matter which source produced it.

use serde::{Deserialize, Serialize};

use crate::player::queue::Track;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: ItemId,
    pub snippet: Snippet,
}

impl SearchItem {
    pub fn video(video_id: &str, title: &str, channel: &str, thumbnail: &str) -> Self {
        SearchItem {
            id: ItemId {
                video_id: Some(video_id.to_string()),
                ..Default::default()
            },
            snippet: Snippet {
                title: title.to_string(),
                channel_title: channel.to_string(),
                thumbnails: Thumbnails {
                    medium: Some(Thumbnail { url: thumbnail.to_string() }),
                    default: None,
                },
            },
        }
    }

    pub fn medium_thumbnail(&self) -> Option<&str> {
        self.snippet
            .thumbnails
            .medium
            .as_ref()
            .map(|t| t.url.as_str())
            .filter(|url| !url.is_empty())
    }

    // Usable as a result of this kind: right id present, a medium
    // thumbnail, and a title that isn't mangled escape garbage.
    pub fn is_valid_for(&self, kind: ResultKind) -> bool {
        let has_id = match kind {
            ResultKind::Video => self.id.video_id.is_some(),
            ResultKind::Playlist => self.id.playlist_id.is_some(),
            ResultKind::Channel => self.id.channel_id.is_some(),
        };
        let title = &self.snippet.title;
        has_id && self.medium_thumbnail().is_some() && !title.is_empty() && !title.contains('\\')
    }

    // Only videos are playable.
    pub fn to_track(&self) -> Option<Track> {
        let video_id = self.id.video_id.as_deref().filter(|id| !id.is_empty())?;
        let thumbnail = self
            .medium_thumbnail()
            .or_else(|| self.snippet.thumbnails.default.as_ref().map(|t| t.url.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| default_thumbnail(video_id));
        Some(Track::new(
            video_id,
            &self.snippet.title,
            &self.snippet.channel_title,
            thumbnail,
        ))
    }
}

pub fn default_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/mqdefault.jpg")
}

// ==========================================
// SEARCH FILTERS
// ==========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    Video,
    Playlist,
    Channel,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Video => "video",
            ResultKind::Playlist => "playlist",
            ResultKind::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationFilter {
    #[default]
    Any,
    Short,
    Medium,
    Long,
}

impl DurationFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            DurationFilter::Any => "any",
            DurationFilter::Short => "short",
            DurationFilter::Medium => "medium",
            DurationFilter::Long => "long",
        }
    }

    pub fn next(self) -> Self {
        match self {
            DurationFilter::Any => DurationFilter::Short,
            DurationFilter::Short => DurationFilter::Medium,
            DurationFilter::Medium => DurationFilter::Long,
            DurationFilter::Long => DurationFilter::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Date,
    ViewCount,
    Rating,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Date => "date",
            SortOrder::ViewCount => "viewCount",
            SortOrder::Rating => "rating",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortOrder::Relevance => SortOrder::Date,
            SortOrder::Date => SortOrder::ViewCount,
            SortOrder::ViewCount => SortOrder::Rating,
            SortOrder::Rating => SortOrder::Relevance,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub duration: DurationFilter,
    pub sort_by: SortOrder,
}

// The full parameter tuple of a search. Also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchParams {
    pub query: String,
    pub filters: SearchFilters,
}

impl SearchParams {
    pub fn new(query: impl Into<String>, filters: SearchFilters) -> Self {
        SearchParams {
            query: query.into(),
            filters,
        }
    }

    // Plain video search with default filters.
    pub fn videos(query: impl Into<String>) -> Self {
        SearchParams::new(query, SearchFilters::default())
    }
}
