// YouTube Data API v3 client.
//
// All calls go through get(), which keeps a minimum spacing between
// outbound requests so bursts (search + recommendations + trending) don't
// burn through the quota.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::types::{ItemId, ResultKind, SearchItem, SearchParams, Snippet};
use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

// YouTube's "Music" video category
pub const MUSIC_CATEGORY: &str = "10";

pub const MAX_RESULTS: usize = 25;

pub const DEFAULT_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

// videos.list returns the id as a plain string
#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

pub struct YouTubeApi {
    http: Client,
    base_url: String,
    api_key: String,
    region_code: String,
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl YouTubeApi {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ApiError::MissingKey);
        }
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(YouTubeApi {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            region_code: "US".to_string(),
            spacing: DEFAULT_SPACING,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_region(mut self, region_code: impl Into<String>) -> Self {
        self.region_code = region_code.into();
        self
    }

    // Waits until at least `spacing` has passed since the previous call.
    // The lock is held while waiting, so concurrent callers queue up.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.spacing {
                let wait = self.spacing - elapsed;
                debug!(?wait, "rate limiting YouTube API call");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        self.throttle().await;

        let url = format!("{}/{}", self.base_url, resource);
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    // search.list with the filters of `params`. Items that don't fit the
    // requested kind are dropped.
    pub async fn search(&self, params: &SearchParams, max_results: usize) -> Result<Vec<SearchItem>, ApiError> {
        let kind = params.filters.kind;
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("q", params.query.clone()),
            ("maxResults", max_results.to_string()),
            ("type", kind.as_str().to_string()),
            ("regionCode", self.region_code.clone()),
            ("safeSearch", "none".to_string()),
        ];
        if kind == ResultKind::Video {
            query.push(("videoEmbeddable", "true".to_string()));
            query.push(("videoSyndicated", "true".to_string()));
            query.push(("videoCategoryId", MUSIC_CATEGORY.to_string()));
            query.push(("videoType", "any".to_string()));
            let duration = params.filters.duration.as_str();
            if duration != "any" {
                query.push(("videoDuration", duration.to_string()));
            }
            let order = params.filters.sort_by.as_str();
            if order != "relevance" {
                query.push(("order", order.to_string()));
            }
        }

        debug!(query = %params.query, kind = kind.as_str(), "searching YouTube");
        let response: SearchResponse = self.get("search", &query).await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| item.is_valid_for(kind))
            .collect())
    }

    // Music videos related to a seed, found by searching for its title and
    // channel. The seed itself is never returned.
    pub async fn related(
        &self,
        video_id: &str,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<SearchItem>, ApiError> {
        let query = vec![
            ("part", "snippet".to_string()),
            ("q", format!("{title} {artist}")),
            ("maxResults", limit.min(50).to_string()),
            ("type", "video".to_string()),
            ("videoCategoryId", MUSIC_CATEGORY.to_string()),
        ];
        let response: SearchResponse = self.get("search", &query).await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| item.id.video_id.as_deref().is_some_and(|id| id != video_id))
            .collect())
    }

    // The most popular music videos right now.
    pub async fn trending(&self, limit: usize) -> Result<Vec<SearchItem>, ApiError> {
        let query = vec![
            ("part", "snippet".to_string()),
            ("chart", "mostPopular".to_string()),
            ("videoCategoryId", MUSIC_CATEGORY.to_string()),
            ("regionCode", self.region_code.clone()),
            ("maxResults", limit.clamp(1, 50).to_string()),
        ];
        let response: VideoListResponse = self.get("videos", &query).await?;
        Ok(response
            .items
            .into_iter()
            .map(|video| SearchItem {
                id: ItemId {
                    video_id: Some(video.id),
                    ..Default::default()
                },
                snippet: video.snippet,
            })
            .collect())
    }
}
