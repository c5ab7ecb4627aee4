// The Catalog backed by YouTube.
//
// related and trending use the Data API directly. Without a key, related
// is unavailable and trending becomes a search for "trending music".
// Free-text search always goes through the cached SearchService.

use std::sync::Arc;

use async_trait::async_trait;

use super::Catalog;
use crate::error::CatalogError;
use crate::player::queue::Track;
use crate::youtube::types::SearchItem;
use crate::youtube::{SearchService, YouTubeApi};

pub const TRENDING_QUERY: &str = "trending music";

pub struct YouTubeCatalog {
    search: Arc<SearchService>,
    api: Option<Arc<YouTubeApi>>,
}

impl YouTubeCatalog {
    pub fn new(search: Arc<SearchService>, api: Option<Arc<YouTubeApi>>) -> Self {
        YouTubeCatalog { search, api }
    }
}

fn to_tracks(items: &[SearchItem], limit: usize) -> Vec<Track> {
    items.iter().filter_map(SearchItem::to_track).take(limit).collect()
}

#[async_trait]
impl Catalog for YouTubeCatalog {
    async fn related(&self, seed: &Track, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let api = self.api.as_ref().ok_or(CatalogError::Unavailable("related videos"))?;
        let items = api
            .related(&seed.video_id, &seed.title, &seed.artist, limit)
            .await?;
        Ok(to_tracks(&items, limit))
    }

    async fn search_videos(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        Ok(self.search.search_tracks(query, limit).await?)
    }

    async fn trending(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        match &self.api {
            Some(api) => Ok(to_tracks(&api.trending(limit).await?, limit)),
            None => Ok(self.search.search_tracks(TRENDING_QUERY, limit).await?),
        }
    }
}
