// User-facing search with caching and fallbacks.
//
// Order of attempts for a query:
//   1. fresh cache entry (30 minutes)
//   2. the Data API, when a key is configured
//   3. the scraper, right away if the API said quota/auth or found nothing
//   4. a stale cache entry
//   5. the scraper as a last resort
// If all of that comes up empty the search fails with NotFound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::api::{YouTubeApi, MAX_RESULTS};
use super::scrape::Scraper;
use super::types::{SearchItem, SearchParams};
use crate::error::SearchError;
use crate::player::queue::Track;

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

struct CacheEntry {
    items: Vec<SearchItem>,
    stored_at: Instant,
}

pub struct SearchService {
    api: Option<Arc<YouTubeApi>>,
    scraper: Scraper,
    cache: Mutex<HashMap<SearchParams, CacheEntry>>,
    ttl: Duration,
}

impl SearchService {
    pub fn new(api: Option<Arc<YouTubeApi>>, scraper: Scraper) -> Self {
        SearchService {
            api,
            scraper,
            cache: Mutex::new(HashMap::new()),
            ttl: CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<SearchParams, CacheEntry>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Cached items for these params, and whether they are still fresh.
    fn cached(&self, params: &SearchParams) -> Option<(Vec<SearchItem>, bool)> {
        self.cache()
            .get(params)
            .map(|entry| (entry.items.clone(), entry.stored_at.elapsed() < self.ttl))
    }

    fn store(&self, params: &SearchParams, items: &[SearchItem]) {
        self.cache().insert(
            params.clone(),
            CacheEntry {
                items: items.to_vec(),
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Vec<SearchItem>, SearchError> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let params = SearchParams::new(query, params.filters);

        let cached = self.cached(&params);
        if let Some((items, true)) = &cached {
            debug!(query, "search served from cache");
            return Ok(items.clone());
        }

        let mut scraped = false;
        if let Some(api) = &self.api {
            let fall_back = match api.search(&params, MAX_RESULTS).await {
                Ok(items) if !items.is_empty() => {
                    self.store(&params, &items);
                    return Ok(items);
                }
                Ok(_) => {
                    debug!(query, "YouTube API returned no results");
                    true
                }
                Err(e) => {
                    warn!(query, error = %e, "YouTube API search failed");
                    e.is_quota_or_auth()
                }
            };
            if fall_back {
                info!(query, "falling back to scraping");
                scraped = true;
                if let Some(items) = self.scrape(&params).await {
                    return Ok(items);
                }
            }
        }

        if let Some((items, _)) = cached {
            info!(query, "serving stale cached results");
            return Ok(items);
        }

        if !scraped {
            if let Some(items) = self.scrape(&params).await {
                return Ok(items);
            }
        }

        Err(SearchError::NotFound)
    }

    // Tracks for a plain video search, at most `limit`.
    pub async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError> {
        let items = self.search(&SearchParams::videos(query)).await?;
        Ok(items.iter().filter_map(SearchItem::to_track).take(limit).collect())
    }

    async fn scrape(&self, params: &SearchParams) -> Option<Vec<SearchItem>> {
        match self.scraper.search(&params.query).await {
            Ok(items) if !items.is_empty() => {
                self.store(params, &items);
                Some(items)
            }
            Ok(_) => {
                debug!(query = %params.query, "scraper found nothing");
                None
            }
            Err(e) => {
                warn!(query = %params.query, error = %e, "scraping failed");
                None
            }
        }
    }
}
