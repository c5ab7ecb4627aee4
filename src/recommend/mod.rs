// Recommendation pipeline.
//
// Recommender asks a Catalog for tracks using three strategies, each
// only tried when the previous one came back empty:
//   1. related to the current track
//   2. a free-text search for a random recently played artist
//   3. trending music
// A tier that errors counts as empty. The whole call never fails.

pub mod catalog;

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, RecommendError};
use crate::player::queue::Track;

pub use catalog::YouTubeCatalog;

pub const DEFAULT_LIMIT: usize = 10;

// Where tracks come from. Implemented over YouTube in catalog.rs and by
// fakes in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    // Tracks related to `seed`, never including the seed itself.
    async fn related(&self, seed: &Track, limit: usize) -> Result<Vec<Track>, CatalogError>;

    // Video-only free-text search.
    async fn search_videos(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;

    async fn trending(&self, limit: usize) -> Result<Vec<Track>, CatalogError>;
}

// What the player engine needs from a recommendation source.
#[async_trait]
pub trait Recommend: Send + Sync {
    async fn recommend(
        &self,
        current: Option<&Track>,
        recent: &[Track],
        limit: usize,
    ) -> Result<Vec<Track>, RecommendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Related,
    RecentArtist,
    Trending,
}

pub struct Recommender<C> {
    catalog: C,
    rng: Mutex<StdRng>,
}

impl<C: Catalog> Recommender<C> {
    pub fn new(catalog: C) -> Self {
        Recommender {
            catalog,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    // Deterministic artist picks, for tests and reproducible sessions.
    pub fn with_seed(catalog: C, seed: u64) -> Self {
        Recommender {
            catalog,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub async fn get_recommendations(
        &self,
        current: Option<&Track>,
        recent: &[Track],
        limit: usize,
    ) -> Vec<Track> {
        let mut tracks = Vec::new();

        if let Some(seed) = current {
            tracks = self.run_tier(Tier::Related, self.catalog.related(seed, limit)).await;
        }

        if tracks.is_empty() {
            if let Some(artist) = self.pick_artist(recent) {
                let query = format!("{artist} music");
                tracks = self
                    .run_tier(Tier::RecentArtist, self.catalog.search_videos(&query, limit))
                    .await;
            }
        }

        if tracks.is_empty() {
            tracks = self.run_tier(Tier::Trending, self.catalog.trending(limit)).await;
        }

        dedup_by_id(tracks, limit)
    }

    async fn run_tier<F>(&self, tier: Tier, fetch: F) -> Vec<Track>
    where
        F: std::future::Future<Output = Result<Vec<Track>, CatalogError>>,
    {
        match fetch.await {
            Ok(tracks) => {
                if tracks.is_empty() {
                    debug!(?tier, "tier returned nothing");
                } else {
                    info!(?tier, count = tracks.len(), "recommendations found");
                }
                tracks
            }
            Err(e) => {
                warn!(?tier, error = %e, "recommendation tier failed");
                Vec::new()
            }
        }
    }

    // One artist, uniformly at random among the distinct artists in
    // recently played.
    fn pick_artist<'a>(&self, recent: &'a [Track]) -> Option<&'a str> {
        let mut artists: Vec<&str> = Vec::new();
        for track in recent {
            if !artists.contains(&track.artist.as_str()) {
                artists.push(&track.artist);
            }
        }
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        artists.choose(&mut *rng).copied()
    }
}

// First occurrence wins, order preserved, then truncated to `limit`.
pub fn dedup_by_id(tracks: Vec<Track>, limit: usize) -> Vec<Track> {
    let mut unique: Vec<Track> = Vec::with_capacity(tracks.len().min(limit));
    for track in tracks {
        if unique.len() >= limit {
            break;
        }
        if !unique.iter().any(|t| t.video_id == track.video_id) {
            unique.push(track);
        }
    }
    unique
}

#[async_trait]
impl<C: Catalog> Recommend for Recommender<C> {
    async fn recommend(
        &self,
        current: Option<&Track>,
        recent: &[Track],
        limit: usize,
    ) -> Result<Vec<Track>, RecommendError> {
        Ok(self.get_recommendations(current, recent, limit).await)
    }
}
