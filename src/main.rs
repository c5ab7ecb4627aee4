// Main entry point for ytqueue
// Loads the config, wires the services together and hands over to the TUI

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytqueue::player::audio::AudioDriver;
use ytqueue::player::driver::spawn_driver;
use ytqueue::playlist::PlaylistClient;
use ytqueue::recommend::{Recommend, Recommender, YouTubeCatalog};
use ytqueue::storage::LocalStore;
use ytqueue::ui::app::MusicPlayerApp;
use ytqueue::youtube::{Scraper, SearchService, YouTubeApi, YouTubeExtractor};
use ytqueue::{Config, PlayerEngine};

const LOG_FILE: &str = "ytqueue.log";

// The terminal belongs to the UI, so logs go to a file in the data dir
fn init_logging(data_dir: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE))
        .context("failed to open log file")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ytqueue=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress ALSA error messages that pollute the TUI
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let config = Config::load().context("failed to load config")?;
    let data_dir = config.data_dir()?;
    fs::create_dir_all(&data_dir).context("failed to create data directory")?;
    init_logging(&data_dir)?;
    info!(data_dir = %data_dir.display(), "starting ytqueue");

    let store = match LocalStore::open(&data_dir) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "local storage unavailable, history won't be kept");
            None
        }
    };

    let api = match config.api_key() {
        Some(key) => Some(Arc::new(
            YouTubeApi::new(key, &config.youtube_api_url)?.with_region(&config.region_code),
        )),
        None => {
            warn!("no YOUTUBE_API_KEY set, searching by scraping only");
            None
        }
    };
    let scraper = Scraper::new(&config.youtube_web_url)?;
    let search = Arc::new(SearchService::new(api.clone(), scraper));

    let catalog = YouTubeCatalog::new(search.clone(), api);
    let recommender: Arc<dyn Recommend> = match config.recommendation_seed {
        Some(seed) => Arc::new(Recommender::with_seed(catalog, seed)),
        None => Arc::new(Recommender::new(catalog)),
    };

    let playlists = match &config.playlist_api_url {
        Some(url) => Some(Arc::new(PlaylistClient::new(url)?)),
        None => None,
    };

    let extractor = YouTubeExtractor::new(config.audio_cache_dir()?);
    let (driver, events) = spawn_driver(move || AudioDriver::new(extractor))?;

    let engine = PlayerEngine::new(config.engine_config(), recommender, store.clone(), Some(driver));
    engine.set_autoplay_enabled(config.autoplay);
    engine.set_volume(config.volume);
    let event_loop = engine.spawn_event_loop(events);

    let mut app = MusicPlayerApp::new(engine.clone(), search, playlists, store);
    let result = app.run().await;

    engine.shutdown();
    event_loop.abort();
    info!("ytqueue stopped");

    result
}
