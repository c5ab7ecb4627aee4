// Runtime configuration.
//
// Defaults, then <config dir>/ytqueue/config.json if it exists, then
// environment variables:
//   YOUTUBE_API_KEY    Data API key; without it search scrapes
//   PLAYLIST_API_URL   base URL of the playlist store
//   YTQUEUE_DATA_DIR   where history, logs and audio go

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::player::engine::EngineConfig;
use crate::youtube::api::DEFAULT_API_URL;
use crate::youtube::scrape::DEFAULT_WEB_URL;

pub const APP_DIR: &str = "ytqueue";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub youtube_api_key: Option<String>,
    pub youtube_api_url: String,
    pub youtube_web_url: String,
    // Market for API searches and the trending chart
    pub region_code: String,
    pub playlist_api_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub autoplay: bool,
    pub volume: f32,
    pub preload_retries: u32,
    pub preload_retry_delay_secs: u64,
    pub discard_stale_recommendations: bool,
    // Fixed seed for the recommender's artist pick
    pub recommendation_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            youtube_api_key: None,
            youtube_api_url: DEFAULT_API_URL.to_string(),
            youtube_web_url: DEFAULT_WEB_URL.to_string(),
            region_code: "US".to_string(),
            playlist_api_url: None,
            data_dir: None,
            autoplay: true,
            volume: 1.0,
            preload_retries: 2,
            preload_retry_delay_secs: 5,
            discard_stale_recommendations: false,
            recommendation_seed: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_DIR)
            .join(CONFIG_FILE))
    }

    // The file (if any) plus environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::from_json(&fs::read_to_string(&path)?)?
        } else {
            Config::default()
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    // Blank values count as unset.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = var("YOUTUBE_API_KEY") {
            self.youtube_api_key = Some(key);
        }
        if let Some(url) = var("PLAYLIST_API_URL") {
            self.playlist_api_url = Some(url);
        }
        if let Some(dir) = var("YTQUEUE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.youtube_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir().ok_or(ConfigError::NoConfigDir)?.join(APP_DIR)),
        }
    }

    pub fn audio_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("audio"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            preload_retries: self.preload_retries,
            preload_retry_delay: Duration::from_secs(self.preload_retry_delay_secs),
            discard_stale_recommendations: self.discard_stale_recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_files_keep_defaults() {
        let config = Config::from_json(r#"{ "autoplay": false, "preloadRetries": 5, "regionCode": "DK" }"#).unwrap();
        assert!(!config.autoplay);
        assert_eq!(config.region_code, "DK");
        assert_eq!(config.preload_retries, 5);
        assert_eq!(config.youtube_api_url, DEFAULT_API_URL);
        assert_eq!(config.engine_config().preload_retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn environment_overrides_the_file() {
        let env: HashMap<&str, &str> = [
            ("YOUTUBE_API_KEY", "from-env"),
            ("PLAYLIST_API_URL", "http://localhost:5000/api"),
            ("YTQUEUE_DATA_DIR", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::from_json(r#"{ "youtubeApiKey": "from-file", "dataDir": "/tmp/yt" }"#).unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_key(), Some("from-env"));
        assert_eq!(config.playlist_api_url.as_deref(), Some("http://localhost:5000/api"));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/yt"));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(Config::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
