// YouTube audio extractor
// Uses a yt-dlp subprocess to download a video's audio track as mp3 into a
// cache directory. Blocking: call it from the driver thread, not the runtime.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::ExtractError;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    // Seconds, 0 when yt-dlp didn't say
    pub duration: f64,
}

pub struct YouTubeExtractor {
    cache_dir: PathBuf,
    program: String,
}

impl YouTubeExtractor {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        YouTubeExtractor {
            cache_dir: cache_dir.into(),
            program: "yt-dlp".to_string(),
        }
    }

    // Use a different yt-dlp binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn cached_path(&self, video_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{video_id}.mp3"))
    }

    // yt-dlp only prints the duration on download, so it is kept beside
    // the mp3 for later plays.
    fn duration_path(&self, video_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{video_id}.duration"))
    }

    fn cached_duration(&self, video_id: &str) -> f64 {
        fs::read_to_string(self.duration_path(video_id))
            .map(|text| parse_duration(&text))
            .unwrap_or(0.0)
    }

    pub fn download_audio(&self, video_id: &str) -> Result<AudioFile, ExtractError> {
        if !is_valid_video_id(video_id) {
            return Err(ExtractError::InvalidId(video_id.to_string()));
        }

        let path = self.cached_path(video_id);
        if path.exists() {
            debug!(video_id, "audio already cached");
            return Ok(AudioFile {
                path,
                duration: self.cached_duration(video_id),
            });
        }

        fs::create_dir_all(&self.cache_dir)?;
        let template = self.cache_dir.join(format!("{video_id}.%(ext)s"));

        info!(video_id, "downloading audio");
        let output = Command::new(&self.program)
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--no-playlist")
            .arg("--no-simulate")
            .arg("--print")
            .arg("duration")
            .arg("-o")
            .arg(&template)
            .arg(watch_url(video_id))
            .output()?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed(error.trim().to_string()));
        }

        if !path.exists() {
            return Err(ExtractError::Missing(video_id.to_string()));
        }

        let duration = parse_duration(&String::from_utf8_lossy(&output.stdout));
        if duration > 0.0 {
            if let Err(e) = fs::write(self.duration_path(video_id), duration.to_string()) {
                warn!(video_id, error = %e, "could not cache duration");
            }
        }

        Ok(AudioFile { path, duration })
    }
}

// Video ids come from outside (API, scraper, playlist store) and end up in
// file names, so only the YouTube id alphabet is accepted.
pub fn is_valid_video_id(video_id: &str) -> bool {
    !video_id.is_empty()
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

// First line of yt-dlp output that is a number
fn parse_duration(stdout: &str) -> f64 {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}
