// ==========================================
// AUDIO PLAYBACK
// ==========================================
// The rodio-backed MediaDriver. It lives on the driver thread (see
// driver.rs) and handles:
// - Connecting to the default audio output device
// - Fetching a track's audio through the extractor
// - Play, pause, stop, seek and volume
// - Tracking the playback position ourselves, rodio doesn't expose it
//
// rodio only decodes forward, so seeking re-opens the file and skips ahead.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::{debug, warn};

use super::driver::MediaDriver;
use crate::error::DriverError;
use crate::youtube::extractor::YouTubeExtractor;

// ==========================================
// PLAYBACK STATUS
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped, // Nothing loaded, or playback was stopped
    Playing,
    Paused,
    Loading, // Between stopping the old source and appending the new one
}

// Below this many seconds of playback an empty sink is a load hiccup, not
// the end of the track.
const MIN_PLAYED_FOR_END: f64 = 2.0;

// Seek offset as a Duration. Negative or non-finite offsets start from 0.
fn skip_for(offset: f64) -> Duration {
    Duration::try_from_secs_f64(offset).unwrap_or(Duration::ZERO)
}

pub struct AudioDriver {
    // The OutputStream is leaked in new() so the device stays open
    sink: Option<Sink>,
    extractor: YouTubeExtractor,
    status: PlaybackStatus,
    volume: f32,
    duration: f64,
    current_file: Option<PathBuf>,
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    total_paused: Duration,
}

impl Drop for AudioDriver {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }
}

impl AudioDriver {
    // Opens the default output device. Without one the driver still works,
    // loads just fail with NoOutput.
    pub fn new(extractor: YouTubeExtractor) -> Self {
        let sink = match OutputStream::try_default() {
            Ok((stream, handle)) => match Sink::try_new(&handle) {
                Ok(sink) => {
                    // The stream must outlive the sink for the whole program
                    std::mem::forget(stream);
                    Some(sink)
                }
                Err(e) => {
                    warn!(error = %e, "could not create audio sink");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "no audio output device");
                None
            }
        };

        AudioDriver {
            sink,
            extractor,
            status: PlaybackStatus::Stopped,
            volume: 1.0,
            duration: 0.0,
            current_file: None,
            start_time: None,
            pause_time: None,
            total_paused: Duration::ZERO,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, DriverError> {
        let file = File::open(path)?;
        Decoder::new(BufReader::new(file)).map_err(|e| DriverError::Decode(e.to_string()))
    }

    // (Re)starts the current file at `offset` seconds. Keeps the paused
    // state if we were paused. Returns the decoder's idea of the total
    // duration, if it has one.
    fn start_from(&mut self, offset: f64) -> Result<Option<f64>, DriverError> {
        let sink = self.sink.as_ref().ok_or(DriverError::NoOutput)?;
        let path = self.current_file.as_deref().ok_or(DriverError::NoOutput)?;
        let was_paused = self.status == PlaybackStatus::Paused;

        self.status = PlaybackStatus::Loading;
        sink.stop();

        let source = match Self::decode(path) {
            Ok(source) => source,
            Err(e) => {
                self.status = PlaybackStatus::Stopped;
                self.start_time = None;
                return Err(e);
            }
        };
        let total = source.total_duration().map(|d| d.as_secs_f64());
        let skip = skip_for(offset);
        sink.append(source.skip_duration(skip));
        sink.set_volume(self.volume);

        let now = Instant::now();
        self.start_time = Some(now.checked_sub(skip).unwrap_or(now));
        self.total_paused = Duration::ZERO;
        if was_paused {
            sink.pause();
            self.pause_time = Some(now);
            self.status = PlaybackStatus::Paused;
        } else {
            sink.play();
            self.pause_time = None;
            self.status = PlaybackStatus::Playing;
        }
        Ok(total)
    }
}

impl MediaDriver for AudioDriver {
    fn load(&mut self, video_id: &str) -> Result<f64, DriverError> {
        if self.sink.is_none() {
            return Err(DriverError::NoOutput);
        }

        let file = self.extractor.download_audio(video_id)?;
        self.current_file = Some(file.path);
        self.status = PlaybackStatus::Stopped;

        let decoded = self.start_from(0.0)?;
        self.duration = if file.duration > 0.0 {
            file.duration
        } else {
            decoded.unwrap_or(0.0)
        };
        debug!(video_id, duration = self.duration, "track loaded");
        Ok(self.duration)
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
        if let Some(paused_at) = self.pause_time.take() {
            self.total_paused += paused_at.elapsed();
        }
        if self.start_time.is_some() {
            self.status = PlaybackStatus::Playing;
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        if self.status == PlaybackStatus::Playing {
            self.pause_time = Some(Instant::now());
            self.status = PlaybackStatus::Paused;
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.start_time = None;
        self.pause_time = None;
        self.total_paused = Duration::ZERO;
        self.status = PlaybackStatus::Stopped;
    }

    fn seek_to(&mut self, seconds: f64) {
        if self.current_file.is_none() || self.start_time.is_none() {
            return;
        }
        let target = if self.duration > 0.0 {
            seconds.clamp(0.0, self.duration)
        } else {
            seconds.max(0.0)
        };
        if let Err(e) = self.start_from(target) {
            warn!(error = %e, "seek failed");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn current_time(&self) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let elapsed = match self.pause_time {
            Some(paused_at) => paused_at.duration_since(start),
            None => start.elapsed(),
        };
        elapsed.saturating_sub(self.total_paused).as_secs_f64()
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_finished(&self) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        sink.empty()
            && self.status == PlaybackStatus::Playing
            && self.start_time.is_some()
            && self.current_time() >= MIN_PLAYED_FOR_END
    }
}
