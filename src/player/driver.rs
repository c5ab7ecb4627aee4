// Media driver boundary.
//
// The engine never plays audio itself. It sends DriverCommands to a
// driver running on its own thread and receives DriverEvents back:
//
//   engine --(std mpsc: DriverCommand)--> driver thread
//   engine <--(tokio mpsc: DriverEvent)-- driver thread
//
// The driver thread owns the MediaDriver. rodio's output stream is not
// Send, so the driver is built on that thread from a factory closure.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::DriverError;

// How often progress is reported while playing
pub const TICK: Duration = Duration::from_millis(100);

// Something that can actually play a YouTube video's audio.
pub trait MediaDriver {
    // Prepares the video and returns its duration in seconds (0 if unknown).
    fn load(&mut self, video_id: &str) -> Result<f64, DriverError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    // True once the loaded track has played to its end.
    fn is_finished(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Load(String),
    Play,
    Pause,
    Stop,
    SeekTo(f64),
    SetVolume(f32),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Ready { video_id: String, duration: f64 },
    Playing,
    Paused,
    Progress(f64),
    Seeked(f64),
    Ended,
    Error(String),
}

// Sending side of the command channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    pub fn send(&self, command: DriverCommand) {
        if self.commands.send(command).is_err() {
            warn!("media driver is gone, command dropped");
        }
    }

    pub fn shutdown(&self) {
        self.send(DriverCommand::Shutdown);
    }
}

// Starts the driver thread. Returns the command handle and the event stream.
pub fn spawn_driver<D, F>(factory: F) -> Result<(DriverHandle, UnboundedReceiver<DriverEvent>), DriverError>
where
    D: MediaDriver,
    F: FnOnce() -> D + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = unbounded_channel();

    thread::Builder::new()
        .name("media-driver".into())
        .spawn(move || {
            let driver = factory();
            run_driver(driver, command_rx, event_tx);
        })?;

    Ok((DriverHandle { commands: command_tx }, event_rx))
}

// The driver thread's loop: apply commands as they arrive, and between
// them report progress and detect the end of the track.
pub fn run_driver<D: MediaDriver>(
    mut driver: D,
    commands: mpsc::Receiver<DriverCommand>,
    events: UnboundedSender<DriverEvent>,
) {
    let mut playing = false;

    loop {
        match commands.recv_timeout(TICK) {
            Ok(DriverCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                debug!(?command, "driver command");
                playing = apply(&mut driver, command, playing, &events);
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !playing {
            continue;
        }
        if driver.is_finished() {
            playing = false;
            let _ = events.send(DriverEvent::Ended);
        } else {
            let _ = events.send(DriverEvent::Progress(driver.current_time()));
        }
    }

    driver.stop();
    debug!("media driver stopped");
}

// Applies one command, returns whether the driver is now playing.
fn apply<D: MediaDriver>(
    driver: &mut D,
    command: DriverCommand,
    playing: bool,
    events: &UnboundedSender<DriverEvent>,
) -> bool {
    match command {
        DriverCommand::Load(video_id) => match driver.load(&video_id) {
            Ok(duration) => {
                let _ = events.send(DriverEvent::Ready { video_id, duration });
                driver.play();
                let _ = events.send(DriverEvent::Playing);
                true
            }
            Err(e) => {
                warn!(%video_id, error = %e, "failed to load track");
                let _ = events.send(DriverEvent::Error(e.to_string()));
                false
            }
        },
        DriverCommand::Play => {
            driver.play();
            let _ = events.send(DriverEvent::Playing);
            true
        }
        DriverCommand::Pause => {
            driver.pause();
            let _ = events.send(DriverEvent::Paused);
            false
        }
        DriverCommand::Stop => {
            driver.stop();
            false
        }
        DriverCommand::SeekTo(seconds) => {
            driver.seek_to(seconds);
            let _ = events.send(DriverEvent::Seeked(driver.current_time()));
            playing
        }
        DriverCommand::SetVolume(volume) => {
            driver.set_volume(volume);
            playing
        }
        DriverCommand::Shutdown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // Plays a fake track that "finishes" after a fixed number of ticks.
    struct FakeDriver {
        log: Arc<Mutex<Vec<String>>>,
        ticks_left: std::cell::Cell<u32>,
        position: f64,
        fail_loads: bool,
    }

    impl MediaDriver for FakeDriver {
        fn load(&mut self, video_id: &str) -> Result<f64, DriverError> {
            self.log.lock().unwrap().push(format!("load {video_id}"));
            if self.fail_loads {
                return Err(DriverError::Decode("bad data".into()));
            }
            self.position = 0.0;
            Ok(180.0)
        }
        fn play(&mut self) {
            self.log.lock().unwrap().push("play".into());
        }
        fn pause(&mut self) {
            self.log.lock().unwrap().push("pause".into());
        }
        fn stop(&mut self) {}
        fn seek_to(&mut self, seconds: f64) {
            self.position = seconds;
        }
        fn set_volume(&mut self, _volume: f32) {}
        fn current_time(&self) -> f64 {
            self.position
        }
        fn duration(&self) -> f64 {
            180.0
        }
        fn is_finished(&self) -> bool {
            let left = self.ticks_left.get();
            if left == 0 {
                return true;
            }
            self.ticks_left.set(left - 1);
            false
        }
    }

    fn fake(fail_loads: bool) -> (FakeDriver, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let driver = FakeDriver {
            log: log.clone(),
            ticks_left: std::cell::Cell::new(2),
            position: 0.0,
            fail_loads,
        };
        (driver, log)
    }

    #[tokio::test]
    async fn load_reports_ready_playing_then_ended() {
        let (driver, log) = fake(false);
        let (handle, mut events) = spawn_driver(move || driver).unwrap();

        handle.send(DriverCommand::Load("abc".into()));

        assert_eq!(
            events.recv().await,
            Some(DriverEvent::Ready { video_id: "abc".into(), duration: 180.0 })
        );
        assert_eq!(events.recv().await, Some(DriverEvent::Playing));
        loop {
            match events.recv().await {
                Some(DriverEvent::Progress(_)) => continue,
                other => {
                    assert_eq!(other, Some(DriverEvent::Ended));
                    break;
                }
            }
        }
        handle.shutdown();
        assert_eq!(log.lock().unwrap()[..2], ["load abc".to_string(), "play".to_string()]);
    }

    #[tokio::test]
    async fn failed_load_reports_error() {
        let (driver, _log) = fake(true);
        let (handle, mut events) = spawn_driver(move || driver).unwrap();

        handle.send(DriverCommand::Load("abc".into()));
        assert!(matches!(events.recv().await, Some(DriverEvent::Error(_))));
        handle.shutdown();
    }

    #[tokio::test]
    async fn seek_reports_new_position() {
        let (driver, _log) = fake(false);
        let (handle, mut events) = spawn_driver(move || driver).unwrap();

        handle.send(DriverCommand::SeekTo(42.0));
        assert_eq!(events.recv().await, Some(DriverEvent::Seeked(42.0)));
        handle.shutdown();
    }
}
