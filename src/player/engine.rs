// ==========================================
// PLAYER ENGINE
// ==========================================
// PlayerEngine is the one object the rest of the app talks to. It owns
// the PlayerState and runs the Effects its transitions produce:
// - Load/Seek/Play/... go to the media driver as DriverCommands
// - SaveHistory writes recently played to the LocalStore
// - Replenish starts a background recommendation load
//
// The engine is a cheap-to-clone handle (Arc inside). The state sits
// behind a std Mutex that is only held for the synchronous transitions,
// never across an await, so every mutation is a short critical section.
//
// Recommendation loads are single-flight: PlayerState hands out one
// in-flight token at a time, so a second trigger while one load runs is
// a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::driver::{DriverCommand, DriverEvent, DriverHandle};
use super::history::RecentlyPlayed;
use super::queue::Track;
use super::state::{Effect, PlayerState, RecommendationRequest, Transition};
use crate::error::RecommendError;
use crate::recommend::Recommend;
use crate::storage::LocalStore;

// Policy knobs. The queue bounds themselves are constants in queue.rs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Extra attempts for the proactive load that follows a track change
    pub preload_retries: u32,
    pub preload_retry_delay: Duration,
    // Drop recommendation results that arrive after the track changed
    pub discard_stale_recommendations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            preload_retries: 2,
            preload_retry_delay: Duration::from_secs(5),
            discard_stale_recommendations: false,
        }
    }
}

struct Inner {
    state: Mutex<PlayerState>,
    recommender: Arc<dyn Recommend>,
    store: Option<LocalStore>,
    driver: Option<DriverHandle>,
    config: EngineConfig,
    // Background load started by a Replenish effect, if any
    replenish_task: Mutex<Option<JoinHandle<()>>>,
    // Set while an Ended event is being handled
    ending: AtomicBool,
    // Video the last proactive load ran for
    preloaded_for: Mutex<Option<String>>,
}

#[derive(Clone)]
pub struct PlayerEngine {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlayerEngine {
    // Builds the engine for a session. Recently played is rehydrated from
    // the store; everything else starts at its default.
    pub fn new(
        config: EngineConfig,
        recommender: Arc<dyn Recommend>,
        store: Option<LocalStore>,
        driver: Option<DriverHandle>,
    ) -> Self {
        let history = store
            .as_ref()
            .map(|s| s.load_recently_played())
            .unwrap_or_default();
        info!(recently_played = history.len(), "player engine initialised");

        PlayerEngine {
            inner: Arc::new(Inner {
                state: Mutex::new(PlayerState::new(RecentlyPlayed::from_tracks(history))),
                recommender,
                store,
                driver,
                config,
                replenish_task: Mutex::new(None),
                ending: AtomicBool::new(false),
                preloaded_for: Mutex::new(None),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        lock(&self.inner.state)
    }

    // A copy of the current state, for rendering and tests.
    pub fn snapshot(&self) -> PlayerState {
        self.state().clone()
    }

    fn current_id(&self) -> Option<String> {
        self.state().current_track().map(|t| t.video_id.clone())
    }

    // Runs a fallible transition. Rejections are logged and dropped so
    // the public operations stay idempotent no-ops on bad input.
    fn dispatch(&self, op: &'static str, transition: impl FnOnce(&mut PlayerState) -> Transition) {
        let result = transition(&mut self.state());
        match result {
            Ok(effects) => self.apply(effects),
            Err(e) => debug!(op, error = %e, "operation ignored"),
        }
    }

    fn update(&self, transition: impl FnOnce(&mut PlayerState) -> Vec<Effect>) {
        let effects = transition(&mut self.state());
        self.apply(effects);
    }

    // ==========================================
    // EFFECTS
    // ==========================================

    fn command(&self, command: DriverCommand) {
        if let Some(driver) = &self.inner.driver {
            driver.send(command);
        }
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Load(track) => {
                    info!(video_id = %track.video_id, title = %track.title, "now playing");
                    self.command(DriverCommand::Load(track.video_id));
                }
                Effect::Restart => {
                    self.command(DriverCommand::SeekTo(0.0));
                    self.command(DriverCommand::Play);
                }
                Effect::Seek(seconds) => {
                    if self.inner.driver.is_some() {
                        self.command(DriverCommand::SeekTo(seconds));
                    } else {
                        // Nobody will confirm the seek
                        self.state().finish_seek(seconds);
                    }
                }
                Effect::Play => self.command(DriverCommand::Play),
                Effect::Pause => self.command(DriverCommand::Pause),
                Effect::Stop => self.command(DriverCommand::Stop),
                Effect::Volume(volume) => self.command(DriverCommand::SetVolume(volume)),
                Effect::Replenish => self.spawn_replenish(),
                Effect::SaveHistory => self.save_history(),
            }
        }
    }

    fn save_history(&self) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let tracks = self.state().recently_played().to_vec();
        if let Err(e) = store.save_recently_played(&tracks) {
            warn!(error = %e, "failed to save recently played");
        }
    }

    // Fire-and-forget replenishment. The in-flight slot is claimed here,
    // synchronously, so a second trigger right after this one sees it.
    fn spawn_replenish(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime, skipping replenishment");
            return;
        };
        let Some(request) = self.state().begin_recommendations() else {
            return;
        };

        let engine = self.clone();
        let task = runtime.spawn(async move {
            let _ = engine.run_request(request).await;
        });
        *lock(&self.inner.replenish_task) = Some(task);
    }

    async fn run_request(&self, request: RecommendationRequest) -> Result<usize, RecommendError> {
        debug!(
            request = request.token.id,
            limit = request.limit,
            seed = request.current.as_ref().map(|t| t.video_id.as_str()),
            "loading recommendations"
        );
        let outcome = self
            .inner
            .recommender
            .recommend(request.current.as_ref(), &request.recent, request.limit)
            .await;

        let discard_stale = self.inner.config.discard_stale_recommendations;
        let result = self.state().finish_recommendations(request.token, outcome, discard_stale);
        match &result {
            Ok(added) => info!(added, "recommendations merged into queue"),
            Err(e) => warn!(error = %e, "recommendation load failed"),
        }
        result
    }

    // Waits for the background load started by a Replenish effect.
    pub async fn settle(&self) {
        loop {
            let task = lock(&self.inner.replenish_task).take();
            match task {
                Some(task) => {
                    let _ = task.await;
                }
                None => break,
            }
        }
    }

    // ==========================================
    // TRACK CONTROL
    // ==========================================

    pub fn set_current_track(&self, track: Option<Track>, enqueue: bool) {
        self.update(|s| s.set_current_track(track, enqueue));
    }

    pub fn set_is_playing(&self, playing: bool) {
        self.update(|s| s.set_is_playing(playing));
    }

    pub fn toggle_playback(&self) {
        self.update(PlayerState::toggle_playback);
    }

    // ==========================================
    // QUEUE MANAGEMENT
    // ==========================================

    pub fn add_to_queue(&self, track: Track) {
        self.dispatch("add_to_queue", |s| s.add_to_queue(track).map(|_| Vec::new()));
    }

    pub fn set_queue(&self, tracks: Vec<Track>) {
        self.state().set_queue(tracks);
    }

    pub fn remove_from_queue(&self, track_id: &str) {
        self.dispatch("remove_from_queue", |s| s.remove_from_queue(track_id).map(|_| Vec::new()));
    }

    pub fn move_queue_item(&self, from: usize, to: usize) {
        self.dispatch("move_queue_item", |s| s.move_queue_item(from, to).map(|_| Vec::new()));
    }

    pub fn clear_queue(&self) {
        self.update(PlayerState::clear_queue);
    }

    pub fn clear_recently_played(&self) {
        self.update(PlayerState::clear_recently_played);
    }

    // ==========================================
    // NAVIGATION
    // ==========================================

    pub fn set_current_track_index(&self, index: usize) {
        self.dispatch("set_current_track_index", |s| s.set_current_track_index(index));
    }

    pub fn play_next(&self) {
        self.update(PlayerState::play_next);
    }

    pub fn play_previous(&self) {
        self.dispatch("play_previous", PlayerState::play_previous);
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.state().toggle_shuffle()
    }

    pub fn toggle_repeat(&self) -> bool {
        self.state().toggle_repeat()
    }

    pub fn set_autoplay_enabled(&self, enabled: bool) {
        self.state().set_autoplay_enabled(enabled);
    }

    // ==========================================
    // TRANSPORT
    // ==========================================

    pub fn seek_to(&self, seconds: f64) {
        self.update(|s| s.seek_to(seconds));
    }

    pub fn set_is_seeking(&self, seeking: bool) {
        self.state().set_is_seeking(seeking);
    }

    pub fn set_volume(&self, volume: f32) {
        self.update(|s| s.set_volume(volume));
    }

    // ==========================================
    // RECOMMENDATIONS
    // ==========================================

    // Loads recommendations into the queue. Never fails from the caller's
    // point of view: a failure is recorded in recommendations_error.
    pub async fn load_recommendations(&self) {
        let _ = self.try_load_recommendations().await;
    }

    // Same as load_recommendations(), but reports a failed fetch. Ok(0)
    // when nothing was started (autoplay off, already loading, queue full).
    pub async fn try_load_recommendations(&self) -> Result<usize, RecommendError> {
        let request = self.state().begin_recommendations();
        match request {
            Some(request) => self.run_request(request).await,
            None => Ok(0),
        }
    }

    // Proactive load once a new track is ready, retried on failure.
    fn preload(&self, video_id: String) {
        let autoplay = self.state().is_autoplay_enabled();
        if !autoplay || self.current_id().as_deref() != Some(video_id.as_str()) {
            return;
        }
        {
            let mut preloaded = lock(&self.inner.preloaded_for);
            if preloaded.as_deref() == Some(video_id.as_str()) {
                return;
            }
            *preloaded = Some(video_id.clone());
        }

        let engine = self.clone();
        tokio::spawn(async move {
            engine.preload_with_retry(video_id).await;
        });
    }

    async fn preload_with_retry(&self, video_id: String) {
        let retries = self.inner.config.preload_retries;
        let delay = self.inner.config.preload_retry_delay;

        for attempt in 0..=retries {
            match self.try_load_recommendations().await {
                Ok(_) => return,
                Err(e) if attempt < retries => {
                    warn!(attempt = attempt + 1, error = %e, ?delay, "preload failed, retrying");
                    tokio::time::sleep(delay).await;
                    // A newer track gets its own preload
                    if self.current_id().as_deref() != Some(video_id.as_str()) {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "preload failed, giving up"),
            }
        }
    }

    // ==========================================
    // DRIVER EVENTS
    // ==========================================

    pub async fn handle_event(&self, event: DriverEvent) {
        match event {
            DriverEvent::Ready { video_id, duration } => {
                if self.current_id().as_deref() == Some(video_id.as_str()) {
                    self.state().set_duration(duration);
                }
                self.preload(video_id);
            }
            DriverEvent::Playing => self.state().mark_playing(true),
            DriverEvent::Paused => self.state().mark_playing(false),
            DriverEvent::Progress(seconds) => {
                self.state().set_progress(seconds);
            }
            DriverEvent::Seeked(seconds) => self.state().finish_seek(seconds),
            DriverEvent::Ended => self.handle_track_end().await,
            DriverEvent::Error(message) => {
                warn!(%message, "media driver error, playback stopped");
                self.state().mark_playing(false);
            }
        }
    }

    // End of track: repeat restarts it, otherwise move on. With an empty
    // queue and autoplay on, refill first (seeded by the track that just
    // finished) so playback can continue instead of stopping.
    async fn handle_track_end(&self) {
        if self.inner.ending.swap(true, Ordering::SeqCst) {
            debug!("already handling track end");
            return;
        }

        let (repeating, has_current, autoplay) = {
            let state = self.state();
            (state.is_repeating(), state.current_track().is_some(), state.is_autoplay_enabled())
        };

        if repeating && has_current {
            self.update(PlayerState::restart);
        } else {
            let queue_empty = self.state().queue().is_empty();
            if autoplay && queue_empty {
                self.settle().await;
                let still_empty = self.state().queue().is_empty();
                if still_empty {
                    let _ = self.try_load_recommendations().await;
                }
            }
            // The refill above was this track end's one load
            let nothing_queued = self.state().queue().is_empty();
            if autoplay && nothing_queued {
                self.update(PlayerState::stop);
            } else {
                self.play_next();
            }
        }

        self.inner.ending.store(false, Ordering::SeqCst);
    }

    // Feeds driver events into the engine until the driver goes away.
    pub fn spawn_event_loop(&self, mut events: UnboundedReceiver<DriverEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                engine.handle_event(event).await;
            }
            debug!("driver event stream closed");
        })
    }

    pub fn shutdown(&self) {
        if let Some(driver) = &self.inner.driver {
            driver.shutdown();
        }
    }
}
