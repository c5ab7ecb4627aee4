// ==========================================
// PLAYER STATE
// ==========================================
// Everything the player knows, and every transition on it.
//
// Transitions are synchronous and never touch the outside world. They
// return a list of Effects instead (load this track, seek, replenish the
// queue, save history) and PlayerEngine carries those out. That keeps
// this file testable without a runtime, a driver or a network.
//
// Rejected operations return Err(QueueError). The engine logs and drops
// those, so from the outside an invalid index is simply a no-op.

use tracing::debug;

use super::history::RecentlyPlayed;
use super::queue::{Queue, Track, MIN_QUEUE_SIZE};
use crate::error::{QueueError, RecommendError};

// playPrevious() restarts the current track instead of going back once
// it has played for longer than this.
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;

// Work a transition asks the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    // Load this video in the driver and start playing it
    Load(Track),
    // Seek the driver back to 0 and play
    Restart,
    Seek(f64),
    Play,
    Pause,
    Stop,
    Volume(f32),
    // Start a background recommendation load (subject to single-flight)
    Replenish,
    // Recently played changed and should be written to disk
    SaveHistory,
}

pub type Transition = Result<Vec<Effect>, QueueError>;

// Identifies one recommendation load. generation is the track generation
// at the time the load started, so a result can be recognised as stale
// once the user has moved on to another track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub id: u64,
    pub generation: u64,
}

// Everything a recommendation load needs, captured when it starts.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub token: RequestToken,
    pub current: Option<Track>,
    pub recent: Vec<Track>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
struct RequestTracker {
    next_id: u64,
    in_flight: Option<RequestToken>,
}

// Transport as reported by (and commanded to) the media driver.
// volume is 0.0..=1.0, progress and duration are seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    pub is_playing: bool,
    pub volume: f32,
    pub progress: f64,
    pub duration: f64,
    pub is_seeking: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Transport {
            is_playing: false,
            volume: 1.0,
            progress: 0.0,
            duration: 0.0,
            is_seeking: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    queue: Queue,
    recently_played: RecentlyPlayed,
    current_track: Option<Track>,
    current_index: usize,
    transport: Transport,
    is_shuffling: bool,
    is_repeating: bool,
    autoplay_enabled: bool,
    recommendations_error: Option<String>,
    requests: RequestTracker,
    // Bumped every time the current track changes
    generation: u64,
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState::new(RecentlyPlayed::new())
    }
}

impl PlayerState {
    // Fresh session state. Only recently played survives between runs.
    pub fn new(recently_played: RecentlyPlayed) -> Self {
        PlayerState {
            queue: Queue::new(),
            recently_played,
            current_track: None,
            current_index: 0,
            transport: Transport::default(),
            is_shuffling: false,
            is_repeating: false,
            autoplay_enabled: true,
            recommendations_error: None,
            requests: RequestTracker::default(),
            generation: 0,
        }
    }

    // ==========================================
    // READ ACCESS
    // ==========================================

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn recently_played(&self) -> &RecentlyPlayed {
        &self.recently_played
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing
    }

    pub fn progress(&self) -> f64 {
        self.transport.progress
    }

    pub fn is_shuffling(&self) -> bool {
        self.is_shuffling
    }

    pub fn is_repeating(&self) -> bool {
        self.is_repeating
    }

    pub fn is_autoplay_enabled(&self) -> bool {
        self.autoplay_enabled
    }

    pub fn is_loading_recommendations(&self) -> bool {
        self.requests.in_flight.is_some()
    }

    pub fn recommendations_error(&self) -> Option<&str> {
        self.recommendations_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // Autoplay wants more tracks once the queue drops below the low-water mark.
    pub fn queue_is_low(&self) -> bool {
        self.autoplay_enabled && self.queue.len() < MIN_QUEUE_SIZE
    }

    // ==========================================
    // TRACK CONTROL
    // ==========================================

    // Makes `track` the current track and starts it.
    fn change_track(&mut self, track: Track) {
        self.current_track = Some(track);
        self.transport.is_playing = true;
        self.transport.progress = 0.0;
        self.transport.duration = 0.0;
        self.transport.is_seeking = false;
        self.generation += 1;
    }

    fn record_played(&mut self, track: Track, effects: &mut Vec<Effect>) {
        if self.recently_played.record(track) && !effects.contains(&Effect::SaveHistory) {
            effects.push(Effect::SaveHistory);
        }
    }

    // Sets the now-playing track. None stops playback.
    //
    // The outgoing track goes to recently played first. With `enqueue`,
    // a track that isn't queued yet is appended and the cursor points at
    // it; that path does not trigger replenishment. Otherwise the track
    // just becomes current, and a low queue triggers a background load.
    pub fn set_current_track(&mut self, track: Option<Track>, enqueue: bool) -> Vec<Effect> {
        let Some(track) = track else {
            self.current_track = None;
            self.transport.is_playing = false;
            self.generation += 1;
            return vec![Effect::Stop];
        };

        let mut effects = Vec::new();
        if let Some(previous) = self.current_track.take() {
            self.record_played(previous, &mut effects);
        }

        if enqueue && !self.queue.contains(track.id()) {
            match self.queue.push(track.clone()) {
                Ok(index) => {
                    self.current_index = index;
                    self.change_track(track.clone());
                    effects.push(Effect::Load(track));
                    return effects;
                }
                Err(e) => debug!(error = %e, "could not enqueue, playing without queueing"),
            }
        }

        self.change_track(track.clone());
        effects.push(Effect::Load(track));
        if self.queue_is_low() {
            effects.push(Effect::Replenish);
        }
        effects
    }

    pub fn set_is_playing(&mut self, playing: bool) -> Vec<Effect> {
        if self.current_track.is_none() && playing {
            return Vec::new();
        }
        self.transport.is_playing = playing;
        vec![if playing { Effect::Play } else { Effect::Pause }]
    }

    pub fn toggle_playback(&mut self) -> Vec<Effect> {
        let playing = !self.transport.is_playing;
        self.set_is_playing(playing)
    }

    // Driver-side state report: no effect goes back to the driver.
    pub fn mark_playing(&mut self, playing: bool) {
        self.transport.is_playing = playing;
    }

    // Restarts the current track from 0 (repeat on track end).
    pub fn restart(&mut self) -> Vec<Effect> {
        if self.current_track.is_none() {
            return Vec::new();
        }
        self.transport.progress = 0.0;
        self.transport.is_playing = true;
        vec![Effect::Restart]
    }

    // ==========================================
    // QUEUE MANAGEMENT
    // ==========================================

    pub fn add_to_queue(&mut self, track: Track) -> Result<(), QueueError> {
        self.queue.push(track).map(|_| ())
    }

    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.queue.replace(tracks);
        self.clamp_cursor();
    }

    pub fn remove_from_queue(&mut self, id: &str) -> Result<(), QueueError> {
        if self.queue.remove_id(id) == 0 {
            return Err(QueueError::NotQueued(id.to_string()));
        }
        self.clamp_cursor();
        Ok(())
    }

    fn clamp_cursor(&mut self) {
        if self.current_index >= self.queue.len() {
            self.current_index = self.queue.len().saturating_sub(1);
        }
    }

    // Reorders the queue while the cursor keeps pointing at the same track:
    // - the moved item was the cursor: cursor follows it
    // - an item from before the cursor moved to or past it: cursor - 1
    // - an item from after the cursor moved to or before it: cursor + 1
    pub fn move_queue_item(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        if from == to {
            return Ok(());
        }
        self.queue.move_item(from, to)?;

        let cursor = self.current_index;
        if from == cursor {
            self.current_index = to;
        } else if from < cursor && to >= cursor {
            self.current_index -= 1;
        } else if from > cursor && to <= cursor {
            self.current_index += 1;
        }
        Ok(())
    }

    pub fn clear_queue(&mut self) -> Vec<Effect> {
        self.queue.clear();
        self.current_track = None;
        self.transport.is_playing = false;
        self.current_index = 0;
        self.generation += 1;
        vec![Effect::Stop]
    }

    pub fn clear_recently_played(&mut self) -> Vec<Effect> {
        self.recently_played.clear();
        vec![Effect::SaveHistory]
    }

    // ==========================================
    // NAVIGATION
    // ==========================================

    // Plays queue[index]. Out of range is rejected without touching anything.
    pub fn set_current_track_index(&mut self, index: usize) -> Transition {
        let track = self
            .queue
            .get(index)
            .cloned()
            .ok_or(QueueError::IndexOutOfRange {
                index,
                len: self.queue.len(),
            })?;

        let mut effects = Vec::new();
        self.current_index = index;
        self.change_track(track.clone());
        effects.push(Effect::Load(track.clone()));
        self.record_played(track, &mut effects);
        Ok(effects)
    }

    // Three cases:
    // 1. Something queued: pop it and play it
    // 2. Queue empty, repeat on, a track is loaded: play that track again
    // 3. Queue empty otherwise: stop (and still try to refill for next time)
    pub fn play_next(&mut self) -> Vec<Effect> {
        if let Some(next) = self.queue.pop_front() {
            let mut effects = Vec::new();
            if let Some(outgoing) = self.current_track.clone() {
                self.record_played(outgoing, &mut effects);
            }
            self.change_track(next.clone());
            effects.insert(0, Effect::Load(next.clone()));
            self.record_played(next, &mut effects);
            if self.queue_is_low() {
                effects.push(Effect::Replenish);
            }
            return effects;
        }

        if self.is_repeating {
            if let Some(current) = self.current_track.clone() {
                return self.set_current_track(Some(current), false);
            }
        }

        let mut effects = self.stop();
        if self.autoplay_enabled {
            effects.push(Effect::Replenish);
        }
        effects
    }

    // Nothing left to play. Unlike play_next() this never asks for a refill.
    pub fn stop(&mut self) -> Vec<Effect> {
        self.current_track = None;
        self.transport.is_playing = false;
        self.generation += 1;
        vec![Effect::Stop]
    }

    // Past the restart threshold: back to 0 on the same track.
    // Otherwise one step back in the queue; at the start that wraps with
    // repeat on and just rewinds with repeat off.
    pub fn play_previous(&mut self) -> Transition {
        if self.queue.is_empty() {
            return Err(QueueError::Empty);
        }

        if self.transport.progress > RESTART_THRESHOLD_SECS {
            self.transport.progress = 0.0;
            return Ok(vec![Effect::Seek(0.0)]);
        }

        let previous = match self.current_index.checked_sub(1) {
            Some(index) => index,
            None if self.is_repeating => self.queue.len() - 1,
            None => {
                self.transport.progress = 0.0;
                return Ok(vec![Effect::Seek(0.0)]);
            }
        };
        self.set_current_track_index(previous)
    }

    // ==========================================
    // MODES
    // ==========================================
    // Shuffle is advisory: the flag is stored and shown, the queue is not
    // reordered.

    pub fn toggle_shuffle(&mut self) -> bool {
        self.is_shuffling = !self.is_shuffling;
        self.is_shuffling
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.is_repeating = !self.is_repeating;
        self.is_repeating
    }

    pub fn set_autoplay_enabled(&mut self, enabled: bool) {
        self.autoplay_enabled = enabled;
    }

    // ==========================================
    // TRANSPORT
    // ==========================================

    fn clamp_position(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if self.transport.duration > 0.0 {
            seconds.min(self.transport.duration)
        } else {
            seconds
        }
    }

    // Jumps to `seconds`. Progress ticks are ignored until the driver
    // confirms the seek through finish_seek().
    pub fn seek_to(&mut self, seconds: f64) -> Vec<Effect> {
        let position = self.clamp_position(seconds);
        self.transport.progress = position;
        self.transport.is_seeking = true;
        vec![Effect::Seek(position)]
    }

    pub fn finish_seek(&mut self, position: f64) {
        self.transport.progress = self.clamp_position(position);
        self.transport.is_seeking = false;
    }

    pub fn set_is_seeking(&mut self, seeking: bool) {
        self.transport.is_seeking = seeking;
    }

    // Progress tick from the driver. Dropped while a seek is in flight,
    // otherwise the old position would overwrite the requested one.
    pub fn set_progress(&mut self, seconds: f64) -> bool {
        if self.transport.is_seeking {
            return false;
        }
        self.transport.progress = self.clamp_position(seconds);
        true
    }

    pub fn set_duration(&mut self, seconds: f64) {
        self.transport.duration = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.transport.progress = self.clamp_position(self.transport.progress);
    }

    pub fn set_volume(&mut self, volume: f32) -> Vec<Effect> {
        if volume.is_nan() {
            return Vec::new();
        }
        let volume = volume.clamp(0.0, 1.0);
        self.transport.volume = volume;
        vec![Effect::Volume(volume)]
    }

    // ==========================================
    // RECOMMENDATIONS (single-flight)
    // ==========================================

    // Claims the single in-flight slot. None when autoplay is off, a load
    // is already running, or the queue has no room left.
    pub fn begin_recommendations(&mut self) -> Option<RecommendationRequest> {
        if !self.autoplay_enabled {
            debug!("autoplay disabled, not loading recommendations");
            return None;
        }
        if self.requests.in_flight.is_some() {
            debug!("recommendations already loading");
            return None;
        }
        let limit = self.queue.space_left();
        if limit == 0 {
            debug!("queue full, not loading recommendations");
            return None;
        }

        self.requests.next_id += 1;
        let token = RequestToken {
            id: self.requests.next_id,
            generation: self.generation,
        };
        self.requests.in_flight = Some(token);
        self.recommendations_error = None;

        Some(RecommendationRequest {
            token,
            current: self.current_track.clone(),
            recent: self.recently_played.to_vec(),
            limit,
        })
    }

    // Merges a finished load. Filters run against the state as it is now,
    // not as it was when the load started: anything queued, current or
    // recently played in the meantime is dropped.
    //
    // With `discard_stale`, results for an older track generation are
    // thrown away entirely.
    pub fn finish_recommendations(
        &mut self,
        token: RequestToken,
        outcome: Result<Vec<Track>, RecommendError>,
        discard_stale: bool,
    ) -> Result<usize, RecommendError> {
        if self.requests.in_flight != Some(token) {
            debug!(request = token.id, "ignoring result of a superseded request");
            return Ok(0);
        }
        self.requests.in_flight = None;

        let tracks = match outcome {
            Ok(tracks) => tracks,
            Err(e) => {
                self.recommendations_error = Some(e.to_string());
                return Err(e);
            }
        };

        if discard_stale && token.generation != self.generation {
            debug!(request = token.id, "track changed while loading, discarding results");
            return Ok(0);
        }

        let current_id = self.current_track.as_ref().map(|t| t.video_id.clone());
        let fresh: Vec<Track> = tracks
            .into_iter()
            .filter(|t| {
                !self.queue.contains(&t.video_id)
                    && current_id.as_deref() != Some(t.video_id.as_str())
                    && !self.recently_played.contains(&t.video_id)
            })
            .collect();

        Ok(self.queue.extend_capped(fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::queue::MAX_QUEUE_SIZE;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Song {id}"), format!("Artist {id}"), "")
    }

    fn queue_ids(state: &PlayerState) -> Vec<String> {
        state.queue().iter().map(|t| t.video_id.clone()).collect()
    }

    fn history_ids(state: &PlayerState) -> Vec<String> {
        state.recently_played().iter().map(|t| t.video_id.clone()).collect()
    }

    fn state_with_queue(ids: &[&str]) -> PlayerState {
        let mut state = PlayerState::default();
        state.set_queue(ids.iter().map(|id| track(id)).collect());
        state
    }

    #[test]
    fn set_current_track_records_outgoing_track_first() {
        let mut state = PlayerState::default();
        state.set_current_track(Some(track("a")), false);
        assert!(state.recently_played().is_empty());

        let effects = state.set_current_track(Some(track("b")), false);
        assert_eq!(history_ids(&state), vec!["a"]);
        assert_eq!(state.current_track().map(|t| t.id()), Some("b"));
        assert!(state.is_playing());
        assert_eq!(effects[0], Effect::SaveHistory);
        assert!(effects.contains(&Effect::Load(track("b"))));
    }

    #[test]
    fn set_current_track_with_enqueue_appends_and_points_cursor() {
        let mut state = state_with_queue(&["a", "b"]);
        let effects = state.set_current_track(Some(track("c")), true);

        assert_eq!(queue_ids(&state), vec!["a", "b", "c"]);
        assert_eq!(state.current_index(), 2);
        assert_eq!(effects, vec![Effect::Load(track("c"))]);
    }

    #[test]
    fn set_current_track_with_enqueue_of_queued_track_takes_generic_path() {
        let mut state = state_with_queue(&["a", "b"]);
        let effects = state.set_current_track(Some(track("a")), true);

        assert_eq!(queue_ids(&state), vec!["a", "b"]);
        assert_eq!(state.current_index(), 0);
        assert!(effects.contains(&Effect::Replenish));
    }

    #[test]
    fn set_current_track_requests_replenish_only_when_low_and_enabled() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        assert!(!state.set_current_track(Some(track("x")), false).contains(&Effect::Replenish));

        let mut state = state_with_queue(&["a"]);
        state.set_autoplay_enabled(false);
        assert!(!state.set_current_track(Some(track("x")), false).contains(&Effect::Replenish));
    }

    #[test]
    fn set_current_track_none_stops() {
        let mut state = PlayerState::default();
        state.set_current_track(Some(track("a")), false);
        assert_eq!(state.set_current_track(None, false), vec![Effect::Stop]);
        assert!(state.current_track().is_none());
        assert!(!state.is_playing());
    }

    #[test]
    fn remove_clamps_cursor() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        state.set_current_track_index(2).unwrap();
        state.remove_from_queue("c").unwrap();
        assert_eq!(state.current_index(), 1);

        assert_eq!(
            state.remove_from_queue("missing"),
            Err(QueueError::NotQueued("missing".into()))
        );
    }

    #[test]
    fn reorder_keeps_cursor_on_same_track() {
        let mut state = state_with_queue(&["a", "b", "c", "d"]);
        state.set_current_track_index(1).unwrap();

        state.move_queue_item(0, 3).unwrap();
        assert_eq!(queue_ids(&state), vec!["b", "c", "d", "a"]);
        assert_eq!(state.current_index(), 0);

        // From after the cursor to before it
        state.move_queue_item(2, 0).unwrap();
        assert_eq!(queue_ids(&state), vec!["d", "b", "c", "a"]);
        assert_eq!(state.current_index(), 1);

        // Moving the cursor track itself
        state.move_queue_item(1, 3).unwrap();
        assert_eq!(state.current_index(), 3);
        assert_eq!(state.queue().get(3).map(|t| t.id()), Some("b"));
    }

    #[test]
    fn reorder_with_equal_indices_is_a_no_op() {
        let mut state = state_with_queue(&["a", "b"]);
        assert_eq!(state.move_queue_item(1, 1), Ok(()));
        assert_eq!(queue_ids(&state), vec!["a", "b"]);
        assert!(state.move_queue_item(0, 5).is_err());
    }

    #[test]
    fn clear_queue_resets_everything() {
        let mut state = state_with_queue(&["a", "b"]);
        state.set_current_track_index(1).unwrap();
        assert_eq!(state.clear_queue(), vec![Effect::Stop]);
        assert!(state.queue().is_empty());
        assert!(state.current_track().is_none());
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn out_of_range_index_is_rejected_without_changes() {
        let mut state = state_with_queue(&["a"]);
        let before = state.generation();
        assert!(matches!(
            state.set_current_track_index(1),
            Err(QueueError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(state.current_track().is_none());
        assert_eq!(state.generation(), before);
    }

    #[test]
    fn play_next_builds_history_in_play_order() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        state.set_autoplay_enabled(false);
        state.play_next();
        state.play_next();
        state.play_next();
        assert_eq!(history_ids(&state), vec!["c", "b", "a"]);

        state.set_queue(vec![track("a")]);
        state.play_next();
        assert_eq!(history_ids(&state), vec!["a", "c", "b"]);
    }

    #[test]
    fn play_next_pops_front_and_replenishes_when_low() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        let effects = state.play_next();
        assert_eq!(effects[0], Effect::Load(track("a")));
        assert!(effects.contains(&Effect::Replenish));
        assert_eq!(queue_ids(&state), vec!["b", "c"]);
    }

    #[test]
    fn play_next_on_empty_queue_with_repeat_restarts_current() {
        let mut state = PlayerState::default();
        state.set_autoplay_enabled(false);
        state.toggle_repeat();
        state.set_current_track(Some(track("a")), false);

        let effects = state.play_next();
        assert!(effects.contains(&Effect::Load(track("a"))));
        assert_eq!(state.current_track().map(|t| t.id()), Some("a"));
    }

    #[test]
    fn play_next_on_empty_queue_without_repeat_stops() {
        let mut state = PlayerState::default();
        state.set_autoplay_enabled(false);
        state.set_current_track(Some(track("a")), false);

        assert_eq!(state.play_next(), vec![Effect::Stop]);
        assert!(state.current_track().is_none());
        assert!(!state.is_playing());

        state.set_autoplay_enabled(true);
        assert_eq!(state.play_next(), vec![Effect::Stop, Effect::Replenish]);
    }

    #[test]
    fn play_previous_restarts_after_threshold() {
        let mut state = state_with_queue(&["a", "b"]);
        state.set_current_track_index(1).unwrap();
        state.set_duration(200.0);
        state.set_progress(5.0);

        assert_eq!(state.play_previous(), Ok(vec![Effect::Seek(0.0)]));
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn play_previous_at_start_without_repeat_rewinds() {
        let mut state = state_with_queue(&["a", "b"]);
        state.set_current_track_index(0).unwrap();
        state.set_progress(1.0);

        assert_eq!(state.play_previous(), Ok(vec![Effect::Seek(0.0)]));
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn play_previous_at_start_with_repeat_wraps() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        state.set_current_track_index(0).unwrap();
        state.toggle_repeat();

        state.play_previous().unwrap();
        assert_eq!(state.current_index(), 2);
        assert_eq!(state.current_track().map(|t| t.id()), Some("c"));
    }

    #[test]
    fn play_previous_steps_back() {
        let mut state = state_with_queue(&["a", "b", "c"]);
        state.set_current_track_index(2).unwrap();
        state.play_previous().unwrap();
        assert_eq!(state.current_track().map(|t| t.id()), Some("b"));
    }

    #[test]
    fn progress_ticks_are_ignored_while_seeking() {
        let mut state = PlayerState::default();
        state.set_current_track(Some(track("a")), false);
        state.set_duration(100.0);

        assert_eq!(state.seek_to(40.0), vec![Effect::Seek(40.0)]);
        assert!(!state.set_progress(12.0));
        assert_eq!(state.progress(), 40.0);

        state.finish_seek(40.0);
        assert!(state.set_progress(41.0));
        assert_eq!(state.progress(), 41.0);
    }

    #[test]
    fn seek_and_volume_are_clamped() {
        let mut state = PlayerState::default();
        state.set_duration(100.0);
        assert_eq!(state.seek_to(500.0), vec![Effect::Seek(100.0)]);
        assert_eq!(state.seek_to(-3.0), vec![Effect::Seek(0.0)]);
        assert_eq!(state.set_volume(1.5), vec![Effect::Volume(1.0)]);
        assert!(state.set_volume(f32::NAN).is_empty());
    }

    #[test]
    fn non_finite_seek_targets_land_on_zero() {
        let mut state = PlayerState::default();
        assert_eq!(state.transport().duration, 0.0);
        assert_eq!(state.seek_to(f64::INFINITY), vec![Effect::Seek(0.0)]);
        assert_eq!(state.seek_to(f64::NAN), vec![Effect::Seek(0.0)]);
        state.finish_seek(f64::NEG_INFINITY);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn stop_never_asks_for_a_refill() {
        let mut state = PlayerState::default();
        state.set_current_track(Some(track("a")), false);

        assert_eq!(state.stop(), vec![Effect::Stop]);
        assert!(state.current_track().is_none());
        assert!(!state.is_playing());
    }

    #[test]
    fn single_flight_allows_one_request() {
        let mut state = PlayerState::default();
        let request = state.begin_recommendations().expect("first request");
        assert_eq!(request.limit, MAX_QUEUE_SIZE);
        assert!(state.is_loading_recommendations());
        assert!(state.begin_recommendations().is_none());

        state.finish_recommendations(request.token, Ok(vec![]), false).unwrap();
        assert!(!state.is_loading_recommendations());
        assert!(state.begin_recommendations().is_some());
    }

    #[test]
    fn finished_recommendations_are_filtered_against_current_state() {
        let mut state = state_with_queue(&["q"]);
        state.set_current_track(Some(track("old")), false);
        let request = state.begin_recommendations().unwrap();

        // The user moves on while the load is in flight
        state.set_current_track(Some(track("now")), false);

        let results = ["q", "now", "old", "fresh1", "fresh2"].map(track).to_vec();
        let added = state.finish_recommendations(request.token, Ok(results), false).unwrap();

        assert_eq!(added, 2);
        assert_eq!(queue_ids(&state), vec!["q", "fresh1", "fresh2"]);
    }

    #[test]
    fn stale_results_can_be_discarded() {
        let mut state = PlayerState::default();
        state.set_current_track(Some(track("a")), false);
        let request = state.begin_recommendations().unwrap();
        state.set_current_track(Some(track("b")), false);

        let added = state
            .finish_recommendations(request.token, Ok(vec![track("x")]), true)
            .unwrap();
        assert_eq!(added, 0);
        assert!(state.queue().is_empty());
        assert!(!state.is_loading_recommendations());
    }

    #[test]
    fn failed_load_records_error_and_releases_slot() {
        let mut state = PlayerState::default();
        let request = state.begin_recommendations().unwrap();
        let err = RecommendError::Failed("offline".into());

        assert!(state.finish_recommendations(request.token, Err(err), false).is_err());
        assert_eq!(
            state.recommendations_error(),
            Some("Failed to load recommendations: offline")
        );
        assert!(!state.is_loading_recommendations());

        // The next attempt clears the error
        state.begin_recommendations().unwrap();
        assert!(state.recommendations_error().is_none());
    }

    #[test]
    fn recommendations_never_overflow_the_queue() {
        let ids: Vec<String> = (0..48).map(|i| format!("q{i}")).collect();
        let mut state = PlayerState::default();
        state.set_queue(ids.iter().map(|id| track(id)).collect());

        let request = state.begin_recommendations().unwrap();
        assert_eq!(request.limit, 2);
        let results: Vec<Track> = (0..10).map(|i| track(&format!("r{i}"))).collect();
        assert_eq!(state.finish_recommendations(request.token, Ok(results), false), Ok(2));
        assert_eq!(state.queue().len(), MAX_QUEUE_SIZE);
        assert!(state.begin_recommendations().is_none());
    }
}
