// Queue and playback.
//
// state.rs holds the pure transitions, engine.rs runs them against a media
// driver and the recommender. audio.rs is the real (rodio) driver.

pub mod audio;
pub mod driver;
pub mod engine;
pub mod history;
pub mod queue;
pub mod state;

pub use engine::{EngineConfig, PlayerEngine};
pub use queue::Track;
pub use state::PlayerState;
