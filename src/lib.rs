// ytqueue: a terminal music player that streams from YouTube and keeps an
// autoplay queue topped up with recommendations.

pub mod config;
pub mod error;
pub mod player;
pub mod playlist;
pub mod recommend;
pub mod storage;
pub mod ui;
pub mod youtube;

pub use config::Config;
pub use player::{EngineConfig, PlayerEngine, Track};
