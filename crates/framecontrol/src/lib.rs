//! Play video at an arbitrary apparent frame rate without dropping frames.
//!
//! The footage is slowed down or sped up by `target_fps / source_fps` and
//! sampled onto a draw surface once per display refresh.

pub mod config;
pub mod driver;
pub mod error;
pub mod media;
pub mod player;
pub mod pump;
pub mod rate;
pub mod scheduler;
pub mod surface;

#[cfg(test)]
mod testing;

pub use config::PlayerConfig;
pub use driver::{HandleState, PlaybackParameters};
pub use error::{PlayerError, Result};
pub use media::MediaSource;
pub use player::{Player, PlayerEvent, PlayerSeeker, SharedPlayer, spawn_render_loop};
pub use pump::{Seek, SeekPolicy};
pub use rate::{Fps, FpsPreset, compute_speed};
