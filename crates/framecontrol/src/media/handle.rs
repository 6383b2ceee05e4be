use super::types::{DecodedFrame, MediaEvent, ReadyState};
use crate::error::Result;

/// A live, playable media object bound to one address.
///
/// Mirrors what a platform media element offers: it owns its playback
/// position, readiness and rate, and advances on its own while playing.
/// Load failures are reported through [`MediaHandle::poll_events`], never
/// by panicking.
pub trait MediaHandle: Send {
    fn address(&self) -> &str;

    /// Drain pending notifications and pick up asynchronous progress.
    fn poll_events(&mut self) -> Vec<MediaEvent>;

    fn ready_state(&self) -> ReadyState;

    /// Native frame size, once metadata is available.
    fn native_size(&self) -> Option<(u32, u32)>;

    /// Total length in seconds. `None` while unknown.
    fn duration(&self) -> Option<f64>;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    /// Jump to `secs`. Implementations clamp to their own valid range.
    fn set_current_time(&mut self, secs: f64);

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    /// Request playback. May be refused (e.g. by an autoplay policy).
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// The frame visible at the current position.
    fn current_frame(&self) -> Result<&DecodedFrame>;

    /// Nominal frame rate reported by the container, if any.
    fn nominal_fps(&self) -> Option<f64> {
        None
    }
}

/// Opens media handles for resolved addresses.
pub trait MediaBackend: Send + Sync {
    /// Begin loading `address`. Never fails synchronously: problems surface
    /// as [`MediaEvent::Error`] from the returned handle.
    fn open(&self, address: &str) -> Box<dyn MediaHandle>;
}
