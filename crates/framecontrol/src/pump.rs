//! Render pump: the per-tick step that samples the media handle onto the
//! draw surface and reports the playback position.
//!
//! A tick never blocks and never stops the loop. Anything not ready yet is
//! skipped and simply looked at again on the next tick.

use serde::{Deserialize, Serialize};

use crate::media::{MediaHandle, ReadyState};
use crate::surface::DrawSurface;

/// Log the first draw failure, then one in this many while it persists.
const DRAW_FAILURE_LOG_EVERY: u32 = 120;

/// Imperative seek capability, handed to whoever owns the scrubber.
pub trait Seek {
    /// Move playback to `secs`. Takes effect on the next tick.
    fn seek(&mut self, secs: f64);
}

/// How seek targets are bounded before reaching the media handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekPolicy {
    /// Clamp into `[0, duration]` (or `>= 0` while duration is unknown).
    #[default]
    Clamp,
    /// Hand the value to the media handle untouched.
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub current_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSurface,
    NoHandle,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawResult {
    Drawn,
    Skipped(SkipReason),
    /// The copy failed; retried next tick.
    Failed,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub draw: DrawResult,
    /// Set when the media reported a finite, positive duration.
    pub position: Option<PlaybackPosition>,
}

impl TickOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            draw: DrawResult::Skipped(reason),
            position: None,
        }
    }
}

pub struct RenderPump {
    min_ready: ReadyState,
    seek_policy: SeekPolicy,
    ticks: u64,
    failure_streak: u32,
}

impl RenderPump {
    pub fn new(min_ready: ReadyState, seek_policy: SeekPolicy) -> Self {
        Self {
            min_ready,
            seek_policy,
            ticks: 0,
            failure_streak: 0,
        }
    }

    /// One scheduler tick: draw the current frame and read the position.
    pub fn tick(&mut self, handle: Option<&dyn MediaHandle>, surface: &mut DrawSurface) -> TickOutcome {
        self.ticks += 1;

        let Some(handle) = handle else {
            return TickOutcome::skipped(SkipReason::NoHandle);
        };
        if !surface.is_established() {
            return TickOutcome::skipped(SkipReason::NoSurface);
        }
        if handle.ready_state() < self.min_ready {
            return TickOutcome::skipped(SkipReason::NotReady);
        }

        let draw = match handle.current_frame().and_then(|frame| surface.draw_frame(frame)) {
            Ok(()) => {
                if self.failure_streak > 0 {
                    log::info!("Drawing recovered after {} failed ticks", self.failure_streak);
                    self.failure_streak = 0;
                }
                DrawResult::Drawn
            }
            Err(e) => {
                if self.failure_streak % DRAW_FAILURE_LOG_EVERY == 0 {
                    log::warn!(
                        "Draw failed on tick {} ({} in a row): {e}",
                        self.ticks,
                        self.failure_streak + 1
                    );
                }
                self.failure_streak = self.failure_streak.saturating_add(1);
                DrawResult::Failed
            }
        };

        let position = handle
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|duration| PlaybackPosition {
                current_time: handle.current_time(),
                duration,
            });

        TickOutcome { draw, position }
    }

    /// Forward a seek to the handle under the configured policy.
    /// Returns the position actually requested, or `None` if ignored.
    pub fn seek(&self, handle: &mut dyn MediaHandle, secs: f64) -> Option<f64> {
        let target = match self.seek_policy {
            SeekPolicy::Forward => secs,
            SeekPolicy::Clamp => {
                if !secs.is_finite() {
                    log::warn!("Ignoring seek to non-finite position {secs}");
                    return None;
                }
                match handle.duration().filter(|d| d.is_finite()) {
                    Some(duration) => secs.clamp(0.0, duration.max(0.0)),
                    None => secs.max(0.0),
                }
            }
        };
        log::debug!("Seek to {target:.3}s");
        handle.set_current_time(target);
        Some(target)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn set_min_ready(&mut self, min_ready: ReadyState) {
        self.min_ready = min_ready;
    }
}
