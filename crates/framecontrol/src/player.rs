//! The player: ties source binding, rate control, the render pump and the
//! draw surface together behind a host-facing API.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::config::PlayerConfig;
use crate::driver::{HandleState, PlaybackDriver, PlaybackParameters};
use crate::error::Result;
use crate::media::{
    AddressAllocator, FfmpegBackend, MediaBackend, MediaEvent, MediaSource, TempFileAllocator,
};
use crate::pump::{PlaybackPosition, RenderPump, Seek, TickOutcome};
use crate::rate::{self, Fps, FpsPreset};
use crate::scheduler::{IntervalScheduler, RenderLoop};
use crate::surface::DrawSurface;

/// User-facing message category for load failures.
pub const LOAD_FAILED_MESSAGE: &str = "failed to load media";

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Position after a tick. At most one per tick.
    TimeUpdate { current_time: f64, duration: f64 },
    /// The source could not be loaded. Show [`LOAD_FAILED_MESSAGE`] to the user.
    LoadFailed { source: String, reason: String },
    /// The draw surface was sized for a new source.
    SurfaceResized { width: u32, height: u32 },
    StateChanged(HandleState),
}

pub struct Player {
    config: PlayerConfig,
    driver: PlaybackDriver,
    pump: RenderPump,
    surface: DrawSurface,
    params: PlaybackParameters,
    last_state: HandleState,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
}

impl Player {
    pub fn new(
        config: PlayerConfig,
        backend: Arc<dyn MediaBackend>,
        allocator: Arc<dyn AddressAllocator>,
    ) -> Self {
        // Notifications are never dropped; emit() caps the backlog of position updates
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let params = PlaybackParameters {
            target_fps: config.target_fps,
            source_fps: config.source_fps,
            is_playing: false,
        };
        Self {
            pump: RenderPump::new(config.min_ready_state, config.seek_policy),
            driver: PlaybackDriver::new(backend, allocator),
            surface: DrawSurface::new(),
            params,
            last_state: HandleState::Unbound,
            events_tx,
            events_rx,
            config,
        }
    }

    /// A player decoding through ffmpeg, with blobs staged in temporary files.
    pub fn with_ffmpeg(config: PlayerConfig) -> Result<Self> {
        let backend = Arc::new(FfmpegBackend::new().with_looping(config.looping));
        let allocator = Arc::new(TempFileAllocator::new()?);
        Ok(Self::new(config, backend, allocator))
    }

    /// Receiver for host notifications. Clones share one queue.
    ///
    /// Position updates are dropped while `event_capacity` events are
    /// pending; load failures, state changes and resizes never are.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    /// Bind a new source, replacing (and releasing) the current one.
    pub fn load(&mut self, source: MediaSource) {
        self.driver.unbind();
        self.surface.reset();
        // Stored while unbound, applied by the driver once the new handle exists
        self.params.is_playing = self.config.autoplay_on_load;
        self.driver.apply_parameters(self.params);

        let name = source.name().to_string();
        if let Err(e) = self.driver.bind_source(source) {
            self.emit(PlayerEvent::LoadFailed {
                source: name,
                reason: e.to_string(),
            });
        }
        self.sync_state();
    }

    /// Drop the current source, if any.
    pub fn unload(&mut self) {
        self.driver.unbind();
        self.surface.reset();
        self.params.is_playing = false;
        self.sync_state();
    }

    /// Clear the source and restore the configured rates.
    pub fn reset(&mut self) {
        self.unload();
        self.params = PlaybackParameters {
            target_fps: self.config.target_fps,
            source_fps: self.config.source_fps,
            is_playing: false,
        };
        self.driver.apply_parameters(self.params);
    }

    /// Set the apparent rate. Saturates into the valid target range.
    pub fn set_target_fps(&mut self, fps: u32) -> Fps {
        self.params.target_fps = rate::clamp_target_fps(fps, self.params.source_fps);
        self.driver.apply_parameters(self.params);
        self.params.target_fps
    }

    pub fn apply_preset(&mut self, preset: FpsPreset) -> Fps {
        self.set_target_fps(preset.target(self.params.source_fps).get())
    }

    pub fn reset_target_fps(&mut self) -> Fps {
        self.set_target_fps(self.config.target_fps.get())
    }

    /// Set the footage's native rate (known or user-calibrated).
    pub fn set_source_fps(&mut self, fps: Fps) {
        self.params.source_fps = fps;
        self.params.target_fps = rate::clamp_target_fps(self.params.target_fps.get(), fps);
        self.driver.apply_parameters(self.params);
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.params.is_playing = playing;
        self.driver.apply_parameters(self.params);
        self.sync_state();
    }

    pub fn toggle_playing(&mut self) -> bool {
        self.set_playing(!self.params.is_playing);
        self.params.is_playing
    }

    /// Sample the media once: the body of every render-loop iteration.
    pub fn tick(&mut self) -> TickOutcome {
        self.poll_media();
        let outcome = self.pump.tick(self.driver.handle(), &mut self.surface);
        if let Some(position) = outcome.position {
            self.emit(PlayerEvent::TimeUpdate {
                current_time: position.current_time,
                duration: position.duration,
            });
        }
        outcome
    }

    fn poll_media(&mut self) {
        for event in self.driver.poll() {
            match event {
                MediaEvent::MetadataLoaded { width, height } => self.size_surface(width, height),
                MediaEvent::Error(reason) => {
                    let source = self
                        .driver
                        .source()
                        .map(|s| s.name().to_string())
                        .unwrap_or_default();
                    self.emit(PlayerEvent::LoadFailed { source, reason });
                }
                MediaEvent::Ended => self.params.is_playing = false,
                MediaEvent::CanPlay => {}
            }
        }
        // Metadata may have been missed (e.g. the handle was ready before the first poll)
        if !self.surface.is_established() {
            if let Some((w, h)) = self.driver.handle().and_then(|h| h.native_size()) {
                self.size_surface(w, h);
            }
        }
        self.sync_state();
    }

    fn size_surface(&mut self, width: u32, height: u32) {
        // Sized once per source; later metadata for the same source is ignored
        if self.surface.is_established() {
            return;
        }
        self.surface.establish(width, height);
        self.emit(PlayerEvent::SurfaceResized { width, height });
    }

    fn sync_state(&mut self) {
        let state = self.driver.state();
        if state != self.last_state {
            log::debug!("Playback state {:?} -> {:?}", self.last_state, state);
            self.last_state = state;
            self.emit(PlayerEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: PlayerEvent) {
        if matches!(event, PlayerEvent::TimeUpdate { .. })
            && self.events_tx.len() >= self.config.event_capacity.max(1)
        {
            log::trace!("Event backlog full, dropping {event:?}");
            return;
        }
        // Only fails once every receiver is gone
        let _ = self.events_tx.send(event);
    }

    pub fn params(&self) -> PlaybackParameters {
        self.params
    }

    /// Current playback speed multiplier.
    pub fn speed(&self) -> f64 {
        self.params.speed()
    }

    pub fn state(&self) -> HandleState {
        self.driver.state()
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.driver.source()
    }

    pub fn position(&self) -> Option<PlaybackPosition> {
        let handle = self.driver.handle()?;
        let duration = handle.duration().filter(|d| d.is_finite() && *d > 0.0)?;
        Some(PlaybackPosition {
            current_time: handle.current_time(),
            duration,
        })
    }

    pub fn surface(&self) -> &DrawSurface {
        &self.surface
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// The container's nominal rate, rounded. A hint for calibration only;
    /// the player never applies it on its own.
    pub fn suggested_source_fps(&self) -> Option<Fps> {
        let fps = self.driver.handle()?.nominal_fps()?;
        if !fps.is_finite() || fps < 0.5 {
            return None;
        }
        Fps::new(fps.round() as u32).ok()
    }

    /// Wall-clock seconds it takes to show one second of footage.
    pub fn stretch_factor(&self) -> f64 {
        1.0 / self.speed()
    }
}

impl Seek for Player {
    fn seek(&mut self, secs: f64) {
        match self.driver.handle_mut() {
            Some(handle) => {
                self.pump.seek(handle, secs);
            }
            None => log::debug!("Seek ignored: no media bound"),
        }
    }
}

/// A player shared between the host and its render loop.
pub type SharedPlayer = Arc<Mutex<Player>>;

/// Run `player`'s render pump on its own thread at the configured refresh rate.
/// The loop ends when the returned [`RenderLoop`] is stopped or dropped.
pub fn spawn_render_loop(player: &SharedPlayer) -> Result<RenderLoop> {
    let refresh_hz = player
        .lock()
        .map(|p| p.config.refresh_hz)
        .unwrap_or(60);
    let shared = player.clone();
    RenderLoop::spawn(IntervalScheduler::new(refresh_hz), move || {
        if let Ok(mut player) = shared.lock() {
            player.tick();
        }
    })
}

/// Seek capability over a shared player, for scrubber owners.
#[derive(Clone)]
pub struct PlayerSeeker(SharedPlayer);

impl PlayerSeeker {
    pub fn new(player: &SharedPlayer) -> Self {
        Self(player.clone())
    }
}

impl Seek for PlayerSeeker {
    fn seek(&mut self, secs: f64) {
        if let Ok(mut player) = self.0.lock() {
            player.seek(secs);
        }
    }
}
