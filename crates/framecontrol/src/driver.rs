//! Playback driver: keeps the media handle's rate and play/pause state in
//! line with the requested parameters and the active source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::source::{self, AddressAllocator, MediaSource, ResolvedAddress};
use crate::media::{MediaBackend, MediaEvent, MediaHandle};
use crate::rate::{self, DEFAULT_FPS, Fps};

/// What the host wants: apparent rate, the footage's own rate, and play/pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub target_fps: Fps,
    pub source_fps: Fps,
    pub is_playing: bool,
}

impl PlaybackParameters {
    pub fn speed(&self) -> f64 {
        rate::compute_speed(self.target_fps, self.source_fps)
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_FPS,
            source_fps: DEFAULT_FPS,
            is_playing: false,
        }
    }
}

/// Lifecycle of the bound media handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleState {
    /// No source.
    Unbound,
    /// Address bound; media still loading.
    Loading,
    /// Playable, play/pause not yet settled.
    Ready,
    Playing,
    Paused,
    /// The address could not be loaded.
    Error,
}

pub struct PlaybackDriver {
    backend: Arc<dyn MediaBackend>,
    allocator: Arc<dyn AddressAllocator>,
    // Declared before `address`: the handle must close before its address is released
    handle: Option<Box<dyn MediaHandle>>,
    address: Option<ResolvedAddress>,
    source: Option<MediaSource>,
    state: HandleState,
    params: Option<PlaybackParameters>,
}

impl PlaybackDriver {
    pub fn new(backend: Arc<dyn MediaBackend>, allocator: Arc<dyn AddressAllocator>) -> Self {
        Self {
            backend,
            allocator,
            handle: None,
            address: None,
            source: None,
            state: HandleState::Unbound,
            params: None,
        }
    }

    /// Swap in a new source. The previous handle is torn down and any local
    /// address it used is released, whether or not the new source resolves.
    pub fn bind_source(&mut self, source: MediaSource) -> Result<()> {
        self.unbind();

        let resolved = match source::resolve(&source, &self.allocator) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.state = HandleState::Error;
                return Err(e);
            }
        };

        log::info!("Binding source '{}' at {}", source.name(), resolved.as_str());
        self.handle = Some(self.backend.open(resolved.as_str()));
        self.address = Some(resolved);
        self.source = Some(source);
        self.state = HandleState::Loading;

        // Parameters set before the handle existed take effect now
        if let Some(params) = self.params {
            self.apply_parameters(params);
        }
        Ok(())
    }

    /// Tear down the handle and release its address. No-op when unbound.
    pub fn unbind(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::info!("Unbinding {}", handle.address());
        }
        self.address = None;
        self.source = None;
        self.state = HandleState::Unbound;
    }

    /// Apply rate and play/pause to the bound handle. Remembered for the next
    /// bind when no handle is bound. Idempotent.
    pub fn apply_parameters(&mut self, params: PlaybackParameters) {
        self.params = Some(params);
        let Some(handle) = self.handle.as_mut() else {
            log::debug!("No media bound; parameters deferred");
            return;
        };

        let speed = params.speed();
        handle.set_playback_rate(speed);
        log::debug!(
            "Applied {} over {} source: speed {speed:.4}, playing={}",
            params.target_fps,
            params.source_fps,
            params.is_playing
        );

        if params.is_playing {
            if handle.is_paused() {
                if let Err(e) = handle.play() {
                    // Stays paused until a later play succeeds
                    log::warn!("Play request for {} failed: {e}", handle.address());
                }
            }
        } else {
            handle.pause();
        }
        self.refresh_state();
    }

    /// Drain handle notifications and advance the lifecycle. Returns the
    /// events so the owner can react (surface sizing, user notification).
    pub fn poll(&mut self) -> Vec<MediaEvent> {
        let Some(handle) = self.handle.as_mut() else {
            return Vec::new();
        };
        let events = handle.poll_events();
        for event in &events {
            match event {
                MediaEvent::CanPlay if self.state == HandleState::Loading => {
                    self.state = HandleState::Ready;
                }
                MediaEvent::Error(reason) => {
                    log::error!("Failed to load media: {reason}");
                    self.state = HandleState::Error;
                }
                _ => {}
            }
        }
        self.refresh_state();
        events
    }

    fn refresh_state(&mut self) {
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        if matches!(
            self.state,
            HandleState::Ready | HandleState::Playing | HandleState::Paused
        ) {
            self.state = if handle.is_paused() {
                HandleState::Paused
            } else {
                HandleState::Playing
            };
        }
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn params(&self) -> Option<PlaybackParameters> {
        self.params
    }

    pub fn handle(&self) -> Option<&dyn MediaHandle> {
        self.handle.as_deref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut (dyn MediaHandle + 'static)> {
        self.handle.as_deref_mut()
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::testing::CountingAllocator;
    use crate::testing::{FakeBackend, FakeState};

    fn params(target: u32, source: u32, is_playing: bool) -> PlaybackParameters {
        PlaybackParameters {
            target_fps: Fps::from_raw(target),
            source_fps: Fps::from_raw(source),
            is_playing,
        }
    }

    fn driver_with(backend: Arc<FakeBackend>) -> (PlaybackDriver, Arc<CountingAllocator>) {
        let counter = Arc::new(CountingAllocator::default());
        let driver = PlaybackDriver::new(backend, counter.clone());
        (driver, counter)
    }

    #[test]
    fn parameters_without_handle_are_deferred() {
        let backend = Arc::new(FakeBackend::default());
        let (mut driver, _) = driver_with(backend.clone());

        driver.apply_parameters(params(12, 24, true));
        assert_eq!(driver.state(), HandleState::Unbound);
        assert!(backend.handles.lock().unwrap().is_empty());

        driver.bind_source(MediaSource::locator("a.mp4")).unwrap();
        let state = backend.last();
        let state = state.lock().unwrap();
        assert!((state.rate - 0.5).abs() < 1e-12);
        assert!(!state.paused);
    }

    #[test]
    fn lifecycle_loading_ready_playing_paused() {
        let backend = Arc::new(FakeBackend::default());
        let (mut driver, _) = driver_with(backend.clone());

        driver.bind_source(MediaSource::locator("a.mp4")).unwrap();
        assert_eq!(driver.state(), HandleState::Loading);

        driver.poll();
        assert_eq!(driver.state(), HandleState::Paused);

        driver.apply_parameters(params(24, 24, true));
        assert_eq!(driver.state(), HandleState::Playing);

        driver.apply_parameters(params(24, 24, false));
        assert_eq!(driver.state(), HandleState::Paused);

        driver.unbind();
        assert_eq!(driver.state(), HandleState::Unbound);
        assert!(driver.handle().is_none());
    }

    #[test]
    fn apply_twice_equals_apply_once() {
        let backend = Arc::new(FakeBackend::default());
        let (mut driver, _) = driver_with(backend.clone());
        driver.bind_source(MediaSource::locator("a.mp4")).unwrap();
        driver.poll();

        driver.apply_parameters(params(60, 30, true));
        let once = backend.last().lock().unwrap().clone();
        driver.apply_parameters(params(60, 30, true));
        let twice = backend.last().lock().unwrap().clone();

        assert_eq!(once.rate, twice.rate);
        assert_eq!(once.paused, twice.paused);
        assert_eq!(driver.state(), HandleState::Playing);
        // Already playing: no second play request
        assert_eq!(twice.play_calls, 1);
    }

    #[test]
    fn rejected_play_is_absorbed() {
        let backend = Arc::new(FakeBackend::with_template(FakeState {
            reject_play: true,
            ..FakeState::default()
        }));
        let (mut driver, _) = driver_with(backend.clone());
        driver.bind_source(MediaSource::locator("a.mp4")).unwrap();
        driver.poll();

        driver.apply_parameters(params(24, 24, true));
        assert_eq!(driver.state(), HandleState::Paused);
        assert!(backend.last().lock().unwrap().paused);

        // A later play succeeds once the platform allows it
        backend.last().lock().unwrap().reject_play = false;
        driver.apply_parameters(params(24, 24, true));
        assert_eq!(driver.state(), HandleState::Playing);
    }

    #[test]
    fn load_error_moves_to_error_state() {
        let backend = Arc::new(FakeBackend::with_template(FakeState {
            events: vec![MediaEvent::Error("decode failed".into())],
            ready: crate::media::ReadyState::HaveNothing,
            ..FakeState::default()
        }));
        let (mut driver, _) = driver_with(backend);
        driver.bind_source(MediaSource::locator("broken.mp4")).unwrap();
        let events = driver.poll();
        assert_eq!(events, vec![MediaEvent::Error("decode failed".into())]);
        assert_eq!(driver.state(), HandleState::Error);

        // Switching source leaves the error behind
        driver.bind_source(MediaSource::locator("ok.mp4")).unwrap();
        assert_eq!(driver.state(), HandleState::Loading);
    }

    #[test]
    fn blob_addresses_balance_across_switches() {
        let backend = Arc::new(FakeBackend::default());
        let (mut driver, counter) = driver_with(backend);

        for i in 0..5 {
            let source = MediaSource::blob(format!("clip{i}.mp4"), vec![0u8; 8]);
            driver.bind_source(source).unwrap();
            assert_eq!(counter.allocations() - counter.releases(), 1);
        }
        driver.bind_source(MediaSource::locator("remote.mp4")).unwrap();
        assert_eq!(counter.allocations(), 5);
        assert_eq!(counter.releases(), 5);

        driver.bind_source(MediaSource::blob("last.mp4", vec![1u8])).unwrap();
        drop(driver);
        assert_eq!(counter.allocations(), 6);
        assert_eq!(counter.releases(), 6);
    }

    #[test]
    fn failed_resolve_still_releases_previous() {
        let backend = Arc::new(FakeBackend::default());
        let (mut driver, counter) = driver_with(backend);
        driver.bind_source(MediaSource::blob("a.mp4", vec![1u8])).unwrap();

        assert!(driver.bind_source(MediaSource::locator("")).is_err());
        assert_eq!(driver.state(), HandleState::Error);
        assert_eq!(counter.releases(), 1);
        assert!(driver.handle().is_none());
    }
}
