//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use crate::error::{PlayerError, Result};
use crate::media::{
    DecodedFrame, ManualClock, MediaBackend, MediaEvent, MediaHandle, ReadyState, SequenceHandle,
};

/// Serves the same pre-decoded clip for every address, timed by a manual clock.
pub struct FramesBackend {
    pub clock: ManualClock,
    frames: Vec<DecodedFrame>,
    delays_ms: Vec<u32>,
    looping: bool,
    pub opened: Mutex<Vec<String>>,
}

impl FramesBackend {
    /// `n` frames of `size`, frame `i` filled with gray level `i`.
    pub fn numbered(n: usize, delay_ms: u32, size: (u32, u32)) -> Self {
        let frames = (0..n)
            .map(|i| DecodedFrame::solid(size.0, size.1, [i as u8, i as u8, i as u8, 255]))
            .collect();
        Self {
            clock: ManualClock::new(),
            frames,
            delays_ms: vec![delay_ms; n],
            looping: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl MediaBackend for FramesBackend {
    fn open(&self, address: &str) -> Box<dyn MediaHandle> {
        self.opened.lock().unwrap().push(address.to_string());
        Box::new(
            SequenceHandle::from_frames(
                address,
                self.frames.clone(),
                self.delays_ms.clone(),
                Arc::new(self.clock.clone()),
            )
            .with_looping(self.looping),
        )
    }
}

/// Knobs and counters of a [`FakeHandle`], shared with the test body.
#[derive(Debug, Clone)]
pub struct FakeState {
    pub ready: ReadyState,
    pub size: Option<(u32, u32)>,
    pub duration: Option<f64>,
    pub time: f64,
    pub rate: f64,
    pub paused: bool,
    pub reject_play: bool,
    pub fail_draw: bool,
    pub events: Vec<MediaEvent>,
    pub play_calls: usize,
    pub seeks: Vec<f64>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            ready: ReadyState::HaveEnoughData,
            size: Some((4, 2)),
            duration: Some(10.0),
            time: 0.0,
            rate: 1.0,
            paused: true,
            reject_play: false,
            fail_draw: false,
            events: vec![
                MediaEvent::MetadataLoaded {
                    width: 4,
                    height: 2,
                },
                MediaEvent::CanPlay,
            ],
            play_calls: 0,
            seeks: Vec::new(),
        }
    }
}

/// A scripted handle: behavior is whatever the shared [`FakeState`] says.
pub struct FakeHandle {
    address: String,
    frame: DecodedFrame,
    pub state: Arc<Mutex<FakeState>>,
}

impl MediaHandle for FakeHandle {
    fn address(&self) -> &str {
        &self.address
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.state.lock().unwrap().events)
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().unwrap().ready
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.state.lock().unwrap().size
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().time
    }

    fn set_current_time(&mut self, secs: f64) {
        let mut state = self.state.lock().unwrap();
        state.seeks.push(secs);
        state.time = secs;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.lock().unwrap().rate = rate;
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if state.reject_play {
            return Err(PlayerError::Play("autoplay not allowed".to_string()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn current_frame(&self) -> Result<&DecodedFrame> {
        if self.state.lock().unwrap().fail_draw {
            return Err(PlayerError::Draw("cross-origin frame".to_string()));
        }
        Ok(&self.frame)
    }
}

/// Hands out [`FakeHandle`]s built from a template state.
#[derive(Default)]
pub struct FakeBackend {
    pub template: FakeState,
    pub handles: Mutex<Vec<Arc<Mutex<FakeState>>>>,
}

impl FakeBackend {
    pub fn with_template(template: FakeState) -> Self {
        Self {
            template,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Shared state of the most recently opened handle.
    pub fn last(&self) -> Arc<Mutex<FakeState>> {
        self.handles.lock().unwrap().last().cloned().expect("no handle opened")
    }
}

impl MediaBackend for FakeBackend {
    fn open(&self, address: &str) -> Box<dyn MediaHandle> {
        let state = Arc::new(Mutex::new(self.template.clone()));
        self.handles.lock().unwrap().push(state.clone());
        let (w, h) = self.template.size.unwrap_or((1, 1));
        Box::new(FakeHandle {
            address: address.to_string(),
            frame: DecodedFrame::solid(w, h, [50, 60, 70, 255]),
            state,
        })
    }
}
