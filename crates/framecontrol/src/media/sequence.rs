//! A [`MediaHandle`] over pre-decoded frames.
//!
//! Position is continuous: while playing it advances with the clock scaled
//! by the playback rate, and the visible frame is whichever frame's display
//! window contains the position. Frames may arrive asynchronously from a
//! decoder thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use super::clock::Clock;
use super::handle::MediaHandle;
use super::types::{DecodedFrame, MediaEvent, ReadyState, VideoMeta};
use crate::error::{PlayerError, Result};

/// How long each frame is shown.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameTiming {
    /// Constant rate: frame `i` starts at `i / fps` seconds.
    Rate(f64),
    /// Per-frame display time in milliseconds (animated images, VFR).
    DelaysMs(Vec<u32>),
}

/// Progress messages from a background loader.
pub enum LoadMessage {
    Metadata(VideoMeta),
    Frames {
        frames: Vec<DecodedFrame>,
        timing: FrameTiming,
    },
    Failed(String),
}

struct Sequence {
    frames: Vec<DecodedFrame>,
    /// Start time of each frame in seconds.
    starts: Vec<f64>,
    duration: f64,
}

impl Sequence {
    fn new(frames: Vec<DecodedFrame>, timing: &FrameTiming) -> Result<Self> {
        if frames.is_empty() {
            return Err(PlayerError::Load("media has no frames".to_string()));
        }
        let (starts, duration) = match timing {
            FrameTiming::Rate(fps) => {
                if !fps.is_finite() || *fps <= 0.0 {
                    return Err(PlayerError::Load(format!("invalid frame rate {fps}")));
                }
                let starts = (0..frames.len()).map(|i| i as f64 / fps).collect();
                (starts, frames.len() as f64 / fps)
            }
            FrameTiming::DelaysMs(delays_ms) => {
                if frames.len() != delays_ms.len() {
                    return Err(PlayerError::Load(format!(
                        "{} frames but {} frame delays",
                        frames.len(),
                        delays_ms.len()
                    )));
                }
                // Integer accumulation keeps boundaries exact
                let mut starts = Vec::with_capacity(frames.len());
                let mut accum_ms: u64 = 0;
                for &d in delays_ms {
                    starts.push(accum_ms as f64 / 1000.0);
                    accum_ms += u64::from(d.max(1));
                }
                (starts, accum_ms as f64 / 1000.0)
            }
        };
        Ok(Self {
            frames,
            starts,
            duration,
        })
    }

    fn index_at(&self, secs: f64) -> usize {
        self.starts
            .partition_point(|&s| s <= secs)
            .saturating_sub(1)
            .min(self.frames.len() - 1)
    }
}

enum Content {
    Loading(Receiver<LoadMessage>),
    Ready(Sequence),
    Failed,
}

pub struct SequenceHandle {
    address: String,
    clock: Arc<dyn Clock>,
    content: Content,
    meta: Option<VideoMeta>,
    events: VecDeque<MediaEvent>,
    looping: bool,
    rate: f64,
    paused: bool,
    /// Position at `anchor_time`; while playing, position grows from here.
    anchor_pos: f64,
    anchor_time: Duration,
    /// Raised on drop so a background loader can stop early.
    cancel: Option<Arc<AtomicBool>>,
}

impl SequenceHandle {
    /// A handle whose frames are already decoded, each shown for its own delay.
    pub fn from_frames(
        address: impl Into<String>,
        frames: Vec<DecodedFrame>,
        delays_ms: Vec<u32>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_timed_frames(address, frames, &FrameTiming::DelaysMs(delays_ms), clock)
    }

    pub fn from_timed_frames(
        address: impl Into<String>,
        frames: Vec<DecodedFrame>,
        timing: &FrameTiming,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut handle = Self::empty(address.into(), clock, Content::Failed);
        handle.install(frames, timing);
        handle
    }

    /// A handle fed by a loader on another thread.
    pub fn loading(
        address: impl Into<String>,
        rx: Receiver<LoadMessage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::empty(address.into(), clock, Content::Loading(rx))
    }

    /// A handle that failed before loading started.
    pub fn failed(address: impl Into<String>, reason: String, clock: Arc<dyn Clock>) -> Self {
        let mut handle = Self::empty(address.into(), clock, Content::Failed);
        handle.events.push_back(MediaEvent::Error(reason));
        handle
    }

    /// Set `cancel` when this handle is dropped.
    pub fn with_cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        match &self.content {
            Content::Ready(seq) => seq.frames.len(),
            _ => 0,
        }
    }

    /// Index of the frame visible at the current position.
    pub fn current_index(&self) -> Option<usize> {
        match &self.content {
            Content::Ready(seq) => Some(seq.index_at(self.current_time())),
            _ => None,
        }
    }

    fn empty(address: String, clock: Arc<dyn Clock>, content: Content) -> Self {
        let anchor_time = clock.now();
        Self {
            address,
            clock,
            content,
            meta: None,
            events: VecDeque::new(),
            looping: true,
            rate: 1.0,
            paused: true,
            anchor_pos: 0.0,
            anchor_time,
            cancel: None,
        }
    }

    fn install(&mut self, frames: Vec<DecodedFrame>, timing: &FrameTiming) {
        match Sequence::new(frames, timing) {
            Ok(seq) => {
                if self.meta.is_none() {
                    let first = &seq.frames[0];
                    self.events.push_back(MediaEvent::MetadataLoaded {
                        width: first.width,
                        height: first.height,
                    });
                }
                self.events.push_back(MediaEvent::CanPlay);
                // Time spent loading does not count as playback
                self.anchor_time = self.clock.now();
                self.anchor_pos = self.anchor_pos.clamp(0.0, seq.duration);
                self.content = Content::Ready(seq);
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn fail(&mut self, reason: String) {
        log::error!("Media '{}' failed: {reason}", self.address);
        self.content = Content::Failed;
        self.paused = true;
        self.events.push_back(MediaEvent::Error(reason));
    }

    fn duration_secs(&self) -> Option<f64> {
        match &self.content {
            Content::Ready(seq) => Some(seq.duration),
            Content::Loading(_) => self.meta.as_ref().map(|m| m.duration_secs),
            Content::Failed => None,
        }
    }

    /// Unwrapped position (may exceed duration while playing).
    fn raw_position(&self) -> f64 {
        if self.paused || !matches!(self.content, Content::Ready(_)) {
            return self.anchor_pos;
        }
        let elapsed = self.clock.now().saturating_sub(self.anchor_time).as_secs_f64();
        self.anchor_pos + elapsed * self.rate
    }

    /// Fold elapsed playback into the anchor so rate/state changes start from here.
    fn reanchor(&mut self) {
        self.anchor_pos = self.current_time();
        self.anchor_time = self.clock.now();
    }

    fn check_ended(&mut self) {
        if self.looping || self.paused {
            return;
        }
        let Some(duration) = self.duration_secs() else {
            return;
        };
        if self.raw_position() >= duration {
            self.anchor_pos = duration;
            self.anchor_time = self.clock.now();
            self.paused = true;
            self.events.push_back(MediaEvent::Ended);
        }
    }

    fn drain_loader(&mut self) {
        loop {
            let Content::Loading(rx) = &self.content else {
                return;
            };
            match rx.try_recv() {
                Ok(LoadMessage::Metadata(meta)) => {
                    self.events.push_back(MediaEvent::MetadataLoaded {
                        width: meta.width,
                        height: meta.height,
                    });
                    self.meta = Some(meta);
                }
                Ok(LoadMessage::Frames { frames, timing }) => {
                    self.install(frames, &timing);
                }
                Ok(LoadMessage::Failed(reason)) => self.fail(reason),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.fail("decoder exited without producing frames".to_string());
                }
            }
        }
    }
}

impl Drop for SequenceHandle {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.store(true, Ordering::Release);
        }
    }
}

impl MediaHandle for SequenceHandle {
    fn address(&self) -> &str {
        &self.address
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        self.drain_loader();
        self.check_ended();
        self.events.drain(..).collect()
    }

    fn ready_state(&self) -> ReadyState {
        match &self.content {
            Content::Ready(_) => ReadyState::HaveEnoughData,
            Content::Loading(_) if self.meta.is_some() => ReadyState::HaveMetadata,
            Content::Loading(_) | Content::Failed => ReadyState::HaveNothing,
        }
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        match &self.content {
            Content::Ready(seq) => Some((seq.frames[0].width, seq.frames[0].height)),
            Content::Loading(_) => self.meta.as_ref().map(|m| (m.width, m.height)),
            Content::Failed => None,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration_secs()
    }

    fn current_time(&self) -> f64 {
        let raw = self.raw_position();
        match self.duration_secs() {
            Some(d) if d > 0.0 && self.looping => raw.rem_euclid(d),
            Some(d) => raw.clamp(0.0, d),
            None => raw.max(0.0),
        }
    }

    fn set_current_time(&mut self, secs: f64) {
        if !secs.is_finite() {
            return;
        }
        let upper = match self.duration_secs() {
            // Looping position wraps at `duration`; stop just short so the end reads as the end
            Some(d) if self.looping && d > 0.0 => d.next_down(),
            Some(d) => d,
            None => f64::INFINITY,
        };
        self.anchor_pos = secs.clamp(0.0, upper);
        self.anchor_time = self.clock.now();
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate == self.rate {
            return;
        }
        self.reanchor();
        self.rate = rate;
    }

    fn play(&mut self) -> Result<()> {
        if matches!(self.content, Content::Failed) {
            return Err(PlayerError::Play("media is in an error state".to_string()));
        }
        if !self.paused {
            return Ok(());
        }
        // Restart finished non-looping media from the top
        if let Some(d) = self.duration_secs() {
            if !self.looping && self.anchor_pos >= d {
                self.anchor_pos = 0.0;
            }
        }
        self.anchor_time = self.clock.now();
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.reanchor();
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_frame(&self) -> Result<&DecodedFrame> {
        match &self.content {
            Content::Ready(seq) => Ok(&seq.frames[seq.index_at(self.current_time())]),
            _ => Err(PlayerError::Draw("no decoded frame available".to_string())),
        }
    }

    fn nominal_fps(&self) -> Option<f64> {
        if let Some(meta) = &self.meta {
            return Some(meta.fps);
        }
        match &self.content {
            Content::Ready(seq) if seq.duration > 0.0 => {
                Some(seq.frames.len() as f64 / seq.duration)
            }
            _ => None,
        }
    }
}
