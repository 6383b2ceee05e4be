//! Media backend that shells out to `ffprobe` and `ffmpeg`.
//!
//! Each opened address gets a `framecontrol-decode` thread that inspects the
//! stream, then pipes raw RGBA frames out of ffmpeg into memory. Clips are
//! bounded by [`MAX_DECODE_SECS`] and [`MAX_DECODE_BYTES`]. Dropping the
//! handle raises its cancel token: the read loop stops at the next frame and
//! the ffmpeg child is killed.

use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::Sender;
use serde::Deserialize;

use super::clock::{Clock, SystemClock};
use super::handle::{MediaBackend, MediaHandle};
use super::sequence::{FrameTiming, LoadMessage, SequenceHandle};
use super::types::{DecodedFrame, VideoMeta};

/// Longest clip (seconds) decoded into memory.
pub const MAX_DECODE_SECS: f64 = 60.0;
/// Most RGBA frame memory a single clip may take.
pub const MAX_DECODE_BYTES: usize = 2 << 30;
/// Assumed rate when the container reports none.
const FALLBACK_FPS: f64 = 30.0;
const CANCELLED: &str = "decode cancelled";

/// Whether both `ffprobe` and `ffmpeg` run. Checked once per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| tool_runs("ffprobe") && tool_runs("ffmpeg"))
}

fn tool_runs(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

pub struct FfmpegBackend {
    clock: Arc<dyn Clock>,
    looping: bool,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            looping: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for FfmpegBackend {
    fn open(&self, address: &str) -> Box<dyn MediaHandle> {
        if !ffmpeg_available() {
            return Box::new(SequenceHandle::failed(
                address,
                "ffprobe/ffmpeg not found on PATH".to_string(),
                self.clock.clone(),
            ));
        }

        let (tx, rx) = crossbeam_channel::bounded(2);
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();
        let target = address.to_string();
        let spawned = thread::Builder::new()
            .name("framecontrol-decode".into())
            .spawn(move || load_address(&target, &tx, &thread_cancel));
        if let Err(e) = spawned {
            return Box::new(SequenceHandle::failed(
                address,
                format!("failed to spawn decoder thread: {e}"),
                self.clock.clone(),
            ));
        }

        Box::new(
            SequenceHandle::loading(address, rx, self.clock.clone())
                .with_looping(self.looping)
                .with_cancel_token(cancel),
        )
    }
}

fn load_address(address: &str, tx: &Sender<LoadMessage>, cancel: &AtomicBool) {
    let outcome = inspect_video(address).and_then(|meta| {
        let max_frames = frame_budget(&meta)?;
        if tx.send(LoadMessage::Metadata(meta.clone())).is_err() {
            return Err(CANCELLED.to_string());
        }
        log::info!(
            "Decoding '{address}': {}x{} at {:.3} fps, at most {max_frames} frames",
            meta.width,
            meta.height,
            meta.fps
        );
        let frames = decode(address, &meta, max_frames, cancel)?;
        log::info!("Decoded {} frames from '{address}'", frames.len());
        Ok(LoadMessage::Frames {
            frames,
            timing: FrameTiming::Rate(meta.fps),
        })
    });

    let message = match outcome {
        Ok(message) => message,
        Err(reason) if cancel.load(Ordering::Acquire) || reason == CANCELLED => {
            log::debug!("Stopped loading '{address}': handle dropped");
            return;
        }
        Err(reason) => LoadMessage::Failed(reason),
    };
    // Fails only if the handle went away meanwhile
    let _ = tx.send(message);
}

#[derive(Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<ReportStream>,
    #[serde(default)]
    format: ReportFormat,
}

#[derive(Deserialize, Default)]
struct ReportFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ReportStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Read size, nominal rate and duration of the first video stream.
pub fn inspect_video(address: &str) -> Result<VideoMeta, String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(address)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("could not run ffprobe: {e}"))?;
    if !output.status.success() {
        return Err(format!("ffprobe rejected '{address}'"));
    }
    parse_stream_report(&output.stdout)
}

fn parse_stream_report(stdout: &[u8]) -> Result<VideoMeta, String> {
    let report: StreamReport =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or("no video stream")?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        other => return Err(format!("video stream has no usable frame size: {other:?}")),
    };

    let fps = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_frame_rate(rate))
        .unwrap_or(FALLBACK_FPS);

    // 0.0 marks an unknown length (live or unseekable streams)
    let duration_secs = [&report.format.duration, &video.duration]
        .into_iter()
        .flatten()
        .filter_map(|d| d.parse::<f64>().ok())
        .find(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(VideoMeta {
        width,
        height,
        fps,
        duration_secs,
    })
}

/// Parse `"num/den"` or a plain number. `None` for zero, negative or garbage.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => num.trim().parse::<f64>().ok()? / den.trim().parse::<f64>().ok()?,
        None => rate.trim().parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// How many frames of `meta` we are willing to hold, or why the clip is refused.
fn frame_budget(meta: &VideoMeta) -> Result<usize, String> {
    if !meta.duration_secs.is_finite() || meta.duration_secs <= 0.0 {
        return Err("media has no known duration; live streams are not supported".to_string());
    }
    if meta.duration_secs > MAX_DECODE_SECS {
        return Err(format!(
            "clip is {:.0}s long; at most {MAX_DECODE_SECS:.0}s can be decoded",
            meta.duration_secs
        ));
    }
    let frame_bytes = meta.width as usize * meta.height as usize * 4;
    // Container durations round; leave room for a couple of extra frames
    let frames = (meta.duration_secs * meta.fps).ceil() as usize + 2;
    let bytes = frames.saturating_mul(frame_bytes);
    if bytes > MAX_DECODE_BYTES {
        return Err(format!(
            "clip needs ~{}MB of frame memory; limit is {}MB",
            bytes >> 20,
            MAX_DECODE_BYTES >> 20
        ));
    }
    Ok(frames)
}

/// Run ffmpeg over `address` and collect its RGBA output.
fn decode(
    address: &str,
    meta: &VideoMeta,
    max_frames: usize,
    cancel: &AtomicBool,
) -> Result<Vec<DecodedFrame>, String> {
    let size = format!("{}x{}", meta.width, meta.height);
    let mut child = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(address)
        .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "-s", &size, "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("could not run ffmpeg: {e}"))?;

    let result = match child.stdout.take() {
        Some(stdout) => read_frames(stdout, meta.width, meta.height, max_frames, cancel),
        None => Err("ffmpeg stdout was not captured".to_string()),
    };
    // Finished, over budget or cancelled: ffmpeg may still be running
    let _ = child.kill();
    let _ = child.wait();
    result
}

/// Split a raw RGBA stream into frames, stopping at end of stream, at
/// `max_frames`, or as soon as `cancel` is raised.
fn read_frames(
    mut reader: impl Read,
    width: u32,
    height: u32,
    max_frames: usize,
    cancel: &AtomicBool,
) -> Result<Vec<DecodedFrame>, String> {
    let frame_bytes = width as usize * height as usize * 4;
    let mut frames = Vec::with_capacity(max_frames.min(1024));
    while frames.len() < max_frames {
        if cancel.load(Ordering::Acquire) {
            return Err(CANCELLED.to_string());
        }
        let mut data = vec![0u8; frame_bytes];
        match reader.read_exact(&mut data) {
            Ok(()) => frames.push(DecodedFrame {
                data,
                width,
                height,
            }),
            // A trailing partial frame is dropped
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(format!("reading decoded frames failed: {e}")),
        }
    }
    if frames.is_empty() {
        return Err("ffmpeg produced no frames".to_string());
    }
    Ok(frames)
}
