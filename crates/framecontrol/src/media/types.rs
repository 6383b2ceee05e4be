use serde::{Deserialize, Serialize};

/// A decoded frame in RGBA8, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    /// A frame filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            data,
            width,
            height,
        }
    }
}

/// How much of the media the pipeline has available, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing,
    /// Dimensions and duration are known; no frame yet.
    HaveMetadata,
    /// The frame at the current position can be rendered.
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Stream metadata known once the media has been inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate as reported by the container. A hint only.
    pub fps: f64,
    pub duration_secs: f64,
}

/// Asynchronous notifications a media handle reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Native size is known (fires once per bound address).
    MetadataLoaded { width: u32, height: u32 },
    /// Enough data to render arrived.
    CanPlay,
    /// The address could not be resolved or decoded.
    Error(String),
    /// Playback reached the end of non-looping media.
    Ended,
}
