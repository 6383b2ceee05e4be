use thiserror::Error;

/// Errors surfaced by the playback engine.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// A frame rate of zero was supplied. This is a caller bug, not a runtime condition.
    #[error("invalid frame rate {0}: must be a positive integer")]
    InvalidFrameRate(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load media: {0}")]
    Load(String),
    #[error("play request rejected: {0}")]
    Play(String),
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
