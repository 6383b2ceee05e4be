pub mod clock;
pub mod ffmpeg;
pub mod handle;
pub mod sequence;
pub mod source;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ffmpeg::FfmpegBackend;
pub use handle::{MediaBackend, MediaHandle};
pub use sequence::{LoadMessage, SequenceHandle};
pub use source::{AddressAllocator, MediaSource, ResolvedAddress, TempFileAllocator};
pub use types::{DecodedFrame, MediaEvent, ReadyState, VideoMeta};
