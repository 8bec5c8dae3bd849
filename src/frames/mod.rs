//! Video frame transmission feeding the push channel.
//!
//! * [`FrameSource`] / [`ImageSequenceSource`] — where frames come from.
//! * [`FrameEncoder`] — downsample to the target width, JPEG, base64 data URI.
//! * [`FramePipeline`] — one capture per tick, at most one frame in flight.

pub mod encode;
pub mod pipeline;
pub mod source;

pub use encode::{EncodeError, EncodedFrame, FrameEncoder, DATA_URI_PREFIX};
pub use pipeline::{
    CameraStatus, FramePipeline, FrameSink, FrameStats, OutboundFrame, TickOutcome,
};
pub use source::{CaptureError, FrameSource, ImageSequenceSource};
