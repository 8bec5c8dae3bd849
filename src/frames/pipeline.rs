//! Frame transmission: capture → downsample → compress → push, one frame
//! per timer tick.
//!
//! ```text
//! tick ──▶ push channel open?  ── no ──▶ SkippedClosed
//!            │ yes
//!            ▼
//!          previous frame acknowledged? ── no ──▶ SkippedInFlight
//!            │ yes (permit taken)
//!            ▼
//!          capture ──▶ encode ──▶ FrameSink::submit(frame + permit)
//! ```
//!
//! At most one frame is in flight.  The permit travels with the frame and
//! is dropped by the transport once the frame has been written, which is
//! what frees the next tick to send.  A busy tick is skipped, never queued.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::encode::FrameEncoder;
use super::source::FrameSource;
use crate::config::FrameConfig;

// ---------------------------------------------------------------------------
// CameraStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraStatus {
    #[default]
    Idle,
    Starting,
    Streaming,
    Error,
}

impl CameraStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CameraStatus::Idle => "Idle",
            CameraStatus::Starting => "Starting",
            CameraStatus::Streaming => "Streaming",
            CameraStatus::Error => "Camera Error",
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSink
// ---------------------------------------------------------------------------

/// One encoded frame on its way out.  Dropping it releases the in-flight
/// slot.
#[derive(Debug)]
pub struct OutboundFrame {
    pub message: String,
    pub permit: OwnedSemaphorePermit,
}

/// Where frames go; implemented by the push channel handle.
pub trait FrameSink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Hand a frame to the transport without waiting.  Returns `false` if
    /// the transport is gone.
    fn submit(&self, frame: OutboundFrame) -> bool;
}

// ---------------------------------------------------------------------------
// FramePipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    SkippedClosed,
    SkippedInFlight,
    CaptureFailed,
    EncodeFailed,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct FramePipeline<S: FrameSource> {
    source: S,
    encoder: FrameEncoder,
    in_flight: Arc<Semaphore>,
    status: CameraStatus,
    stats: FrameStats,
}

impl<S: FrameSource> FramePipeline<S> {
    pub fn new(source: S, encoder: FrameEncoder) -> Self {
        Self {
            source,
            encoder,
            in_flight: Arc::new(Semaphore::new(1)),
            status: CameraStatus::Idle,
            stats: FrameStats::default(),
        }
    }

    pub fn from_config(source: S, config: &FrameConfig) -> Self {
        Self::new(source, FrameEncoder::from_config(config))
    }

    /// Open the camera.  Failure leaves the pipeline in `Camera Error`;
    /// every later tick reports `CaptureFailed` without touching the device.
    pub fn start(&mut self) -> CameraStatus {
        self.status = CameraStatus::Starting;
        match self.source.open() {
            Ok(()) => {
                log::info!("frames: {} streaming", self.source.name());
                self.status = CameraStatus::Streaming;
            }
            Err(e) => {
                log::warn!("frames: camera unavailable: {e}");
                self.status = CameraStatus::Error;
            }
        }
        self.status
    }

    pub fn tick(&mut self, sink: &dyn FrameSink) -> TickOutcome {
        let outcome = self.run_tick(sink);
        match outcome {
            TickOutcome::Sent => self.stats.sent += 1,
            TickOutcome::SkippedClosed | TickOutcome::SkippedInFlight => self.stats.skipped += 1,
            _ => self.stats.failed += 1,
        }
        log::trace!("frames: tick {outcome:?}");
        outcome
    }

    fn run_tick(&mut self, sink: &dyn FrameSink) -> TickOutcome {
        if self.status != CameraStatus::Streaming {
            return TickOutcome::CaptureFailed;
        }
        if !sink.is_open() {
            return TickOutcome::SkippedClosed;
        }
        let permit = match Arc::clone(&self.in_flight).try_acquire_owned() {
            Ok(p) => p,
            Err(_) => return TickOutcome::SkippedInFlight,
        };

        let image = match self.source.capture() {
            Ok(img) => img,
            Err(e) => {
                // The camera stays open; the next tick captures again.
                log::warn!("frames: capture failed: {e}");
                return TickOutcome::CaptureFailed;
            }
        };

        let encoded = match self.encoder.encode(&image) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("frames: dropping frame: {e}");
                return TickOutcome::EncodeFailed;
            }
        };

        let frame = OutboundFrame {
            message: encoded.to_message(),
            permit,
        };
        if sink.submit(frame) {
            TickOutcome::Sent
        } else {
            TickOutcome::Rejected
        }
    }

    pub fn status(&self) -> CameraStatus {
        self.status
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Release the camera.  Safe to call in any state.
    pub fn release(&mut self) {
        self.source.release();
        if self.status != CameraStatus::Idle {
            log::info!("frames: camera released");
        }
        self.status = CameraStatus::Idle;
    }
}

impl<S: FrameSource> Drop for FramePipeline<S> {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
