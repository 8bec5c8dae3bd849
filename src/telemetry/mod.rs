//! Telemetry fusion: snapshot model, channel payloads, reconciler, history
//! and the HTTP poll client.
//!
//! # Data flow
//!
//! ```text
//! HttpBackend::fetch_combined ──(every ~500 ms)──▶ Reconciler::apply_poll
//! push channel text message   ──(as received)───▶ Reconciler::apply_push_message
//!                                                        │
//!                                      Reconciler::current() (clone)
//!                                                        │
//!                                    classifier / alarm / pose animator
//! ```

pub mod backend;
pub mod history;
pub mod payload;
pub mod reconciler;
pub mod snapshot;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{HealthReport, HttpBackend, LinkStatus, TelemetryBackend, TransportError};
pub use history::{HistoryPoint, RingBuffer, TelemetryHistory};
pub use payload::{
    HeadPositionBlock, PayloadError, PerclosBlock, PollPayload, PredictionBlock, PushHeadPose,
    PushUpdate, SensorBlock,
};
pub use reconciler::{
    lock, new_shared_reconciler, ChannelHealth, PollOutcome, Reconciler, SharedReconciler,
};
pub use snapshot::{
    position_label, EyeStatus, HeadPose, MlStatus, SystemStatus, TelemetrySnapshot, YawnStatus,
    POSITION_BAND_DEG,
};
