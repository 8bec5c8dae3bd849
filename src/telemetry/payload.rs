//! Wire records for the two telemetry channels.
//!
//! Every field is optional on the wire.  The merge rules that turn these
//! records into a [`TelemetrySnapshot`](super::TelemetrySnapshot) live in the
//! reconciler, not here: a poll replaces the whole snapshot, a push only the
//! fields it carries.

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// PayloadError
// ---------------------------------------------------------------------------

/// A channel message that could not be decoded.  The message is dropped.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Shared blocks
// ---------------------------------------------------------------------------

/// Physiological sensor readings (`sensor` object).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorBlock {
    pub temperature: Option<f64>,
    pub hr: Option<f64>,
    pub spo2: Option<f64>,
}

/// Eye / mouth metrics from the vision service (`perclos` object).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PerclosBlock {
    /// Eye state label: `"Open"`, `"Closed"` or `"No Face"`.
    pub status: Option<String>,
    pub perclos: Option<f64>,
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub yawn_status: Option<String>,
}

/// Head orientation as served by the poll endpoint (`head_position`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeadPositionBlock {
    pub position: Option<String>,
    pub angle_x: Option<f64>,
    pub angle_y: Option<f64>,
    pub angle_z: Option<f64>,
    pub source: Option<String>,
    pub calibrated: Option<bool>,
}

/// ML verdict (`prediction` object).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PredictionBlock {
    pub status: Option<String>,
    pub confidence: Option<f64>,
    pub flag: Option<String>,
}

// ---------------------------------------------------------------------------
// PollPayload
// ---------------------------------------------------------------------------

/// Full-state response of the combined-data endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollPayload {
    pub sensor: Option<SensorBlock>,
    pub perclos: Option<PerclosBlock>,
    pub head_position: Option<HeadPositionBlock>,
    pub prediction: Option<PredictionBlock>,
    /// Backend clock in seconds since the Unix epoch.
    pub server_time: Option<f64>,
    /// `"Active"` or `"Initializing"` (backend calibrating).
    pub system_status: Option<String>,
}

impl PollPayload {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// `true` when the backend itself reports that it is calibrating.
    pub fn backend_initializing(&self) -> bool {
        self.system_status
            .as_deref()
            .is_some_and(|s| s.trim_end_matches('.').eq_ignore_ascii_case("initializing"))
    }
}

// ---------------------------------------------------------------------------
// PushUpdate
// ---------------------------------------------------------------------------

/// Head-pose angles carried by the push channel.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushHeadPose {
    #[serde(alias = "angle_x")]
    pub pitch: Option<f64>,
    #[serde(alias = "angle_y")]
    pub yaw: Option<f64>,
    #[serde(alias = "angle_z")]
    pub roll: Option<f64>,
}

impl PushHeadPose {
    pub fn is_empty(&self) -> bool {
        self.pitch.is_none() && self.yaw.is_none() && self.roll.is_none()
    }
}

/// Partial update delivered over the push channel.
///
/// Producers name the pose block either `head_pose` or `head_position`;
/// both may appear in one message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushUpdate {
    pub perclos: Option<PerclosBlock>,
    pub head_pose: Option<PushHeadPose>,
    pub head_position: Option<PushHeadPose>,
    /// Producer clock in seconds since the Unix epoch.
    pub timestamp: Option<f64>,
}

impl PushUpdate {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The carried pose angles.  `head_pose` wins per angle; gaps are filled
    /// from `head_position`.
    pub fn pose(&self) -> Option<PushHeadPose> {
        match (&self.head_pose, &self.head_position) {
            (None, None) => None,
            (Some(p), None) | (None, Some(p)) => Some(p.clone()),
            (Some(primary), Some(fallback)) => Some(PushHeadPose {
                pitch: primary.pitch.or(fallback.pitch),
                yaw: primary.yaw.or(fallback.yaw),
                roll: primary.roll.or(fallback.roll),
            }),
        }
    }
}

/// Convert a seconds-since-epoch wire timestamp to milliseconds.
pub(crate) fn seconds_to_ms(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
