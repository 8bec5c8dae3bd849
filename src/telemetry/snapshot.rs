//! The reconciled telemetry record and its status enums.
//!
//! [`TelemetrySnapshot`] is owned by the [`Reconciler`](super::Reconciler);
//! everything else works on clones handed out by
//! [`Reconciler::current`](super::Reconciler::current).

// ---------------------------------------------------------------------------
// SystemStatus
// ---------------------------------------------------------------------------

/// Liveness of the poll channel as seen by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemStatus {
    /// No successful poll yet, or the backend is (re)calibrating.
    #[default]
    Initializing,
    /// The last poll succeeded within its expected interval.
    Active,
    /// The poll channel failed; values shown are the last good ones.
    Offline,
}

impl SystemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SystemStatus::Initializing => "Initializing",
            SystemStatus::Active => "Active",
            SystemStatus::Offline => "Offline",
        }
    }
}

// ---------------------------------------------------------------------------
// EyeStatus
// ---------------------------------------------------------------------------

/// Instantaneous eye state reported by the vision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyeStatus {
    Open,
    Closed,
    /// The vision service found no face in the last frame.
    NoFace,
    #[default]
    Unknown,
}

impl EyeStatus {
    /// Parse the wire label (`"Open"`, `"Closed"`, `"No Face"`).
    pub fn from_wire(s: &str) -> Self {
        match s.trim() {
            "Open" => EyeStatus::Open,
            "Closed" => EyeStatus::Closed,
            "No Face" => EyeStatus::NoFace,
            _ => EyeStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EyeStatus::Open => "Open",
            EyeStatus::Closed => "Closed",
            EyeStatus::NoFace => "No Face",
            EyeStatus::Unknown => "—",
        }
    }
}

// ---------------------------------------------------------------------------
// YawnStatus
// ---------------------------------------------------------------------------

/// Mouth state derived from MAR by the vision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YawnStatus {
    Closed,
    Opening,
    Yawning,
    Relaxing,
    NoFace,
    #[default]
    Unknown,
}

impl YawnStatus {
    pub fn from_wire(s: &str) -> Self {
        match s.trim() {
            "Closed" => YawnStatus::Closed,
            "Opening" => YawnStatus::Opening,
            "Yawning" => YawnStatus::Yawning,
            "Relaxing" => YawnStatus::Relaxing,
            "No Face" => YawnStatus::NoFace,
            _ => YawnStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            YawnStatus::Closed => "Closed",
            YawnStatus::Opening => "Opening",
            YawnStatus::Yawning => "Yawning",
            YawnStatus::Relaxing => "Relaxing",
            YawnStatus::NoFace => "No Face",
            YawnStatus::Unknown => "—",
        }
    }

    /// `true` while a yawn is starting or in progress.
    pub fn is_yawning(&self) -> bool {
        matches!(self, YawnStatus::Yawning | YawnStatus::Opening)
    }
}

// ---------------------------------------------------------------------------
// MlStatus
// ---------------------------------------------------------------------------

/// Verdict of the backend's ML model.
///
/// Anything the model emits while warming up (`"Waiting..."`,
/// `"Initializing..."`) is folded into [`MlStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MlStatus {
    Alert,
    Drowsy,
    Fatigued,
    #[default]
    Unknown,
    Error,
}

impl MlStatus {
    pub fn from_wire(s: &str) -> Self {
        match s.trim() {
            "Alert" => MlStatus::Alert,
            "Drowsy" => MlStatus::Drowsy,
            "Fatigued" => MlStatus::Fatigued,
            "Error" => MlStatus::Error,
            _ => MlStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MlStatus::Alert => "Alert",
            MlStatus::Drowsy => "Drowsy",
            MlStatus::Fatigued => "Fatigued",
            MlStatus::Unknown => "Unknown",
            MlStatus::Error => "Error",
        }
    }

    /// `true` for a usable verdict (`Alert`, `Drowsy`, `Fatigued`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, MlStatus::Alert | MlStatus::Drowsy | MlStatus::Fatigued)
    }
}

// ---------------------------------------------------------------------------
// HeadPose
// ---------------------------------------------------------------------------

/// Head orientation in degrees.  `angle_x` is pitch, `angle_y` yaw,
/// `angle_z` roll.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadPose {
    pub angle_x: f64,
    pub angle_y: f64,
    pub angle_z: f64,
    pub position_label: String,
    /// Which producer measured the pose (`"Sensor"`, `"Vision (Fallback)"`).
    pub source: String,
    pub calibrated: bool,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            angle_x: 0.0,
            angle_y: 0.0,
            angle_z: 0.0,
            position_label: "Center".into(),
            source: "None".into(),
            calibrated: false,
        }
    }
}

/// Degrees beyond which pitch or yaw leaves the centre band.
pub const POSITION_BAND_DEG: f64 = 10.0;

/// Coarse head position from pitch and yaw.
///
/// Positive pitch looks down, positive yaw looks right.  Combined offsets
/// read vertical first, e.g. `"Down Right"`.
///
/// ```
/// use fatigue_dashboard::telemetry::position_label;
///
/// assert_eq!(position_label(0.0, 0.0), "Center");
/// assert_eq!(position_label(15.0, 0.0), "Down");
/// assert_eq!(position_label(-12.0, -30.0), "Up Left");
/// ```
pub fn position_label(pitch: f64, yaw: f64) -> String {
    let vertical = if pitch > POSITION_BAND_DEG {
        Some("Down")
    } else if pitch < -POSITION_BAND_DEG {
        Some("Up")
    } else {
        None
    };
    let horizontal = if yaw > POSITION_BAND_DEG {
        Some("Right")
    } else if yaw < -POSITION_BAND_DEG {
        Some("Left")
    } else {
        None
    };

    match (vertical, horizontal) {
        (None, None) => "Center".to_string(),
        (Some(v), None) => v.to_string(),
        (None, Some(h)) => h.to_string(),
        (Some(v), Some(h)) => format!("{v} {h}"),
    }
}

// ---------------------------------------------------------------------------
// TelemetrySnapshot
// ---------------------------------------------------------------------------

/// One consistent view of every telemetry signal.
///
/// Numeric signals are `None` when the backend has no reading for them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Body temperature in °C.
    pub temperature: Option<f64>,
    /// Heart rate in bpm.
    pub heart_rate: Option<f64>,
    /// Blood oxygen saturation in %.
    pub spo2: Option<f64>,
    /// Percentage of eye closure over the rolling window (0 – 100).
    pub perclos: Option<f64>,
    /// Eye aspect ratio.
    pub ear: Option<f64>,
    /// Mouth aspect ratio.
    pub mar: Option<f64>,
    pub eye_status: EyeStatus,
    pub yawn_status: YawnStatus,
    pub head_pose: HeadPose,
    pub ml_status: MlStatus,
    /// Model confidence, 0.0 – 1.0.
    pub ml_confidence: f64,
    /// Backend annotation such as `"MICROSLEEP"` or `"HIGH_PERCLOS"`.
    pub ml_flag: Option<String>,
    pub system_status: SystemStatus,
    /// Backend clock at the time of the last merged update.
    pub timestamp_ms: Option<u64>,
}

impl TelemetrySnapshot {
    /// The "Loading" sentinel shown before the first successful poll.
    pub fn loading() -> Self {
        Self::default()
    }

    /// `false` when the vision service reports that no face is in frame.
    pub fn subject_detected(&self) -> bool {
        self.eye_status != EyeStatus::NoFace
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_sentinel_is_empty_and_initializing() {
        let s = TelemetrySnapshot::loading();
        assert_eq!(s.system_status, SystemStatus::Initializing);
        assert!(s.temperature.is_none());
        assert!(s.heart_rate.is_none());
        assert!(s.perclos.is_none());
        assert_eq!(s.ml_confidence, 0.0);
        assert_eq!(s.head_pose.angle_x, 0.0);
        assert_eq!(s.ml_status, MlStatus::Unknown);
    }

    #[test]
    fn position_label_bands() {
        assert_eq!(position_label(10.0, -10.0), "Center");
        assert_eq!(position_label(-10.5, 0.0), "Up");
        assert_eq!(position_label(0.0, 11.0), "Right");
        assert_eq!(position_label(25.0, 25.0), "Down Right");
    }

    #[test]
    fn wire_labels_parse() {
        assert_eq!(EyeStatus::from_wire("No Face"), EyeStatus::NoFace);
        assert_eq!(EyeStatus::from_wire("Closed"), EyeStatus::Closed);
        assert_eq!(EyeStatus::from_wire("Unstable"), EyeStatus::Unknown);
        assert_eq!(YawnStatus::from_wire("Opening"), YawnStatus::Opening);
        assert_eq!(MlStatus::from_wire("Waiting..."), MlStatus::Unknown);
        assert_eq!(MlStatus::from_wire("Error"), MlStatus::Error);
    }

    #[test]
    fn terminal_ml_verdicts() {
        assert!(MlStatus::Alert.is_terminal());
        assert!(MlStatus::Drowsy.is_terminal());
        assert!(MlStatus::Fatigued.is_terminal());
        assert!(!MlStatus::Unknown.is_terminal());
        assert!(!MlStatus::Error.is_terminal());
    }

    #[test]
    fn yawning_covers_opening() {
        assert!(YawnStatus::Yawning.is_yawning());
        assert!(YawnStatus::Opening.is_yawning());
        assert!(!YawnStatus::Relaxing.is_yawning());
    }

    #[test]
    fn no_face_means_no_subject() {
        let mut s = TelemetrySnapshot::loading();
        assert!(s.subject_detected());
        s.eye_status = EyeStatus::NoFace;
        assert!(!s.subject_detected());
    }
}
