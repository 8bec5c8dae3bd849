//! Fatigue risk classification.
//!
//! * [`RiskTier`] — ordered `Low < Medium < High`.
//! * [`Assessment`] — `Searching` (no face) or a [`Classification`].
//! * [`classify`] / [`Classifier`] — the pure snapshot → assessment mapping.
//!
//! ```
//! use fatigue_dashboard::config::RiskThresholds;
//! use fatigue_dashboard::risk::{classify, RiskTier};
//! use fatigue_dashboard::telemetry::{EyeStatus, MlStatus, SystemStatus, TelemetrySnapshot};
//!
//! let snapshot = TelemetrySnapshot {
//!     eye_status: EyeStatus::Closed,
//!     ml_status: MlStatus::Alert,
//!     system_status: SystemStatus::Active,
//!     ..TelemetrySnapshot::default()
//! };
//! let assessment = classify(&snapshot, &RiskThresholds::default());
//! assert_eq!(assessment.alarm_level(), RiskTier::High);
//! ```

pub mod classifier;
pub mod tier;

pub use classifier::{
    classify, Classifier, REASON_ALL_NORMAL, REASON_CALIBRATING, REASON_EYES_CLOSED,
};
pub use tier::{Assessment, Classification, RiskTier};
