//! Risk classifier — a pure function from snapshot to [`Assessment`].
//!
//! # Precedence
//!
//! ```text
//! 1. system Initializing      → LOW "calibrating"           (stops here)
//!    no face in frame         → Searching                   (stops here)
//! 2. ML verdict usable        → Fatigued HIGH / Drowsy MEDIUM / Alert LOW
//!                               eyes Closed still forces HIGH
//! 3. otherwise rule table     → max tier of every rule that fires
//! ```
//!
//! The rule table is data: each entry is a predicate, the tier it implies and
//! the reason shown to the operator.  Folding keeps the highest tier, so a
//! later MEDIUM rule can never lower an earlier HIGH one.

use crate::config::RiskThresholds;
use crate::telemetry::{EyeStatus, MlStatus, SystemStatus, TelemetrySnapshot};

use super::tier::{Assessment, Classification, RiskTier};

pub const REASON_CALIBRATING: &str = "calibrating";
pub const REASON_ALL_NORMAL: &str = "All vitals normal";
pub const REASON_EYES_CLOSED: &str = "Eyes closed";

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

struct Rule {
    fires: fn(&TelemetrySnapshot, &RiskThresholds) -> bool,
    tier: RiskTier,
    reason: &'static str,
}

/// A reading of 0 means the sensor is disconnected, not a real value.
fn reading(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

const FALLBACK_RULES: &[Rule] = &[
    Rule {
        fires: |s, t| s.temperature.is_some_and(|v| v >= t.temp_high),
        tier: RiskTier::Medium,
        reason: "High body temperature",
    },
    Rule {
        fires: |s, t| s.perclos.is_some_and(|v| v >= t.perclos_high),
        tier: RiskTier::High,
        reason: "High eye closure rate (PERCLOS)",
    },
    Rule {
        fires: |s, t| {
            s.perclos
                .is_some_and(|v| v >= t.perclos_medium && v < t.perclos_high)
        },
        tier: RiskTier::Medium,
        reason: "Elevated eye closure rate (PERCLOS)",
    },
    Rule {
        fires: |s, _| s.yawn_status.is_yawning(),
        tier: RiskTier::High,
        reason: "Frequent yawning detected",
    },
    Rule {
        fires: |s, t| reading(s.spo2).is_some_and(|v| v < t.spo2_low),
        tier: RiskTier::High,
        reason: "Low oxygen saturation",
    },
    Rule {
        fires: |s, t| reading(s.heart_rate).is_some_and(|v| v < t.hr_low || v > t.hr_high),
        tier: RiskTier::Medium,
        reason: "Abnormal heart rate",
    },
    Rule {
        fires: |s, _| s.eye_status == EyeStatus::Closed,
        tier: RiskTier::High,
        reason: REASON_EYES_CLOSED,
    },
];

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Classify one snapshot.  Identical inputs always give identical output.
pub fn classify(snapshot: &TelemetrySnapshot, thresholds: &RiskThresholds) -> Assessment {
    if snapshot.system_status == SystemStatus::Initializing {
        return Assessment::Classified(Classification {
            level: RiskTier::Low,
            reason: REASON_CALIBRATING.into(),
            factors: Vec::new(),
        });
    }

    if !snapshot.subject_detected() {
        return Assessment::Searching;
    }

    let classification = if snapshot.ml_status.is_terminal() {
        classify_ml(snapshot)
    } else {
        classify_rules(snapshot, thresholds)
    };
    Assessment::Classified(classification)
}

fn classify_ml(snapshot: &TelemetrySnapshot) -> Classification {
    let level = match snapshot.ml_status {
        MlStatus::Fatigued => RiskTier::High,
        MlStatus::Drowsy => RiskTier::Medium,
        _ => RiskTier::Low,
    };
    let verdict = format!(
        "ML model: {} ({:.0}% confidence)",
        snapshot.ml_status.label(),
        snapshot.ml_confidence * 100.0
    );

    if snapshot.eye_status == EyeStatus::Closed {
        return Classification {
            level: RiskTier::High,
            reason: REASON_EYES_CLOSED.into(),
            factors: vec![verdict, REASON_EYES_CLOSED.into()],
        };
    }

    Classification {
        level,
        reason: verdict.clone(),
        factors: vec![verdict],
    }
}

fn classify_rules(snapshot: &TelemetrySnapshot, thresholds: &RiskThresholds) -> Classification {
    let fired: Vec<&Rule> = FALLBACK_RULES
        .iter()
        .filter(|rule| (rule.fires)(snapshot, thresholds))
        .collect();

    let driver = fired.iter().copied().fold(None::<&Rule>, |best, rule| match best {
        Some(b) if b.tier >= rule.tier => Some(b),
        _ => Some(rule),
    });

    match driver {
        Some(rule) => Classification {
            level: rule.tier,
            reason: rule.reason.into(),
            factors: fired.iter().map(|r| r.reason.to_string()).collect(),
        },
        None => Classification {
            level: RiskTier::Low,
            reason: REASON_ALL_NORMAL.into(),
            factors: Vec::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// [`classify`] bound to a threshold set.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    thresholds: RiskThresholds,
}

impl Classifier {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, snapshot: &TelemetrySnapshot) -> Assessment {
        classify(snapshot, &self.thresholds)
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
