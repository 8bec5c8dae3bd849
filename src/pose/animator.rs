//! Per-frame head-pose smoothing.
//!
//! ```text
//! reconciled target ─▶ clamp to anatomical bounds
//!                   ─▶ deadzone vs. last accepted target
//!                   ─▶ roll × damping
//!                   ─▶ lerp display toward target (pose α, jaw α)
//!                   ─▶ emit only if something moved by more than ε
//! ```
//!
//! All work in [`PoseAnimator::tick`] is constant-time arithmetic, so it is
//! safe to call from the UI thread every frame.

use crate::config::PoseConfig;
use crate::filter::{clamp, deadzone, lerp};
use crate::telemetry::TelemetrySnapshot;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Raw pose target as reconciled from telemetry.  Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseTarget {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    /// Mouth aspect ratio.  `None` holds the jaw where it is.
    pub mar: Option<f64>,
}

impl PoseTarget {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            pitch: snapshot.head_pose.angle_x,
            yaw: snapshot.head_pose.angle_y,
            roll: snapshot.head_pose.angle_z,
            mar: snapshot.mar,
        }
    }
}

/// Display-ready angles for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayPose {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub mar: f64,
}

/// Animator state.  `filtered_target_*` is the last value that passed the
/// deadzone, which is what noise is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseAnimationState {
    pub display_x: f64,
    pub display_y: f64,
    pub display_z: f64,
    pub filtered_target_x: f64,
    pub filtered_target_y: f64,
    pub filtered_target_z: f64,
    pub display_mar: f64,
}

impl PoseAnimationState {
    fn display(&self) -> DisplayPose {
        DisplayPose {
            pitch: self.display_x,
            yaw: self.display_y,
            roll: self.display_z,
            mar: self.display_mar,
        }
    }
}

// ---------------------------------------------------------------------------
// PoseAnimator
// ---------------------------------------------------------------------------

pub struct PoseAnimator {
    config: PoseConfig,
    state: PoseAnimationState,
    last_emitted: DisplayPose,
}

impl PoseAnimator {
    pub fn new(config: PoseConfig) -> Self {
        Self {
            config,
            state: PoseAnimationState::default(),
            last_emitted: DisplayPose::default(),
        }
    }

    /// Advance one frame toward `target`.
    ///
    /// Returns the new display pose, or `None` when no component moved by
    /// more than the settle epsilon since the last emitted frame.
    pub fn tick(&mut self, target: PoseTarget) -> Option<DisplayPose> {
        let c = &self.config;
        let s = &mut self.state;

        let pitch = clamp(target.pitch, -c.pitch_limit, c.pitch_limit);
        let yaw = clamp(target.yaw, -c.yaw_limit, c.yaw_limit);
        let roll = clamp(target.roll, -c.roll_limit, c.roll_limit);

        s.filtered_target_x = deadzone(pitch, s.filtered_target_x, c.deadzone_deg);
        s.filtered_target_y = deadzone(yaw, s.filtered_target_y, c.deadzone_deg);
        s.filtered_target_z = deadzone(roll, s.filtered_target_z, c.deadzone_deg);

        let roll_target = s.filtered_target_z * c.roll_damping;

        s.display_x = lerp(s.display_x, s.filtered_target_x, c.pose_alpha, c.settle_epsilon);
        s.display_y = lerp(s.display_y, s.filtered_target_y, c.pose_alpha, c.settle_epsilon);
        s.display_z = lerp(s.display_z, roll_target, c.pose_alpha, c.settle_epsilon);
        if let Some(mar) = target.mar {
            s.display_mar = lerp(s.display_mar, mar, c.jaw_alpha, c.settle_epsilon);
        }

        let next = s.display();
        let eps = c.settle_epsilon;
        let prev = self.last_emitted;
        let moved = (next.pitch - prev.pitch).abs() > eps
            || (next.yaw - prev.yaw).abs() > eps
            || (next.roll - prev.roll).abs() > eps
            || (next.mar - prev.mar).abs() > eps;

        if moved {
            self.last_emitted = next;
            Some(next)
        } else {
            None
        }
    }

    /// Last emitted display pose.
    pub fn display(&self) -> DisplayPose {
        self.last_emitted
    }

    pub fn state(&self) -> &PoseAnimationState {
        &self.state
    }

    /// Snap back to neutral.
    pub fn reset(&mut self) {
        self.state = PoseAnimationState::default();
        self.last_emitted = DisplayPose::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
