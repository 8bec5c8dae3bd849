//! Session status shared with the operator panel.
//!
//! [`SessionStatus`] carries what the panel shows about the session that is
//! not part of the telemetry snapshot: camera state, frame counters, the
//! last health check and the last command failure.  The session tasks
//! write it; the egui update loop reads it each frame.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::frames::{CameraStatus, FrameStats};
use crate::telemetry::HealthReport;

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// Requests from the panel to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// `POST /reset_calibration`, then hold `Initializing` until the backend
    /// reports a calibrated pose.
    Recalibrate,
    /// Run a `GET /health` now.
    CheckHealth,
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub camera: CameraStatus,
    pub frames: FrameStats,
    /// `None` until the first health check completes.
    pub health: Option<HealthReport>,
    pub calibration_requested: bool,
    pub last_error: Option<String>,
    pub running: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            camera: CameraStatus::Idle,
            frames: FrameStats::default(),
            health: None,
            calibration_requested: false,
            last_error: None,
            running: false,
        }
    }
}

/// Thread-safe handle to [`SessionStatus`].  Hold the lock briefly and
/// never across `.await`.
pub type SharedStatus = Arc<Mutex<SessionStatus>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(SessionStatus::default()))
}

/// Lock the status, recovering from a poisoned mutex.
pub fn lock_status(status: &SharedStatus) -> MutexGuard<'_, SessionStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_idle() {
        let s = SessionStatus::default();
        assert_eq!(s.camera, CameraStatus::Idle);
        assert!(s.health.is_none());
        assert!(!s.running);
    }

    #[test]
    fn shared_status_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedStatus>();
    }

    #[test]
    fn shared_status_can_be_cloned_and_mutated() {
        let status = new_shared_status();
        let other = Arc::clone(&status);
        lock_status(&status).camera = CameraStatus::Streaming;
        assert_eq!(lock_status(&other).camera, CameraStatus::Streaming);
    }
}
