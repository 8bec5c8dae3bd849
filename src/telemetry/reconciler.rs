//! Telemetry reconciler — fuses the poll and push channels into one snapshot.
//!
//! # Merge rules
//!
//! ```text
//! poll ok        ──▶ every field replaced, status Active (or Initializing
//!                    while the backend / a calibration reset is pending)
//! poll failed    ──▶ fields kept, status Offline
//! poll malformed ──▶ message dropped, nothing changes
//! push           ──▶ only the carried fields overwritten (last write wins
//!                    per field), position label recomputed, status untouched
//! ```
//!
//! Nothing merges before the first successful poll: until then
//! [`Reconciler::current`] returns the "Loading" sentinel.
//!
//! The reconciler is shared as [`SharedReconciler`]; every `apply_*` call
//! runs under a single lock so a reader never sees a half-merged snapshot.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::backend::TransportError;
use super::history::{HistoryPoint, TelemetryHistory};
use super::payload::{seconds_to_ms, PayloadError, PollPayload, PushUpdate};
use super::snapshot::{
    position_label, EyeStatus, HeadPose, MlStatus, SystemStatus, TelemetrySnapshot, YawnStatus,
};

// ---------------------------------------------------------------------------
// ChannelHealth
// ---------------------------------------------------------------------------

/// Per-channel liveness bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelHealth {
    /// The most recent poll attempt succeeded.
    pub poll_ok: bool,
    /// The push channel is currently connected.
    pub push_ok: bool,
    /// When the last successful poll was merged.
    pub last_poll_at: Option<Instant>,
    /// When the last push update was merged.
    pub last_push_at: Option<Instant>,
    /// Poll failures since the last success.
    pub consecutive_poll_failures: u32,
}

// ---------------------------------------------------------------------------
// PollOutcome
// ---------------------------------------------------------------------------

/// What a call to [`Reconciler::apply_poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Merged,
    /// Transport failure recorded; prior values retained.
    Failed,
    /// Body could not be decoded; dropped.
    Discarded,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owner of the current [`TelemetrySnapshot`].
pub struct Reconciler {
    snapshot: TelemetrySnapshot,
    health: ChannelHealth,
    history: TelemetryHistory,
    history_tick: u64,
    /// Set by the first successful poll.
    primed: bool,
    /// A calibration reset is pending until a poll reports `calibrated`.
    calibrating: bool,
    /// Bumped on every change visible through `current()`.
    revision: u64,
}

impl Reconciler {
    /// Create a reconciler keeping `history_len` charted points.
    pub fn new(history_len: usize) -> Self {
        Self {
            snapshot: TelemetrySnapshot::loading(),
            health: ChannelHealth::default(),
            history: TelemetryHistory::new(history_len),
            history_tick: 0,
            primed: false,
            calibrating: false,
            revision: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Poll channel
    // -----------------------------------------------------------------------

    /// Merge the outcome of one poll attempt.
    pub fn apply_poll(&mut self, result: Result<PollPayload, TransportError>) -> PollOutcome {
        match result {
            Ok(payload) => {
                self.merge_poll(payload);
                PollOutcome::Merged
            }
            Err(TransportError::Malformed(e)) => {
                log::warn!("telemetry: dropping malformed poll payload: {e}");
                PollOutcome::Discarded
            }
            Err(e) => {
                self.record_poll_failure(&e);
                PollOutcome::Failed
            }
        }
    }

    /// Decode and merge a raw poll body.
    pub fn apply_poll_message(&mut self, raw: &str) -> PollOutcome {
        self.apply_poll(PollPayload::parse(raw).map_err(TransportError::from))
    }

    fn merge_poll(&mut self, payload: PollPayload) {
        let backend_initializing = payload.backend_initializing();
        let sensor = payload.sensor.unwrap_or_default();
        let perclos = payload.perclos.unwrap_or_default();
        let head = payload.head_position.unwrap_or_default();
        let prediction = payload.prediction.unwrap_or_default();

        let angle_x = head.angle_x.unwrap_or(0.0);
        let angle_y = head.angle_y.unwrap_or(0.0);
        let calibrated = head.calibrated.unwrap_or(false);

        // Sensor-sourced poses carry no `calibrated` flag; for those the
        // backend's own status decides.
        let calibration_done = match head.calibrated {
            Some(flag) => flag,
            None => !backend_initializing,
        };
        if self.calibrating && calibration_done {
            log::info!("telemetry: calibration complete");
            self.calibrating = false;
        }

        let system_status = if backend_initializing || self.calibrating {
            SystemStatus::Initializing
        } else {
            SystemStatus::Active
        };

        if self.snapshot.system_status != system_status {
            log::info!(
                "telemetry: system status {} -> {}",
                self.snapshot.system_status.label(),
                system_status.label()
            );
        }

        self.snapshot = TelemetrySnapshot {
            temperature: sensor.temperature,
            heart_rate: sensor.hr,
            spo2: sensor.spo2,
            perclos: perclos.perclos,
            ear: perclos.ear,
            mar: perclos.mar,
            eye_status: perclos
                .status
                .as_deref()
                .map(EyeStatus::from_wire)
                .unwrap_or_default(),
            yawn_status: perclos
                .yawn_status
                .as_deref()
                .map(YawnStatus::from_wire)
                .unwrap_or_default(),
            head_pose: HeadPose {
                angle_x,
                angle_y,
                angle_z: head.angle_z.unwrap_or(0.0),
                position_label: head
                    .position
                    .unwrap_or_else(|| position_label(angle_x, angle_y)),
                source: head.source.unwrap_or_else(|| "None".into()),
                calibrated,
            },
            ml_status: prediction
                .status
                .as_deref()
                .map(MlStatus::from_wire)
                .unwrap_or_default(),
            ml_confidence: prediction.confidence.unwrap_or(0.0),
            ml_flag: prediction.flag,
            system_status,
            timestamp_ms: payload.server_time.and_then(seconds_to_ms),
        };

        let now = Instant::now();
        self.primed = true;
        self.health.poll_ok = true;
        self.health.last_poll_at = Some(now);
        self.health.consecutive_poll_failures = 0;

        self.history.push(HistoryPoint {
            tick: self.history_tick,
            heart_rate: self.snapshot.heart_rate,
            temperature: self.snapshot.temperature,
            timestamp_ms: self.snapshot.timestamp_ms,
        });
        self.history_tick += 1;
        self.revision += 1;
    }

    fn record_poll_failure(&mut self, error: &TransportError) {
        self.health.poll_ok = false;
        self.health.consecutive_poll_failures += 1;

        if self.health.consecutive_poll_failures == 1 {
            log::warn!("telemetry: poll failed: {error}");
        } else {
            log::debug!(
                "telemetry: poll failed ({} in a row): {error}",
                self.health.consecutive_poll_failures
            );
        }

        // The Loading sentinel stays Initializing until a poll succeeds.
        if self.primed {
            self.mark_offline();
        }
    }

    /// Mark the system offline when the last successful poll is older than
    /// `max_age`.  Returns `true` if the status changed.
    pub fn check_liveness(&mut self, now: Instant, max_age: Duration) -> bool {
        let stale = self
            .health
            .last_poll_at
            .is_some_and(|at| now.saturating_duration_since(at) > max_age);

        if stale && self.snapshot.system_status != SystemStatus::Offline {
            self.health.poll_ok = false;
            self.mark_offline();
            return true;
        }
        false
    }

    fn mark_offline(&mut self) {
        if self.snapshot.system_status != SystemStatus::Offline {
            log::info!(
                "telemetry: system status {} -> Offline",
                self.snapshot.system_status.label()
            );
            self.snapshot.system_status = SystemStatus::Offline;
            self.revision += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Push channel
    // -----------------------------------------------------------------------

    /// Merge one partial update.  Ignored before the first successful poll.
    ///
    /// Returns `true` when the snapshot changed.
    pub fn apply_push(&mut self, update: PushUpdate) -> bool {
        if !self.primed {
            log::trace!("telemetry: push update before first poll ignored");
            return false;
        }

        self.health.last_push_at = Some(Instant::now());

        let before = self.snapshot.clone();
        let snap = &mut self.snapshot;

        if let Some(perclos) = &update.perclos {
            if let Some(v) = perclos.perclos {
                snap.perclos = Some(v);
            }
            if let Some(v) = perclos.ear {
                snap.ear = Some(v);
            }
            if let Some(v) = perclos.mar {
                snap.mar = Some(v);
            }
            if let Some(s) = perclos.status.as_deref() {
                snap.eye_status = EyeStatus::from_wire(s);
            }
            if let Some(s) = perclos.yawn_status.as_deref() {
                snap.yawn_status = YawnStatus::from_wire(s);
            }
        }

        if let Some(pose) = update.pose().filter(|p| !p.is_empty()) {
            if let Some(v) = pose.pitch {
                snap.head_pose.angle_x = v;
            }
            if let Some(v) = pose.yaw {
                snap.head_pose.angle_y = v;
            }
            if let Some(v) = pose.roll {
                snap.head_pose.angle_z = v;
            }
            snap.head_pose.position_label =
                position_label(snap.head_pose.angle_x, snap.head_pose.angle_y);
        }

        if let Some(ms) = update.timestamp.and_then(seconds_to_ms) {
            snap.timestamp_ms = Some(ms);
        }

        let changed = *snap != before;
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Decode and merge a raw push message.  A malformed message is dropped
    /// and the snapshot is left unchanged.
    pub fn apply_push_message(&mut self, raw: &str) -> Result<bool, PayloadError> {
        let update = PushUpdate::parse(raw).map_err(|e| {
            log::warn!("telemetry: dropping malformed push message: {e}");
            e
        })?;
        Ok(self.apply_push(update))
    }

    /// Record a push channel connect / disconnect.  Never changes the
    /// system status.
    pub fn set_push_connected(&mut self, connected: bool) {
        if self.health.push_ok != connected {
            log::info!(
                "telemetry: push channel {}",
                if connected { "connected" } else { "closed" }
            );
        }
        self.health.push_ok = connected;
    }

    // -----------------------------------------------------------------------
    // Calibration
    // -----------------------------------------------------------------------

    /// Enter calibrating mode after a successful calibration reset request.
    pub fn begin_calibration(&mut self) {
        self.calibrating = true;
        self.snapshot.head_pose.calibrated = false;
        if self.snapshot.system_status != SystemStatus::Initializing {
            self.snapshot.system_status = SystemStatus::Initializing;
            self.revision += 1;
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    // -----------------------------------------------------------------------
    // Readers
    // -----------------------------------------------------------------------

    /// A copy of the current snapshot.
    pub fn current(&self) -> TelemetrySnapshot {
        self.snapshot.clone()
    }

    pub fn health(&self) -> &ChannelHealth {
        &self.health
    }

    /// Charted points, oldest first.
    pub fn history(&self) -> Vec<HistoryPoint> {
        self.history.to_vec()
    }

    /// Change counter; consumers re-classify only when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(20)
    }
}

// ---------------------------------------------------------------------------
// SharedReconciler
// ---------------------------------------------------------------------------

/// Thread-safe handle to the [`Reconciler`].
///
/// Lock for a short critical section only; never hold the guard across an
/// `.await`.
pub type SharedReconciler = Arc<Mutex<Reconciler>>;

pub fn new_shared_reconciler(history_len: usize) -> SharedReconciler {
    Arc::new(Mutex::new(Reconciler::new(history_len)))
}

/// Lock the shared reconciler, recovering the guard if a previous holder
/// panicked.  Every merge is applied to a local value before it is written
/// back, so a poisoned lock still guards a consistent snapshot.
pub fn lock(shared: &SharedReconciler) -> MutexGuard<'_, Reconciler> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
