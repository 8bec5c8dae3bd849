//! Operator panel — egui/eframe application.
//!
//! # Architecture
//!
//! [`Dashboard`] is the UI-thread core: every frame it reads the reconciled
//! snapshot, classifies it when (and only when) the snapshot changed, feeds
//! the alarm state machine, and advances the pose animation.
//! [`DashboardApp`] wraps it with the [`Session`] and draws the panel.
//!
//! ```text
//! Reconciler (revision changed?) ──▶ classify ──▶ AlarmStateMachine::on_classification
//!            │
//!            └──────────────────────▶ AnimationLoop::frame ──▶ head-pose readout
//! ```
//!
//! # Panel
//!
//! | Area | Content |
//! |------|---------|
//! | Header | system status, offline indicator, backend health, camera status |
//! | Risk card | LOW / MEDIUM / HIGH or SEARCHING, driver reason, all factors |
//! | Vitals | temperature, heart rate, SpO₂, PERCLOS, EAR, MAR, eye / yawn state, ML verdict |
//! | Head pose | position label and smoothed pitch / yaw / roll |
//! | Controls | mute, recalibrate, health check |
//!
//! The alarm audio is primed on the first click or key press.

use eframe::egui;

use crate::alarm::{AlarmPhase, AlarmSink, AlarmStateMachine, ToneAlarm};
use crate::config::AppConfig;
use crate::pose::{AnimationLoop, DisplayPose, PoseTarget};
use crate::risk::{Assessment, Classifier, RiskTier};
use crate::session::{lock_status, Session, SessionCommand, SessionStatus, SharedStatus};
use crate::telemetry::{
    lock, HistoryPoint, LinkStatus, SharedReconciler, SystemStatus, TelemetrySnapshot,
};

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Per-frame state of the panel, independent of any drawing.
pub struct Dashboard<S: AlarmSink> {
    reconciler: SharedReconciler,
    classifier: Classifier,
    alarm: AlarmStateMachine<S>,
    animation: AnimationLoop,
    snapshot: TelemetrySnapshot,
    assessment: Assessment,
    history: Vec<HistoryPoint>,
    seen_revision: Option<u64>,
}

impl<S: AlarmSink> Dashboard<S> {
    pub fn new(reconciler: SharedReconciler, config: &AppConfig, sink: S) -> Self {
        let mut animation = AnimationLoop::new(config.pose.clone());
        animation.start();
        Self {
            reconciler,
            classifier: Classifier::new(config.risk.clone()),
            alarm: AlarmStateMachine::new(sink),
            animation,
            snapshot: TelemetrySnapshot::loading(),
            assessment: Assessment::Searching,
            history: Vec::new(),
            seen_revision: None,
        }
    }

    /// Pull the latest snapshot.  Classifies and drives the alarm only when
    /// the reconciler reports a new revision.  Returns `true` if it did.
    pub fn refresh(&mut self) -> bool {
        let (revision, snapshot, history) = {
            let r = lock(&self.reconciler);
            let revision = r.revision();
            if self.seen_revision == Some(revision) {
                return false;
            }
            (revision, r.current(), r.history())
        };

        self.seen_revision = Some(revision);
        self.snapshot = snapshot;
        self.history = history;
        self.assessment = self.classifier.classify(&self.snapshot);
        self.alarm.on_classification(self.assessment.alarm_level());
        true
    }

    /// Advance the pose animation by one frame.
    pub fn animate(&mut self) -> Option<DisplayPose> {
        self.animation
            .frame(PoseTarget::from_snapshot(&self.snapshot))
    }

    /// Any click or key press: prime the alarm audio.
    pub fn on_user_interaction(&mut self) {
        self.alarm.unlock();
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.alarm.toggle_mute()
    }

    /// Stop the animation and release the alarm audio.
    pub fn teardown(&mut self) {
        self.animation.cancel();
        self.alarm.release();
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn history(&self) -> &[HistoryPoint] {
        &self.history
    }

    pub fn alarm(&self) -> &AlarmStateMachine<S> {
        &self.alarm
    }

    pub fn animation(&self) -> &AnimationLoop {
        &self.animation
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn reading(value: Option<f64>, decimals: usize, unit: &str) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}{unit}"),
        _ => "--".into(),
    }
}

fn tier_color(assessment: &Assessment) -> egui::Color32 {
    match assessment {
        Assessment::Searching => egui::Color32::from_rgb(140, 140, 140),
        Assessment::Classified(c) => match c.level {
            RiskTier::Low => egui::Color32::from_rgb(80, 200, 120),
            RiskTier::Medium => egui::Color32::from_rgb(255, 180, 60),
            RiskTier::High => egui::Color32::from_rgb(255, 68, 68),
        },
    }
}

fn system_color(status: SystemStatus) -> egui::Color32 {
    match status {
        SystemStatus::Active => egui::Color32::from_rgb(80, 200, 120),
        SystemStatus::Initializing => egui::Color32::from_rgb(68, 136, 255),
        SystemStatus::Offline => egui::Color32::from_rgb(255, 136, 68),
    }
}

const DIM: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);

// ---------------------------------------------------------------------------
// DashboardApp
// ---------------------------------------------------------------------------

/// eframe application — the operator panel.
pub struct DashboardApp {
    dashboard: Dashboard<ToneAlarm>,
    session: Session,
    status: SharedStatus,
}

impl DashboardApp {
    pub fn new(session: Session, config: &AppConfig) -> Self {
        let dashboard = Dashboard::new(
            session.reconciler(),
            config,
            ToneAlarm::from_config(&config.alarm),
        );
        let status = session.status();
        Self {
            dashboard,
            session,
            status,
        }
    }

    // ── Sections ─────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui, status: &SessionStatus) {
        let snap = self.dashboard.snapshot();
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(snap.system_status.label())
                    .color(system_color(snap.system_status))
                    .strong(),
            );
            if snap.system_status == SystemStatus::Offline {
                ui.label(
                    egui::RichText::new("OFFLINE · showing last values")
                        .color(system_color(SystemStatus::Offline))
                        .size(11.0),
                );
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(format!("Camera: {}", status.camera.label()))
                        .color(DIM)
                        .size(11.0),
                );
            });
        });

        let health = match &status.health {
            Some(h) if h.status == LinkStatus::Online => {
                format!("Backend online · {} ms · {}", h.latency_ms, h.version)
            }
            Some(_) => "Backend offline".to_string(),
            None => "Backend: checking…".to_string(),
        };
        let push = if lock(&self.session.reconciler()).health().push_ok {
            "push connected"
        } else {
            "push closed"
        };
        ui.label(
            egui::RichText::new(format!("{health} · {push}"))
                .color(DIM)
                .size(11.0),
        );
    }

    fn draw_risk_card(&self, ui: &mut egui::Ui) {
        let assessment = self.dashboard.assessment();
        let color = tier_color(assessment);

        egui::Frame::new()
            .stroke(egui::Stroke::new(1.5, color))
            .corner_radius(egui::CornerRadius::same(6))
            .inner_margin(egui::Margin::same(8))
            .show(ui, |ui| {
                ui.label(
                    egui::RichText::new(assessment.label())
                        .color(color)
                        .size(26.0)
                        .strong(),
                );
                match assessment {
                    Assessment::Searching => {
                        ui.label(egui::RichText::new("No face detected").color(DIM));
                    }
                    Assessment::Classified(c) => {
                        ui.label(egui::RichText::new(c.reason.as_str()).size(13.0));
                        for factor in c.factors.iter().filter(|f| **f != c.reason) {
                            ui.label(
                                egui::RichText::new(format!("• {factor}"))
                                    .color(DIM)
                                    .size(11.0),
                            );
                        }
                    }
                }
            });
    }

    fn draw_vitals(&self, ui: &mut egui::Ui) {
        let s = self.dashboard.snapshot();
        egui::Grid::new("vitals")
            .num_columns(4)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label("Temp");
                ui.label(reading(s.temperature, 1, " °C"));
                ui.label("Heart rate");
                ui.label(reading(s.heart_rate, 0, " bpm"));
                ui.end_row();

                ui.label("SpO₂");
                ui.label(reading(s.spo2, 0, " %"));
                ui.label("PERCLOS");
                ui.label(reading(s.perclos, 1, " %"));
                ui.end_row();

                ui.label("EAR");
                ui.label(reading(s.ear, 3, ""));
                ui.label("MAR");
                ui.label(reading(s.mar, 3, ""));
                ui.end_row();

                ui.label("Eyes");
                ui.label(s.eye_status.label());
                ui.label("Yawn");
                ui.label(s.yawn_status.label());
                ui.end_row();

                ui.label("Model");
                ui.label(format!(
                    "{} ({:.0}%)",
                    s.ml_status.label(),
                    s.ml_confidence * 100.0
                ));
                ui.label("Samples");
                ui.label(self.dashboard.history().len().to_string());
                ui.end_row();
            });
    }

    fn draw_head_pose(&self, ui: &mut egui::Ui) {
        let s = self.dashboard.snapshot();
        let pose = self.dashboard.animation().display();
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Head").strong());
            ui.label(s.head_pose.position_label.as_str());
            ui.label(
                egui::RichText::new(format!(
                    "pitch {:+.1}°  yaw {:+.1}°  roll {:+.1}°  jaw {:.2}",
                    pose.pitch, pose.yaw, pose.roll, pose.mar
                ))
                .color(DIM)
                .size(11.0),
            );
        });
        if !s.head_pose.calibrated && s.system_status != SystemStatus::Initializing {
            ui.label(
                egui::RichText::new(format!("uncalibrated · source {}", s.head_pose.source))
                    .color(DIM)
                    .size(11.0),
            );
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, status: &SessionStatus) {
        ui.horizontal(|ui| {
            let phase = self.dashboard.alarm().phase();
            let mute_label = if phase == AlarmPhase::Muted {
                "Unmute alarm"
            } else {
                "Mute alarm"
            };
            if ui.button(mute_label).clicked() {
                self.dashboard.toggle_mute();
            }

            let recalibrate = ui.add_enabled(
                !status.calibration_requested,
                egui::Button::new("Recalibrate"),
            );
            if recalibrate.clicked() {
                self.session.send(SessionCommand::Recalibrate);
            }

            if ui.button("Check backend").clicked() {
                self.session.send(SessionCommand::CheckHealth);
            }

            ui.label(
                egui::RichText::new(format!("Alarm: {}", phase.label()))
                    .color(DIM)
                    .size(11.0),
            );
        });

        if let Some(err) = &status.last_error {
            ui.label(
                egui::RichText::new(err.as_str())
                    .color(egui::Color32::from_rgb(255, 136, 68))
                    .size(11.0),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for DashboardApp {
    /// Called every frame by eframe.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.pointer.any_click() || !i.keys_down.is_empty()) {
            self.dashboard.on_user_interaction();
        }

        self.dashboard.refresh();
        self.dashboard.animate();

        // The snapshot changes on the network's schedule, not on input, so
        // keep frames coming while the animation runs.
        if let Some(next) = self.dashboard.animation().next_frame_in() {
            ctx.request_repaint_after(next);
        }

        let status = lock_status(&self.status).clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_header(ui, &status);
            ui.separator();
            self.draw_risk_card(ui);
            ui.add_space(6.0);
            self.draw_vitals(ui);
            ui.separator();
            self.draw_head_pose(ui);
            ui.separator();
            self.draw_controls(ui, &status);
        });
    }

    /// Stop the alarm, the animation and every session task.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("operator panel closing");
        self.dashboard.teardown();
        self.session.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmError;
    use crate::telemetry::new_shared_reconciler;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct CountingSink {
        plays: Rc<Cell<u32>>,
        stops: Rc<Cell<u32>>,
    }

    impl AlarmSink for CountingSink {
        fn prime(&mut self) -> Result<(), AlarmError> {
            Ok(())
        }
        fn play(&mut self) -> Result<(), AlarmError> {
            self.plays.set(self.plays.get() + 1);
            Ok(())
        }
        fn stop(&mut self) {
            self.stops.set(self.stops.get() + 1);
        }
        fn release(&mut self) {}
    }

    fn body(eye: &str, ml: &str, pitch: f64) -> String {
        format!(
            r#"{{
                "sensor": {{"temperature": 36.6, "hr": 72, "spo2": 97}},
                "perclos": {{"status": "{eye}", "perclos": 10.0, "mar": 0.2}},
                "head_position": {{"angle_x": {pitch}, "angle_y": 0, "angle_z": 0,
                                   "calibrated": true}},
                "prediction": {{"status": "{ml}", "confidence": 0.9}},
                "system_status": "Active"
            }}"#
        )
    }

    fn dashboard() -> (Dashboard<CountingSink>, SharedReconciler, CountingSink) {
        let reconciler = new_shared_reconciler(20);
        let sink = CountingSink::default();
        let d = Dashboard::new(reconciler.clone(), &AppConfig::default(), sink.clone());
        (d, reconciler, sink)
    }

    #[test]
    fn first_refresh_shows_calibrating_sentinel() {
        let (mut d, _, sink) = dashboard();
        assert!(d.refresh());
        assert_eq!(d.assessment().alarm_level(), RiskTier::Low);
        assert_eq!(
            d.assessment().classification().map(|c| c.reason.as_str()),
            Some("calibrating")
        );
        assert_eq!(sink.plays.get(), 0);
    }

    #[test]
    fn classifies_only_on_new_revision() {
        let (mut d, r, _) = dashboard();
        assert!(d.refresh());
        assert!(!d.refresh());
        lock(&r).apply_poll_message(&body("Open", "Alert", 0.0));
        assert!(d.refresh());
        assert!(!d.refresh());
        assert_eq!(d.snapshot().heart_rate, Some(72.0));
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn closed_eyes_sound_alarm_once() {
        let (mut d, r, sink) = dashboard();
        lock(&r).apply_poll_message(&body("Closed", "Alert", 0.0));
        d.refresh();
        assert_eq!(d.assessment().alarm_level(), RiskTier::High);
        assert_eq!(sink.plays.get(), 1);

        // Same tier on the next poll: no retrigger.
        lock(&r).apply_poll_message(&body("Closed", "Alert", 5.0));
        d.refresh();
        assert_eq!(sink.plays.get(), 1);

        lock(&r).apply_poll_message(&body("Open", "Alert", 5.0));
        d.refresh();
        assert_eq!(d.assessment().alarm_level(), RiskTier::Low);
        assert!(sink.stops.get() >= 1);
    }

    #[test]
    fn no_face_is_searching() {
        let (mut d, r, sink) = dashboard();
        lock(&r).apply_poll_message(&body("No Face", "Fatigued", 0.0));
        d.refresh();
        assert_eq!(*d.assessment(), Assessment::Searching);
        assert_eq!(sink.plays.get(), 0);
    }

    #[test]
    fn muted_dashboard_stays_silent() {
        let (mut d, r, sink) = dashboard();
        d.on_user_interaction();
        assert!(d.toggle_mute());
        lock(&r).apply_poll_message(&body("Closed", "Fatigued", 0.0));
        d.refresh();
        assert_eq!(d.assessment().alarm_level(), RiskTier::High);
        assert_eq!(sink.plays.get(), 0);
        assert_eq!(d.alarm().phase(), AlarmPhase::Muted);
    }

    #[test]
    fn animation_follows_snapshot_pose() {
        let (mut d, r, _) = dashboard();
        lock(&r).apply_poll_message(&body("Open", "Alert", 20.0));
        d.refresh();
        let pose = d.animate().unwrap();
        assert!((pose.pitch - 2.0).abs() < 1e-9);
        d.teardown();
        assert!(d.animate().is_none());
        assert!(!d.animation().is_running());
    }

    #[test]
    fn readings_format_or_dash() {
        assert_eq!(reading(Some(36.64), 1, " °C"), "36.6 °C");
        assert_eq!(reading(None, 0, " bpm"), "--");
        assert_eq!(reading(Some(f64::NAN), 0, ""), "--");
    }
}
