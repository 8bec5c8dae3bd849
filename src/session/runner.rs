//! Session runner — owns the async side of the dashboard.
//!
//! [`Session`] is the composition root: it builds the runtime, the
//! reconciler, the backend client, the push channel and the frame pipeline,
//! and spawns one task per independent time source.
//!
//! ```text
//! poll_loop     ── every poll_interval ──▶ backend.fetch_combined ─▶ Reconciler::apply_poll
//! PushChannel   ── as received ─────────▶ Reconciler::apply_push_message
//! frame_loop    ── every frame interval ─▶ FramePipeline::tick ─▶ PushHandle
//! command_loop  ── panel commands ──────▶ reset_calibration / health
//!
//! Session::shutdown ──▶ watch(true) ──▶ every task exits, camera released,
//!                                       push socket closed
//! ```
//!
//! Each task applies its whole update under one lock, so the panel never
//! reads a half-merged snapshot.  Nothing is retried except by the owning
//! timer's next tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::AppConfig;
use crate::frames::{CameraStatus, FramePipeline, FrameSink, FrameSource, ImageSequenceSource};
use crate::push::push_channel;
use crate::telemetry::{
    lock, new_shared_reconciler, HttpBackend, SharedReconciler, TelemetryBackend,
};

use super::state::{lock_status, new_shared_status, SessionCommand, SharedStatus};

/// How long teardown waits for each task before abandoning it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Fixed-period full-state poll.  A slow request delays the next tick; ticks
/// are never stacked.
pub async fn poll_loop(
    backend: Arc<dyn TelemetryBackend>,
    reconciler: SharedReconciler,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let max_age = period * 3;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let result = tokio::select! {
            r = backend.fetch_combined() => r,
            _ = shutdown.changed() => break,
        };

        {
            let mut r = lock(&reconciler);
            r.apply_poll(result);
            r.check_liveness(Instant::now(), max_age);
        }
    }
    log::debug!("poll loop stopped");
}

/// Run one blocking pipeline step on the blocking pool and hand the
/// pipeline back.  `None` if the step panicked; the pipeline was dropped
/// (and so released) during unwinding.
async fn off_worker<S, T, F>(mut pipeline: FramePipeline<S>, step: F) -> Option<(FramePipeline<S>, T)>
where
    S: FrameSource + 'static,
    T: Send + 'static,
    F: FnOnce(&mut FramePipeline<S>) -> T + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let out = step(&mut pipeline);
        (pipeline, out)
    })
    .await;

    match joined {
        Ok(done) => Some(done),
        Err(e) => {
            log::error!("frames: pipeline step panicked: {e}");
            None
        }
    }
}

/// Frame timer.  Opens the camera, ticks the pipeline, and releases the
/// camera on the way out whatever happened.  Decoding and JPEG encoding run
/// on the blocking pool so the poll and push tasks are never starved.
pub async fn frame_loop<S: FrameSource + 'static>(
    pipeline: FramePipeline<S>,
    sink: Arc<dyn FrameSink>,
    period: Duration,
    status: SharedStatus,
    mut shutdown: watch::Receiver<bool>,
) {
    lock_status(&status).camera = CameraStatus::Starting;
    let Some((mut pipeline, camera)) = off_worker(pipeline, |p| p.start()).await else {
        lock_status(&status).camera = CameraStatus::Error;
        return;
    };
    lock_status(&status).camera = camera;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let tick_sink = Arc::clone(&sink);
        pipeline = match off_worker(pipeline, move |p| p.tick(tick_sink.as_ref())).await {
            Some((p, _outcome)) => p,
            None => {
                lock_status(&status).camera = CameraStatus::Error;
                return;
            }
        };
        {
            let mut s = lock_status(&status);
            s.camera = pipeline.status();
            s.frames = pipeline.stats();
        }
    }

    pipeline.release();
    lock_status(&status).camera = pipeline.status();
    log::debug!("frame loop stopped");
}

/// Panel commands.  Runs one health check on startup.
pub async fn command_loop(
    backend: Arc<dyn TelemetryBackend>,
    reconciler: SharedReconciler,
    status: SharedStatus,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next = Some(SessionCommand::CheckHealth);

    loop {
        let command = match next.take() {
            Some(c) => c,
            None => tokio::select! {
                c = commands.recv() => match c {
                    Some(c) => c,
                    None => break,
                },
                _ = shutdown.changed() => break,
            },
        };

        match command {
            SessionCommand::CheckHealth => {
                let report = backend.health().await;
                log::debug!(
                    "health: {:?} {} ms {}",
                    report.status,
                    report.latency_ms,
                    report.version
                );
                lock_status(&status).health = Some(report);
            }
            SessionCommand::Recalibrate => {
                lock_status(&status).calibration_requested = true;
                let result = backend.reset_calibration().await;
                let mut s = lock_status(&status);
                s.calibration_requested = false;
                match result {
                    Ok(()) => {
                        log::info!("calibration reset requested");
                        lock(&reconciler).begin_calibration();
                        s.last_error = None;
                    }
                    Err(e) => {
                        log::warn!("calibration reset failed: {e}");
                        s.last_error = Some(format!("Calibration reset failed: {e}"));
                    }
                }
            }
        }
    }
    log::debug!("command loop stopped");
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    runtime: Option<Runtime>,
    shutdown: watch::Sender<bool>,
    commands: mpsc::Sender<SessionCommand>,
    reconciler: SharedReconciler,
    status: SharedStatus,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Start against the configured HTTP backend, replaying frames from the
    /// configured directory.
    pub fn start(config: &AppConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("session")
            .enable_all()
            .build()?;
        let backend: Arc<dyn TelemetryBackend> =
            Arc::new(HttpBackend::from_config(&config.backend));
        let source = ImageSequenceSource::new(config.frames_dir());
        Ok(Self::start_on(runtime, backend, source, config))
    }

    /// Start on an existing runtime with explicit collaborators.
    pub fn start_on<S: FrameSource + 'static>(
        runtime: Runtime,
        backend: Arc<dyn TelemetryBackend>,
        source: S,
        config: &AppConfig,
    ) -> Self {
        let reconciler = new_shared_reconciler(config.backend.history_len);
        let status = new_shared_status();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (push, push_handle) = push_channel(&config.backend, Arc::clone(&reconciler));

        let mut tasks = Vec::new();

        tasks.push(runtime.spawn(poll_loop(
            Arc::clone(&backend),
            Arc::clone(&reconciler),
            config.backend.poll_interval(),
            shutdown_rx.clone(),
        )));

        tasks.push(runtime.spawn(push.run(shutdown_rx.clone())));

        if config.frames.enabled {
            let pipeline = FramePipeline::from_config(source, &config.frames);
            tasks.push(runtime.spawn(frame_loop(
                pipeline,
                Arc::new(push_handle),
                config.frames.interval(),
                Arc::clone(&status),
                shutdown_rx.clone(),
            )));
        } else {
            log::info!("frame transmission disabled");
        }

        tasks.push(runtime.spawn(command_loop(
            backend,
            Arc::clone(&reconciler),
            Arc::clone(&status),
            command_rx,
            shutdown_rx,
        )));

        lock_status(&status).running = true;
        log::info!(
            "session started: poll {} every {} ms, push {}",
            config.backend.base_url,
            config.backend.poll_interval_ms,
            config.backend.push_url
        );

        Self {
            runtime: Some(runtime),
            shutdown: shutdown_tx,
            commands: command_tx,
            reconciler,
            status,
            tasks,
        }
    }

    pub fn reconciler(&self) -> SharedReconciler {
        Arc::clone(&self.reconciler)
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    /// Queue a command for the session.  Dropped if the session is gone or
    /// the queue is full.
    pub fn send(&self, command: SessionCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("session command {command:?} dropped: {e}");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Stop every task, close the push socket and release the camera.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        log::info!("session shutting down");
        let _ = self.shutdown.send(true);

        for task in self.tasks.drain(..) {
            let joined = runtime.block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, task).await });
            if joined.is_err() {
                log::warn!("session task did not stop within {SHUTDOWN_GRACE:?}; abandoning it");
            }
        }
        // Drops (and so releases) anything still alive inside abandoned tasks.
        runtime.shutdown_timeout(SHUTDOWN_GRACE);

        lock_status(&self.status).running = false;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::frames::{CaptureError, OutboundFrame};
    use crate::telemetry::{
        HealthReport, LinkStatus, PollPayload, SystemStatus, TransportError,
    };
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const BODY: &str = r#"{
        "sensor": {"temperature": 36.5, "hr": 72, "spo2": 97},
        "perclos": {"status": "Open", "perclos": 12.0},
        "head_position": {"angle_x": 0, "angle_y": 0, "angle_z": 0, "calibrated": true},
        "prediction": {"status": "Alert", "confidence": 0.9},
        "system_status": "Active"
    }"#;

    // ---- stubs ---

    #[derive(Default)]
    struct StubBackend {
        failing: AtomicBool,
        polls: AtomicUsize,
        resets: AtomicUsize,
        reject_reset: bool,
    }

    #[async_trait]
    impl TelemetryBackend for StubBackend {
        async fn fetch_combined(&self) -> Result<PollPayload, TransportError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(TransportError::Timeout)
            } else {
                Ok(PollPayload::parse(BODY)?)
            }
        }

        async fn health(&self) -> HealthReport {
            HealthReport {
                status: LinkStatus::Online,
                latency_ms: 3,
                version: "stub".into(),
            }
        }

        async fn reset_calibration(&self) -> Result<(), TransportError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            if self.reject_reset {
                Err(TransportError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    struct StubSource {
        released: Arc<AtomicBool>,
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn capture(&mut self) -> Result<DynamicImage, CaptureError> {
            Ok(DynamicImage::ImageRgb8(RgbImage::new(16, 16)))
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Acknowledges every frame immediately.
    #[derive(Default)]
    struct CountingSink {
        frames: AtomicUsize,
    }

    impl FrameSink for CountingSink {
        fn is_open(&self) -> bool {
            true
        }
        fn submit(&self, frame: OutboundFrame) -> bool {
            self.frames.fetch_add(1, Ordering::SeqCst);
            drop(frame);
            true
        }
    }

    // ---- poll_loop ---

    #[tokio::test]
    async fn poll_loop_merges_and_goes_offline_on_failure() {
        let backend = Arc::new(StubBackend::default());
        let reconciler = new_shared_reconciler(20);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(poll_loop(
            backend.clone(),
            reconciler.clone(),
            Duration::from_millis(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        {
            let r = lock(&reconciler);
            assert_eq!(r.current().system_status, SystemStatus::Active);
            assert_eq!(r.current().heart_rate, Some(72.0));
        }

        backend.failing.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        {
            let r = lock(&reconciler);
            assert_eq!(r.current().system_status, SystemStatus::Offline);
            assert_eq!(r.current().heart_rate, Some(72.0));
            assert!(r.health().consecutive_poll_failures >= 1);
        }

        tx.send(true).unwrap();
        task.await.unwrap();
        assert!(backend.polls.load(Ordering::SeqCst) >= 2);
    }

    // ---- frame_loop ---

    #[tokio::test]
    async fn frame_loop_streams_then_releases_camera() {
        let released = Arc::new(AtomicBool::new(false));
        let source = StubSource {
            released: released.clone(),
        };
        let pipeline = FramePipeline::from_config(source, &Default::default());
        let sink = Arc::new(CountingSink::default());
        let status = new_shared_status();
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(frame_loop(
            pipeline,
            sink.clone(),
            Duration::from_millis(5),
            status.clone(),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lock_status(&status).camera, CameraStatus::Streaming);
        assert!(sink.frames.load(Ordering::SeqCst) >= 2);

        tx.send(true).unwrap();
        task.await.unwrap();
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(lock_status(&status).camera, CameraStatus::Idle);
    }

    /// Records the thread every capture runs on.
    struct ThreadRecordingSource {
        threads: Arc<std::sync::Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl FrameSource for ThreadRecordingSource {
        fn open(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn capture(&mut self) -> Result<DynamicImage, CaptureError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(DynamicImage::ImageRgb8(RgbImage::new(16, 16)))
        }
        fn release(&mut self) {}
        fn name(&self) -> &str {
            "threads"
        }
    }

    #[tokio::test]
    async fn frame_work_runs_off_the_async_thread() {
        let threads = Arc::new(std::sync::Mutex::new(Vec::new()));
        let source = ThreadRecordingSource {
            threads: threads.clone(),
        };
        let pipeline = FramePipeline::from_config(source, &Default::default());
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(frame_loop(
            pipeline,
            Arc::new(CountingSink::default()),
            Duration::from_millis(5),
            new_shared_status(),
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        // The current-thread test runtime polls every task on this thread.
        let here = std::thread::current().id();
        let seen = threads.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|id| *id != here));
    }

    // ---- command_loop ---

    #[tokio::test]
    async fn recalibrate_puts_reconciler_into_calibration() {
        let backend = Arc::new(StubBackend::default());
        let reconciler = new_shared_reconciler(20);
        lock(&reconciler).apply_poll_message(BODY);
        let status = new_shared_status();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(command_loop(
            backend.clone(),
            reconciler.clone(),
            status.clone(),
            cmd_rx,
            rx,
        ));

        cmd_tx.send(SessionCommand::Recalibrate).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.resets.load(Ordering::SeqCst), 1);
        assert!(lock(&reconciler).is_calibrating());
        assert_eq!(
            lock(&reconciler).current().system_status,
            SystemStatus::Initializing
        );
        {
            let s = lock_status(&status);
            assert_eq!(s.health.as_ref().map(|h| h.version.as_str()), Some("stub"));
            assert!(s.last_error.is_none());
        }

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_recalibrate_is_reported_not_applied() {
        let backend = Arc::new(StubBackend {
            reject_reset: true,
            ..StubBackend::default()
        });
        let reconciler = new_shared_reconciler(20);
        lock(&reconciler).apply_poll_message(BODY);
        let status = new_shared_status();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (_tx, rx) = watch::channel(false);

        let task = tokio::spawn(command_loop(
            backend,
            reconciler.clone(),
            status.clone(),
            cmd_rx,
            rx,
        ));

        cmd_tx.send(SessionCommand::Recalibrate).await.unwrap();
        drop(cmd_tx);
        task.await.unwrap();

        assert!(!lock(&reconciler).is_calibrating());
        assert!(lock_status(&status)
            .last_error
            .as_deref()
            .unwrap()
            .contains("Calibration reset failed"));
    }

    // ---- Session ---

    #[test]
    fn session_shutdown_stops_everything_and_releases_camera() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let config = AppConfig {
            backend: BackendConfig {
                push_url: "ws://127.0.0.1:9/ws".into(),
                poll_interval_ms: 10,
                push_reconnect_ms: 20,
                request_timeout_ms: 200,
                ..BackendConfig::default()
            },
            ..AppConfig::default()
        };

        let mut session = Session::start_on(
            runtime,
            Arc::new(StubBackend::default()),
            StubSource {
                released: released.clone(),
            },
            &config,
        );
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(
            lock(&session.reconciler()).current().system_status,
            SystemStatus::Active
        );
        assert!(session.send(SessionCommand::CheckHealth));

        session.shutdown();
        session.shutdown();
        assert!(!session.is_running());
        assert!(released.load(Ordering::SeqCst));
        assert!(!lock_status(&session.status()).running);
        assert!(!lock(&session.reconciler()).health().push_ok);
        assert!(!session.send(SessionCommand::CheckHealth));
    }
}
