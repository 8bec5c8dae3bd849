//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every struct is `#[serde(default)]`: a hand-edited file that only sets a
//! few keys still loads, with the rest taken from the defaults below.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the poll channel, the push channel and the
/// auxiliary health / calibration endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the HTTP backend (poll, health, calibration reset).
    pub base_url: String,
    /// WebSocket URL of the push channel.
    pub push_url: String,
    /// Period of the full-state poll timer in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-request timeout for every HTTP call.
    pub request_timeout_ms: u64,
    /// Fixed delay before the push task re-dials a dropped connection.
    pub push_reconnect_ms: u64,
    /// Number of points kept in the in-memory heart-rate / temperature history.
    pub history_len: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            push_url: "ws://localhost:5000/ws".into(),
            poll_interval_ms: 500,
            request_timeout_ms: 2_000,
            push_reconnect_ms: 2_000,
            history_len: 20,
        }
    }
}

impl BackendConfig {
    /// Poll period; never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn push_reconnect(&self) -> Duration {
        Duration::from_millis(self.push_reconnect_ms)
    }
}

// ---------------------------------------------------------------------------
// RiskThresholds
// ---------------------------------------------------------------------------

/// Tunable thresholds of the rule-based fallback classifier.
///
/// PERCLOS values are percentages (0 – 100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Body temperature (°C) at or above which the tier is at least MEDIUM.
    pub temp_high: f64,
    /// PERCLOS at or above which the tier is at least MEDIUM.
    pub perclos_medium: f64,
    /// PERCLOS at or above which the tier is HIGH.
    pub perclos_high: f64,
    /// SpO₂ (%) below which the tier is HIGH.
    pub spo2_low: f64,
    /// Lower bound of the normal heart-rate band (bpm).
    pub hr_low: f64,
    /// Upper bound of the normal heart-rate band (bpm).
    pub hr_high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            temp_high: 38.0,
            perclos_medium: 33.0,
            perclos_high: 75.0,
            spo2_low: 60.0,
            hr_low: 50.0,
            hr_high: 110.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PoseConfig
// ---------------------------------------------------------------------------

/// Smoothing parameters for the head-pose animation.
///
/// Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Anatomical pitch bound (±).
    pub pitch_limit: f64,
    /// Anatomical yaw bound (±).
    pub yaw_limit: f64,
    /// Anatomical roll bound (±).
    pub roll_limit: f64,
    /// Changes smaller than this against the last accepted target are ignored.
    pub deadzone_deg: f64,
    /// Interpolation factor for the pose angles.
    pub pose_alpha: f64,
    /// Interpolation factor for jaw openness (MAR).
    pub jaw_alpha: f64,
    /// Multiplier applied to roll before interpolation.
    pub roll_damping: f64,
    /// Distance below which an interpolated value snaps onto its target.
    pub settle_epsilon: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            pitch_limit: 40.0,
            yaw_limit: 45.0,
            roll_limit: 20.0,
            deadzone_deg: 1.5,
            pose_alpha: 0.1,
            jaw_alpha: 0.2,
            roll_damping: 0.5,
            settle_epsilon: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Settings for the frame capture → downsample → compress → push loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Whether frames are captured and pushed at all.
    pub enabled: bool,
    /// Period of the capture timer in milliseconds.
    pub interval_ms: u64,
    /// Frames wider than this are downscaled (aspect ratio preserved).
    pub target_width: u32,
    /// JPEG quality, 1 – 100.
    pub jpeg_quality: u8,
    /// Directory of still images replayed as the frame source.  `None` means
    /// [`AppPaths::frames_dir`].
    pub source_dir: Option<PathBuf>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 100,
            target_width: 480,
            jpeg_quality: 50,
            source_dir: None,
        }
    }
}

impl FrameConfig {
    /// Capture period; never zero.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// AlarmConfig
// ---------------------------------------------------------------------------

/// Shape of the synthesised alarm tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Tone frequency in Hz.
    pub tone_hz: f32,
    /// Output amplitude, 0.0 – 1.0.
    pub volume: f32,
    /// Length of each beep.
    pub beep_on_ms: u32,
    /// Silence between beeps.
    pub beep_off_ms: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            tone_hz: 880.0,
            volume: 0.4,
            beep_on_ms: 400,
            beep_off_ms: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Operator panel window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Keep the panel floating above all other windows.
    pub always_on_top: bool,
    /// Initial inner size of the window in points.
    pub window_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            always_on_top: false,
            window_size: (460.0, 560.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use fatigue_dashboard::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.backend.poll_interval_ms > 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Poll / push / health endpoints.
    pub backend: BackendConfig,
    /// Rule-based classifier thresholds.
    pub risk: RiskThresholds,
    /// Head-pose animation smoothing.
    pub pose: PoseConfig,
    /// Frame transmission loop.
    pub frames: FrameConfig,
    /// Alarm tone.
    pub alarm: AlarmConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory replayed by the frame source.
    pub fn frames_dir(&self) -> PathBuf {
        self.frames
            .source_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().frames_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.backend.base_url, loaded.backend.base_url);
        assert_eq!(original.backend.push_url, loaded.backend.push_url);
        assert_eq!(
            original.backend.poll_interval_ms,
            loaded.backend.poll_interval_ms
        );
        assert_eq!(original.risk, loaded.risk);
        assert_eq!(original.pose, loaded.pose);
        assert_eq!(original.frames.target_width, loaded.frames.target_width);
        assert_eq!(original.frames.source_dir, loaded.frames.source_dir);
        assert_eq!(original.alarm.tone_hz, loaded.alarm.tone_hz);
        assert_eq!(original.ui.window_size, loaded.ui.window_size);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.backend.poll_interval_ms, 500);
        assert_eq!(config.risk, RiskThresholds::default());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.backend.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.backend.history_len, 20);
        assert_eq!(cfg.risk.temp_high, 38.0);
        assert_eq!(cfg.risk.perclos_medium, 33.0);
        assert_eq!(cfg.risk.perclos_high, 75.0);
        assert_eq!(cfg.risk.spo2_low, 60.0);
        assert_eq!((cfg.risk.hr_low, cfg.risk.hr_high), (50.0, 110.0));
        assert_eq!(cfg.pose.pitch_limit, 40.0);
        assert_eq!(cfg.pose.yaw_limit, 45.0);
        assert_eq!(cfg.pose.roll_limit, 20.0);
        assert_eq!(cfg.pose.pose_alpha, 0.1);
        assert_eq!(cfg.pose.jaw_alpha, 0.2);
        assert_eq!(cfg.frames.interval(), Duration::from_millis(100));
        assert_eq!(cfg.frames.target_width, 480);
        assert_eq!(cfg.frames.jpeg_quality, 50);
    }

    /// A file that only overrides a couple of thresholds still loads.
    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[risk]\nperclos_medium = 25.0\nperclos_high = 50.0\n\n[backend]\nbase_url = \"http://10.0.0.2:5000\"\n",
        )
        .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.risk.perclos_medium, 25.0);
        assert_eq!(cfg.risk.perclos_high, 50.0);
        assert_eq!(cfg.risk.temp_high, 38.0);
        assert_eq!(cfg.backend.base_url, "http://10.0.0.2:5000");
        assert_eq!(cfg.backend.poll_interval_ms, 500);
    }

    #[test]
    fn explicit_frames_dir_wins() {
        let mut cfg = AppConfig::default();
        cfg.frames.source_dir = Some(PathBuf::from("/tmp/replay"));
        assert_eq!(cfg.frames_dir(), PathBuf::from("/tmp/replay"));
    }

    #[test]
    fn zero_intervals_are_raised_to_one_ms() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[backend]\npoll_interval_ms = 0\n\n[frames]\ninterval_ms = 0\n")
            .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.backend.poll_interval_ms, 0);
        assert_eq!(cfg.backend.poll_interval(), Duration::from_millis(1));
        assert_eq!(cfg.frames.interval(), Duration::from_millis(1));
    }
}
