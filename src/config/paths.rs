//! Where the dashboard keeps `settings.toml` and its replay frames.
//!
//! ```text
//! <config dir>/fatigue-dashboard/settings.toml
//! <local data dir>/fatigue-dashboard/frames/    default frame source
//! ```

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Replayed when `frames.source_dir` is unset.
    pub frames_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "fatigue-dashboard";

    /// `.` stands in for any platform dir `dirs` cannot resolve.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let frames_dir = data_dir.join("frames");

        Self {
            config_dir,
            settings_file,
            frames_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
