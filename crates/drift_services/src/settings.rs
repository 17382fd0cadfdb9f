//! Settings management
//!
//! Every section and field falls back to its default, so a settings file
//! only needs the values it changes.

use std::path::{Path, PathBuf};

use drift_core::plane::MotionParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming an optional JSON settings file.
pub const SETTINGS_ENV: &str = "DRIFT_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub simulation: SimulationSettings,
    pub camera: CameraSettings,
    pub frame: FrameSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Drift".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub plane_count: usize,
    pub plane_scale: f32,
    pub alpha: f32,
    /// `None` derives a seed from the clock at startup.
    pub seed: Option<u64>,
    pub bound: f32,
    pub max_speed: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let motion = MotionParams::default();
        Self {
            plane_count: 33,
            plane_scale: 2.0,
            alpha: 1.0,
            seed: None,
            bound: motion.bound,
            max_speed: motion.max_speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub light_position: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 8.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov_degrees: 65.0,
            near: 0.1,
            far: 100.0,
            light_position: [1.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Longest wait for a free in-flight slot before the frame is skipped.
    pub acquire_timeout_ms: u64,
    /// Frames between FPS log lines; 0 disables them.
    pub fps_log_interval: u64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 1000,
            fps_log_interval: 300,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Loads the file named by `DRIFT_SETTINGS`, or the defaults when unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => Self::load(path),
            None => {
                debug!("{SETTINGS_ENV} not set, using default settings");
                Ok(Self::default())
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn motion_params(&self) -> MotionParams {
        MotionParams {
            bound: self.simulation.bound,
            max_speed: self.simulation.max_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.simulation.plane_count, 33);
        assert_eq!(settings.camera.fov_degrees, 65.0);
        assert_eq!(settings.frame.acquire_timeout_ms, 1000);
        assert_eq!(settings.motion_params(), MotionParams::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_json(
            r#"{ "simulation": { "plane_count": 5, "seed": 42 }, "window": { "width": 640 } }"#,
        )
        .unwrap();
        assert_eq!(settings.simulation.plane_count, 5);
        assert_eq!(settings.simulation.seed, Some(42));
        assert_eq!(settings.simulation.plane_scale, 2.0);
        assert_eq!(settings.window.width, 640);
        assert_eq!(settings.window.height, 720);
        assert_eq!(settings.camera, CameraSettings::default());
    }

    #[test]
    fn written_settings_parse_back() {
        let mut settings = Settings::default();
        settings.camera.eye = [1.0, 2.0, 9.0];
        settings.simulation.seed = Some(7);
        let text = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&text).unwrap(), settings);
    }

    #[test]
    fn load_reports_missing_file_and_bad_json() {
        let dir = std::env::temp_dir();

        let missing = dir.join("drift-settings-missing.json");
        let _ = std::fs::remove_file(&missing);
        assert!(matches!(
            Settings::load(&missing),
            Err(SettingsError::Io { .. })
        ));

        let bad = dir.join(format!("drift-settings-bad-{}.json", std::process::id()));
        std::fs::write(&bad, "{ \"frame\": ").unwrap();
        assert!(matches!(Settings::load(&bad), Err(SettingsError::Parse { .. })));

        std::fs::write(&bad, r#"{ "frame": { "fps_log_interval": 0 } }"#).unwrap();
        let settings = Settings::load(&bad).unwrap();
        assert_eq!(settings.frame.fps_log_interval, 0);
        std::fs::remove_file(&bad).unwrap();
    }
}
