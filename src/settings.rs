//! Layered settings: logging config, plus the engine tunables that ship as
//! defaults. Built-in defaults, optionally overridden by a TOML file;
//! absence of the file is not an error.

use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};

use crate::error::KumiteResult;

#[derive(Debug, Deserialize)]
pub struct Logging {
    pub level: String,
    pub file: String,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "info".to_string(),
            file: "kumite.log".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: Logging,
}

pub fn read() -> Result<Settings, ConfigError> {
    let mut s = Config::new();
    s.merge(File::with_name("config/dev.toml").required(false))?;
    if s.get::<Logging>("logging").is_err() {
        return Ok(Settings {
            logging: Logging::default(),
        });
    }
    s.try_into()
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionSettings {
    pub max_window_frames: u32,
    pub motion_to_button_gap_frames: u32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        MotionSettings {
            max_window_frames: 20,
            motion_to_button_gap_frames: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StepperSettings {
    pub default_timeout_frames: u32,
}

impl Default for StepperSettings {
    fn default() -> Self {
        StepperSettings {
            default_timeout_frames: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_entries: usize,
    pub timeline_cap_frames: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        HistorySettings {
            max_entries: 512,
            timeline_cap_frames: 240,
        }
    }
}

/// Tunables a host may override without recompiling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineSettings {
    pub motion: MotionSettings,
    pub stepper: StepperSettings,
    pub history: HistorySettings,
}

impl EngineSettings {
    /// Built-in defaults, identical to what a missing settings file yields.
    pub fn defaults() -> Self {
        EngineSettings::default()
    }

    /// Merge an optional TOML file over the built-in defaults.
    pub fn read(path: &str) -> KumiteResult<EngineSettings> {
        let mut s = Config::new();
        s.merge(File::with_name(path).required(false))?;

        let mut settings = EngineSettings::defaults();
        if let Ok(max_window) = s.get_int("motion.max_window_frames") {
            settings.motion.max_window_frames = max_window as u32;
        }
        if let Ok(gap) = s.get_int("motion.motion_to_button_gap_frames") {
            settings.motion.motion_to_button_gap_frames = gap as u32;
        }
        if let Ok(timeout) = s.get_int("stepper.default_timeout_frames") {
            settings.stepper.default_timeout_frames = timeout as u32;
        }
        if let Ok(max_entries) = s.get_int("history.max_entries") {
            settings.history.max_entries = max_entries as usize;
        }
        if let Ok(cap) = s.get_int("history.timeline_cap_frames") {
            settings.history.timeline_cap_frames = cap as usize;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_fixed() {
        assert_eq!(EngineSettings::defaults(), EngineSettings::defaults());
        assert_eq!(EngineSettings::defaults().motion.max_window_frames, 20);
        assert_eq!(
            EngineSettings::defaults().motion.motion_to_button_gap_frames,
            12
        );
        assert_eq!(EngineSettings::defaults().stepper.default_timeout_frames, 60);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = EngineSettings::read("config/does-not-exist.toml").unwrap();
        assert_eq!(settings, EngineSettings::defaults());
    }
}
