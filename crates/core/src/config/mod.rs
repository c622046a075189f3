use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SeaLevelError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()
    }

    /// Rejects zero periods and clamps values with a fixed legal range.
    pub fn validate(mut self) -> Result<Self> {
        if self.playback.tick_period_ms == 0 {
            return Err(SeaLevelError::msg("playback.tick_period_ms must be positive"));
        }
        if self.audio.poll_interval_ms == 0 {
            return Err(SeaLevelError::msg("audio.poll_interval_ms must be positive"));
        }
        if self.render.frame_interval_ms == 0 {
            return Err(SeaLevelError::msg("render.frame_interval_ms must be positive"));
        }
        self.audio.poll_interval_ms = self.audio.poll_interval_ms.min(MAX_POLL_INTERVAL_MS);
        self.audio.volume_percent = self.audio.volume_percent.clamp(0.0, 100.0);
        self.render.wave_points = self.render.wave_points.max(1);
        Ok(self)
    }
}

/// Audio progress is never polled less often than this.
pub const MAX_POLL_INTERVAL_MS: u64 = 100;

/// Autoplay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_period_ms: u64,
    pub default_scenario: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            default_scenario: "1.5".to_string(),
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub poll_interval_ms: u64,
    pub volume_percent: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: MAX_POLL_INTERVAL_MS,
            volume_percent: 70.0,
        }
    }
}

/// Chart geometry and wave shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub wave_points: usize,
    pub amplitude: f64,
    pub frequency: f64,
    pub frame_interval_ms: u64,
    /// Multiplier applied to the highest value to leave room above it.
    pub headroom: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 360.0,
            margin: 24.0,
            wave_points: 40,
            amplitude: 4.0,
            frequency: 0.015,
            frame_interval_ms: 16,
            headroom: 1.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_use_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "playback": { "tick_period_ms": 250 } }"#).unwrap();
        let config = config.validate().unwrap();

        assert_eq!(config.playback.tick_period_ms, 250);
        assert_eq!(config.playback.default_scenario, "1.5");
        assert_eq!(config.audio.poll_interval_ms, 100);
        assert_eq!(config.render.wave_points, 40);
    }

    #[test]
    fn loads_and_validates_files() {
        let path = std::env::temp_dir().join(format!(
            "sea-level-wave-config-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{ "playback": { "default_scenario": "2.5" }, "audio": { "poll_interval_ms": 400 } }"#,
        )
        .unwrap();

        let config = AppConfig::from_json_file(&path);
        std::fs::remove_file(&path).unwrap();
        let config = config.unwrap();

        assert_eq!(config.playback.default_scenario, "2.5");
        assert_eq!(config.playback.tick_period_ms, 1000);
        assert_eq!(config.audio.poll_interval_ms, MAX_POLL_INTERVAL_MS);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("sea-level-wave-config-does-not-exist.json");
        let err = AppConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, SeaLevelError::Io(_)));
    }

    #[test]
    fn poll_interval_is_bounded() {
        let mut config = AppConfig::default();
        config.audio.poll_interval_ms = 500;
        config.audio.volume_percent = 140.0;

        let config = config.validate().unwrap();
        assert_eq!(config.audio.poll_interval_ms, MAX_POLL_INTERVAL_MS);
        assert_eq!(config.audio.volume_percent, 100.0);
    }

    #[test]
    fn rejects_zero_tick_period() {
        let mut config = AppConfig::default();
        config.playback.tick_period_ms = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_period_ms"));
    }
}
