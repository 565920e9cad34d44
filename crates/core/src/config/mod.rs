use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub title: TitleConfig,
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Parses a configuration document. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Playback synchronisation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Largest tolerated video/audio drift before video is dropped.
    pub drift_tolerance_seconds: f64,
    /// Period of the device pixel density poll.
    pub density_poll_interval_ms: u64,
}

impl SyncConfig {
    pub fn density_poll_interval(&self) -> Duration {
        Duration::from_millis(self.density_poll_interval_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_tolerance_seconds: 0.2,
            density_poll_interval_ms: 1000,
        }
    }
}

/// Timing of the title card shown before a song starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub hold_ms: u64,
    /// Opacity removed on every fade frame.
    pub fade_step: f32,
}

impl TitleConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            hold_ms: 3000,
            fade_step: 0.05,
        }
    }
}

/// Configuration specific to the live capture pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Blocks quieter than this RMS level are treated as silence.
    pub min_rms: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 2048,
            min_rms: 0.01,
            min_frequency_hz: 70.0,
            max_frequency_hz: 1100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.drift_tolerance_seconds, 0.2);
        assert_eq!(config.sync.density_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.title.hold(), Duration::from_secs(3));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "sync": { "drift_tolerance_seconds": 0.5 } }"#).unwrap();
        assert_eq!(config.sync.drift_tolerance_seconds, 0.5);
        assert_eq!(config.sync.density_poll_interval_ms, 1000);
        assert_eq!(config.capture.sample_rate, 48_000);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json_str("{ sync: ").unwrap_err();
        assert!(matches!(err, crate::SingalongError::Json(_)));
    }
}
