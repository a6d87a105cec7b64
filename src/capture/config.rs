//! Capture and pipeline configuration.
//!
//! The receiver runs against a live camera feed, so the knobs here are
//! about throughput and overload protection rather than image quality:
//! worker pool sizing, the backpressure threshold, and where recovered
//! files land.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dispatch::{DecodeMode, ModeState};

/// Configuration for frame capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Camera device index or identifier.
    pub device_id: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Interval between stall checks, in milliseconds.
    pub watchdog_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 1920,
            height: 1080,
            fps: 30,
            watchdog_interval_ms: 2000,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.watchdog_interval_ms == 0 {
            return Err(ConfigError::InvalidWatchdogInterval);
        }
        Ok(())
    }
}

/// Configuration for the decode worker pool and dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of decode workers.
    pub workers: usize,
    /// Backpressure threshold as a multiple of the pool size.
    pub inflight_multiplier: usize,
    /// Decode mode: "auto", "b", or "4c".
    pub mode: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            inflight_multiplier: 2,
            mode: "auto".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > 64 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.inflight_multiplier == 0 {
            return Err(ConfigError::InvalidBackpressure);
        }
        self.mode_state()?;
        Ok(())
    }

    /// In-flight frame limit implied by this configuration.
    pub fn inflight_limit(&self) -> usize {
        self.workers * self.inflight_multiplier
    }

    /// Parses the mode field into the dispatcher's initial mode state.
    pub fn mode_state(&self) -> Result<ModeState, ConfigError> {
        if self.mode.eq_ignore_ascii_case("auto") {
            return Ok(ModeState::auto());
        }
        DecodeMode::parse(&self.mode)
            .map(ModeState::fixed)
            .ok_or_else(|| ConfigError::InvalidMode(self.mode.clone()))
    }
}

/// Configuration for file export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory recovered files are written into.
    pub output_dir: String,
    /// Decompression chunk size in bytes.
    pub chunk_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "received".to_string(),
            chunk_size: 128 * 1024,
        }
    }
}

impl ExportConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.output_dir.is_empty() {
            return Err(ConfigError::InvalidOutputDir);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid watchdog interval")]
    InvalidWatchdogInterval,
    #[error("invalid worker count (must be 1-64)")]
    InvalidWorkerCount,
    #[error("invalid backpressure multiplier")]
    InvalidBackpressure,
    #[error("unknown decode mode: {0}")]
    InvalidMode(String),
    #[error("invalid decompression chunk size")]
    InvalidChunkSize,
    #[error("invalid output directory")]
    InvalidOutputDir,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.dispatch.validate()?;
        self.export.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_zero_workers_invalid() {
        let mut config = DispatchConfig::default();
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn test_mode_parsing() {
        let mut config = DispatchConfig::default();
        assert!(matches!(config.mode_state(), Ok(ModeState::Auto { .. })));

        config.mode = "b".to_string();
        assert_eq!(
            config.mode_state().unwrap().latched(),
            Some(DecodeMode::B)
        );

        config.mode = "4c".to_string();
        assert_eq!(
            config.mode_state().unwrap().latched(),
            Some(DecodeMode::FourC)
        );

        config.mode = "bogus".to_string();
        assert!(matches!(
            config.mode_state(),
            Err(ConfigError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_inflight_limit() {
        let config = DispatchConfig {
            workers: 3,
            inflight_multiplier: 2,
            mode: "auto".to_string(),
        };
        assert_eq!(config.inflight_limit(), 6);
    }
}
