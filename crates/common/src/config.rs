//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default export settings.
    pub export: ExportDefaults,

    /// Zoom-detection thresholds. These vary per user and are deliberately
    /// configuration rather than constants.
    pub detector: DetectorDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Default FPS.
    pub fps: u32,

    /// Default video codec.
    pub video_codec: String,

    /// Default video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Frames per export chunk.
    pub chunk_size_frames: u64,

    /// Maximum parallel chunk renders when using the worker pool.
    pub max_parallel_chunks: usize,
}

/// Default zoom detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorDefaults {
    /// Pointer movement (pixels) counted as activity.
    pub activity_threshold_px: f64,

    /// Idle gap (ms) after which a zoom window closes.
    pub idle_timeout_ms: f64,

    /// Trailing fade (ms) appended after the last activity.
    pub fade_ms: f64,

    /// Windows closer than this gap (ms) are merged.
    pub merge_gap_ms: f64,

    /// Windows shorter than this (ms) are discarded as noise.
    pub min_duration_ms: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            export: ExportDefaults::default(),
            detector: DetectorDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            video_codec: "h264".to_string(),
            video_bitrate_kbps: 8000,
            chunk_size_frames: 2000,
            max_parallel_chunks: 2,
        }
    }
}

impl Default for DetectorDefaults {
    fn default() -> Self {
        Self {
            activity_threshold_px: 30.0,
            idle_timeout_ms: 2000.0,
            fade_ms: 300.0,
            merge_gap_ms: 400.0,
            min_duration_ms: 900.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelcut").join("config.json")
}
