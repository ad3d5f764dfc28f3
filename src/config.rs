//! Engine configuration: audio format, tone parameters, buffer sizing
//!
//! Configuration can be loaded from a JSON file for quick experimentation
//! without recompiling; missing or invalid files fall back to defaults.
//! The format is fixed for the lifetime of a playback session.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AudioError;

/// Sample encoding delivered to the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    Int16,
    Float32,
}

/// Fixed per-session output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
    /// Interleaved channel count (1 = mono, 2 = stereo)
    pub channel_count: u16,
    /// Sample encoding at the device boundary
    pub sample_format: SampleFormat,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            channel_count: 1,
            sample_format: SampleFormat::Int16,
        }
    }
}

impl AudioFormat {
    /// Validate the format before a session opens a device.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for a zero sample rate or a channel
    /// count other than 1 or 2.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate_hz == 0 {
            return Err(AudioError::UnsupportedFormat {
                details: "sample rate must be greater than 0".to_string(),
            });
        }
        if self.channel_count == 0 || self.channel_count > 2 {
            return Err(AudioError::UnsupportedFormat {
                details: format!(
                    "channel count must be 1 or 2 (got {})",
                    self.channel_count
                ),
            });
        }
        Ok(())
    }
}

/// Tone generator parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToneConfig {
    /// Tone frequency in Hz (must stay below sample_rate / 2)
    pub frequency_hz: f32,
    /// Peak amplitude in [0.0, 1.0]
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.5,
        }
    }
}

/// Complete playback engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub format: AudioFormat,
    pub tone: ToneConfig,
    /// Ring buffer capacity in frames; must be at least twice the
    /// backend's maximum callback request, or start() refuses to run
    pub ring_frames: usize,
    /// Frames generated per producer iteration
    pub chunk_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            tone: ToneConfig::default(),
            ring_frames: 8192,
            chunk_frames: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or
    /// cannot be parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
