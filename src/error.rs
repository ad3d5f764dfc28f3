// Audio error types for the playback engine

use std::fmt;

use tracing::error;

/// Log an audio error with structured context
///
/// The logging is non-blocking and must never be called from the
/// real-time render callback.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!("Audio error in {}: {}", context, err);
}

/// Errors raised by the playback engine and its backends.
///
/// Open-time failures (`UnsupportedFormat`, `DeviceUnavailable`) are reported
/// synchronously to the caller and are not retried automatically. Failures
/// during rendering surface as `HardwareError` through the engine's event
/// channel, never out of the real-time callback itself.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The requested audio format is not supported by the device or engine
    UnsupportedFormat { details: String },

    /// No usable output device, or the device refused to open
    DeviceUnavailable { reason: String },

    /// Hardware or stream error during playback
    HardwareError { details: String },

    /// Engine configuration is inconsistent (buffer sizing, tone range)
    InvalidConfig { details: String },

    /// Playback session is already running
    AlreadyRunning,

    /// Playback session is not running
    NotRunning,

    /// Playback session has been closed and cannot be reused
    SessionClosed,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::UnsupportedFormat { details } => {
                write!(f, "unsupported audio format: {}", details)
            }
            AudioError::DeviceUnavailable { reason } => {
                write!(f, "audio device unavailable: {}", reason)
            }
            AudioError::HardwareError { details } => {
                write!(f, "hardware error: {}", details)
            }
            AudioError::InvalidConfig { details } => {
                write!(f, "invalid engine configuration: {}", details)
            }
            AudioError::AlreadyRunning => {
                write!(f, "playback already running; call stop() first")
            }
            AudioError::NotRunning => {
                write!(f, "playback not running; call start() first")
            }
            AudioError::SessionClosed => {
                write!(f, "playback session closed; create a new session")
            }
            AudioError::LockPoisoned { component } => {
                write!(f, "lock poisoned on {}", component)
            }
        }
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AudioError::UnsupportedFormat {
            details: "3 channels".to_string(),
        };
        assert!(err.to_string().contains("unsupported audio format"));

        let err = AudioError::DeviceUnavailable {
            reason: "no default output device".to_string(),
        };
        assert!(err.to_string().contains("no default output device"));

        assert!(AudioError::AlreadyRunning
            .to_string()
            .contains("already running"));
        assert!(AudioError::NotRunning.to_string().contains("not running"));
        assert!(AudioError::SessionClosed.to_string().contains("closed"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
