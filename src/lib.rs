//! tinyaudio - minimal low-latency PCM tone playback engine
//!
//! A generation thread synthesizes interleaved f32 frames into a lock-free
//! SPSC ring; a platform backend (oboe on Android, cpal on desktop, or a
//! push loop for headless/offline output) drains the ring from its render
//! context. Underruns render silence, hardware faults surface through a
//! non-blocking event channel, and nothing in the render path allocates,
//! locks, or blocks.
//!
//! Quick start:
//!
//! ```no_run
//! use tinyaudio::api;
//!
//! api::start_tone()?;            // 440 Hz on the default output device
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! api::stop_tone()?;
//! api::shutdown()?;
//! # Ok::<(), tinyaudio::error::AudioError>(())
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod ring;
pub mod synth;

pub use config::{AudioFormat, EngineConfig, SampleFormat, ToneConfig};
pub use engine::{EngineEvent, PlaybackEngine, SessionState};
pub use error::AudioError;

/// Install the process-wide tracing subscriber. Safe to call repeatedly;
/// only the first call takes effect.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Install the process-wide tracing subscriber, routed to logcat.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    if let Ok(layer) = tracing_android::layer("tinyaudio") {
        let _ = tracing_subscriber::registry().with(layer).try_init();
    }
}
