//! Backend abstractions for platform audio output.
//!
//! A backend owns the connection to one output device and drives a
//! [`FrameSupplier`] either from a platform-scheduled real-time callback
//! (cpal on desktop, oboe on Android) or from a loop thread it schedules
//! itself ([`PushBackend`]).

use crate::config::AudioFormat;
use crate::engine::supplier::FrameSupplier;
use crate::error::AudioError;

/// Trait implemented by platform-specific audio output backends.
///
/// Lifecycle: `open` -> `start` -> `stop` -> (`start` again, or) `close`.
///
/// Contract highlights:
/// - `open` reports `UnsupportedFormat` / `DeviceUnavailable` synchronously
///   and is never retried automatically.
/// - `start` hands the supplier to the render context; the supplier must be
///   the only consumer of the session's frame ring.
/// - `stop` is a synchronization barrier: once it returns, no further
///   supplier invocation for this device is in flight.
/// - `close` releases the device and is idempotent.
/// - A hardware failure during rendering is flagged through the supplier's
///   [`RenderStats`](crate::engine::supplier::RenderStats), never propagated
///   out of the callback.
pub trait OutputBackend: Send + Sync {
    fn open(&self, format: &AudioFormat) -> Result<(), AudioError>;
    fn start(&self, supplier: FrameSupplier) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
    fn close(&self) -> Result<(), AudioError>;

    /// Largest single frame request the render context may issue.
    ///
    /// The engine sizes the frame ring to at least twice this value so a
    /// callback can always be satisfied in one pass.
    fn max_callback_frames(&self) -> usize;
}

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_os = "android")] {
        mod oboe;
        pub use self::oboe::OboeBackend;
    } else {
        mod cpal;
        pub use self::cpal::CpalBackend;
    }
}

mod push;
pub use push::{PushBackend, PushSink, SilentSink, WavSink};

use std::sync::Arc;

/// Default callback backend for the current platform.
pub fn default_backend() -> Arc<dyn OutputBackend> {
    cfg_if! {
        if #[cfg(target_os = "android")] {
            Arc::new(OboeBackend::new())
        } else {
            Arc::new(CpalBackend::new())
        }
    }
}
