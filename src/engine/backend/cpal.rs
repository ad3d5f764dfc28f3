//! CPAL-based callback backend for desktop platforms (Linux, macOS, Windows)
//!
//! The `cpal::Stream` is built, played, and dropped on a dedicated owner
//! thread; `start` performs an init handshake over a channel so open/start
//! failures are still reported synchronously to the caller. Stopping joins
//! that thread, which drops the stream first - the barrier that guarantees
//! no callback is in flight once `stop` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, warn};

use crate::config::AudioFormat;
use crate::engine::supplier::FrameSupplier;
use crate::error::{log_audio_error, AudioError};

use super::OutputBackend;

/// Upper bound on a single cpal callback request, used for ring sizing.
/// Matches the largest period observed on common hosts with headroom.
const MAX_CALLBACK_FRAMES: usize = 2048;

struct StreamWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Inner {
    format: Option<AudioFormat>,
    worker: Option<StreamWorker>,
    closed: bool,
}

/// Desktop output backend driving the default cpal device.
///
/// Samples are rendered as f32 regardless of the session's logical sample
/// format; the host converts at the device boundary.
pub struct CpalBackend {
    inner: Mutex<Inner>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                format: None,
                worker: None,
                closed: false,
            }),
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, AudioError> {
        self.inner.lock().map_err(|_| {
            let err = AudioError::LockPoisoned {
                component: "cpal_backend".to_string(),
            };
            log_audio_error(&err, "lock_inner");
            err
        })
    }

    /// Find the default output device and a stream config matching `format`.
    fn negotiate(format: &AudioFormat) -> Result<(cpal::Device, cpal::StreamConfig), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable {
                reason: "no default output device found".to_string(),
            })?;

        let ranges = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceUnavailable {
                reason: format!("failed to query output configs: {}", e),
            })?;

        let rate = cpal::SampleRate(format.sample_rate_hz);
        for range in ranges {
            if range.channels() == format.channel_count
                && range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
            {
                return Ok((device, range.with_sample_rate(rate).config()));
            }
        }

        Err(AudioError::UnsupportedFormat {
            details: format!(
                "device has no f32 output path for {} Hz / {} channel(s)",
                format.sample_rate_hz, format.channel_count
            ),
        })
    }

    fn build_stream(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut supplier: FrameSupplier,
    ) -> Result<cpal::Stream, AudioError> {
        let stats = supplier.stats();
        let err_fn = move |err: cpal::StreamError| {
            // Runs on cpal's own (non-real-time) error path; defer to the
            // engine via the fault flag instead of propagating
            warn!("output stream error: {}", err);
            stats.flag_fault();
        };

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time callback: copy from the ring, silence on
                    // underrun. No allocations, locks, or blocking here.
                    supplier.fill(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::DeviceUnavailable {
                reason: format!("failed to build output stream: {:?}", e),
            })
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for CpalBackend {
    fn open(&self, format: &AudioFormat) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        format.validate()?;
        // Probe now so UnsupportedFormat/DeviceUnavailable surface here,
        // synchronously, rather than inside start()
        let _ = Self::negotiate(format)?;
        inner.format = Some(*format);
        Ok(())
    }

    fn start(&self, supplier: FrameSupplier) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        if inner.worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        let format = inner.format.ok_or_else(|| AudioError::DeviceUnavailable {
            reason: "open() has not been called".to_string(),
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        // cpal streams are not guaranteed Send, so the stream lives its
        // whole life on this thread; the init channel hands the open
        // result back to the caller (same handshake the blocking
        // backends use)
        let handle = thread::spawn(move || {
            let stream = match Self::negotiate(&format)
                .and_then(|(device, config)| Self::build_stream(&device, &config, supplier))
            {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = init_tx.send(Err(AudioError::HardwareError {
                    details: format!("failed to start output stream: {}", e),
                }));
                return;
            }
            let _ = init_tx.send(Ok(()));

            while !stop_flag.load(Ordering::Acquire) {
                thread::park();
            }
            drop(stream);
            debug!("cpal stream thread exited");
        });

        match init_rx.recv() {
            Ok(Ok(())) => {
                inner.worker = Some(StreamWorker { stop, handle });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                log_audio_error(&err, "cpal_start");
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::HardwareError {
                    details: "stream thread exited before initialization".to_string(),
                })
            }
        }
    }

    fn stop(&self) -> Result<(), AudioError> {
        let worker = {
            let mut inner = self.lock_inner()?;
            inner.worker.take().ok_or(AudioError::NotRunning)?
        };

        worker.stop.store(true, Ordering::Release);
        worker.handle.thread().unpark();
        // Joining drops the stream on its owner thread; after this no
        // callback for the session is in flight
        if worker.handle.join().is_err() {
            warn!("cpal stream thread panicked during stop");
        }
        Ok(())
    }

    fn close(&self) -> Result<(), AudioError> {
        let worker = {
            let mut inner = self.lock_inner()?;
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.format = None;
            inner.worker.take()
        };

        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            if worker.handle.join().is_err() {
                warn!("cpal stream thread panicked during close");
            }
        }
        Ok(())
    }

    fn max_callback_frames(&self) -> usize {
        MAX_CALLBACK_FRAMES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_before_open_is_idempotent() {
        let backend = CpalBackend::new();
        assert!(backend.close().is_ok());
        assert!(backend.close().is_ok());
    }

    #[test]
    fn test_open_after_close_is_rejected() {
        let backend = CpalBackend::new();
        backend.close().unwrap();
        assert_eq!(
            backend.open(&AudioFormat::default()),
            Err(AudioError::SessionClosed)
        );
    }

    #[test]
    fn test_stop_without_start_reports_not_running() {
        let backend = CpalBackend::new();
        assert_eq!(backend.stop(), Err(AudioError::NotRunning));
    }

    #[test]
    fn test_invalid_format_rejected_before_device_probe() {
        let backend = CpalBackend::new();
        let bad = AudioFormat {
            channel_count: 3,
            ..AudioFormat::default()
        };
        assert!(matches!(
            backend.open(&bad),
            Err(AudioError::UnsupportedFormat { .. })
        ));
    }
}
