//! Push backend - blocking-write output on a thread the engine owns
//!
//! The callback backends (cpal, oboe) are pulled by the platform; this
//! backend instead schedules its own loop thread that repeatedly asks the
//! [`FrameSupplier`] for a chunk and pushes it into a [`PushSink`] with a
//! blocking write. This mirrors how ALSA/Pulse style APIs are driven, and
//! doubles as the deterministic headless path for tests and offline WAV
//! rendering.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AudioFormat;
use crate::engine::supplier::FrameSupplier;
use crate::error::{log_audio_error, AudioError};
use crate::synth::sample_to_i16;

use super::OutputBackend;

/// Destination for interleaved f32 chunks pushed by the loop thread.
///
/// `write` may block (it runs on the backend's own thread, not in a
/// real-time callback). A write error stops the loop and is surfaced
/// through the supplier's fault flag.
pub trait PushSink: Send + 'static {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), AudioError>;

    /// Called once when the loop thread exits.
    fn finalize(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Sink that discards samples while pacing writes to real time.
///
/// Useful for soak-testing the full pipeline on machines without an
/// audio device.
pub struct SilentSink {
    sample_rate_hz: u32,
    channel_count: u16,
}

impl SilentSink {
    pub fn new(format: &AudioFormat) -> Self {
        Self {
            sample_rate_hz: format.sample_rate_hz,
            channel_count: format.channel_count,
        }
    }
}

impl PushSink for SilentSink {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), AudioError> {
        let frames = interleaved.len() / self.channel_count as usize;
        let micros = frames as u64 * 1_000_000 / self.sample_rate_hz as u64;
        thread::sleep(Duration::from_micros(micros));
        Ok(())
    }
}

/// Sink that renders 16-bit PCM into a WAV file via hound.
///
/// Unpaced: the loop runs as fast as the producer supplies frames, so an
/// offline render finishes quicker than real time.
pub struct WavSink {
    writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, format: &AudioFormat) -> Result<Self, AudioError> {
        let spec = hound::WavSpec {
            channels: format.channel_count,
            sample_rate: format.sample_rate_hz,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(|e| {
            AudioError::DeviceUnavailable {
                reason: format!("failed to create WAV file: {}", e),
            }
        })?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl PushSink for WavSink {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), AudioError> {
        let writer = self.writer.as_mut().ok_or(AudioError::NotRunning)?;
        for &sample in interleaved {
            writer
                .write_sample(sample_to_i16(sample))
                .map_err(|e| AudioError::HardwareError {
                    details: format!("WAV write failed: {}", e),
                })?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), AudioError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| AudioError::HardwareError {
                details: format!("WAV finalize failed: {}", e),
            })?;
        }
        Ok(())
    }
}

struct PushWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Inner<S: PushSink> {
    format: Option<AudioFormat>,
    sink: Option<S>,
    worker: Option<PushWorker>,
    closed: bool,
}

/// Output backend that pushes blocking writes into a [`PushSink`].
///
/// The sink is consumed by the first `start`; a fresh sink is required for
/// another run. Restartable sessions on real hardware use the callback
/// backends instead.
pub struct PushBackend<S: PushSink> {
    inner: Mutex<Inner<S>>,
    chunk_frames: usize,
}

impl<S: PushSink> PushBackend<S> {
    pub fn new(sink: S, chunk_frames: usize) -> Self {
        assert!(chunk_frames > 0, "chunk_frames must be greater than 0");
        Self {
            inner: Mutex::new(Inner {
                format: None,
                sink: Some(sink),
                worker: None,
                closed: false,
            }),
            chunk_frames,
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner<S>>, AudioError> {
        self.inner.lock().map_err(|_| {
            let err = AudioError::LockPoisoned {
                component: "push_backend".to_string(),
            };
            log_audio_error(&err, "lock_inner");
            err
        })
    }
}

impl<S: PushSink> OutputBackend for PushBackend<S> {
    fn open(&self, format: &AudioFormat) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        format.validate()?;
        inner.format = Some(*format);
        Ok(())
    }

    fn start(&self, mut supplier: FrameSupplier) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        if inner.worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        if inner.format.is_none() {
            return Err(AudioError::DeviceUnavailable {
                reason: "open() has not been called".to_string(),
            });
        }
        let mut sink = inner.sink.take().ok_or_else(|| AudioError::DeviceUnavailable {
            reason: "push sink already consumed; install a new sink".to_string(),
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let chunk_frames = self.chunk_frames;

        let handle = thread::spawn(move || {
            let channels = supplier.channel_count();
            let stats = supplier.stats();
            let mut buf = vec![0.0_f32; chunk_frames * channels];

            loop {
                if stop_flag.load(Ordering::Acquire) {
                    break;
                }
                // A blocking-write backend owns its schedule: wait briefly
                // for the producer instead of padding the output with silence
                if supplier.available() < chunk_frames {
                    thread::park_timeout(Duration::from_millis(1));
                    continue;
                }
                supplier.fill(&mut buf);
                if let Err(err) = sink.write(&buf) {
                    log_audio_error(&err, "push_sink_write");
                    stats.flag_fault();
                    break;
                }
            }

            if let Err(err) = sink.finalize() {
                log_audio_error(&err, "push_sink_finalize");
            }
            debug!("push loop thread exited");
        });

        inner.worker = Some(PushWorker { stop, handle });
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        let worker = {
            let mut inner = self.lock_inner()?;
            inner.worker.take().ok_or(AudioError::NotRunning)?
        };

        worker.stop.store(true, Ordering::Release);
        worker.handle.thread().unpark();
        // Barrier: after the join no supplier invocation is in flight
        if worker.handle.join().is_err() {
            warn!("push loop thread panicked during stop");
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
            inner.sink = None;
            inner.worker.take()
        };

        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            if worker.handle.join().is_err() {
                warn!("push loop thread panicked during close");
            }
        }
        Ok(())
    }

    fn max_callback_frames(&self) -> usize {
        self.chunk_frames
    }
}
