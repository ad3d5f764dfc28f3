//! Oboe-based callback backend for Android (AAudio / OpenSL ES)
//!
//! Renders 16-bit PCM through a low-latency exclusive output stream, the
//! same device path the original OpenSL implementation used. The render
//! callback runs on a high-priority thread owned by the platform; all state
//! it touches is pre-allocated and lock-free.

use std::sync::{Mutex, MutexGuard};

use oboe::{
    AudioOutputCallback, AudioOutputStreamSafe, AudioStream, AudioStreamAsync, AudioStreamBuilder,
    DataCallbackResult, Mono, Output, PerformanceMode, SharingMode, Stereo,
};
use tracing::debug;

use crate::config::{AudioFormat, SampleFormat};
use crate::engine::supplier::FrameSupplier;
use crate::error::{log_audio_error, AudioError};
use crate::synth::{convert_to_i16, sample_to_i16};

use super::OutputBackend;

/// Largest single callback request assumed for ring sizing; matches the
/// 2048-frame buffers of the original OpenSL double-buffer queue.
const MAX_CALLBACK_FRAMES: usize = 2048;

/// Shared render state for the oboe callbacks.
///
/// The f32 scratch buffer is allocated once up front; oversized hardware
/// requests are processed in scratch-sized slices so the callback never
/// allocates.
struct RenderState {
    supplier: FrameSupplier,
    scratch: Vec<f32>,
}

impl RenderState {
    fn new(supplier: FrameSupplier) -> Self {
        let channels = supplier.channel_count();
        Self {
            supplier,
            scratch: vec![0.0; MAX_CALLBACK_FRAMES * channels],
        }
    }
}

struct MonoRender(RenderState);

impl AudioOutputCallback for MonoRender {
    type FrameType = (i16, Mono);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [i16],
    ) -> DataCallbackResult {
        // Real-time callback: ring copy + conversion only
        let scratch_len = self.0.scratch.len();
        for chunk in frames.chunks_mut(scratch_len) {
            let scratch = &mut self.0.scratch[..chunk.len()];
            self.0.supplier.fill(scratch);
            convert_to_i16(scratch, chunk);
        }
        DataCallbackResult::Continue
    }
}

struct StereoRender(RenderState);

impl AudioOutputCallback for StereoRender {
    type FrameType = (i16, Stereo);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [(i16, i16)],
    ) -> DataCallbackResult {
        let max_frames = self.0.scratch.len() / 2;
        for chunk in frames.chunks_mut(max_frames) {
            let scratch = &mut self.0.scratch[..chunk.len() * 2];
            self.0.supplier.fill(scratch);
            for (out, pair) in chunk.iter_mut().zip(scratch.chunks_exact(2)) {
                *out = (sample_to_i16(pair[0]), sample_to_i16(pair[1]));
            }
        }
        DataCallbackResult::Continue
    }
}

enum StreamHandle {
    Mono(AudioStreamAsync<Output, MonoRender>),
    Stereo(AudioStreamAsync<Output, StereoRender>),
}

impl StreamHandle {
    fn start(&mut self) -> Result<(), AudioError> {
        let result = match self {
            StreamHandle::Mono(s) => s.start(),
            StreamHandle::Stereo(s) => s.start(),
        };
        result.map_err(|e| AudioError::HardwareError {
            details: format!("failed to start output stream: {:?}", e),
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let result = match self {
            StreamHandle::Mono(s) => s.stop(),
            StreamHandle::Stereo(s) => s.stop(),
        };
        result.map_err(|e| AudioError::HardwareError {
            details: format!("failed to stop output stream: {:?}", e),
        })
    }
}

struct Inner {
    format: Option<AudioFormat>,
    stream: Option<StreamHandle>,
    closed: bool,
}

/// Android output backend that drives the Oboe-powered audio stream.
pub struct OboeBackend {
    inner: Mutex<Inner>,
}

impl OboeBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                format: None,
                stream: None,
                closed: false,
            }),
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, AudioError> {
        self.inner.lock().map_err(|_| {
            let err = AudioError::LockPoisoned {
                component: "oboe_backend".to_string(),
            };
            log_audio_error(&err, "lock_inner");
            err
        })
    }

    fn open_stream(format: &AudioFormat, supplier: FrameSupplier) -> Result<StreamHandle, AudioError> {
        let state = RenderState::new(supplier);
        match format.channel_count {
            1 => AudioStreamBuilder::default()
                .set_performance_mode(PerformanceMode::LowLatency)
                .set_sharing_mode(SharingMode::Exclusive)
                .set_direction::<Output>()
                .set_sample_rate(format.sample_rate_hz as i32)
                .set_channel_count::<Mono>()
                .set_format::<i16>()
                .set_callback(MonoRender(state))
                .open_stream()
                .map(StreamHandle::Mono)
                .map_err(|e| AudioError::DeviceUnavailable {
                    reason: format!("failed to open output stream: {:?}", e),
                }),
            2 => AudioStreamBuilder::default()
                .set_performance_mode(PerformanceMode::LowLatency)
                .set_sharing_mode(SharingMode::Exclusive)
                .set_direction::<Output>()
                .set_sample_rate(format.sample_rate_hz as i32)
                .set_channel_count::<Stereo>()
                .set_format::<i16>()
                .set_callback(StereoRender(state))
                .open_stream()
                .map(StreamHandle::Stereo)
                .map_err(|e| AudioError::DeviceUnavailable {
                    reason: format!("failed to open output stream: {:?}", e),
                }),
            other => Err(AudioError::UnsupportedFormat {
                details: format!("channel count must be 1 or 2 (got {})", other),
            }),
        }
    }
}

impl Default for OboeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for OboeBackend {
    fn open(&self, format: &AudioFormat) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        format.validate()?;
        if format.sample_format != SampleFormat::Int16 {
            return Err(AudioError::UnsupportedFormat {
                details: "oboe backend renders 16-bit PCM only".to_string(),
            });
        }
        inner.format = Some(*format);
        Ok(())
    }

    fn start(&self, supplier: FrameSupplier) -> Result<(), AudioError> {
        let mut inner = self.lock_inner()?;
        if inner.closed {
            return Err(AudioError::SessionClosed);
        }
        if inner.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        let format = inner.format.ok_or_else(|| AudioError::DeviceUnavailable {
            reason: "open() has not been called".to_string(),
        })?;

        let mut stream = Self::open_stream(&format, supplier).map_err(|err| {
            log_audio_error(&err, "oboe_open_stream");
            err
        })?;
        stream.start()?;
        inner.stream = Some(stream);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        let mut stream = {
            let mut inner = self.lock_inner()?;
            inner.stream.take().ok_or(AudioError::NotRunning)?
        };

        // oboe's stop waits for the state transition, so no callback is in
        // flight once this returns; dropping then releases the stream
        stream.stop()?;
        drop(stream);
        debug!("oboe stream stopped");
        Ok(())
    }

    fn close(&self) -> Result<(), AudioError> {
        let stream = {
            let mut inner = self.lock_inner()?;
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.format = None;
            inner.stream.take()
        };

        if let Some(mut stream) = stream {
            let _ = stream.stop();
        }
        Ok(())
    }

    fn max_callback_frames(&self) -> usize {
        MAX_CALLBACK_FRAMES
    }
}
