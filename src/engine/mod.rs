//! PlaybackEngine - session lifecycle and generation/render orchestration
//!
//! Owns the two concurrency domains of a playback session: the generation
//! thread (producer side of the frame ring) and the backend's render context
//! (consumer side). The engine itself runs on ordinary control threads and
//! may block briefly in `stop`/`close` to synchronize with in-flight
//! callbacks; the render path never blocks.
//!
//! State machine:
//!
//! ```text
//! Idle --start--> Running --stop--> Idle
//!                 Running --fault--> Stopped --start--> Running
//!                 any --close--> Closed (terminal)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{log_audio_error, AudioError};
use crate::ring::{frame_ring, FrameWriter};
use crate::synth::ToneGenerator;

pub mod backend;
pub mod supplier;

use backend::OutputBackend;
use supplier::{FrameSupplier, RenderStats};

/// Lifecycle state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created or cleanly stopped; ready to start
    Idle,
    /// Audio is flowing
    Running,
    /// Halted by a render fault; restartable
    Stopped,
    /// Torn down; terminal
    Closed,
}

/// Notification emitted by the engine on its (non-real-time) event channel.
///
/// This is the deferred path for render-context failures: the callback only
/// flags a fault, the producer loop translates it into `HardwareFault`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Stopped,
    HardwareFault { details: String },
    Closed,
}

struct ProducerWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Orchestrates Sample Source -> Ring Buffer -> Output Backend for one
/// output device. At most one session runs per backend instance.
pub struct PlaybackEngine {
    config: EngineConfig,
    backend: Arc<dyn OutputBackend>,
    state: Arc<Mutex<SessionState>>,
    stats: Mutex<Arc<RenderStats>>,
    producer: Mutex<Option<ProducerWorker>>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl PlaybackEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn OutputBackend>) -> Self {
        let (events_tx, _) = broadcast::channel(32);
        Self {
            config,
            backend,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stats: Mutex::new(RenderStats::new()),
            producer: Mutex::new(None),
            events_tx,
        }
    }

    /// Subscribe to engine notifications (start/stop/fault/close).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Current session state. A poisoned state lock is reported as Closed.
    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(_) => SessionState::Closed,
        }
    }

    /// Frames filled with silence because the ring ran dry. Underrun is not
    /// an error; this counter exists for diagnostics.
    pub fn underrun_frames(&self) -> u64 {
        match self.stats.lock() {
            Ok(guard) => guard.underrun_frames.load(Ordering::Relaxed),
            Err(_) => 0,
        }
    }

    /// Total frames delivered to the render context this session.
    pub fn frames_rendered(&self) -> u64 {
        match self.stats.lock() {
            Ok(guard) => guard.frames_rendered.load(Ordering::Relaxed),
            Err(_) => 0,
        }
    }

    /// Open the device and start playback.
    ///
    /// Builds a fresh ring per start, primes it from the generation thread,
    /// then hands the consumer half to the backend. Open failures surface
    /// synchronously and leave the session restartable.
    pub fn start(&self) -> Result<(), AudioError> {
        let mut state = self.lock_state()?;
        match *state {
            SessionState::Running => return Err(AudioError::AlreadyRunning),
            SessionState::Closed => return Err(AudioError::SessionClosed),
            SessionState::Idle | SessionState::Stopped => {}
        }

        self.validate_config()?;
        self.backend.open(&self.config.format)?;

        let channels = self.config.format.channel_count;
        let (writer, reader) = frame_ring(self.config.ring_frames, channels);
        let stats = RenderStats::new();
        let supplier = FrameSupplier::new(reader, Arc::clone(&stats), channels);

        // Producer first: the ring is primed before the hardware pulls,
        // like the double-buffer pre-enqueue on the original device path
        let worker = self.spawn_producer(writer, Arc::clone(&stats));

        if let Err(err) = self.backend.start(supplier) {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            let _ = worker.handle.join();
            log_audio_error(&err, "engine_start");
            return Err(err);
        }

        *self.lock_stats()? = stats;
        *self.lock_producer()? = Some(worker);
        *state = SessionState::Running;
        drop(state);

        info!(
            "playback started: {} Hz, {} channel(s)",
            self.config.format.sample_rate_hz, channels
        );
        let _ = self.events_tx.send(EngineEvent::Started);
        Ok(())
    }

    /// Stop playback and return to Idle.
    ///
    /// Synchronization barrier: when this returns, the generation thread has
    /// exited and the backend guarantees no supplier invocation is in
    /// flight, so the session's buffers can be torn down safely.
    pub fn stop(&self) -> Result<(), AudioError> {
        {
            let mut state = self.lock_state()?;
            if *state != SessionState::Running {
                return Err(AudioError::NotRunning);
            }
            *state = SessionState::Idle;
        }

        self.join_producer()?;
        match self.backend.stop() {
            // The fault path may have stopped the backend already
            Ok(()) | Err(AudioError::NotRunning) => {}
            Err(err) => {
                log_audio_error(&err, "engine_stop");
                return Err(err);
            }
        }

        info!("playback stopped");
        let _ = self.events_tx.send(EngineEvent::Stopped);
        Ok(())
    }

    /// Tear the session down. Idempotent; the engine is unusable afterwards.
    pub fn close(&self) -> Result<(), AudioError> {
        {
            let mut state = self.lock_state()?;
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        self.join_producer()?;
        match self.backend.stop() {
            Ok(()) | Err(AudioError::NotRunning) => {}
            Err(err) => log_audio_error(&err, "engine_close"),
        }
        self.backend.close()?;
        info!("playback session closed");
        let _ = self.events_tx.send(EngineEvent::Closed);
        Ok(())
    }

    // ========================================================================
    // PRIVATE HELPERS
    // ========================================================================

    fn validate_config(&self) -> Result<(), AudioError> {
        let config = &self.config;
        config.format.validate()?;

        let nyquist = config.format.sample_rate_hz as f32 / 2.0;
        if config.tone.frequency_hz <= 0.0 || config.tone.frequency_hz >= nyquist {
            return Err(AudioError::InvalidConfig {
                details: format!(
                    "tone frequency {} Hz must be in (0, {}) for {} Hz output",
                    config.tone.frequency_hz, nyquist, config.format.sample_rate_hz
                ),
            });
        }

        if config.chunk_frames == 0 || config.chunk_frames > config.ring_frames {
            return Err(AudioError::InvalidConfig {
                details: format!(
                    "chunk_frames {} must be in 1..={}",
                    config.chunk_frames, config.ring_frames
                ),
            });
        }

        // The ring must absorb two maximal callback requests or tryRead can
        // never satisfy the hardware in one pass
        let needed = 2 * self.backend.max_callback_frames();
        if config.ring_frames < needed {
            return Err(AudioError::InvalidConfig {
                details: format!(
                    "ring_frames {} is below 2x the backend callback maximum ({})",
                    config.ring_frames, needed
                ),
            });
        }
        Ok(())
    }

    fn spawn_producer(&self, writer: FrameWriter, stats: Arc<RenderStats>) -> ProducerWorker {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let state = Arc::clone(&self.state);
        let events_tx = self.events_tx.clone();
        let backend = Arc::clone(&self.backend);
        let generator = ToneGenerator::new(
            self.config.tone,
            self.config.format.sample_rate_hz,
            self.config.format.channel_count,
        );
        let chunk_frames = self.config.chunk_frames;

        let handle = thread::spawn(move || {
            run_producer(
                writer,
                generator,
                stop_flag,
                stats,
                state,
                events_tx,
                backend,
                chunk_frames,
            );
        });

        ProducerWorker { stop, handle }
    }

    fn join_producer(&self) -> Result<(), AudioError> {
        let worker = self.lock_producer()?.take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            let _ = worker.handle.join();
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, AudioError> {
        self.state.lock().map_err(|_| AudioError::LockPoisoned {
            component: "engine_state".to_string(),
        })
    }

    fn lock_stats(&self) -> Result<MutexGuard<'_, Arc<RenderStats>>, AudioError> {
        self.stats.lock().map_err(|_| AudioError::LockPoisoned {
            component: "engine_stats".to_string(),
        })
    }

    fn lock_producer(&self) -> Result<MutexGuard<'_, Option<ProducerWorker>>, AudioError> {
        self.producer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "engine_producer".to_string(),
        })
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Generation loop: fill the ring with tone frames, retrying partial writes.
///
/// A `try_write` that accepts fewer frames than offered is not a failure;
/// the unwritten remainder of the chunk is retried until the ring drains.
/// The loop also polls the render fault flag and performs the deferred
/// Running -> Stopped transition when a backend reports a failure.
#[allow(clippy::too_many_arguments)]
fn run_producer(
    mut writer: FrameWriter,
    mut generator: ToneGenerator,
    stop: Arc<AtomicBool>,
    stats: Arc<RenderStats>,
    state: Arc<Mutex<SessionState>>,
    events_tx: broadcast::Sender<EngineEvent>,
    backend: Arc<dyn OutputBackend>,
    chunk_frames: usize,
) {
    let channels = generator.channel_count();
    let mut chunk = vec![0.0_f32; chunk_frames * channels];
    let mut offset = chunk.len(); // samples already written; begins "drained"

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }

        if stats.has_fault() {
            if let Ok(mut guard) = state.lock() {
                if *guard == SessionState::Running {
                    *guard = SessionState::Stopped;
                }
            }
            let _ = events_tx.send(EngineEvent::HardwareFault {
                details: "output stream reported a failure".to_string(),
            });
            match backend.stop() {
                Ok(()) | Err(AudioError::NotRunning) => {}
                Err(err) => log_audio_error(&err, "producer_fault_stop"),
            }
            debug!("producer halted on render fault");
            break;
        }

        if offset == chunk.len() {
            generator.fill(&mut chunk);
            offset = 0;
        }

        let wrote = writer.try_write(&chunk[offset..]);
        offset += wrote * channels;
        if wrote == 0 {
            // A dropped consumer can never drain the ring; exit instead of
            // spinning until the stop flag arrives
            if writer.is_abandoned() {
                debug!("consumer half dropped; producer exiting");
                break;
            }
            thread::park_timeout(Duration::from_micros(500));
        }
    }
}
