//! FrameSupplier - render-side bridge between the ring buffer and a backend
//!
//! This is the only code that runs inside the platform's real-time render
//! context. It must not allocate, lock, log, or block: it copies whatever the
//! ring buffer has ready and fills any shortfall with silence. Silence is the
//! underrun policy - it never violates the callback deadline and is less
//! jarring than repeating or glitching.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::ring::FrameReader;

/// Shared render-side counters and the deferred fault flag.
///
/// Backends set `fault` from their (non-real-time) error paths; the engine's
/// producer loop polls it and translates it into a session transition plus an
/// event notification. Nothing ever propagates out of the callback itself.
#[derive(Debug, Default)]
pub struct RenderStats {
    /// Total frames delivered to the hardware
    pub frames_rendered: AtomicU64,
    /// Frames that had to be filled with silence
    pub underrun_frames: AtomicU64,
    /// Set when the stream reports a hardware error
    pub fault: AtomicBool,
}

impl RenderStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a backend fault for the engine to pick up.
    pub fn flag_fault(&self) {
        self.fault.store(true, Ordering::Release);
    }

    pub fn has_fault(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }
}

/// Fills backend destination buffers from the frame ring.
///
/// Owned by exactly one render context at a time (the consumer side of the
/// SPSC ring). Moved into the platform callback or the push loop thread by
/// [`crate::engine::backend::OutputBackend::start`].
pub struct FrameSupplier {
    reader: FrameReader,
    stats: Arc<RenderStats>,
    channels: usize,
}

impl FrameSupplier {
    pub fn new(reader: FrameReader, stats: Arc<RenderStats>, channel_count: u16) -> Self {
        Self {
            reader,
            stats,
            channels: channel_count as usize,
        }
    }

    /// Interleaved channels per frame
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Shared stats handle for backends that need to flag faults.
    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    /// Frames currently ready in the ring (stale the instant it returns).
    #[inline]
    pub fn available(&self) -> usize {
        self.reader.available()
    }

    /// Fill `dest` with interleaved samples; zero any shortfall.
    ///
    /// Real-time safe. Returns the number of frames that came from the ring
    /// (the rest of `dest` is silence).
    #[inline]
    pub fn fill(&mut self, dest: &mut [f32]) -> usize {
        let requested = dest.len() / self.channels;
        let got = self.reader.try_read(dest);

        if got < requested {
            for sample in dest[got * self.channels..].iter_mut() {
                *sample = 0.0;
            }
            self.stats
                .underrun_frames
                .fetch_add((requested - got) as u64, Ordering::Relaxed);
        }

        self.stats
            .frames_rendered
            .fetch_add(requested as u64, Ordering::Relaxed);
        got
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::frame_ring;

    #[test]
    fn test_full_request_from_ring() {
        let (mut writer, reader) = frame_ring(64, 1);
        let data: Vec<f32> = (0..32).map(|i| i as f32 + 1.0).collect();
        writer.try_write(&data);

        let stats = RenderStats::new();
        let mut supplier = FrameSupplier::new(reader, Arc::clone(&stats), 1);

        let mut dest = [0.0_f32; 32];
        assert_eq!(supplier.fill(&mut dest), 32);
        assert_eq!(&dest[..], &data[..]);
        assert_eq!(stats.underrun_frames.load(Ordering::Relaxed), 0);
        assert_eq!(stats.frames_rendered.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn test_empty_ring_yields_pure_silence() {
        // Underrun policy: every requested slot is zeroed, no blocking
        let (_writer, reader) = frame_ring(64, 1);
        let stats = RenderStats::new();
        let mut supplier = FrameSupplier::new(reader, Arc::clone(&stats), 1);

        let mut dest = [0.77_f32; 48];
        assert_eq!(supplier.fill(&mut dest), 0);
        assert!(dest.iter().all(|&s| s == 0.0), "all slots must be silence");
        assert_eq!(stats.underrun_frames.load(Ordering::Relaxed), 48);
    }

    #[test]
    fn test_partial_fill_zeroes_the_tail() {
        let (mut writer, reader) = frame_ring(64, 2);
        writer.try_write(&[0.5, 0.5, -0.5, -0.5]); // 2 stereo frames

        let stats = RenderStats::new();
        let mut supplier = FrameSupplier::new(reader, Arc::clone(&stats), 2);

        let mut dest = [0.9_f32; 12]; // 6 frames requested
        assert_eq!(supplier.fill(&mut dest), 2);
        assert_eq!(&dest[..4], &[0.5, 0.5, -0.5, -0.5]);
        assert!(dest[4..].iter().all(|&s| s == 0.0));
        assert_eq!(stats.underrun_frames.load(Ordering::Relaxed), 4);
        assert_eq!(stats.frames_rendered.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_fault_flag_round_trip() {
        let stats = RenderStats::new();
        assert!(!stats.has_fault());
        stats.flag_fault();
        assert!(stats.has_fault());
    }
}
