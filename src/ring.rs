//! Frame ring buffer - lock-free SPSC bridge between generation and playback
//!
//! Thin frame-granular layer over an rtrb sample queue. The split halves
//! enforce the single-producer/single-consumer discipline through ownership:
//! exactly one [`FrameWriter`] advances the write index and exactly one
//! [`FrameReader`] advances the read index. Both operations are wait-free,
//! which the render side relies on inside the real-time audio callback.
//!
//! Writes and reads move whole interleaved frames only; a partial frame is
//! never visible to the consumer.

use rtrb::{Consumer, Producer, RingBuffer};

/// Create a frame ring with room for `capacity_frames` interleaved frames.
///
/// # Panics
/// Panics if `capacity_frames` or `channel_count` is 0.
pub fn frame_ring(capacity_frames: usize, channel_count: u16) -> (FrameWriter, FrameReader) {
    assert!(capacity_frames > 0, "capacity_frames must be greater than 0");
    assert!(channel_count > 0, "channel_count must be greater than 0");

    let channels = channel_count as usize;
    let (producer, consumer) = RingBuffer::new(capacity_frames * channels);

    (
        FrameWriter {
            producer,
            channels,
        },
        FrameReader {
            consumer,
            channels,
        },
    )
}

/// Producer half of the frame ring. Owned by the generation thread.
pub struct FrameWriter {
    producer: Producer<f32>,
    channels: usize,
}

impl FrameWriter {
    /// Copy as many whole frames from `frames` as currently fit.
    ///
    /// Never blocks and never fails: a full ring simply results in a
    /// partial (or zero) write. The caller is responsible for retrying
    /// the remainder.
    ///
    /// # Returns
    /// Number of frames written (<= `frames.len() / channels`).
    pub fn try_write(&mut self, frames: &[f32]) -> usize {
        debug_assert_eq!(frames.len() % self.channels, 0);

        let want = frames.len().min(self.producer.slots());
        let samples = want - want % self.channels;
        if samples == 0 {
            return 0;
        }

        match self.producer.write_chunk_uninit(samples) {
            Ok(chunk) => {
                let written = chunk.fill_from_iter(frames[..samples].iter().copied());
                written / self.channels
            }
            // Cannot happen: samples <= free slots was just checked
            Err(_) => 0,
        }
    }

    /// Snapshot of frames that can currently be written.
    ///
    /// May be stale immediately after return while the consumer is active.
    pub fn available(&self) -> usize {
        self.producer.slots() / self.channels
    }

    /// True once the reader half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Consumer half of the frame ring. Owned by the render context.
pub struct FrameReader {
    consumer: Consumer<f32>,
    channels: usize,
}

impl FrameReader {
    /// Copy up to `dest.len() / channels` whole frames into `dest`.
    ///
    /// Never blocks; returns 0 when the ring is empty (the caller treats
    /// that as underrun risk, not as a failure). Real-time safe.
    ///
    /// # Returns
    /// Number of frames copied into the front of `dest`.
    pub fn try_read(&mut self, dest: &mut [f32]) -> usize {
        debug_assert_eq!(dest.len() % self.channels, 0);

        let want = dest.len().min(self.consumer.slots());
        let samples = want - want % self.channels;
        if samples == 0 {
            return 0;
        }

        match self.consumer.read_chunk(samples) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                dest[..first.len()].copy_from_slice(first);
                dest[first.len()..first.len() + second.len()].copy_from_slice(second);
                chunk.commit_all();
                samples / self.channels
            }
            // Cannot happen: samples <= readable slots was just checked
            Err(_) => 0,
        }
    }

    /// Snapshot of frames ready to read.
    ///
    /// May be stale immediately after return while the producer is active.
    pub fn available(&self) -> usize {
        self.consumer.slots() / self.channels
    }

    /// True once the writer half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_preserves_data() {
        let (mut writer, mut reader) = frame_ring(64, 1);

        let data: Vec<f32> = (0..32).map(|i| i as f32).collect();
        assert_eq!(writer.try_write(&data), 32);
        assert_eq!(reader.available(), 32);

        let mut out = vec![0.0_f32; 32];
        assert_eq!(reader.try_read(&mut out), 32);
        assert_eq!(out, data, "reader must only see what the writer wrote");
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_write_saturates_at_free_space() {
        // Spec scenario: capacity 4096, write 5000 -> exactly 4096 accepted
        let (mut writer, mut reader) = frame_ring(4096, 1);

        let data = vec![0.25_f32; 5000];
        assert_eq!(writer.try_write(&data), 4096);
        assert_eq!(writer.available(), 0);
        assert_eq!(writer.try_write(&data), 0, "full ring accepts nothing");

        let mut out = vec![0.0_f32; 5000];
        assert_eq!(reader.try_read(&mut out), 4096);
    }

    #[test]
    fn test_read_from_empty_returns_zero() {
        let (_writer, mut reader) = frame_ring(16, 1);
        let mut out = [1.0_f32; 8];
        assert_eq!(reader.try_read(&mut out), 0);
        // Untouched destination; silence fill is the supplier's job
        assert_eq!(out, [1.0_f32; 8]);
    }

    #[test]
    fn test_never_reads_more_than_written() {
        let (mut writer, mut reader) = frame_ring(32, 1);
        writer.try_write(&[1.0, 2.0, 3.0]);

        let mut out = [0.0_f32; 16];
        let got = reader.try_read(&mut out);
        assert_eq!(got, 3, "no data fabricated");
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(reader.try_read(&mut out), 0, "no data duplicated");
    }

    #[test]
    fn test_stereo_moves_whole_frames_only() {
        let (mut writer, mut reader) = frame_ring(4, 2);

        // 3 stereo frames fit, the 4th fills the ring
        let data = [1.0_f32, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0, 5.0, -5.0];
        assert_eq!(writer.try_write(&data), 4);

        let mut out = [0.0_f32; 6];
        assert_eq!(reader.try_read(&mut out), 3);
        assert_eq!(out, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(reader.available(), 1);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let (mut writer, mut reader) = frame_ring(8, 1);
        let mut next = 0.0_f32;
        let mut expected = 0.0_f32;

        // Push the indices through several wraps
        for _ in 0..10 {
            let chunk: Vec<f32> = (0..5).map(|i| next + i as f32).collect();
            let wrote = writer.try_write(&chunk);
            next += wrote as f32;

            let mut out = [0.0_f32; 5];
            let got = reader.try_read(&mut out);
            for &v in &out[..got] {
                assert_eq!(v, expected, "FIFO order must survive wraparound");
                expected += 1.0;
            }
        }
    }

    #[test]
    fn test_dropped_halves_are_observable() {
        let (writer, reader) = frame_ring(8, 1);
        assert!(!writer.is_abandoned());
        drop(reader);
        assert!(writer.is_abandoned());

        let (writer, reader) = frame_ring(8, 1);
        assert!(!reader.is_abandoned());
        drop(writer);
        assert!(reader.is_abandoned());
    }

    #[test]
    fn test_halves_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameWriter>();
        assert_send::<FrameReader>();
    }

    #[test]
    #[should_panic(expected = "capacity_frames must be greater than 0")]
    fn test_zero_capacity_panics() {
        frame_ring(0, 1);
    }
}
