//! Tone generation - deterministic sine wave sample source
//!
//! Produces a lazy, infinite sequence of interleaved PCM frames. Key
//! properties:
//! - Phase accumulator wrapped into [0, 2π) so it never grows without bound,
//!   even over arbitrarily long sessions
//! - Pure functions of generator state (no side effects beyond the phase)
//! - Zero allocations per frame, safe to drive from any thread

use crate::config::ToneConfig;

/// Full circle in radians
pub const TWO_PI: f32 = std::f32::consts::TAU;

/// Sine tone generator with a wrapped phase accumulator.
///
/// The generator is non-restartable: each call yields the next value of the
/// infinite sequence. Restarting playback from the beginning requires an
/// explicit [`ToneGenerator::reset`].
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    /// Current phase angle in [0, 2π)
    phase: f32,
    /// Phase advance per frame: 2π · frequency / sample_rate
    phase_delta: f32,
    /// Peak amplitude in [0.0, 1.0]
    amplitude: f32,
    /// Interleaved channels per frame
    channel_count: usize,
}

impl ToneGenerator {
    /// Create a generator for the given tone at `sample_rate_hz`.
    pub fn new(tone: ToneConfig, sample_rate_hz: u32, channel_count: u16) -> Self {
        Self {
            phase: 0.0,
            phase_delta: TWO_PI * tone.frequency_hz / sample_rate_hz as f32,
            amplitude: tone.amplitude.clamp(0.0, 1.0),
            channel_count: channel_count as usize,
        }
    }

    /// Interleaved channels per frame
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Current phase angle in [0, 2π)
    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Rewind the phase accumulator to the start of the waveform.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Write the next interleaved frame into `frame` and advance the phase.
    ///
    /// Every channel of the frame receives the same sample value. The slice
    /// length must equal the channel count.
    #[inline]
    pub fn next_frame(&mut self, frame: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.channel_count);

        let value = self.amplitude * self.phase.sin();
        for sample in frame.iter_mut() {
            *sample = value;
        }

        self.phase += self.phase_delta;
        // Wrap into [0, 2π) to keep float precision stable over long runs
        if self.phase >= TWO_PI {
            self.phase -= TWO_PI;
        }
    }

    /// Fill `dest` with whole interleaved frames.
    ///
    /// `dest.len()` must be a multiple of the channel count.
    pub fn fill(&mut self, dest: &mut [f32]) {
        debug_assert_eq!(dest.len() % self.channel_count, 0);
        for frame in dest.chunks_exact_mut(self.channel_count) {
            self.next_frame(frame);
        }
    }
}

/// Convert a float sample in [-1.0, 1.0] to a 16-bit PCM sample.
///
/// Out-of-range input is clamped; the scaled value is rounded, not
/// truncated, so e.g. 0.5 maps to 16384 rather than 16383.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Convert an interleaved f32 buffer to 16-bit PCM in place of `dest`.
///
/// Both slices must have the same length. Real-time safe: no allocation,
/// bounded time.
#[inline]
pub fn convert_to_i16(src: &[f32], dest: &mut [i16]) {
    debug_assert_eq!(src.len(), dest.len());
    for (d, &s) in dest.iter_mut().zip(src.iter()) {
        *d = sample_to_i16(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency_hz: f32, amplitude: f32) -> ToneConfig {
        ToneConfig {
            frequency_hz,
            amplitude,
        }
    }

    #[test]
    fn test_first_frame_is_silence_at_zero_phase() {
        let mut gen = ToneGenerator::new(tone(440.0, 0.5), 44_100, 1);
        let mut frame = [1.0_f32];
        gen.next_frame(&mut frame);
        assert_eq!(sample_to_i16(frame[0]), 0, "sin(0) must map to 0");
    }

    #[test]
    fn test_quarter_cycle_reaches_half_scale() {
        // 440 Hz at 44.1 kHz: phase π/2 lands near frame 25
        let mut gen = ToneGenerator::new(tone(440.0, 0.5), 44_100, 1);
        let mut frame = [0.0_f32];
        let mut peak = 0_i16;
        for _ in 0..=25 {
            gen.next_frame(&mut frame);
            peak = peak.max(sample_to_i16(frame[0]));
        }
        assert!(
            (peak - 16_384).abs() <= 1,
            "quarter cycle should reach round(0.5 * 32767) = 16384 +/- 1, got {}",
            peak
        );
    }

    #[test]
    fn test_phase_stays_wrapped_over_long_runs() {
        // Property from the wrap invariant: after any number of frames the
        // phase remains inside [0, 2π)
        let rates = [8_000_u32, 44_100, 48_000];
        let freqs = [1.0_f32, 440.0, 3_999.0];

        for &rate in &rates {
            for &freq in &freqs {
                if freq >= rate as f32 / 2.0 {
                    continue;
                }
                let mut gen = ToneGenerator::new(tone(freq, 1.0), rate, 1);
                let mut frame = [0.0_f32];
                for _ in 0..1_000_000 {
                    gen.next_frame(&mut frame);
                }
                assert!(
                    (0.0..TWO_PI).contains(&gen.phase()),
                    "phase {} escaped [0, 2pi) at {} Hz / {} Hz",
                    gen.phase(),
                    freq,
                    rate
                );
            }
        }
    }

    #[test]
    fn test_stereo_frames_duplicate_the_sample() {
        let mut gen = ToneGenerator::new(tone(440.0, 0.8), 44_100, 2);
        let mut buf = [0.0_f32; 64];
        gen.fill(&mut buf);
        for frame in buf.chunks_exact(2) {
            assert_eq!(frame[0], frame[1], "left and right must match");
        }
    }

    #[test]
    fn test_reset_restarts_the_sequence() {
        let mut gen = ToneGenerator::new(tone(440.0, 0.5), 44_100, 1);
        let mut first = [0.0_f32; 32];
        gen.fill(&mut first);

        gen.reset();
        let mut second = [0.0_f32; 32];
        gen.fill(&mut second);

        assert_eq!(first, second, "reset must rewind to the same sequence");
    }

    #[test]
    fn test_amplitude_is_clamped() {
        let mut gen = ToneGenerator::new(tone(440.0, 4.0), 44_100, 1);
        let mut buf = [0.0_f32; 2048];
        gen.fill(&mut buf);
        for &s in &buf {
            assert!((-1.0..=1.0).contains(&s), "sample {} out of range", s);
        }
    }

    #[test]
    fn test_sample_to_i16_rounds_at_boundaries() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 32_767);
        assert_eq!(sample_to_i16(-1.0), -32_767);
        assert_eq!(sample_to_i16(0.5), 16_384); // rounds, does not truncate
        // Clamping at the representable range
        assert_eq!(sample_to_i16(2.0), 32_767);
        assert_eq!(sample_to_i16(-2.0), -32_767);
    }

    #[test]
    fn test_convert_to_i16_buffer() {
        let src = [0.0_f32, 0.5, -0.5, 1.0];
        let mut dest = [0_i16; 4];
        convert_to_i16(&src, &mut dest);
        assert_eq!(dest, [0, 16_384, -16_384, 32_767]);
    }
}
