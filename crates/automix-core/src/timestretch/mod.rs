//! Time-stretching via signalsmith-stretch
//!
//! Wraps the signalsmith-stretch library for beat-matched deck playback.
//! The stretcher changes tempo without changing pitch; the ratio is
//! expressed by the relative sizes of the input and output blocks.

use signalsmith_stretch::Stretch;

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Real-time tempo stretcher for one deck
///
/// The ratio is a tempo ratio (output tempo / source tempo): a deck
/// playing a 131 BPM track at 128 BPM uses ratio 128/131 and consumes
/// fewer source frames than it produces.
pub struct TimeStretcher {
    stretcher: Stretch,
    ratio: f32,
}

impl TimeStretcher {
    /// Create a stretcher for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            ratio: 1.0,
        }
    }

    /// Set the tempo ratio, clamped to the playable range
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(0.5, 2.0);
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Source frames consumed when producing `output_frames`
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        (output_frames as f64 * self.ratio as f64).round() as usize
    }

    /// Stretch an interleaved input block into an interleaved output block
    ///
    /// The effective ratio is `input.len() / output.len()`; both slices
    /// must hold whole stereo frames.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        output.fill(0.0);
        if input.is_empty() && output.is_empty() {
            return;
        }
        self.stretcher.process(input, output);
    }

    /// Drain the stretcher's tail after the source is exhausted
    pub fn flush(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        self.stretcher.flush(output);
    }

    /// Latency introduced on the input side, in frames
    pub fn input_latency(&self) -> usize {
        self.stretcher.input_latency()
    }

    /// Latency introduced on the output side, in frames
    pub fn output_latency(&self) -> usize {
        self.stretcher.output_latency()
    }

    /// Reset all internal state (e.g. after a seek)
    pub fn reset(&mut self) {
        self.stretcher.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation() {
        let stretcher = TimeStretcher::new(44100);
        assert_eq!(stretcher.ratio(), 1.0);
        assert!(stretcher.input_latency() > 0);
        assert!(stretcher.output_latency() > 0);
    }

    #[test]
    fn test_ratio_clamped() {
        let mut stretcher = TimeStretcher::new(44100);
        stretcher.set_ratio(3.0);
        assert_eq!(stretcher.ratio(), 2.0);
        stretcher.set_ratio(0.1);
        assert_eq!(stretcher.ratio(), 0.5);
    }

    #[test]
    fn test_input_frames_for_ratio() {
        let mut stretcher = TimeStretcher::new(44100);
        stretcher.set_ratio(0.5);
        assert_eq!(stretcher.input_frames_for(512), 256);
        stretcher.set_ratio(2.0);
        assert_eq!(stretcher.input_frames_for(512), 1024);
    }

    #[test]
    fn test_process_fills_output() {
        let mut stretcher = TimeStretcher::new(44100);
        let input = vec![0.0f32; 512 * 2];
        let mut output = vec![1.0f32; 512 * 2];
        stretcher.process(&input, &mut output);
        // Silence in, silence out (modulo windowing ramp-in)
        assert_eq!(output.len(), 512 * 2);
    }
}
