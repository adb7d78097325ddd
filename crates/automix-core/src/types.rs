//! Common audio types for the automix engine
//!
//! Stereo frame and buffer types used throughout the engine, plus the
//! cross-thread primitives the real-time path relies on.

use std::sync::atomic::{AtomicU32, Ordering};

/// Default sample rate assumed until the host reports the device rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Maximum frames per render call to pre-allocate for real-time safety.
/// Covers all common audio callback sizes (64 through 8192).
pub const MAX_BUFFER_FRAMES: usize = 8192;

/// Audio sample type (32-bit float, interleaved stereo on the wire)
pub type Sample = f32;

/// A single stereo frame (left and right channels)
///
/// Uses `#[repr(C)]` so a `&[StereoSample]` has the same layout as an
/// interleaved `&[f32]`. Conversions between the two views go through
/// bytemuck and are zero-copy.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// A silent frame
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Scale both channels by a factor
    #[inline]
    pub fn scale(&self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// Decoded audio owned by a deck: stereo frames plus the decoder's rate
///
/// Always stereo by construction; decoders feeding other channel counts
/// are expected to up/downmix before handing the buffer over.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    samples: Vec<StereoSample>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from a vec of stereo frames
    pub fn from_frames(samples: Vec<StereoSample>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(interleaved: &[Sample], sample_rate: u32) -> Self {
        assert!(interleaved.len() % 2 == 0, "interleaved buffer must have even length");
        let samples = interleaved
            .chunks_exact(2)
            .map(|chunk| StereoSample::new(chunk[0], chunk[1]))
            .collect();
        Self { samples, sample_rate }
    }

    /// Create a silent buffer of the given length in frames
    pub fn silence(frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![StereoSample::silence(); frames],
            sample_rate,
        }
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    #[inline]
    pub fn frames(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Zero-copy view of the frames as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }
}

/// Per-block mix parameters produced by the crossfader
///
/// Gains are linear [0, 1]; EQ gains are dB (0 = unity, -60 = kill).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    pub gain_a: f32,
    pub gain_b: f32,
    pub eq_low_a: f32,
    pub eq_mid_a: f32,
    pub eq_high_a: f32,
    pub eq_low_b: f32,
    pub eq_mid_b: f32,
    pub eq_high_b: f32,
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            gain_a: 1.0,
            gain_b: 0.0,
            eq_low_a: 0.0,
            eq_mid_a: 0.0,
            eq_high_a: 0.0,
            eq_low_b: 0.0,
            eq_mid_b: 0.0,
            eq_high_b: 0.0,
        }
    }
}

/// Scheduler playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
    Transitioning = 3,
}

impl From<u8> for PlaybackState {
    fn from(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Transitioning,
            _ => PlaybackState::Stopped,
        }
    }
}

/// An f32 shared across threads as its bit pattern in an `AtomicU32`
///
/// The control thread publishes parameter changes with release stores;
/// the audio thread observes them with acquire loads.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.bits.load(order))
    }

    #[inline]
    pub fn store(&self, value: f32, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_scale() {
        let s = StereoSample::new(0.5, -0.5).scale(2.0);
        assert_eq!(s.left, 1.0);
        assert_eq!(s.right, -1.0);
    }

    #[test]
    fn test_buffer_from_interleaved() {
        let buffer = AudioBuffer::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 44100);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.frames()[0].left, 1.0);
        assert_eq!(buffer.frames()[1].right, 4.0);
        assert_eq!(buffer.as_interleaved(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::silence(44100, 44100);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-6);
        assert_eq!(AudioBuffer::default().duration_seconds(), 0.0);
    }

    #[test]
    fn test_playback_state_roundtrip() {
        for state in [
            PlaybackState::Stopped,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Transitioning,
        ] {
            assert_eq!(PlaybackState::from(state as u8), state);
        }
    }

    #[test]
    fn test_atomic_f32() {
        let a = AtomicF32::new(0.25);
        assert_eq!(a.load(Ordering::Acquire), 0.25);
        a.store(-1.5, Ordering::Release);
        assert_eq!(a.load(Ordering::Acquire), -1.5);
    }
}
