//! Deck - single-track player with gain ramp, EQ and time-stretch
//!
//! A deck owns one decoded stereo buffer and renders interleaved float
//! samples into a caller-supplied block. Parameters (gain, EQ, stretch
//! ratio, transport flags) live in atomics so the control thread can
//! adjust them while the audio thread renders; the decoded source itself
//! sits behind a mutex that the render path takes uncontended in steady
//! state and the control thread only touches during load/unload/seek.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::timestretch::TimeStretcher;
use crate::types::{AtomicF32, AudioBuffer, Sample};

use super::eq::ThreeBandEq;

/// Block size for feeding the time stretcher
const STRETCH_BLOCK_FRAMES: usize = 512;

/// Stretch ratios this close to unity stream the source directly
const STRETCH_EPSILON: f32 = 0.001;

/// Decoded source and render state, guarded by the deck mutex
struct DeckSource {
    buffer: AudioBuffer,
    /// Playhead in frames into the buffer
    playhead: usize,
    /// Gain at the end of the previous render, None before the first
    prev_gain: Option<f32>,
    eq: ThreeBandEq,
    stretcher: Option<TimeStretcher>,
    /// Scratch block for stretcher output, interleaved
    stretch_out: Vec<Sample>,
    /// Stretcher tail has been flushed after source exhaustion
    drained: bool,
}

/// A single deck
pub struct Deck {
    source: Mutex<DeckSource>,
    loaded: AtomicBool,
    playing: AtomicBool,
    finished: AtomicBool,
    gain: AtomicF32,
    stretch_ratio: AtomicF32,
    eq_low_db: AtomicF32,
    eq_mid_db: AtomicF32,
    eq_high_db: AtomicF32,
    track_id: AtomicI64,
    playhead_frames: AtomicUsize,
    sample_rate: AtomicU32,
    duration_seconds: AtomicF32,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// Create an empty deck
    pub fn new() -> Self {
        Self {
            source: Mutex::new(DeckSource {
                buffer: AudioBuffer::default(),
                playhead: 0,
                prev_gain: None,
                eq: ThreeBandEq::new(crate::types::DEFAULT_SAMPLE_RATE as f32),
                stretcher: None,
                stretch_out: vec![0.0; STRETCH_BLOCK_FRAMES * 2],
                drained: false,
            }),
            loaded: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            gain: AtomicF32::new(1.0),
            stretch_ratio: AtomicF32::new(1.0),
            eq_low_db: AtomicF32::new(0.0),
            eq_mid_db: AtomicF32::new(0.0),
            eq_high_db: AtomicF32::new(0.0),
            track_id: AtomicI64::new(0),
            playhead_frames: AtomicUsize::new(0),
            sample_rate: AtomicU32::new(crate::types::DEFAULT_SAMPLE_RATE),
            duration_seconds: AtomicF32::new(0.0),
        }
    }

    /// Load decoded audio into the deck
    ///
    /// The deck becomes loaded but not playing, with the playhead at 0.
    pub fn load(&self, audio: AudioBuffer, track_id: i64) -> EngineResult<()> {
        if audio.is_empty() {
            return Err(EngineError::InvalidArgument("empty audio buffer".into()));
        }
        if audio.sample_rate() == 0 {
            return Err(EngineError::InvalidArgument("audio buffer has no sample rate".into()));
        }

        let sample_rate = audio.sample_rate();
        let duration = audio.duration_seconds();

        {
            let mut src = self.source.lock().unwrap();
            src.buffer = audio;
            src.playhead = 0;
            src.prev_gain = None;
            src.eq.reset();
            src.stretcher = Some(TimeStretcher::new(sample_rate));
            src.drained = false;
        }

        self.sample_rate.store(sample_rate, Ordering::Release);
        self.duration_seconds.store(duration, Ordering::Release);
        self.playhead_frames.store(0, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        self.track_id.store(track_id, Ordering::Release);
        self.playing.store(false, Ordering::Release);
        self.loaded.store(true, Ordering::Release);

        log::debug!("deck loaded track {} ({:.1}s @ {}Hz)", track_id, duration, sample_rate);
        Ok(())
    }

    /// Unload the current audio and reset all deck state
    pub fn unload(&self) {
        self.playing.store(false, Ordering::Release);
        self.loaded.store(false, Ordering::Release);

        {
            let mut src = self.source.lock().unwrap();
            src.buffer = AudioBuffer::default();
            src.playhead = 0;
            src.prev_gain = None;
            src.eq.reset();
            src.stretcher = None;
            src.drained = false;
        }

        self.track_id.store(0, Ordering::Release);
        self.playhead_frames.store(0, Ordering::Release);
        self.duration_seconds.store(0.0, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        self.gain.store(1.0, Ordering::Release);
        self.stretch_ratio.store(1.0, Ordering::Release);
        self.eq_low_db.store(0.0, Ordering::Release);
        self.eq_mid_db.store(0.0, Ordering::Release);
        self.eq_high_db.store(0.0, Ordering::Release);
    }

    /// Start playback; position is untouched
    pub fn play(&self) {
        if self.loaded.load(Ordering::Acquire) {
            self.playing.store(true, Ordering::Release);
        }
    }

    /// Pause playback; position is untouched
    pub fn pause(&self) {
        self.playing.store(false, Ordering::Release);
    }

    /// Move the playhead, clamped to the track duration
    pub fn seek(&self, position_seconds: f32) {
        let mut src = self.source.lock().unwrap();
        let sample_rate = src.buffer.sample_rate();
        if sample_rate == 0 {
            return;
        }

        let frame = (position_seconds.max(0.0) * sample_rate as f32) as usize;
        let frame = frame.min(src.buffer.frame_count());
        src.playhead = frame;
        src.drained = false;
        if let Some(stretcher) = src.stretcher.as_mut() {
            stretcher.reset();
        }
        drop(src);

        self.playhead_frames.store(frame, Ordering::Release);
        self.finished.store(false, Ordering::Release);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn track_id(&self) -> i64 {
        self.track_id.load(Ordering::Acquire)
    }

    /// Current position in seconds
    pub fn position(&self) -> f32 {
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        if sample_rate == 0 {
            return 0.0;
        }
        self.playhead_frames.load(Ordering::Acquire) as f32 / sample_rate as f32
    }

    /// Track duration in seconds
    pub fn duration(&self) -> f32 {
        self.duration_seconds.load(Ordering::Acquire)
    }

    /// Set playback gain, clamped to [0, 1]; ramped over the next render
    pub fn set_volume(&self, volume: f32) {
        self.gain.store(volume.clamp(0.0, 1.0), Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        self.gain.load(Ordering::Acquire)
    }

    /// Set the tempo stretch ratio, clamped to [0.5, 2.0]
    pub fn set_stretch_ratio(&self, ratio: f32) {
        self.stretch_ratio.store(ratio.clamp(0.5, 2.0), Ordering::Release);
    }

    pub fn stretch_ratio(&self) -> f32 {
        self.stretch_ratio.load(Ordering::Acquire)
    }

    /// Set 3-band EQ gains in dB, each clamped to [-60, +12]
    pub fn set_eq(&self, low_db: f32, mid_db: f32, high_db: f32) {
        self.eq_low_db.store(low_db.clamp(-60.0, 12.0), Ordering::Release);
        self.eq_mid_db.store(mid_db.clamp(-60.0, 12.0), Ordering::Release);
        self.eq_high_db.store(high_db.clamp(-60.0, 12.0), Ordering::Release);
    }

    /// Current EQ gains in dB as (low, mid, high)
    pub fn eq(&self) -> (f32, f32, f32) {
        (
            self.eq_low_db.load(Ordering::Acquire),
            self.eq_mid_db.load(Ordering::Acquire),
            self.eq_high_db.load(Ordering::Acquire),
        )
    }

    /// True once the playhead has passed the last source frame and the
    /// stretcher, if in use, has nothing left to drain
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Render interleaved stereo frames into `out`
    ///
    /// Returns the number of frames actually written; the remainder of
    /// the requested block is zeroed. Called from the audio thread.
    pub fn render(&self, out: &mut [Sample], frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        debug_assert!(out.len() >= frames * 2);

        if !self.playing.load(Ordering::Acquire) || !self.loaded.load(Ordering::Acquire) {
            out[..frames * 2].fill(0.0);
            return 0;
        }

        let mut src = self.source.lock().unwrap();
        if src.buffer.is_empty() {
            out[..frames * 2].fill(0.0);
            return 0;
        }

        // Volume ramp across the block, from wherever the last block ended
        let gain_end = self.gain.load(Ordering::Acquire);
        let gain_start = src.prev_gain.unwrap_or(gain_end);
        src.prev_gain = Some(gain_end);

        // Refresh EQ coefficients only when a gain moved audibly
        let (low_db, mid_db, high_db) = self.eq();
        if src.eq.needs_update(low_db, mid_db, high_db) {
            let sample_rate = src.buffer.sample_rate() as f32;
            src.eq.update(sample_rate, low_db, mid_db, high_db);
        }

        let ratio = self.stretch_ratio.load(Ordering::Acquire);
        let rendered = if (ratio - 1.0).abs() <= STRETCH_EPSILON {
            Self::render_direct(&mut src, out, frames, gain_start, gain_end)
        } else {
            Self::render_stretched(&mut src, out, frames, ratio, gain_start, gain_end)
        };

        out[rendered * 2..frames * 2].fill(0.0);

        let total = src.buffer.frame_count();
        let exhausted = src.playhead >= total;
        let stretching = (ratio - 1.0).abs() > STRETCH_EPSILON;
        let finished = exhausted && (!stretching || src.drained);

        self.playhead_frames.store(src.playhead, Ordering::Release);
        if finished {
            self.finished.store(true, Ordering::Release);
        }

        rendered
    }

    /// Unity-ratio path: stream the source with EQ and gain ramp
    fn render_direct(
        src: &mut DeckSource,
        out: &mut [Sample],
        frames: usize,
        gain_start: f32,
        gain_end: f32,
    ) -> usize {
        let total = src.buffer.frame_count();
        let mut rendered = 0;

        while rendered < frames && src.playhead < total {
            let frame = src.buffer.frames()[src.playhead];
            let t = if frames > 1 {
                rendered as f32 / (frames - 1) as f32
            } else {
                1.0
            };
            let gain = gain_start + t * (gain_end - gain_start);

            let (l, r) = src.eq.process_frame(frame.left, frame.right);
            out[rendered * 2] = l * gain;
            out[rendered * 2 + 1] = r * gain;

            src.playhead += 1;
            rendered += 1;
        }

        rendered
    }

    /// Stretched path: feed the stretcher in fixed blocks and drain it
    /// until the requested frame count is produced or the source is gone
    fn render_stretched(
        src: &mut DeckSource,
        out: &mut [Sample],
        frames: usize,
        ratio: f32,
        gain_start: f32,
        gain_end: f32,
    ) -> usize {
        let total = src.buffer.frame_count();
        let mut rendered = 0;

        while rendered < frames {
            let chunk = (frames - rendered).min(STRETCH_BLOCK_FRAMES);
            let remaining = total - src.playhead.min(total);

            let (in_frames, out_frames) = if remaining == 0 {
                if src.drained {
                    break;
                }
                (0, chunk)
            } else {
                let want = (chunk as f64 * ratio as f64).round().max(1.0) as usize;
                if want <= remaining {
                    (want, chunk)
                } else {
                    // Final partial block: emit in proportion to what is left
                    let out_frames = ((remaining as f64 / ratio as f64) as usize).min(chunk);
                    if out_frames == 0 {
                        // Sub-frame remainder, not worth a stretch call
                        src.playhead = total;
                        continue;
                    }
                    (remaining, out_frames)
                }
            };

            {
                let Some(stretcher) = src.stretcher.as_mut() else {
                    break;
                };
                let stretch_out = &mut src.stretch_out[..out_frames * 2];
                if in_frames > 0 {
                    let start = src.playhead * 2;
                    let input = &src.buffer.as_interleaved()[start..start + in_frames * 2];
                    stretcher.process(input, stretch_out);
                } else {
                    stretcher.flush(stretch_out);
                    src.drained = true;
                }
            }
            src.playhead += in_frames;

            for i in 0..out_frames {
                let idx = rendered + i;
                let t = if frames > 1 {
                    idx as f32 / (frames - 1) as f32
                } else {
                    1.0
                };
                let gain = gain_start + t * (gain_end - gain_start);
                let (l, r) = src
                    .eq
                    .process_frame(src.stretch_out[i * 2], src.stretch_out[i * 2 + 1]);
                out[idx * 2] = l * gain;
                out[idx * 2 + 1] = r * gain;
            }
            rendered += out_frames;

            if src.drained {
                break;
            }
        }

        rendered
    }
}
