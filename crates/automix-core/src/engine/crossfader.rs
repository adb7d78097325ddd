//! Crossfader - position to per-deck mix parameters
//!
//! A single position in [-1, +1] (-1 = full deck A, +1 = full deck B)
//! mapped through a selectable curve, plus a frame-driven automation
//! line that eases the position with a smoothstep. All state lives in
//! atomics: the control thread sets position/curve/automation, the audio
//! thread advances and reads.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crate::types::{AtomicF32, MixParams};

/// EQ kill level in dB for the EQ-swap envelope
const KILL_DB: f32 = -60.0;

/// Crossfade curve shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CurveType {
    /// Straight gain trade
    Linear = 0,
    /// Constant perceived loudness through the middle
    #[default]
    EqualPower = 1,
    /// Both decks stay loud; the bass swaps hands via EQ
    EqSwap = 2,
    /// Instant cut at center
    HardCut = 3,
}

impl From<u8> for CurveType {
    fn from(value: u8) -> Self {
        match value {
            0 => CurveType::Linear,
            2 => CurveType::EqSwap,
            3 => CurveType::HardCut,
            _ => CurveType::EqualPower,
        }
    }
}

/// Crossfader between two decks
pub struct Crossfader {
    position: AtomicF32,
    curve: AtomicU8,
    automating: AtomicBool,
    auto_start: AtomicF32,
    auto_end: AtomicF32,
    auto_total_frames: AtomicUsize,
    auto_done_frames: AtomicUsize,
}

impl Default for Crossfader {
    fn default() -> Self {
        Self::new()
    }
}

impl Crossfader {
    pub fn new() -> Self {
        Self {
            position: AtomicF32::new(-1.0),
            curve: AtomicU8::new(CurveType::EqualPower as u8),
            automating: AtomicBool::new(false),
            auto_start: AtomicF32::new(0.0),
            auto_end: AtomicF32::new(0.0),
            auto_total_frames: AtomicUsize::new(0),
            auto_done_frames: AtomicUsize::new(0),
        }
    }

    /// Set the position directly, clamped to [-1, +1]
    pub fn set_position(&self, position: f32) {
        self.position.store(position.clamp(-1.0, 1.0), Ordering::Release);
    }

    pub fn position(&self) -> f32 {
        self.position.load(Ordering::Acquire)
    }

    pub fn set_curve(&self, curve: CurveType) {
        self.curve.store(curve as u8, Ordering::Release);
    }

    pub fn curve(&self) -> CurveType {
        CurveType::from(self.curve.load(Ordering::Acquire))
    }

    /// Start an automated sweep over `duration_frames` frames
    ///
    /// The position follows a smoothstep from `from` to `to` as the
    /// audio thread reports rendered frames through `get_volumes` /
    /// `get_mix_params`.
    pub fn start_automation(&self, from: f32, to: f32, duration_frames: usize) {
        if duration_frames == 0 {
            self.automating.store(false, Ordering::Release);
            self.set_position(to);
            return;
        }

        self.auto_start.store(from, Ordering::Release);
        self.auto_end.store(to, Ordering::Release);
        self.auto_total_frames.store(duration_frames, Ordering::Release);
        self.auto_done_frames.store(0, Ordering::Release);
        self.set_position(from);
        self.automating.store(true, Ordering::Release);
    }

    /// Stop automation, leaving the position wherever it reached
    pub fn stop_automation(&self) {
        self.automating.store(false, Ordering::Release);
    }

    pub fn is_automating(&self) -> bool {
        self.automating.load(Ordering::Acquire)
    }

    /// Deck gains only, advancing automation by `frames`
    pub fn get_volumes(&self, frames: usize) -> (f32, f32) {
        let pos = self.advance_automation(frames);
        Self::compute_volumes(pos, self.curve())
    }

    /// Full per-deck mix parameters, advancing automation by `frames`
    pub fn get_mix_params(&self, frames: usize) -> MixParams {
        let pos = self.advance_automation(frames);
        self.compute_mix_params(pos)
    }

    /// Advance the automation accumulator and return the new position
    fn advance_automation(&self, frames: usize) -> f32 {
        if !self.automating.load(Ordering::Acquire) || frames == 0 {
            return self.position();
        }

        let total = self.auto_total_frames.load(Ordering::Acquire);
        let done = self.auto_done_frames.fetch_add(frames, Ordering::AcqRel) + frames;

        let pos = if done >= total {
            let end = self.auto_end.load(Ordering::Acquire);
            self.automating.store(false, Ordering::Release);
            end
        } else {
            let start = self.auto_start.load(Ordering::Acquire);
            let end = self.auto_end.load(Ordering::Acquire);
            let t = done as f32 / total as f32;
            let t = t * t * (3.0 - 2.0 * t);
            start + t * (end - start)
        };

        self.position.store(pos, Ordering::Release);
        pos
    }

    fn compute_volumes(pos: f32, curve: CurveType) -> (f32, f32) {
        let n = ((pos + 1.0) / 2.0).clamp(0.0, 1.0);

        match curve {
            CurveType::Linear => (1.0 - n, n),
            CurveType::EqualPower => {
                let angle = n * std::f32::consts::FRAC_PI_2;
                (angle.cos(), angle.sin())
            }
            CurveType::EqSwap => {
                // Both tracks stay loud while the EQ does the work
                if n < 0.5 {
                    (1.0, n * 2.0)
                } else {
                    ((1.0 - n) * 2.0, 1.0)
                }
            }
            CurveType::HardCut => {
                if n < 0.5 {
                    (1.0, 0.0)
                } else {
                    (0.0, 1.0)
                }
            }
        }
    }

    fn compute_mix_params(&self, pos: f32) -> MixParams {
        let curve = self.curve();
        let (gain_a, gain_b) = Self::compute_volumes(pos, curve);
        let mut params = MixParams {
            gain_a,
            gain_b,
            ..Default::default()
        };

        if curve != CurveType::EqSwap {
            return params;
        }

        // The classic EQ-swap transition in three phases:
        //   n in [0, 0.4):  cut A's bass, raise B's mids, B's bass killed
        //   n in [0.4, 0.6): swap zone, B's bass fades back in
        //   n in [0.6, 1.0]: A's mids/highs fade out, B fully restored
        let n = ((pos + 1.0) / 2.0).clamp(0.0, 1.0);

        if n < 0.4 {
            let t = n / 0.4;
            params.eq_low_a = KILL_DB * t;
            params.eq_low_b = KILL_DB;
            params.eq_mid_b = KILL_DB * (1.0 - t);
        } else if n < 0.6 {
            let t = (n - 0.4) / 0.2;
            params.eq_low_a = KILL_DB;
            params.eq_low_b = KILL_DB * (1.0 - t);
        } else {
            let t = (n - 0.6) / 0.4;
            params.eq_low_a = KILL_DB;
            params.eq_mid_a = KILL_DB * t;
            params.eq_high_a = KILL_DB * t;
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_deck_a() {
        let fader = Crossfader::new();
        assert_eq!(fader.position(), -1.0);

        let (a, b) = fader.get_volumes(0);
        assert!((a - 1.0).abs() < 1e-6);
        assert!(b.abs() < 1e-6);
    }

    #[test]
    fn test_gains_stay_in_range_for_all_curves() {
        let fader = Crossfader::new();
        for curve in [CurveType::Linear, CurveType::EqualPower, CurveType::EqSwap, CurveType::HardCut] {
            fader.set_curve(curve);
            for i in 0..=100 {
                let pos = -1.0 + i as f32 * 0.02;
                fader.set_position(pos);
                let (a, b) = fader.get_volumes(0);
                assert!((0.0..=1.0).contains(&a), "{:?} gain_a {} at {}", curve, a, pos);
                assert!((0.0..=1.0).contains(&b), "{:?} gain_b {} at {}", curve, b, pos);
            }
        }
    }

    #[test]
    fn test_equal_power_preserves_power() {
        let fader = Crossfader::new();
        fader.set_curve(CurveType::EqualPower);
        for i in 0..=100 {
            fader.set_position(-1.0 + i as f32 * 0.02);
            let (a, b) = fader.get_volumes(0);
            let power = a * a + b * b;
            assert!((0.99..=1.01).contains(&power), "power {} out of range", power);
        }
    }

    #[test]
    fn test_hard_cut_sums_to_one() {
        let fader = Crossfader::new();
        fader.set_curve(CurveType::HardCut);
        for i in 0..=100 {
            fader.set_position(-1.0 + i as f32 * 0.02);
            let (a, b) = fader.get_volumes(0);
            assert_eq!(a + b, 1.0);
        }
    }

    #[test]
    fn test_eq_swap_envelope() {
        let fader = Crossfader::new();
        fader.set_curve(CurveType::EqSwap);

        // Full deck A: B's bass is killed, A untouched
        fader.set_position(-1.0);
        let params = fader.get_mix_params(0);
        assert_eq!(params.eq_low_b, -60.0);
        assert_eq!(params.eq_low_a, 0.0);
        assert_eq!(params.eq_mid_a, 0.0);

        // Center: A's bass killed, B's bass half restored
        fader.set_position(0.0);
        let params = fader.get_mix_params(0);
        assert_eq!(params.eq_low_a, -60.0);
        assert!(params.eq_low_b <= 0.0 && params.eq_low_b >= -60.0);
        assert!((params.eq_low_b - (-30.0)).abs() < 1e-4);

        // Full deck B: all B bands restored
        fader.set_position(1.0);
        let params = fader.get_mix_params(0);
        assert_eq!(params.eq_low_b, 0.0);
        assert_eq!(params.eq_mid_b, 0.0);
        assert_eq!(params.eq_high_b, 0.0);
        // A is fully EQ'd out by now
        assert_eq!(params.eq_low_a, -60.0);
        assert_eq!(params.eq_mid_a, -60.0);
        assert_eq!(params.eq_high_a, -60.0);
    }

    #[test]
    fn test_non_eq_swap_curves_report_flat_eq() {
        let fader = Crossfader::new();
        for curve in [CurveType::Linear, CurveType::EqualPower, CurveType::HardCut] {
            fader.set_curve(curve);
            fader.set_position(0.3);
            let params = fader.get_mix_params(0);
            assert_eq!(params.eq_low_a, 0.0);
            assert_eq!(params.eq_mid_a, 0.0);
            assert_eq!(params.eq_high_a, 0.0);
            assert_eq!(params.eq_low_b, 0.0);
        }
    }

    #[test]
    fn test_automation_reaches_target_exactly() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 1000);
        assert!(fader.is_automating());

        fader.get_mix_params(1000);
        assert!(!fader.is_automating());
        assert_eq!(fader.position(), 1.0);
    }

    #[test]
    fn test_automation_idempotent_after_completion() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 512);
        fader.get_mix_params(512);

        for _ in 0..10 {
            let params = fader.get_mix_params(256);
            assert_eq!(fader.position(), 1.0);
            assert!((params.gain_b - 1.0).abs() < 1e-6);
            assert!(params.gain_a.abs() < 1e-6);
        }
    }

    #[test]
    fn test_automation_smoothstep_midpoint() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 1000);

        // Halfway through the sweep the smoothstep is at 0.5
        fader.get_mix_params(500);
        assert!(fader.position().abs() < 1e-4);
    }

    #[test]
    fn test_automation_eases_in_and_out() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 1000);

        fader.get_mix_params(100);
        let early = fader.position();
        // smoothstep(0.1) = 0.028: barely off the start
        assert!(early < -0.9);

        let fader2 = Crossfader::new();
        fader2.start_automation(-1.0, 1.0, 1000);
        fader2.get_mix_params(900);
        // smoothstep(0.9) = 0.972: nearly at the end
        assert!(fader2.position() > 0.9);
    }

    #[test]
    fn test_stop_automation_holds_position() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 1000);
        fader.get_mix_params(500);
        let held = fader.position();

        fader.stop_automation();
        fader.get_mix_params(400);
        assert_eq!(fader.position(), held);
    }

    #[test]
    fn test_zero_frames_does_not_advance() {
        let fader = Crossfader::new();
        fader.start_automation(-1.0, 1.0, 100);
        let before = fader.position();
        fader.get_mix_params(0);
        assert_eq!(fader.position(), before);
        assert!(fader.is_automating());
    }
}
