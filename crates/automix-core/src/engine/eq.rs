//! 3-band EQ via cascaded biquad filters
//!
//! Low shelf at 250 Hz, peaking at 1 kHz (Q = 0.7), high shelf at 4 kHz.
//! Coefficients follow the RBJ audio EQ cookbook; the filter sections run
//! direct-form II transposed per channel.

use std::f32::consts::PI;

/// EQ band frequencies
const EQ_LOW_FREQ: f32 = 250.0;
const EQ_MID_FREQ: f32 = 1000.0;
const EQ_HIGH_FREQ: f32 = 4000.0;
const EQ_MID_Q: f32 = 0.7;

/// Gains this close to unity leave the EQ bypassed
const BYPASS_THRESHOLD_DB: f32 = 0.01;

/// Biquad filter coefficients
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    /// Unity gain, no filtering
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    /// Low shelf filter coefficients
    pub fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cs = w0.cos();
        let sn = w0.sin();
        let alpha = sn / 2.0 * 2.0_f32.sqrt(); // Q = 0.707
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cs + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cs + 2.0 * sqrt_a * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cs)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cs - 2.0 * sqrt_a * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cs)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cs - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    /// High shelf filter coefficients
    pub fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cs = w0.cos();
        let sn = w0.sin();
        let alpha = sn / 2.0 * 2.0_f32.sqrt();
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cs + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cs + 2.0 * sqrt_a * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cs)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cs - 2.0 * sqrt_a * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cs)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cs - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    /// Peaking EQ filter coefficients
    pub fn peaking(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cs = w0.cos();
        let sn = w0.sin();
        let alpha = sn / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cs) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cs) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// Per-channel biquad state, direct-form II transposed
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, x: f32, c: &BiquadCoeffs) -> f32 {
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 3-band stereo EQ for one deck
///
/// Bypassed (exact identity) while all three gains sit within 0.01 dB of
/// unity; filter state is kept across bypass so re-engaging is
/// artifact-free.
#[derive(Debug)]
pub struct ThreeBandEq {
    low_coeffs: BiquadCoeffs,
    mid_coeffs: BiquadCoeffs,
    high_coeffs: BiquadCoeffs,
    low_state: [BiquadState; 2],
    mid_state: [BiquadState; 2],
    high_state: [BiquadState; 2],
    low_db: f32,
    mid_db: f32,
    high_db: f32,
    sample_rate: f32,
    active: bool,
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low_coeffs: BiquadCoeffs::passthrough(),
            mid_coeffs: BiquadCoeffs::passthrough(),
            high_coeffs: BiquadCoeffs::passthrough(),
            low_state: [BiquadState::default(); 2],
            mid_state: [BiquadState::default(); 2],
            high_state: [BiquadState::default(); 2],
            low_db: 0.0,
            mid_db: 0.0,
            high_db: 0.0,
            sample_rate,
            active: false,
        }
    }

    /// Whether new gains differ enough from the current ones to warrant
    /// recomputing coefficients
    pub fn needs_update(&self, low_db: f32, mid_db: f32, high_db: f32) -> bool {
        (low_db - self.low_db).abs() > BYPASS_THRESHOLD_DB
            || (mid_db - self.mid_db).abs() > BYPASS_THRESHOLD_DB
            || (high_db - self.high_db).abs() > BYPASS_THRESHOLD_DB
    }

    /// Recompute coefficients for the given gains
    pub fn update(&mut self, sample_rate: f32, low_db: f32, mid_db: f32, high_db: f32) {
        self.sample_rate = sample_rate;
        self.low_db = low_db;
        self.mid_db = mid_db;
        self.high_db = high_db;
        self.active = low_db.abs() > BYPASS_THRESHOLD_DB
            || mid_db.abs() > BYPASS_THRESHOLD_DB
            || high_db.abs() > BYPASS_THRESHOLD_DB;

        if self.active {
            self.low_coeffs = BiquadCoeffs::low_shelf(sample_rate, EQ_LOW_FREQ, low_db);
            self.mid_coeffs = BiquadCoeffs::peaking(sample_rate, EQ_MID_FREQ, mid_db, EQ_MID_Q);
            self.high_coeffs = BiquadCoeffs::high_shelf(sample_rate, EQ_HIGH_FREQ, high_db);
        }
    }

    /// Process one stereo frame through all three bands
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        if !self.active {
            return (left, right);
        }

        let mut l = self.low_state[0].process(left, &self.low_coeffs);
        l = self.mid_state[0].process(l, &self.mid_coeffs);
        l = self.high_state[0].process(l, &self.high_coeffs);

        let mut r = self.low_state[1].process(right, &self.low_coeffs);
        r = self.mid_state[1].process(r, &self.mid_coeffs);
        r = self.high_state[1].process(r, &self.high_coeffs);

        (l, r)
    }

    /// Clear filter memory (track load or seek)
    pub fn reset(&mut self) {
        for ch in 0..2 {
            self.low_state[ch].reset();
            self.mid_state[ch].reset();
            self.high_state[ch].reset();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
