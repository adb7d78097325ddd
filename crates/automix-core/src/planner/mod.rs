//! Transition planner
//!
//! Pure functions that turn two analyzed tracks into a transition plan:
//! a beat-snapped, phrase-aware out-point on the outgoing track, an
//! in-point on the incoming one, a tempo stretch ratio, an optional
//! pitch-shift suggestion, and crossfade/EQ parameters for the mixer.

use serde::{Deserialize, Serialize};

use crate::music::CamelotKey;
use crate::store::TrackFeatures;

/// Number of evenly spaced candidates sampled across a search window
const WINDOW_SAMPLES: usize = 40;

/// Beats per phrase boundary: 8 bars and 16 bars of 4/4
const PHRASE_BEATS: [usize; 2] = [32, 64];

/// Engine-wide transition tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Crossfade length in beats
    pub crossfade_beats: f32,
    /// Prefer the EQ-swap transition style
    pub use_eq_swap: bool,
    /// Maximum tolerated tempo stretch, as a fraction (0.06 = +-6%)
    pub stretch_limit: f32,
    pub min_transition_seconds: f32,
    pub max_transition_seconds: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            crossfade_beats: 16.0,
            use_eq_swap: false,
            stretch_limit: 0.06,
            min_transition_seconds: 4.0,
            max_transition_seconds: 32.0,
        }
    }
}

/// A chosen point in a track where a transition starts or lands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionPoint {
    pub time_seconds: f32,
    /// Index into the track's beat list, -1 when no beats are known
    pub beat_index: i32,
    /// Interpolated energy at this point, [0, 1]
    pub energy: f32,
}

impl Default for TransitionPoint {
    fn default() -> Self {
        Self {
            time_seconds: 0.0,
            beat_index: -1,
            energy: 0.0,
        }
    }
}

/// EQ automation hints attached to a plan
///
/// Breakpoints are fractions of the transition (0 = start, 1 = end):
/// when the outgoing low band is cut, and when the incoming low band is
/// restored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqHint {
    pub use_eq_swap: bool,
    pub low_cut_start: f32,
    pub low_cut_end: f32,
    pub low_restore_start: f32,
    pub low_restore_end: f32,
}

impl Default for EqHint {
    fn default() -> Self {
        Self {
            use_eq_swap: false,
            low_cut_start: 0.0,
            low_cut_end: 0.5,
            low_restore_start: 0.5,
            low_restore_end: 1.0,
        }
    }
}

/// A complete planned transition between two tracks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub from_id: i64,
    pub to_id: i64,
    pub out_point: TransitionPoint,
    pub in_point: TransitionPoint,
    /// Tempo ratio applied to the incoming track (1.0 = untouched)
    pub bpm_stretch_ratio: f32,
    /// Suggested key nudge in semitones; informational only
    pub pitch_shift_semitones: i32,
    /// Crossfade length in seconds
    pub crossfade_duration: f32,
    pub eq_hint: EqHint,
}

/// Build a transition plan from `from` into `to`
pub fn create_plan(
    from: &TrackFeatures,
    to: &TrackFeatures,
    config: &TransitionConfig,
) -> TransitionPlan {
    let out_point = find_out_point(from, config);
    let in_point = find_in_point(to, config);

    let mut ratio = stretch_ratio(from.bpm, to.bpm);
    if (1.0 - ratio).abs() > config.stretch_limit {
        ratio = 1.0;
    }
    ratio = ratio.clamp(0.5, 2.0);

    TransitionPlan {
        from_id: from.id,
        to_id: to.id,
        out_point,
        in_point,
        bpm_stretch_ratio: ratio,
        pitch_shift_semitones: pitch_shift_hint(&from.key, &to.key),
        crossfade_duration: crossfade_duration(from.bpm, to.bpm, config),
        eq_hint: eq_hint(&out_point, &in_point, config),
    }
}

/// Pick where the outgoing track starts fading
///
/// Searches the last `max..min` transition seconds for a beat-snapped
/// point with low energy, good phrase alignment, a position near the
/// natural tail, and falling energy.
pub fn find_out_point(track: &TrackFeatures, config: &TransitionConfig) -> TransitionPoint {
    if track.duration <= 0.0 {
        return TransitionPoint::default();
    }

    let start = (track.duration - config.max_transition_seconds).max(0.0);
    let end = (track.duration - config.min_transition_seconds).max(0.0);

    if start >= end {
        // Track too short for the configured window
        let time = 0.7 * track.duration;
        return point_at(track, time);
    }

    let default_out = (track.duration - 16.0).max(0.0);
    let phrases = phrase_boundaries(&track.beats, start, end);
    let candidates = candidate_times(track, start, end, &phrases);

    let mut best_time = default_out;
    let mut best_score = f32::MAX;

    for &t in &candidates {
        let energy = energy_at(&track.energy_curve, t, track.duration);
        let phrase = phrase_alignment(&phrases, t);
        let position = (t - default_out).abs() / track.duration;
        let trend = energy_trend(&track.energy_curve, t, track.duration);

        let score = 0.35 * energy + 0.30 * phrase + 0.15 * position + 0.20 * trend;
        if score < best_score {
            best_score = score;
            best_time = t;
        }
    }

    point_at(track, best_time)
}

/// Pick where the incoming track starts playing
///
/// Searches the first `min..max` transition seconds, preferring phrase
/// starts with low energy that is about to rise. No position bias; any
/// good phrase start is acceptable.
pub fn find_in_point(track: &TrackFeatures, config: &TransitionConfig) -> TransitionPoint {
    if track.duration <= 0.0 {
        return TransitionPoint::default();
    }

    let start = config.min_transition_seconds;
    let end = track.duration.min(config.max_transition_seconds);

    if start >= end {
        return point_at(track, 0.0);
    }

    let phrases = phrase_boundaries(&track.beats, start, end);
    let candidates = candidate_times(track, start, end, &phrases);

    let mut best_time = start;
    let mut best_score = f32::MAX;

    for &t in &candidates {
        let energy = energy_at(&track.energy_curve, t, track.duration);
        let phrase = phrase_alignment(&phrases, t);
        let trend = energy_trend(&track.energy_curve, t, track.duration);

        // Rising energy is good for the incoming track
        let score = 0.35 * energy + 0.35 * phrase + 0.30 * (1.0 - trend);
        if score < best_score {
            best_score = score;
            best_time = t;
        }
    }

    point_at(track, best_time)
}

/// Tempo ratio that plays `source_bpm` material at `target_bpm`
///
/// Folds half/double-time relationships, treats near-unity as exactly
/// 1.0, and returns 1.0 when either tempo is unknown.
pub fn stretch_ratio(target_bpm: f32, source_bpm: f32) -> f32 {
    if target_bpm <= 0.0 || source_bpm <= 0.0 {
        return 1.0;
    }

    let mut ratio = target_bpm / source_bpm;
    if ratio > 1.5 {
        ratio /= 2.0;
    }
    if ratio < 0.67 {
        ratio *= 2.0;
    }

    if (1.0 - ratio).abs() < 0.01 {
        1.0
    } else {
        ratio
    }
}

/// Suggested semitone shift for key matching
///
/// Only emitted for near-miss keys (Camelot distance 1 or 2) where the
/// shift is small enough to sound natural (two semitones or less).
fn pitch_shift_hint(from_key: &str, to_key: &str) -> i32 {
    let (Some(from), Some(to)) = (CamelotKey::parse(from_key), CamelotKey::parse(to_key)) else {
        return 0;
    };

    let distance = from.distance(&to);
    if distance != 1 && distance != 2 {
        return 0;
    }

    let shift = to.semitones_to(&from);
    if shift.abs() <= 2 {
        shift
    } else {
        0
    }
}

/// Crossfade length in seconds for the configured beat count
fn crossfade_duration(from_bpm: f32, to_bpm: f32, config: &TransitionConfig) -> f32 {
    let avg_bpm = if from_bpm > 0.0 && to_bpm > 0.0 {
        (from_bpm + to_bpm) / 2.0
    } else {
        120.0
    };

    (config.crossfade_beats * 60.0 / avg_bpm).clamp(
        config.min_transition_seconds,
        config.max_transition_seconds,
    )
}

/// EQ hint for the transition, shaped by the boundary energies
fn eq_hint(out_point: &TransitionPoint, in_point: &TransitionPoint, config: &TransitionConfig) -> EqHint {
    let mut hint = EqHint::default();
    if !config.use_eq_swap {
        return hint;
    }

    hint.use_eq_swap = true;

    // High outgoing energy: get the bass out of the way sooner
    if out_point.energy > 0.7 {
        hint.low_cut_end = 0.4;
    }
    // Quiet incoming intro: hold its bass back a little longer
    if in_point.energy < 0.3 {
        hint.low_restore_start = 0.6;
    }

    hint
}

/// Index of the beat closest to `time`, -1 when no beats are known
pub fn closest_beat(beats: &[f32], time: f32) -> i32 {
    if beats.is_empty() {
        return -1;
    }

    let after = beats.partition_point(|&b| b < time);
    if after == 0 {
        return 0;
    }
    if after >= beats.len() {
        return beats.len() as i32 - 1;
    }

    let prev = after - 1;
    if (beats[after] - time).abs() < (beats[prev] - time).abs() {
        after as i32
    } else {
        prev as i32
    }
}

/// Piecewise-linear energy lookup at `time`, 0.5 when no curve is known
pub fn energy_at(energy_curve: &[f32], time: f32, duration: f32) -> f32 {
    if energy_curve.is_empty() || duration <= 0.0 {
        return 0.5;
    }
    if energy_curve.len() == 1 {
        return energy_curve[0];
    }

    let normalized = (time / duration).clamp(0.0, 1.0);
    let index_f = normalized * (energy_curve.len() - 1) as f32;
    let index = index_f as usize;

    if index >= energy_curve.len() - 1 {
        return *energy_curve.last().unwrap_or(&0.5);
    }

    let frac = index_f - index as f32;
    energy_curve[index] * (1.0 - frac) + energy_curve[index + 1] * frac
}

/// Build the beat-snapped candidate set for a search window
fn candidate_times(track: &TrackFeatures, start: f32, end: f32, phrases: &[f32]) -> Vec<f32> {
    let mut times = Vec::with_capacity(WINDOW_SAMPLES + phrases.len());

    for i in 0..WINDOW_SAMPLES {
        times.push(start + (end - start) * i as f32 / (WINDOW_SAMPLES - 1) as f32);
    }
    times.extend_from_slice(phrases);

    let mut snapped: Vec<f32> = times
        .into_iter()
        .filter_map(|t| {
            let idx = closest_beat(&track.beats, t);
            let t = if idx >= 0 { track.beats[idx as usize] } else { t };
            (t >= start && t <= end).then_some(t)
        })
        .collect();

    // Ascending order so equal scores resolve to the earliest point
    snapped.sort_by(|a, b| a.total_cmp(b));
    snapped.dedup();
    snapped
}

/// Beat times at 8-bar and 16-bar phrase starts inside [start, end]
fn phrase_boundaries(beats: &[f32], start: f32, end: f32) -> Vec<f32> {
    let mut boundaries = Vec::new();
    for &stride in &PHRASE_BEATS {
        for k in (0..beats.len()).step_by(stride) {
            let t = beats[k];
            if t >= start && t <= end {
                boundaries.push(t);
            }
        }
    }
    boundaries.sort_by(|a, b| a.total_cmp(b));
    boundaries.dedup();
    boundaries
}

/// Distance to the nearest phrase boundary mapped to [0, 1]
///
/// 0 means exactly on a boundary; without beats every candidate scores a
/// neutral 0.5.
fn phrase_alignment(phrases: &[f32], time: f32) -> f32 {
    if phrases.is_empty() {
        return 0.5;
    }
    let nearest = phrases
        .iter()
        .map(|&p| (p - time).abs())
        .fold(f32::MAX, f32::min);
    (nearest / 2.0).clamp(0.0, 1.0)
}

/// Local energy slope around `time` mapped to [0, 1]; 0.5 is flat
fn energy_trend(energy_curve: &[f32], time: f32, duration: f32) -> f32 {
    let after = energy_at(energy_curve, time + 1.0, duration);
    let before = energy_at(energy_curve, time - 1.0, duration);
    ((after - before + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn point_at(track: &TrackFeatures, time: f32) -> TransitionPoint {
    TransitionPoint {
        time_seconds: time,
        beat_index: closest_beat(&track.beats, time),
        energy: energy_at(&track.energy_curve, time, track.duration),
    }
}
