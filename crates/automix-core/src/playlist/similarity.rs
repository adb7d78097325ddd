//! Weighted track similarity
//!
//! Combines tempo, key, timbre, energy and duration distances into a
//! single score used to filter and rank playlist candidates.

use serde::{Deserialize, Serialize};

use crate::music::camelot_distance;
use crate::store::TrackFeatures;

use super::PlaylistRules;

/// Resampling length for comparing energy curves of different sizes
const ENERGY_COMPARE_POINTS: usize = 100;

/// Relative importance of each feature distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub bpm: f32,
    pub key: f32,
    pub mfcc: f32,
    pub energy: f32,
    pub chroma: f32,
    pub duration: f32,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            bpm: 1.0,
            key: 1.0,
            mfcc: 0.5,
            energy: 0.3,
            chroma: 0.4,
            duration: 0.2,
        }
    }
}

/// Weighted distance/similarity calculator over track features
#[derive(Debug, Clone, Default)]
pub struct SimilarityCalculator {
    weights: SimilarityWeights,
}

impl SimilarityCalculator {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    pub fn set_weights(&mut self, weights: SimilarityWeights) {
        self.weights = weights;
    }

    /// Weighted feature distance, normalized by the active weight mass
    ///
    /// Features missing on either side are skipped rather than penalized.
    pub fn distance(&self, a: &TrackFeatures, b: &TrackFeatures) -> f32 {
        let mut d = 0.0;
        let mut total_weight = 0.0;

        if self.weights.bpm > 0.0 && a.bpm > 0.0 && b.bpm > 0.0 {
            d += self.weights.bpm * bpm_distance(a.bpm, b.bpm);
            total_weight += self.weights.bpm;
        }

        if self.weights.key > 0.0 && !a.key.is_empty() && !b.key.is_empty() {
            d += self.weights.key * key_distance(&a.key, &b.key);
            total_weight += self.weights.key;
        }

        if self.weights.mfcc > 0.0 && !a.mfcc.is_empty() && !b.mfcc.is_empty() {
            d += self.weights.mfcc * cosine_distance(&a.mfcc, &b.mfcc);
            total_weight += self.weights.mfcc;
        }

        if self.weights.energy > 0.0 && !a.energy_curve.is_empty() && !b.energy_curve.is_empty() {
            d += self.weights.energy * energy_distance(&a.energy_curve, &b.energy_curve);
            total_weight += self.weights.energy;
        }

        if self.weights.chroma > 0.0 && !a.chroma.is_empty() && !b.chroma.is_empty() {
            d += self.weights.chroma * cosine_distance(&a.chroma, &b.chroma);
            total_weight += self.weights.chroma;
        }

        if self.weights.duration > 0.0 && a.duration > 0.0 && b.duration > 0.0 {
            d += self.weights.duration * duration_distance(a.duration, b.duration);
            total_weight += self.weights.duration;
        }

        if total_weight > 0.0 {
            d / total_weight
        } else {
            0.0
        }
    }

    /// Similarity in (0, 1], 1 meaning identical features
    pub fn similarity(&self, a: &TrackFeatures, b: &TrackFeatures) -> f32 {
        1.0 / (1.0 + self.distance(a, b))
    }

    /// Whether `b` may follow `a` under the given rules
    pub fn are_compatible(&self, a: &TrackFeatures, b: &TrackFeatures, rules: &PlaylistRules) -> bool {
        if rules.bpm_tolerance > 0.0 && a.bpm > 0.0 && b.bpm > 0.0 {
            if bpm_distance(a.bpm, b.bpm) > rules.bpm_tolerance {
                return false;
            }
        }

        if !a.key.is_empty() && !b.key.is_empty() {
            let key_dist = camelot_distance(&a.key, &b.key);
            if !rules.allow_key_change {
                if key_dist > 0 {
                    return false;
                }
            } else if rules.max_key_distance > 0 && key_dist as i32 > rules.max_key_distance {
                return false;
            }
        }

        if rules.min_energy_match > 0.0
            && !a.energy_curve.is_empty()
            && !b.energy_curve.is_empty()
        {
            let energy_sim = 1.0 - energy_distance(&a.energy_curve, &b.energy_curve);
            if energy_sim < rules.min_energy_match {
                return false;
            }
        }

        if !rules.style_filter.is_empty() && !rules.allow_cross_style {
            match &b.genre {
                Some(genre) if rules.style_filter.iter().any(|s| s.eq_ignore_ascii_case(genre)) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Tempo distance accounting for half/double-time relationships
pub fn bpm_distance(bpm1: f32, bpm2: f32) -> f32 {
    if bpm1 <= 0.0 || bpm2 <= 0.0 {
        return 0.0;
    }

    let ratio = bpm1 / bpm2;
    [(1.0 - ratio).abs(), (2.0 - ratio).abs(), (0.5 - ratio).abs()]
        .into_iter()
        .fold(f32::MAX, f32::min)
}

/// Camelot wheel distance normalized to [0, 1]
fn key_distance(key1: &str, key2: &str) -> f32 {
    camelot_distance(key1, key2) as f32 / 6.0
}

/// Cosine distance between feature vectors, 1.0 for mismatched input
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    1.0 - similarity.clamp(-1.0, 1.0)
}

/// Mean absolute difference of energy curves resampled to common length
fn energy_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let sample = |curve: &[f32], i: usize| -> f32 {
        if curve.len() == 1 {
            return curve[0];
        }
        let pos = i as f32 / (ENERGY_COMPARE_POINTS - 1) as f32 * (curve.len() - 1) as f32;
        let idx = pos as usize;
        if idx >= curve.len() - 1 {
            curve[curve.len() - 1]
        } else {
            let frac = pos - idx as f32;
            curve[idx] * (1.0 - frac) + curve[idx + 1] * frac
        }
    };

    let mut sum = 0.0;
    for i in 0..ENERGY_COMPARE_POINTS {
        sum += (sample(a, i) - sample(b, i)).abs();
    }
    (sum / ENERGY_COMPARE_POINTS as f32).clamp(0.0, 1.0)
}

/// Relative duration difference in [0, 1]
fn duration_distance(a: f32, b: f32) -> f32 {
    ((a - b).abs() / a.max(b)).clamp(0.0, 1.0)
}
