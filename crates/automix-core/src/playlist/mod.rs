//! Playlist types and the automatic playlist generator
//!
//! A playlist is an ordered list of track ids with a transition plan
//! attached between consecutive entries. The generator grows one from a
//! seed track by repeatedly scoring the remaining candidates against the
//! current tail track.

mod similarity;

pub use similarity::{SimilarityCalculator, SimilarityWeights};

use std::collections::VecDeque;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::planner::{self, TransitionConfig, TransitionPlan};
use crate::store::TrackFeatures;

/// How many top-scored candidates the weighted pick chooses among
const PICK_POOL: usize = 5;

/// How many recent tracks the variety score looks back over
const RECENT_WINDOW: usize = 5;

/// One playlist slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub track_id: i64,
    /// Plan for mixing into the following entry; the last entry has none
    pub transition_to_next: Option<TransitionPlan>,
}

/// An ordered sequence of tracks with transition plans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn track_ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.track_id).collect()
    }
}

/// Target energy shape over the course of a generated set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnergyArc {
    #[default]
    None,
    /// Gradually increasing energy
    Ascending,
    /// Low, up to a peak around 60%, back down (party mode)
    Peak,
    /// Gradually decreasing energy (closing set)
    Descending,
    /// Oscillating energy
    Wave,
}

/// Constraints and preferences for playlist generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRules {
    /// Maximum BPM distance between neighbors; 0 allows any
    pub bpm_tolerance: f32,
    pub allow_key_change: bool,
    /// Maximum Camelot wheel distance between neighbors; 0 allows any
    pub max_key_distance: i32,
    /// Minimum energy-curve similarity between neighbors, [0, 1]
    pub min_energy_match: f32,
    pub style_filter: Vec<String>,
    pub allow_cross_style: bool,
    pub weights: SimilarityWeights,
    pub energy_arc: EnergyArc,
    /// Maximum BPM jump per step, as percent; 0 disables the check
    pub bpm_step_limit: f32,
    pub prefer_bpm_progression: bool,
    /// 0 picks a fresh random stream; any other value is reproducible
    pub random_seed: u64,
}

impl Default for PlaylistRules {
    fn default() -> Self {
        Self {
            bpm_tolerance: 0.0,
            allow_key_change: true,
            max_key_distance: 0,
            min_energy_match: 0.0,
            style_filter: Vec::new(),
            allow_cross_style: true,
            weights: SimilarityWeights::default(),
            energy_arc: EnergyArc::None,
            bpm_step_limit: 0.0,
            prefer_bpm_progression: false,
            random_seed: 0,
        }
    }
}

/// Grows playlists from a seed track by candidate scoring
#[derive(Debug, Default)]
pub struct PlaylistGenerator {
    similarity: SimilarityCalculator,
}

impl PlaylistGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a playlist of up to `count` tracks starting from `seed`
    ///
    /// Candidates that violate the rules are filtered per step; when the
    /// pool runs dry the constraints are relaxed once before giving up,
    /// so the result may be shorter than `count`.
    pub fn generate(
        &mut self,
        seed: &TrackFeatures,
        candidates: &[TrackFeatures],
        count: usize,
        rules: &PlaylistRules,
        config: &TransitionConfig,
    ) -> Playlist {
        self.similarity.set_weights(rules.weights);

        let mut rng = if rules.random_seed != 0 {
            StdRng::seed_from_u64(rules.random_seed)
        } else {
            StdRng::from_entropy()
        };

        let mut playlist = Playlist::default();
        playlist.entries.push(PlaylistEntry {
            track_id: seed.id,
            transition_to_next: None,
        });

        let mut available: Vec<TrackFeatures> = candidates
            .iter()
            .filter(|t| t.id != seed.id)
            .cloned()
            .collect();

        let mut recent: VecDeque<TrackFeatures> = VecDeque::new();
        recent.push_back(seed.clone());
        let mut current = seed.clone();

        while playlist.len() < count && !available.is_empty() {
            let progress = playlist.len() as f32 / count as f32;

            let next = match self.select_next(&current, &available, rules, progress, &recent, &mut rng) {
                Some(next) => next,
                None => {
                    // Nothing compatible left; relax the hard constraints
                    let relaxed = PlaylistRules {
                        bpm_tolerance: 0.0,
                        max_key_distance: 0,
                        allow_key_change: true,
                        min_energy_match: 0.0,
                        bpm_step_limit: 0.0,
                        allow_cross_style: true,
                        ..rules.clone()
                    };
                    match self.select_next(&current, &available, &relaxed, progress, &recent, &mut rng) {
                        Some(next) => next,
                        None => break,
                    }
                }
            };

            let plan = planner::create_plan(&current, &next, config);
            if let Some(last) = playlist.entries.last_mut() {
                last.transition_to_next = Some(plan);
            }
            playlist.entries.push(PlaylistEntry {
                track_id: next.id,
                transition_to_next: None,
            });

            available.retain(|t| t.id != next.id);
            recent.push_back(next.clone());
            if recent.len() > RECENT_WINDOW {
                recent.pop_front();
            }
            current = next;
        }

        log::info!(
            "generated playlist: {} tracks from seed {} ({} candidates)",
            playlist.len(),
            seed.id,
            candidates.len()
        );

        playlist
    }

    /// Build a playlist from an explicit track order, planning each seam
    pub fn create_with_transitions(
        &self,
        tracks: &[TrackFeatures],
        config: &TransitionConfig,
    ) -> Playlist {
        let mut playlist = Playlist::default();

        for (i, track) in tracks.iter().enumerate() {
            let transition_to_next = tracks
                .get(i + 1)
                .map(|next| planner::create_plan(track, next, config));
            playlist.entries.push(PlaylistEntry {
                track_id: track.id,
                transition_to_next,
            });
        }

        playlist
    }

    fn select_next(
        &self,
        current: &TrackFeatures,
        available: &[TrackFeatures],
        rules: &PlaylistRules,
        progress: f32,
        recent: &VecDeque<TrackFeatures>,
        rng: &mut StdRng,
    ) -> Option<TrackFeatures> {
        let mut scored: Vec<(&TrackFeatures, f32)> = available
            .iter()
            .filter(|t| {
                if !self.similarity.are_compatible(current, t, rules) {
                    return false;
                }
                if rules.bpm_step_limit > 0.0 && current.bpm > 0.0 && t.bpm > 0.0 {
                    let step = similarity::bpm_distance(current.bpm, t.bpm);
                    if step > rules.bpm_step_limit / 100.0 {
                        return false;
                    }
                }
                true
            })
            .map(|t| (t, self.score_candidate(current, t, rules, progress, recent)))
            .collect();

        if scored.is_empty() {
            return None;
        }

        // Best first; equal scores resolve by id so a fixed seed always
        // reproduces the same playlist
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id))
        });

        let pool = scored.len().min(PICK_POOL);
        let weights: Vec<f32> = (0..pool).map(|i| (-0.5 * i as f32).exp()).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        let pick = dist.sample(rng);

        Some(scored[pick].0.clone())
    }

    fn score_candidate(
        &self,
        current: &TrackFeatures,
        candidate: &TrackFeatures,
        rules: &PlaylistRules,
        progress: f32,
        recent: &VecDeque<TrackFeatures>,
    ) -> f32 {
        let sim_score = self.similarity.similarity(current, candidate);

        let energy_arc_score = if rules.energy_arc != EnergyArc::None {
            let target = target_energy(rules.energy_arc, progress);
            let actual = average_energy(candidate);
            1.0 - (target - actual).abs().clamp(0.0, 1.0)
        } else {
            1.0
        };

        let bpm_prog_score = if rules.prefer_bpm_progression && current.bpm > 0.0 && candidate.bpm > 0.0 {
            1.0 / (1.0 + similarity::bpm_distance(current.bpm, candidate.bpm) * 20.0)
        } else {
            1.0
        };

        let variety_score = if !recent.is_empty() {
            let total: f32 = recent
                .iter()
                .map(|r| self.similarity.distance(candidate, r))
                .sum();
            (total / recent.len() as f32 * 2.0).clamp(0.0, 1.0)
        } else {
            1.0
        };

        0.35 * sim_score + 0.25 * energy_arc_score + 0.20 * bpm_prog_score + 0.20 * variety_score
    }
}

/// Target energy for a point of the set under the given arc
fn target_energy(arc: EnergyArc, progress: f32) -> f32 {
    let progress = progress.clamp(0.0, 1.0);
    match arc {
        EnergyArc::None => 0.5,
        EnergyArc::Ascending => 0.2 + 0.7 * progress,
        EnergyArc::Peak => {
            if progress < 0.6 {
                0.3 + 0.7 * (progress / 0.6)
            } else {
                1.0 - 0.6 * ((progress - 0.6) / 0.4)
            }
        }
        EnergyArc::Descending => 0.9 - 0.7 * progress,
        EnergyArc::Wave => 0.5 + 0.3 * (progress * 4.0 * std::f32::consts::PI).sin(),
    }
}

fn average_energy(track: &TrackFeatures) -> f32 {
    if track.energy_curve.is_empty() {
        return 0.5;
    }
    track.energy_curve.iter().sum::<f32>() / track.energy_curve.len() as f32
}
