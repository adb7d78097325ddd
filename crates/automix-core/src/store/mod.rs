//! Track feature source contract
//!
//! The engine consumes analyzed track features through the `TrackStore`
//! trait; how they are produced and persisted is the host's business.
//! `MemoryStore` is the reference implementation used by hosts that keep
//! their library in memory, and by the test suite.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Analyzed features for one track, as produced by the external analyzer
///
/// `bpm` is 0 when unknown, `beats` are ascending onset times in seconds
/// and may be empty, `key` is Camelot notation ("8A") or empty, and
/// `energy_curve` is a normalized [0, 1] profile of any length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub id: i64,
    pub path: String,
    pub duration: f32,
    pub bpm: f32,
    pub beats: Vec<f32>,
    pub key: String,
    pub energy_curve: Vec<f32>,
    /// 13-dimensional MFCC mean, empty when not analyzed
    #[serde(default)]
    pub mfcc: Vec<f32>,
    /// 12-dimensional chroma mean, empty when not analyzed
    #[serde(default)]
    pub chroma: Vec<f32>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// Read access to the analyzed library
pub trait TrackStore: Send + Sync {
    /// Look up a track by id
    fn track(&self, id: i64) -> Option<TrackFeatures>;

    /// Total number of tracks
    fn track_count(&self) -> usize;

    /// Case-insensitive substring search over track paths
    fn search(&self, pattern: &str) -> Vec<TrackFeatures>;

    /// All tracks, unordered
    fn all_tracks(&self) -> Vec<TrackFeatures>;
}

/// In-memory track store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tracks: HashMap<i64, TrackFeatures>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(tracks: impl IntoIterator<Item = TrackFeatures>) -> Self {
        Self {
            tracks: tracks.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// Insert or replace a track record
    pub fn insert(&mut self, track: TrackFeatures) {
        self.tracks.insert(track.id, track);
    }

    pub fn remove(&mut self, id: i64) -> Option<TrackFeatures> {
        self.tracks.remove(&id)
    }
}

impl TrackStore for MemoryStore {
    fn track(&self, id: i64) -> Option<TrackFeatures> {
        self.tracks.get(&id).cloned()
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn search(&self, pattern: &str) -> Vec<TrackFeatures> {
        let needle = pattern.to_lowercase();
        let mut found: Vec<TrackFeatures> = self
            .tracks
            .values()
            .filter(|t| t.path.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.id);
        found
    }

    fn all_tracks(&self) -> Vec<TrackFeatures> {
        let mut all: Vec<TrackFeatures> = self.tracks.values().cloned().collect();
        all.sort_by_key(|t| t.id);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: i64, path: &str) -> TrackFeatures {
        TrackFeatures {
            id,
            path: path.to_string(),
            duration: 180.0,
            bpm: 128.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = MemoryStore::new();
        store.insert(track(1, "/music/one.flac"));
        store.insert(track(2, "/music/two.flac"));

        assert_eq!(store.track_count(), 2);
        assert_eq!(store.track(1).unwrap().path, "/music/one.flac");
        assert!(store.track(99).is_none());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let store = MemoryStore::with_tracks([
            track(1, "/music/Deep/sunrise.flac"),
            track(2, "/music/Techno/warehouse.flac"),
        ]);

        let hits = store.search("DEEP");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert!(store.search("missing").is_empty());
    }

    #[test]
    fn test_all_tracks_sorted_by_id() {
        let store = MemoryStore::with_tracks([track(3, "c"), track(1, "a"), track(2, "b")]);
        let ids: Vec<i64> = store.all_tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
