//! Engine facade - library, planning and playback behind one surface
//!
//! Ties the track store, playlist generator, transition planner and
//! scheduler together into the API a host embeds. Playback control and
//! `poll` belong to the control thread; `render` belongs to the audio
//! thread (hosts bridging real threads drive the `Scheduler` /
//! `SchedulerRenderer` pair directly).

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::planner::TransitionConfig;
use crate::playlist::{Playlist, PlaylistGenerator, PlaylistRules};
use crate::store::{TrackFeatures, TrackStore};
use crate::types::{PlaybackState, Sample, MAX_BUFFER_FRAMES};

use super::scheduler::{Scheduler, SchedulerRenderer, StatusCallback, TrackLoader};

/// The automix engine
pub struct AutomixEngine {
    store: Arc<dyn TrackStore>,
    generator: PlaylistGenerator,
    transition_config: TransitionConfig,
    scheduler: Scheduler,
    renderer: SchedulerRenderer,
    last_error: String,
}

impl AutomixEngine {
    /// Create an engine over a track store and a decoder callback
    pub fn new(store: Arc<dyn TrackStore>, loader: TrackLoader) -> Self {
        let (mut scheduler, renderer) = Scheduler::new(MAX_BUFFER_FRAMES);
        scheduler.set_track_loader(loader);

        Self {
            store,
            generator: PlaylistGenerator::new(),
            transition_config: TransitionConfig::default(),
            scheduler,
            renderer,
            last_error: String::new(),
        }
    }

    /// Most recent error message, empty when none occurred
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    // --- Library ---

    pub fn track_count(&self) -> usize {
        self.store.track_count()
    }

    pub fn track(&mut self, id: i64) -> EngineResult<TrackFeatures> {
        let result = self.store.track(id).ok_or(EngineError::TrackNotFound(id));
        self.record(result)
    }

    pub fn search(&self, pattern: &str) -> Vec<TrackFeatures> {
        self.store.search(pattern)
    }

    // --- Planning ---

    /// Generate a playlist of `count` tracks starting from `seed_id`
    pub fn generate_playlist(
        &mut self,
        seed_id: i64,
        count: usize,
        rules: &PlaylistRules,
    ) -> EngineResult<Playlist> {
        if count == 0 {
            let result = Err(EngineError::InvalidArgument("playlist count must be positive".into()));
            return self.record(result);
        }
        let seed = match self.store.track(seed_id) {
            Some(seed) => seed,
            None => {
                let result = Err(EngineError::TrackNotFound(seed_id));
                return self.record(result);
            }
        };

        let candidates = self.store.all_tracks();
        Ok(self
            .generator
            .generate(&seed, &candidates, count, rules, &self.transition_config))
    }

    /// Build a playlist from an explicit track order
    pub fn create_playlist(&mut self, track_ids: &[i64]) -> EngineResult<Playlist> {
        let mut tracks = Vec::with_capacity(track_ids.len());
        for &id in track_ids {
            match self.store.track(id) {
                Some(track) => tracks.push(track),
                None => {
                    let result = Err(EngineError::TrackNotFound(id));
                    return self.record(result);
                }
            }
        }
        Ok(self
            .generator
            .create_with_transitions(&tracks, &self.transition_config))
    }

    // --- Playback ---

    /// Load a playlist and start playing it
    pub fn play(&mut self, playlist: Playlist) -> EngineResult<()> {
        let result = self
            .scheduler
            .load_playlist(playlist)
            .and_then(|_| self.scheduler.play());
        self.record(result)
    }

    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn skip(&mut self) {
        self.scheduler.skip();
    }

    pub fn seek(&mut self, position_seconds: f32) {
        self.scheduler.seek(position_seconds);
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    pub fn playback_position(&self) -> f32 {
        self.scheduler.position()
    }

    pub fn current_track_id(&self) -> i64 {
        self.scheduler.current_track_id()
    }

    pub fn next_track_id(&self) -> i64 {
        self.scheduler.next_track_id()
    }

    // --- Audio ---

    /// Render interleaved stereo frames; pull this from the audio callback
    pub fn render(&mut self, out: &mut [Sample], frames: usize, sample_rate: u32) -> usize {
        self.renderer.render(out, frames, sample_rate)
    }

    /// Control-thread housekeeping; call every 10-50 ms
    pub fn poll(&mut self) {
        self.scheduler.poll();
    }

    /// Effective output sample rate, as last reported through `render`
    pub fn sample_rate(&self) -> u32 {
        self.scheduler.sample_rate()
    }

    pub fn channels(&self) -> u32 {
        2
    }

    // --- Config ---

    pub fn set_transition_config(&mut self, config: TransitionConfig) {
        self.transition_config = config;
        self.scheduler.set_transition_config(config);
    }

    pub fn transition_config(&self) -> &TransitionConfig {
        &self.transition_config
    }

    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.scheduler.set_status_callback(callback);
    }

    fn record<T>(&mut self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(e) = &result {
            self.last_error = e.to_string();
            log::warn!("engine error: {}", self.last_error);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::AudioBuffer;

    fn test_engine() -> AutomixEngine {
        let mut store = MemoryStore::new();
        for id in 1..=6 {
            store.insert(TrackFeatures {
                id,
                path: format!("/music/track-{id}.flac"),
                duration: 20.0,
                bpm: 124.0 + id as f32,
                beats: (0..42).map(|i| i as f32 * 0.48).collect(),
                key: "8A".to_string(),
                energy_curve: vec![0.5; 16],
                ..Default::default()
            });
        }

        let loader: TrackLoader = Box::new(|id| {
            if id > 6 {
                return Err(EngineError::TrackNotFound(id));
            }
            Ok(AudioBuffer::silence(20 * 8000, 8000))
        });

        AutomixEngine::new(Arc::new(store), loader)
    }

    #[test]
    fn test_library_queries() {
        let mut engine = test_engine();
        assert_eq!(engine.track_count(), 6);
        assert_eq!(engine.track(3).unwrap().id, 3);
        assert_eq!(engine.search("track-2").len(), 1);
        assert!(engine.track(99).is_err());
        assert!(engine.last_error().contains("99"));
    }

    #[test]
    fn test_generate_playlist_from_seed() {
        let mut engine = test_engine();
        let rules = PlaylistRules {
            random_seed: 42,
            ..Default::default()
        };

        let playlist = engine.generate_playlist(1, 4, &rules).unwrap();
        assert_eq!(playlist.len(), 4);
        assert_eq!(playlist.entries[0].track_id, 1);
        assert!(playlist.entries.last().unwrap().transition_to_next.is_none());

        assert!(engine.generate_playlist(99, 4, &rules).is_err());
        assert!(engine.generate_playlist(1, 0, &rules).is_err());
    }

    #[test]
    fn test_create_playlist_checks_ids() {
        let mut engine = test_engine();
        let playlist = engine.create_playlist(&[1, 2, 3]).unwrap();
        assert_eq!(playlist.track_ids(), vec![1, 2, 3]);
        assert!(playlist.entries[0].transition_to_next.is_some());

        assert!(engine.create_playlist(&[1, 99]).is_err());
    }

    #[test]
    fn test_play_render_poll_cycle() {
        let mut engine = test_engine();
        let playlist = engine.create_playlist(&[1, 2]).unwrap();
        engine.play(playlist).unwrap();
        assert_eq!(engine.playback_state(), PlaybackState::Playing);
        assert_eq!(engine.current_track_id(), 1);
        assert_eq!(engine.next_track_id(), 2);

        let mut out = vec![0.0f32; 512 * 2];
        let rendered = engine.render(&mut out, 512, 8000);
        assert_eq!(rendered, 512);
        assert_eq!(engine.sample_rate(), 8000);
        engine.poll();

        engine.stop();
        assert_eq!(engine.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_empty_playlist_fails_and_records_error() {
        let mut engine = test_engine();
        assert!(engine.play(Playlist::default()).is_err());
        assert!(!engine.last_error().is_empty());
        assert_eq!(engine.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_channels_is_stereo() {
        let engine = test_engine();
        assert_eq!(engine.channels(), 2);
    }
}
