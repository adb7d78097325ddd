//! Playback scheduler - dual decks, crossfader, split thread model
//!
//! The scheduler plays a playlist through two decks, triggering
//! beat-matched transitions at each entry's planned out-point.
//!
//! Thread model:
//!   `SchedulerRenderer::render` - real-time audio thread (no allocation,
//!   no I/O, no callbacks; state changes are atomic flag writes only)
//!   `Scheduler::poll` + mutating calls - control thread (track loading,
//!   deck swaps, status callbacks)
//!
//! The two halves share state through an `Arc`; the control side owns
//! the playlist and callbacks outright, publishing everything the
//! real-time side needs (trigger time, indices, flags) through atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::planner::TransitionConfig;
use crate::playlist::Playlist;
use crate::types::{AtomicF32, AudioBuffer, PlaybackState, Sample, DEFAULT_SAMPLE_RATE};

use super::crossfader::{Crossfader, CurveType};
use super::deck::Deck;

/// Loads decoded audio for a track id; supplied by the host
pub type TrackLoader = Box<dyn Fn(i64) -> EngineResult<AudioBuffer> + Send>;

/// Invoked from the control thread on every state change:
/// (state, current_track_id, position_seconds, next_track_id)
pub type StatusCallback = Box<dyn FnMut(PlaybackState, i64, f32, i64) + Send>;

/// State shared between the control handle and the audio renderer
struct SharedState {
    decks: [Deck; 2],
    /// Index of the active deck; the other one is "next"
    active: AtomicUsize,
    crossfader: Crossfader,
    state: AtomicU8,
    sample_rate: AtomicU32,
    current_index: AtomicUsize,
    playlist_len: AtomicUsize,
    /// Position in the active track at which to trigger a transition
    trigger_time: AtomicF32,

    // Edge-triggered flags: set with release stores (mostly by the audio
    // thread), consumed with exchange-clear by poll()
    transitioning: AtomicBool,
    transition_trigger_pending: AtomicBool,
    transition_finished: AtomicBool,
    playback_finished: AtomicBool,
    skip_requested: AtomicBool,
    need_preload_next: AtomicBool,
    need_status_notify: AtomicBool,
}

impl SharedState {
    fn playback_state(&self) -> PlaybackState {
        PlaybackState::from(self.state.load(Ordering::Acquire))
    }

    fn set_playback_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn active_deck(&self) -> &Deck {
        &self.decks[self.active.load(Ordering::Acquire)]
    }

    fn next_index(&self) -> usize {
        1 - self.active.load(Ordering::Acquire)
    }
}

/// Control-thread handle: playlist management, transport, poll
pub struct Scheduler {
    shared: Arc<SharedState>,
    playlist: Playlist,
    transition_config: TransitionConfig,
    track_loader: Option<TrackLoader>,
    status_callback: Option<StatusCallback>,
}

/// Audio-thread handle: owns the pre-allocated mix buffers
pub struct SchedulerRenderer {
    shared: Arc<SharedState>,
    mix_a: Vec<Sample>,
    mix_b: Vec<Sample>,
    max_buffer_frames: usize,
}

impl Scheduler {
    /// Create a scheduler and its audio-thread renderer
    ///
    /// `max_buffer_frames` bounds a single render call; larger requests
    /// are clamped rather than resized.
    pub fn new(max_buffer_frames: usize) -> (Scheduler, SchedulerRenderer) {
        let shared = Arc::new(SharedState {
            decks: [Deck::new(), Deck::new()],
            active: AtomicUsize::new(0),
            crossfader: Crossfader::new(),
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
            current_index: AtomicUsize::new(0),
            playlist_len: AtomicUsize::new(0),
            trigger_time: AtomicF32::new(0.0),
            transitioning: AtomicBool::new(false),
            transition_trigger_pending: AtomicBool::new(false),
            transition_finished: AtomicBool::new(false),
            playback_finished: AtomicBool::new(false),
            skip_requested: AtomicBool::new(false),
            need_preload_next: AtomicBool::new(false),
            need_status_notify: AtomicBool::new(false),
        });

        let renderer = SchedulerRenderer {
            shared: Arc::clone(&shared),
            mix_a: vec![0.0; max_buffer_frames * 2],
            mix_b: vec![0.0; max_buffer_frames * 2],
            max_buffer_frames,
        };

        let scheduler = Scheduler {
            shared,
            playlist: Playlist::default(),
            transition_config: TransitionConfig::default(),
            track_loader: None,
            status_callback: None,
        };

        (scheduler, renderer)
    }

    pub fn set_track_loader(&mut self, loader: TrackLoader) {
        self.track_loader = Some(loader);
    }

    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.status_callback = Some(callback);
    }

    pub fn set_transition_config(&mut self, config: TransitionConfig) {
        self.transition_config = config;
        if !self.playlist.is_empty() {
            self.update_trigger_time();
        }
    }

    pub fn transition_config(&self) -> &TransitionConfig {
        &self.transition_config
    }

    /// Replace the playlist and preload the first two tracks
    ///
    /// Stops any current playback first. Fails on an empty playlist or
    /// when the first track cannot be loaded.
    pub fn load_playlist(&mut self, playlist: Playlist) -> EngineResult<()> {
        self.stop();

        if playlist.is_empty() {
            return Err(EngineError::InvalidArgument("empty playlist".into()));
        }

        let first_id = playlist.entries[0].track_id;
        let active = self.shared.active.load(Ordering::Acquire);
        self.load_track_to_deck(active, first_id)?;

        self.playlist = playlist;
        self.shared.current_index.store(0, Ordering::Release);
        self.shared.playlist_len.store(self.playlist.len(), Ordering::Release);

        if self.playlist.len() > 1 {
            let next_id = self.playlist.entries[1].track_id;
            if let Err(e) = self.load_track_to_deck(self.shared.next_index(), next_id) {
                log::warn!("failed to preload track {}: {}", next_id, e);
            }
        }

        self.update_trigger_time();
        self.shared.crossfader.set_position(-1.0);

        log::info!("playlist loaded: {} tracks", self.playlist.len());
        Ok(())
    }

    /// Start playback of the loaded playlist
    pub fn play(&mut self) -> EngineResult<()> {
        if self.playlist.is_empty() || !self.shared.active_deck().is_loaded() {
            return Err(EngineError::Playback("no playlist loaded".into()));
        }

        self.shared.active_deck().play();
        self.shared.set_playback_state(PlaybackState::Playing);
        self.notify_status();
        Ok(())
    }

    /// Pause both decks, preserving positions
    pub fn pause(&mut self) {
        self.shared.decks[0].pause();
        self.shared.decks[1].pause();
        self.shared.set_playback_state(PlaybackState::Paused);
        self.notify_status();
    }

    /// Resume from pause, restarting the next deck if a transition was
    /// in flight
    pub fn resume(&mut self) {
        if self.shared.playback_state() != PlaybackState::Paused {
            return;
        }

        self.shared.active_deck().play();
        let transitioning = self.shared.transitioning.load(Ordering::Acquire);
        if transitioning {
            self.shared.decks[self.shared.next_index()].play();
        }
        self.shared.set_playback_state(if transitioning {
            PlaybackState::Transitioning
        } else {
            PlaybackState::Playing
        });
        self.notify_status();
    }

    /// Stop playback, unload both decks and clear all pending flags
    pub fn stop(&mut self) {
        let sh = &self.shared;
        sh.decks[0].pause();
        sh.decks[1].pause();
        sh.decks[0].unload();
        sh.decks[1].unload();

        sh.transitioning.store(false, Ordering::Release);
        sh.transition_trigger_pending.store(false, Ordering::Release);
        sh.transition_finished.store(false, Ordering::Release);
        sh.playback_finished.store(false, Ordering::Release);
        sh.skip_requested.store(false, Ordering::Release);
        sh.need_preload_next.store(false, Ordering::Release);
        sh.need_status_notify.store(false, Ordering::Release);

        sh.crossfader.stop_automation();
        sh.crossfader.set_position(-1.0);
        sh.crossfader.set_curve(CurveType::EqualPower);

        sh.active.store(0, Ordering::Release);
        sh.current_index.store(0, Ordering::Release);
        sh.playlist_len.store(0, Ordering::Release);
        sh.trigger_time.store(0.0, Ordering::Release);
        self.playlist = Playlist::default();

        sh.set_playback_state(PlaybackState::Stopped);
        self.notify_status();
    }

    /// Request a transition to the next track; past the last track this
    /// degrades to `stop`
    pub fn skip(&mut self) {
        let index = self.shared.current_index.load(Ordering::Acquire);
        if index + 1 >= self.playlist.len() {
            self.stop();
            return;
        }
        self.shared.skip_requested.store(true, Ordering::Release);
    }

    /// Seek within the current track
    pub fn seek(&mut self, position_seconds: f32) {
        let deck = self.shared.active_deck();
        if deck.is_loaded() {
            deck.seek(position_seconds);
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.playback_state()
    }

    /// Position in the current track, in seconds
    pub fn position(&self) -> f32 {
        self.shared.active_deck().position()
    }

    pub fn current_track_id(&self) -> i64 {
        self.shared.active_deck().track_id()
    }

    pub fn next_track_id(&self) -> i64 {
        let index = self.shared.current_index.load(Ordering::Acquire);
        self.playlist
            .entries
            .get(index + 1)
            .map(|e| e.track_id)
            .unwrap_or(0)
    }

    pub fn current_index(&self) -> usize {
        self.shared.current_index.load(Ordering::Acquire)
    }

    /// Effective output sample rate, as last reported by the host
    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate.load(Ordering::Acquire)
    }

    pub fn is_transitioning(&self) -> bool {
        self.shared.transitioning.load(Ordering::Acquire)
    }

    /// Drain the flags raised by the audio thread and act on them
    ///
    /// Call every 10-50 ms from the control thread. A missed poll delays
    /// transitions but cannot corrupt state; the flags are edge
    /// triggered.
    pub fn poll(&mut self) {
        if self.state() == PlaybackState::Stopped {
            return;
        }
        let sh = Arc::clone(&self.shared);

        if sh.skip_requested.swap(false, Ordering::AcqRel) {
            self.start_transition();
        }

        if sh.transition_trigger_pending.swap(false, Ordering::AcqRel)
            && !sh.transitioning.load(Ordering::Acquire)
        {
            self.start_transition();
        }

        if sh.transition_finished.swap(false, Ordering::AcqRel) {
            let retired = sh.active.load(Ordering::Acquire);
            sh.active.store(1 - retired, Ordering::Release);
            sh.decks[retired].pause();
            sh.decks[retired].unload();

            sh.current_index.fetch_add(1, Ordering::AcqRel);
            sh.transitioning.store(false, Ordering::Release);
            sh.crossfader.set_position(-1.0);
            sh.set_playback_state(PlaybackState::Playing);

            self.update_trigger_time();
            sh.need_preload_next.store(true, Ordering::Release);
            sh.need_status_notify.store(true, Ordering::Release);
            log::info!("transition complete, now playing track {}", self.current_track_id());
        }

        if sh.playback_finished.swap(false, Ordering::AcqRel) {
            let index = sh.current_index.load(Ordering::Acquire);
            if index + 1 < self.playlist.len() {
                // Track ran out with no transition planned; hard-advance
                sh.current_index.store(index + 1, Ordering::Release);
                let retired = sh.active.load(Ordering::Acquire);
                sh.active.store(1 - retired, Ordering::Release);
                sh.decks[1 - retired].play();

                self.update_trigger_time();
                sh.need_preload_next.store(true, Ordering::Release);
                sh.need_status_notify.store(true, Ordering::Release);
            } else {
                self.stop();
                return;
            }
        }

        if sh.need_preload_next.swap(false, Ordering::AcqRel) {
            let index = sh.current_index.load(Ordering::Acquire);
            if let Some(entry) = self.playlist.entries.get(index + 1) {
                let track_id = entry.track_id;
                if let Err(e) = self.load_track_to_deck(sh.next_index(), track_id) {
                    log::warn!("failed to preload track {}: {}", track_id, e);
                }
            }
        }

        if sh.need_status_notify.swap(false, Ordering::AcqRel) {
            self.notify_status();
        }
    }

    /// Begin crossfading into the next playlist entry
    fn start_transition(&mut self) {
        let sh = Arc::clone(&self.shared);
        let index = sh.current_index.load(Ordering::Acquire);
        if index + 1 >= self.playlist.len() {
            return;
        }

        let next_id = self.playlist.entries[index + 1].track_id;
        let next_index = sh.next_index();
        if !sh.decks[next_index].is_loaded() {
            if let Err(e) = self.load_track_to_deck(next_index, next_id) {
                log::warn!("transition aborted, cannot load track {}: {}", next_id, e);
                return;
            }
        }

        let plan = self.playlist.entries[index].transition_to_next;
        let (duration, stretch_ratio, in_point, use_eq_swap) = match plan {
            Some(p) => (
                p.crossfade_duration,
                p.bpm_stretch_ratio,
                p.in_point.time_seconds,
                p.eq_hint.use_eq_swap || self.transition_config.use_eq_swap,
            ),
            None => (
                self.transition_config.crossfade_beats * 60.0 / 120.0,
                1.0,
                0.0,
                self.transition_config.use_eq_swap,
            ),
        };

        let next = &sh.decks[next_index];
        next.set_stretch_ratio(stretch_ratio);
        next.seek(in_point);
        next.play();

        sh.crossfader.set_curve(if use_eq_swap {
            CurveType::EqSwap
        } else {
            CurveType::EqualPower
        });

        let sample_rate = sh.sample_rate.load(Ordering::Acquire);
        let duration_frames = (duration * sample_rate as f32) as usize;
        sh.crossfader.start_automation(-1.0, 1.0, duration_frames);

        sh.transitioning.store(true, Ordering::Release);
        sh.set_playback_state(PlaybackState::Transitioning);

        log::info!(
            "transition started: {} -> {} over {:.1}s",
            self.current_track_id(),
            next_id,
            duration
        );
        self.notify_status();
    }

    fn load_track_to_deck(&self, deck_index: usize, track_id: i64) -> EngineResult<()> {
        let loader = self
            .track_loader
            .as_ref()
            .ok_or_else(|| EngineError::NotInitialized("no track loader configured".into()))?;
        let audio = loader(track_id)?;
        self.shared.decks[deck_index].load(audio, track_id)
    }

    /// Recompute the transition trigger for the current entry
    fn update_trigger_time(&self) {
        let sh = &self.shared;
        let index = sh.current_index.load(Ordering::Acquire);
        let trigger = self
            .playlist
            .entries
            .get(index)
            .and_then(|e| e.transition_to_next.as_ref())
            .map(|p| p.out_point.time_seconds)
            .unwrap_or_else(|| {
                (sh.active_deck().duration() - self.transition_config.max_transition_seconds)
                    .max(0.0)
            });
        sh.trigger_time.store(trigger, Ordering::Release);
    }

    fn notify_status(&mut self) {
        let state = self.state();
        let current = self.current_track_id();
        let position = self.position();
        let next = self.next_track_id();
        if let Some(callback) = self.status_callback.as_mut() {
            callback(state, current, position, next);
        }
    }
}

impl SchedulerRenderer {
    /// Render one interleaved stereo block; real-time safe
    ///
    /// `sample_rate` is the device's effective rate and may change
    /// between calls; the scheduler records it so transition automation
    /// is computed in the right units. Returns the frames written.
    pub fn render(&mut self, out: &mut [Sample], frames: usize, sample_rate: u32) -> usize {
        if frames == 0 {
            return 0;
        }
        let frames = frames.min(self.max_buffer_frames);

        if sample_rate > 0 {
            self.shared.sample_rate.store(sample_rate, Ordering::Release);
        }

        match self.shared.playback_state() {
            PlaybackState::Stopped | PlaybackState::Paused => {
                out[..frames * 2].fill(0.0);
                return frames;
            }
            PlaybackState::Playing | PlaybackState::Transitioning => {}
        }

        self.rt_update();

        let mix = self.shared.crossfader.get_mix_params(frames);
        let active = self.shared.active.load(Ordering::Acquire);
        let deck_a = &self.shared.decks[active];
        let deck_b = &self.shared.decks[1 - active];

        self.mix_a[..frames * 2].fill(0.0);
        self.mix_b[..frames * 2].fill(0.0);

        // Apply the crossfader's parameters for the duration of the
        // render, restoring afterwards so public getters stay stable
        let mut rendered_a = 0;
        if deck_a.is_playing() {
            let volume = deck_a.volume();
            let (low, mid, high) = deck_a.eq();
            deck_a.set_volume(mix.gain_a);
            deck_a.set_eq(mix.eq_low_a, mix.eq_mid_a, mix.eq_high_a);
            rendered_a = deck_a.render(&mut self.mix_a, frames);
            deck_a.set_volume(volume);
            deck_a.set_eq(low, mid, high);
        }

        let mut rendered_b = 0;
        if deck_b.is_playing() {
            let volume = deck_b.volume();
            let (low, mid, high) = deck_b.eq();
            deck_b.set_volume(mix.gain_b);
            deck_b.set_eq(mix.eq_low_b, mix.eq_mid_b, mix.eq_high_b);
            rendered_b = deck_b.render(&mut self.mix_b, frames);
            deck_b.set_volume(volume);
            deck_b.set_eq(low, mid, high);
        }

        for i in 0..frames * 2 {
            out[i] = (self.mix_a[i] + self.mix_b[i]).clamp(-1.0, 1.0);
        }

        rendered_a.max(rendered_b)
    }

    /// Audio-thread bookkeeping: reads positions, writes atomic flags
    fn rt_update(&self) {
        let sh = &*self.shared;
        let active = sh.active_deck();
        if !active.is_loaded() {
            return;
        }

        let position = active.position();
        let transitioning = sh.transitioning.load(Ordering::Acquire);

        if !transitioning {
            let index = sh.current_index.load(Ordering::Acquire);
            let len = sh.playlist_len.load(Ordering::Acquire);
            if index + 1 < len && position >= sh.trigger_time.load(Ordering::Acquire) {
                sh.transition_trigger_pending.store(true, Ordering::Release);
            }
        }

        if transitioning && !sh.crossfader.is_automating() {
            sh.transition_finished.store(true, Ordering::Release);
        }

        if active.is_finished() && !transitioning {
            sh.playback_finished.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::PlaylistGenerator;
    use crate::store::TrackFeatures;
    use std::sync::Mutex;

    fn features(id: i64, duration: f32, bpm: f32, key: &str) -> TrackFeatures {
        let step = 60.0 / bpm;
        let count = (duration / step) as usize + 1;
        TrackFeatures {
            id,
            duration,
            bpm,
            beats: (0..count).map(|i| i as f32 * step).collect(),
            key: key.to_string(),
            ..Default::default()
        }
    }

    /// Loader producing silent buffers of per-track durations
    fn silence_loader(tracks: Vec<TrackFeatures>, sample_rate: u32) -> TrackLoader {
        Box::new(move |id| {
            let track = tracks
                .iter()
                .find(|t| t.id == id)
                .ok_or(EngineError::TrackNotFound(id))?;
            let frames = (track.duration * sample_rate as f32) as usize;
            Ok(AudioBuffer::silence(frames, sample_rate))
        })
    }

    fn playlist_for(tracks: &[TrackFeatures], config: &TransitionConfig) -> Playlist {
        PlaylistGenerator::new().create_with_transitions(tracks, config)
    }

    #[test]
    fn test_empty_playlist_rejected() {
        let (mut scheduler, _renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(Box::new(|_| Ok(AudioBuffer::silence(100, 44100))));

        assert!(scheduler.load_playlist(Playlist::default()).is_err());
        assert!(scheduler.play().is_err());
        assert_eq!(scheduler.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_without_loader_fails() {
        let (mut scheduler, _renderer) = Scheduler::new(1024);
        let tracks = vec![features(1, 10.0, 120.0, "")];
        let playlist = playlist_for(&tracks, &TransitionConfig::default());

        let err = scheduler.load_playlist(playlist).unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized(_)));
    }

    #[test]
    fn test_load_playlist_preloads_both_decks() {
        let (mut scheduler, _renderer) = Scheduler::new(1024);
        let tracks = vec![features(1, 10.0, 120.0, ""), features(2, 10.0, 120.0, "")];
        scheduler.set_track_loader(silence_loader(tracks.clone(), 8000));

        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();

        assert_eq!(scheduler.current_track_id(), 1);
        assert_eq!(scheduler.next_track_id(), 2);
        assert_eq!(scheduler.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_stopped_render_is_silent_full_block() {
        let (_scheduler, mut renderer) = Scheduler::new(1024);
        let mut out = vec![1.0f32; 512 * 2];
        let rendered = renderer.render(&mut out, 512, 44100);
        assert_eq!(rendered, 512);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_render_zero_frames() {
        let (_scheduler, mut renderer) = Scheduler::new(1024);
        let mut out = vec![1.0f32; 8];
        assert_eq!(renderer.render(&mut out, 0, 44100), 0);
        // Nothing written
        assert!(out.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_render_clamps_to_max_buffer() {
        let (_scheduler, mut renderer) = Scheduler::new(256);
        let mut out = vec![1.0f32; 4096 * 2];
        let rendered = renderer.render(&mut out, 4096, 44100);
        assert!(rendered <= 256);
        // Samples beyond the clamped block are untouched
        assert!(out[256 * 2..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_pause_renders_exact_zeros() {
        let sample_rate = 8000;
        let tracks = vec![features(1, 10.0, 120.0, "")];
        let (mut scheduler, mut renderer) = Scheduler::new(1024);
        // Non-silent source so the check is meaningful
        scheduler.set_track_loader(Box::new(move |_| {
            let data: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.001).sin()).collect();
            Ok(AudioBuffer::from_interleaved(&data, sample_rate))
        }));
        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();
        scheduler.play().unwrap();

        let mut out = vec![0.0f32; 512 * 2];
        renderer.render(&mut out, 512, sample_rate);
        assert!(out.iter().any(|&s| s != 0.0));

        scheduler.pause();
        let rendered = renderer.render(&mut out, 512, sample_rate);
        assert_eq!(rendered, 512);
        assert!(out.iter().all(|&s| s == 0.0));

        scheduler.resume();
        assert_eq!(scheduler.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_load_then_stop_restores_fresh_state() {
        let tracks = vec![features(1, 10.0, 120.0, ""), features(2, 10.0, 120.0, "")];
        let (mut scheduler, _renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(silence_loader(tracks.clone(), 8000));
        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();
        scheduler.stop();

        assert_eq!(scheduler.state(), PlaybackState::Stopped);
        assert_eq!(scheduler.current_track_id(), 0);
        assert_eq!(scheduler.next_track_id(), 0);
        assert_eq!(scheduler.current_index(), 0);
        assert_eq!(scheduler.position(), 0.0);
        assert!(!scheduler.is_transitioning());
        assert!(scheduler.play().is_err());
    }

    #[test]
    fn test_single_track_plays_to_completion_and_stops() {
        let sample_rate = 8000;
        let tracks = vec![features(1, 2.0, 120.0, "")];
        let (mut scheduler, mut renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(silence_loader(tracks.clone(), sample_rate));

        let states = std::sync::Arc::new(Mutex::new(Vec::new()));
        let recorded = std::sync::Arc::clone(&states);
        scheduler.set_status_callback(Box::new(move |state, id, _, _| {
            recorded.lock().unwrap().push((state, id));
        }));

        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();
        scheduler.play().unwrap();

        let mut out = vec![0.0f32; 1024 * 2];
        for _ in 0..40 {
            renderer.render(&mut out, 1024, sample_rate);
            scheduler.poll();
            if scheduler.state() == PlaybackState::Stopped {
                break;
            }
        }

        assert_eq!(scheduler.state(), PlaybackState::Stopped);
        let recorded = states.lock().unwrap();
        // A single entry never transitions
        assert!(recorded.iter().all(|(s, _)| *s != PlaybackState::Transitioning));
    }

    #[test]
    fn test_two_track_crossfade_end_to_end() {
        // Matching tempo and key: unity stretch and a 7.5 s crossfade
        let sample_rate = 44100;
        let config = TransitionConfig::default();
        let tracks = vec![features(1, 60.0, 128.0, "8A"), features(2, 60.0, 128.0, "8A")];
        let playlist = playlist_for(&tracks, &config);

        let plan = playlist.entries[0].transition_to_next.unwrap();
        assert_eq!(plan.bpm_stretch_ratio, 1.0);
        assert_eq!(plan.pitch_shift_semitones, 0);
        assert!((plan.crossfade_duration - 7.5).abs() < 1e-3);

        let (mut scheduler, mut renderer) = Scheduler::new(4096);
        scheduler.set_track_loader(silence_loader(tracks.clone(), sample_rate));

        let states = std::sync::Arc::new(Mutex::new(Vec::new()));
        let recorded = std::sync::Arc::clone(&states);
        scheduler.set_status_callback(Box::new(move |state, id, _, _| {
            recorded.lock().unwrap().push((state, id));
        }));

        scheduler.load_playlist(playlist).unwrap();
        scheduler.play().unwrap();

        // Render one minute of audio, polling as a host would
        let mut out = vec![0.0f32; 1024 * 2];
        let blocks = 60 * sample_rate as usize / 1024 + 8;
        for _ in 0..blocks {
            renderer.render(&mut out, 1024, sample_rate);
            scheduler.poll();
        }

        let recorded = states.lock().unwrap();
        assert!(
            recorded.iter().any(|(s, _)| *s == PlaybackState::Transitioning),
            "no transition observed: {:?}",
            recorded
        );
        assert!(
            recorded
                .iter()
                .any(|(s, id)| *s == PlaybackState::Playing && *id == 2),
            "track 2 never became current: {:?}",
            recorded
        );
    }

    #[test]
    fn test_skip_advances_after_crossfade() {
        let sample_rate = 8000;
        let config = TransitionConfig::default();
        let tracks = vec![
            features(1, 30.0, 120.0, ""),
            features(2, 30.0, 120.0, ""),
            features(3, 30.0, 120.0, ""),
        ];
        let playlist = playlist_for(&tracks, &config);

        let (mut scheduler, mut renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(silence_loader(tracks.clone(), sample_rate));
        scheduler.load_playlist(playlist).unwrap();
        scheduler.play().unwrap();

        let mut out = vec![0.0f32; 1024 * 2];
        renderer.render(&mut out, 1024, sample_rate);
        scheduler.poll();

        scheduler.skip();
        scheduler.poll();
        assert!(scheduler.is_transitioning());
        assert_eq!(scheduler.state(), PlaybackState::Transitioning);

        // Drive until the crossfade completes
        let mut advanced = false;
        for _ in 0..200 {
            renderer.render(&mut out, 1024, sample_rate);
            scheduler.poll();
            if !scheduler.is_transitioning() && scheduler.current_index() == 1 {
                advanced = true;
                break;
            }
        }

        assert!(advanced, "skip transition never completed");
        assert_eq!(scheduler.current_track_id(), 2);
        assert_eq!(scheduler.current_index(), 1);
    }

    #[test]
    fn test_skip_past_last_track_stops() {
        let sample_rate = 8000;
        let tracks = vec![features(1, 10.0, 120.0, "")];
        let (mut scheduler, _renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(silence_loader(tracks.clone(), sample_rate));
        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();
        scheduler.play().unwrap();

        scheduler.skip();
        assert_eq!(scheduler.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_pause_during_transition_resumes_transitioning() {
        let sample_rate = 8000;
        let tracks = vec![features(1, 30.0, 120.0, ""), features(2, 30.0, 120.0, "")];
        let (mut scheduler, mut renderer) = Scheduler::new(1024);
        scheduler.set_track_loader(silence_loader(tracks.clone(), sample_rate));
        scheduler
            .load_playlist(playlist_for(&tracks, &TransitionConfig::default()))
            .unwrap();
        scheduler.play().unwrap();

        let mut out = vec![0.0f32; 1024 * 2];
        renderer.render(&mut out, 1024, sample_rate);
        scheduler.poll();
        scheduler.skip();
        scheduler.poll();
        assert!(scheduler.is_transitioning());

        scheduler.pause();
        assert_eq!(scheduler.state(), PlaybackState::Paused);
        assert!(scheduler.is_transitioning());

        scheduler.resume();
        assert_eq!(scheduler.state(), PlaybackState::Transitioning);
    }
}
