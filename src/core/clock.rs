//! Playback / preview clock - the single authority on "where are we".
//!
//! The playback surface (decoder, video widget) reports times in through
//! `on_media_time()`, but never drives state directly. Once per frame the app
//! asks `reconcile()` what the surface should be told, so there is no
//! feedback loop between a seek and the time update it produces.
//!
//! # Modes
//!
//! - **Paused**: time moves only on seek
//! - **Playing**: time follows the surface
//! - **PreviewStepping**: flipbook over the keyframe set, one step every
//!   `1000 / fps` ms, surface updates ignored
//!
//! Entering preview stops playback; starting playback leaves preview.
//!
//! # Preview stepping
//!
//! `tick()` owns a `ScheduledTask` tagged with the inputs the step depends on
//! (fps, keyframe revision, duration). When any of them change, the pending
//! step is dropped and a new one scheduled a full interval later.

use log::{debug, trace};
use std::time::Duration;

use super::keyframes::KeyframeSet;
use super::scheduler::{ScheduledTask, SharedClock};
use crate::config::EditorConfig;
use crate::entities::export_settings::clamp_fps;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    Paused,
    Playing,
    PreviewStepping,
}

/// What the surface currently shows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceState {
    pub time: f64,
    pub paused: bool,
}

/// Corrections for the surface. `None` means leave it alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceCommand {
    pub seek: Option<f64>,
    pub play: Option<bool>,
}

impl SurfaceCommand {
    pub fn is_empty(&self) -> bool {
        self.seek.is_none() && self.play.is_none()
    }
}

/// Inputs a pending preview step was scheduled against.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StepDeps {
    fps: f64,
    revision: u64,
    duration: f64,
}

impl StepDeps {
    fn of(keys: &KeyframeSet, fps: f64) -> Self {
        Self {
            fps: clamp_fps(fps),
            revision: keys.revision(),
            duration: keys.duration(),
        }
    }
}

/// Time between preview steps.
pub fn step_interval(fps: f64) -> Duration {
    Duration::from_micros((1_000_000.0 / clamp_fps(fps)).round() as u64)
}

#[derive(Debug)]
pub struct PlaybackClock {
    current_time: f64,
    duration: f64,
    is_playing: bool,
    preview_mode: bool,
    preview_step: ScheduledTask<StepDeps>,
    match_tolerance: f64,
    seek_epsilon: f64,
    resync_threshold: f64,
    /// Explicit seek not yet handed to the surface
    seek_pending: bool,
}

impl PlaybackClock {
    pub fn new(duration: f64, clock: SharedClock) -> Self {
        Self::with_config(duration, clock, &EditorConfig::default())
    }

    pub fn with_config(duration: f64, clock: SharedClock, config: &EditorConfig) -> Self {
        Self {
            current_time: 0.0,
            duration: sanitize(duration),
            is_playing: false,
            preview_mode: false,
            preview_step: ScheduledTask::new("preview", clock),
            match_tolerance: config.preview_match_tolerance,
            seek_epsilon: config.seek_epsilon,
            resync_threshold: config.playing_resync_threshold,
            seek_pending: false,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_previewing(&self) -> bool {
        self.preview_mode
    }

    pub fn mode(&self) -> PlaybackMode {
        if self.preview_mode {
            PlaybackMode::PreviewStepping
        } else if self.is_playing {
            PlaybackMode::Playing
        } else {
            PlaybackMode::Paused
        }
    }

    /// True while a preview step is waiting to fire.
    pub fn has_pending_step(&self) -> bool {
        self.preview_step.is_pending()
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = sanitize(duration);
        self.current_time = self.current_time.clamp(0.0, self.duration);
    }

    /// Time reported by the surface. Ignored during preview, which owns the
    /// playhead.
    pub fn on_media_time(&mut self, secs: f64) {
        if self.preview_mode || !secs.is_finite() {
            return;
        }
        self.current_time = secs.clamp(0.0, self.duration);
    }

    /// Surface reached the end of the media.
    pub fn on_media_ended(&mut self) {
        if self.is_playing {
            debug!("Playback reached end at {:.3}s", self.current_time);
            self.is_playing = false;
        }
    }

    pub fn seek(&mut self, secs: f64) {
        let secs = if secs.is_finite() { secs } else { 0.0 };
        self.current_time = secs.clamp(0.0, self.duration);
        self.seek_pending = true;
        trace!("Seek to {:.3}s", self.current_time);
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.preview_mode {
            self.stop_preview();
        }
        // Play at the end starts over
        if playing && !self.is_playing && self.duration > 0.0 && self.current_time >= self.duration {
            self.current_time = 0.0;
            self.seek_pending = true;
        }
        if self.is_playing != playing {
            self.is_playing = playing;
            debug!("Playback {}", if playing { "started" } else { "paused" });
        }
    }

    pub fn toggle_play(&mut self) {
        self.set_playing(!self.is_playing);
    }

    /// Enter or leave preview. Entering is refused with an empty set.
    /// Returns the resulting preview state.
    pub fn set_preview(&mut self, on: bool, keys: &KeyframeSet, fps: f64) -> bool {
        if !on {
            self.stop_preview();
            return false;
        }
        if keys.is_empty() {
            debug!("Preview refused: no keyframes");
            self.stop_preview();
            return false;
        }
        if !self.preview_mode {
            self.is_playing = false;
            self.preview_mode = true;
            self.preview_step
                .schedule(StepDeps::of(keys, fps), step_interval(fps));
            debug!("Preview started ({} keyframes @ {} fps)", keys.len(), clamp_fps(fps));
        }
        true
    }

    pub fn toggle_preview(&mut self, keys: &KeyframeSet, fps: f64) -> bool {
        self.set_preview(!self.preview_mode, keys, fps)
    }

    fn stop_preview(&mut self) {
        self.preview_step.cancel();
        if self.preview_mode {
            self.preview_mode = false;
            debug!("Preview stopped at {:.3}s", self.current_time);
        }
    }

    /// Drop any pending preview step and leave preview.
    pub fn cancel(&mut self) {
        self.stop_preview();
    }

    /// Drive the preview stepper. Returns the new time when a step fired.
    pub fn tick(&mut self, keys: &KeyframeSet, fps: f64) -> Option<f64> {
        if !self.preview_mode {
            return None;
        }
        if keys.is_empty() {
            debug!("Preview ended: keyframe set is empty");
            self.stop_preview();
            return None;
        }

        let deps = StepDeps::of(keys, fps);
        let interval = step_interval(fps);
        if self.preview_step.pending_payload() != Some(&deps) {
            // fps, keyframes or duration changed under the pending step
            self.preview_step.cancel();
            self.preview_step.schedule(deps, interval);
            trace!("Preview step rescheduled ({:?})", deps);
            return None;
        }

        let deadline = self.preview_step.deadline()?;
        let deps = self.preview_step.poll()?;

        let target = self.next_target(keys)?;
        self.current_time = target.clamp(0.0, self.duration);

        // Keep cadence steady; if we fell behind, restart from now
        let now = self.preview_step.clock().now();
        let next = deadline + interval;
        let delay = if next > now { next - now } else { interval };
        self.preview_step.schedule(deps, delay);

        trace!("Preview step -> {:.3}s", self.current_time);
        Some(self.current_time)
    }

    /// Keyframe the next preview step lands on.
    fn next_target(&self, keys: &KeyframeSet) -> Option<f64> {
        let count = keys.len();
        if count == 0 {
            return None;
        }
        let index = match keys.closest_within(self.current_time, self.match_tolerance) {
            Some(current) => (current + 1) % count,
            None => keys.first_after(self.current_time).unwrap_or(0),
        };
        keys.get(index).map(|k| k.secs())
    }

    /// Decide what the surface must be told to match this clock.
    ///
    /// Paused/preview: precise seek past `seek_epsilon`. Playing: the surface
    /// runs ahead of the last reported time, so only resync on large drift.
    /// An explicit `seek()` (or the restart from the end) is always held to
    /// `seek_epsilon`, whatever the mode.
    pub fn reconcile(&mut self, surface: SurfaceState) -> SurfaceCommand {
        let delta = (surface.time - self.current_time).abs();
        let threshold = if self.is_playing && !self.seek_pending {
            self.resync_threshold
        } else {
            self.seek_epsilon
        };
        self.seek_pending = false;
        let seek = (delta > threshold).then_some(self.current_time);
        // surface.paused == is_playing means they disagree
        let play = (surface.paused == self.is_playing).then_some(self.is_playing);
        SurfaceCommand { seek, play }
    }
}

fn sanitize(duration: f64) -> f64 {
    if duration.is_finite() { duration.max(0.0) } else { 0.0 }
}
