//! Editor session - one open project.
//!
//! Wires the keyframe set, timeline controller, playback clock and autosave
//! together around a working copy of the project. The UI calls gesture
//! methods as input arrives and `tick()` once per frame; everything else
//! (preview stepping, debounced saves) happens inside `tick()`.
//!
//! Persistence failures never stop the editor: they are logged and kept in
//! `last_save_error()` for the status line.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use super::autosave::{Autosave, SaveFingerprint};
use super::clock::{PlaybackClock, PlaybackMode, SurfaceCommand, SurfaceState};
use super::keyframes::{Keyframe, KeyframeSet, Selection};
use super::scheduler::SharedClock;
use super::timeline::{Modifiers, TimelineController, TrackEdit};
use crate::config::EditorConfig;
use crate::entities::{ExportSettings, Project, SourceRef};
use crate::export::{ExportError, ExportRequest};
use crate::media::MediaInfo;
use crate::storage::{SharedStore, StorageError};

/// What happened during one `tick()`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// New playhead time when a preview step fired
    pub stepped: Option<f64>,
    /// Debounced save was written
    pub saved: bool,
}

pub struct EditorSession {
    store: SharedStore,
    project: Project,
    keys: KeyframeSet,
    timeline: TimelineController,
    clock: PlaybackClock,
    autosave: Autosave,
    config: EditorConfig,
    saved: SaveFingerprint,
    last_save_error: Option<String>,
    closed: bool,
}

impl EditorSession {
    /// First file selection: create the project record and store the video.
    pub fn create(
        store: SharedStore,
        source_path: &Path,
        info: MediaInfo,
        clock: SharedClock,
        config: &EditorConfig,
    ) -> Result<Self, StorageError> {
        let original_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        let source = SourceRef {
            original_name: original_name.clone(),
            stored_name: String::new(),
            width: info.width,
            height: info.height,
        };
        let settings = ExportSettings::with_fps(config.default_fps);
        let mut project = Project::new(original_name, source, info.duration, settings);
        store.save(&mut project, source_path)?;
        info!(
            "Created project '{}' ({:.3}s, {}x{})",
            project.name, info.duration, info.width, info.height
        );
        Ok(Self::from_project(store, project, clock, config))
    }

    /// Load an existing project. `None` (logged) when it is missing or
    /// unreadable, so the caller can fall back to the dashboard.
    pub fn open(store: SharedStore, id: &str, clock: SharedClock, config: &EditorConfig) -> Option<Self> {
        match store.get(id) {
            Ok(Some(project)) => {
                info!("Opened project '{}' ({})", project.name, project.id);
                Some(Self::from_project(store, project, clock, config))
            }
            Ok(None) => {
                warn!("Project {} not found", id);
                None
            }
            Err(e) => {
                error!("Failed to open project {}: {}", id, e);
                None
            }
        }
    }

    fn from_project(store: SharedStore, project: Project, clock: SharedClock, config: &EditorConfig) -> Self {
        let keys = KeyframeSet::from_secs(project.duration, &project.keyframes);
        let saved = SaveFingerprint::new(keys.revision(), &project.export_settings);
        let mut autosave = Autosave::new(clock.clone(), config.autosave_delay());
        autosave.mark_clean(saved);
        Self {
            store,
            keys,
            timeline: TimelineController::new(config.key_match_fraction),
            clock: PlaybackClock::with_config(project.duration, clock, config),
            autosave,
            config: config.clone(),
            saved,
            last_save_error: None,
            closed: false,
            project,
        }
    }

    // --- Accessors ---

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn id(&self) -> &str {
        &self.project.id
    }

    pub fn keys(&self) -> &KeyframeSet {
        &self.keys
    }

    pub fn selection(&self) -> &Selection {
        self.timeline.selection()
    }

    pub fn timeline(&self) -> &TimelineController {
        &self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn export_settings(&self) -> &ExportSettings {
        &self.project.export_settings
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.clock.mode()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.fingerprint() != self.saved
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    pub fn source_path(&self) -> Option<PathBuf> {
        match self.store.source_path(&self.project.id) {
            Ok(path) => path,
            Err(e) => {
                warn!("Source lookup failed: {}", e);
                None
            }
        }
    }

    fn fingerprint(&self) -> SaveFingerprint {
        SaveFingerprint::new(self.keys.revision(), &self.project.export_settings)
    }

    fn changed(&mut self) {
        let fingerprint = self.fingerprint();
        self.autosave.observe(fingerprint);
    }

    fn fps(&self) -> f64 {
        self.project.export_settings.fps
    }

    // --- Timeline gestures ---

    pub fn set_track_width(&mut self, width: f64) {
        self.timeline.set_track_width(width);
    }

    pub fn click_track(&mut self, x: f64, modifiers: Modifiers) -> bool {
        if self.closed {
            return false;
        }
        self.timeline.click_track(x, modifiers, &mut self.clock)
    }

    pub fn double_click_track(&mut self, x: f64) -> TrackEdit {
        if self.closed {
            return TrackEdit::Ignored;
        }
        let edit = self.timeline.double_click_track(x, &mut self.keys);
        self.changed();
        edit
    }

    pub fn click_marker(&mut self, key: Keyframe, modifiers: Modifiers) {
        if !self.closed {
            self.timeline.click_marker(key, modifiers);
        }
    }

    pub fn drag_start(&mut self, key: Keyframe) {
        if !self.closed && self.keys.contains(key) {
            self.timeline.drag_start(key);
        }
    }

    pub fn drag_move(&mut self, x: f64) {
        if !self.closed {
            self.timeline.drag_move(x, self.keys.duration());
        }
    }

    pub fn drag_end(&mut self) -> Option<Keyframe> {
        if self.closed {
            return None;
        }
        let moved = self.timeline.drag_end(&mut self.keys);
        self.changed();
        moved
    }

    pub fn pointer_left(&mut self) -> Option<Keyframe> {
        if self.closed {
            return None;
        }
        let moved = self.timeline.pointer_left(&mut self.keys);
        self.changed();
        moved
    }

    pub fn delete_selected(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        let removed = self.timeline.delete_selected(&mut self.keys);
        self.changed();
        removed
    }

    pub fn retime_selected(&mut self, secs: f64) -> Option<Keyframe> {
        if self.closed {
            return None;
        }
        let moved = self.timeline.retime_selected(secs, &mut self.keys);
        self.changed();
        moved
    }

    /// Add a keyframe at the playhead.
    pub fn add_at_playhead(&mut self) -> Option<Keyframe> {
        if self.closed {
            return None;
        }
        let key = self.keys.add(self.clock.current_time());
        self.changed();
        Some(key)
    }

    pub fn generate_interval(&mut self, step: f64) -> bool {
        if self.closed {
            return false;
        }
        let limit = self.config.max_generated_keyframes;
        let changed = self.timeline.generate_interval(step, limit, &mut self.keys);
        self.changed();
        changed
    }

    pub fn clear_keys(&mut self) {
        if !self.closed {
            self.timeline.clear_keys(&mut self.keys);
            self.changed();
        }
    }

    pub fn clear_selection(&mut self) {
        self.timeline.clear_selection();
    }

    // --- Playback ---

    pub fn seek(&mut self, secs: f64) {
        if !self.closed {
            self.clock.seek(secs);
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        if !self.closed {
            self.clock.set_playing(playing);
        }
    }

    pub fn toggle_play(&mut self) {
        if !self.closed {
            self.clock.toggle_play();
        }
    }

    /// Returns the resulting preview state (false when refused).
    pub fn set_preview(&mut self, on: bool) -> bool {
        if self.closed {
            return false;
        }
        let fps = self.fps();
        self.clock.set_preview(on, &self.keys, fps)
    }

    pub fn toggle_preview(&mut self) -> bool {
        let on = !self.clock.is_previewing();
        self.set_preview(on)
    }

    pub fn on_media_time(&mut self, secs: f64) {
        self.clock.on_media_time(secs);
    }

    pub fn on_media_ended(&mut self) {
        self.clock.on_media_ended();
    }

    /// What the playback surface must be told this frame.
    pub fn reconcile(&mut self, surface: SurfaceState) -> SurfaceCommand {
        self.clock.reconcile(surface)
    }

    /// The decoder measured a different length than the stored record.
    /// Keyframes past the new end are clamped and the record is saved at once.
    /// Returns whether anything changed.
    pub fn set_media_duration(&mut self, duration: f64) -> bool {
        if self.closed || !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        if (duration - self.project.duration).abs() < 0.001 {
            return false;
        }
        info!(
            "Media duration {:.3}s differs from record ({:.3}s), updating",
            duration, self.project.duration
        );
        self.project.duration = duration;
        self.keys.set_duration(duration);
        self.clock.set_duration(duration);
        self.timeline.prune(&self.keys);
        self.save();
        true
    }

    // --- Settings ---

    pub fn set_export_settings(&mut self, settings: ExportSettings) {
        if self.closed {
            return;
        }
        let settings = settings.sanitized();
        if settings != self.project.export_settings {
            debug!("Export settings changed: {:?}", settings);
            self.project.export_settings = settings;
            self.changed();
        }
    }

    /// Rename and save right away.
    pub fn rename(&mut self, name: &str) -> Result<(), StorageError> {
        let name = name.trim();
        if self.closed || name.is_empty() || name == self.project.name {
            return Ok(());
        }
        let renamed = self.store.rename(&self.project.id, name)?;
        info!("Project renamed to '{}'", renamed.name);
        self.project.name = renamed.name;
        self.project.updated_at = renamed.updated_at;
        Ok(())
    }

    // --- Frame loop ---

    pub fn tick(&mut self) -> TickOutcome {
        if self.closed {
            return TickOutcome::default();
        }
        let fps = self.fps();
        let stepped = self.clock.tick(&self.keys, fps);

        self.changed();
        let saved = self.autosave.poll() && self.save();
        TickOutcome { stepped, saved }
    }

    /// Save now if anything changed. Returns whether a write happened.
    pub fn flush(&mut self) -> bool {
        if self.closed || !self.is_dirty() {
            self.autosave.cancel();
            return false;
        }
        self.save()
    }

    fn save(&mut self) -> bool {
        let fingerprint = self.fingerprint();
        self.project.keyframes = self.keys.to_secs();
        match self.store.update(&mut self.project) {
            Ok(()) => {
                debug!("Saved project {} ({} keyframes)", self.project.id, self.keys.len());
                self.saved = fingerprint;
                self.autosave.mark_clean(fingerprint);
                self.last_save_error = None;
                true
            }
            Err(e) => {
                error!("Autosave failed: {}", e);
                self.last_save_error = Some(e.to_string());
                self.autosave.mark_clean(fingerprint);
                false
            }
        }
    }

    /// Stop timers. Pending unsaved changes are dropped; call `flush()` first
    /// to keep them.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.autosave.cancel();
        self.clock.cancel();
        self.closed = true;
        info!("Closed project {}", self.project.id);
    }

    // --- Export ---

    pub fn export_request(&self) -> Result<ExportRequest, ExportError> {
        if self.keys.is_empty() {
            return Err(ExportError::NoKeyframes);
        }
        let source = self
            .store
            .source_path(&self.project.id)
            .map_err(|e| ExportError::Io(e.to_string()))?
            .ok_or_else(|| ExportError::Unavailable("source video is missing".into()))?;
        Ok(ExportRequest {
            name: self.project.name.clone(),
            source,
            source_width: self.project.source.width,
            source_height: self.project.source.height,
            timestamps: self.keys.to_secs(),
            settings: self.project.export_settings,
            sheet_columns: self.config.sheet_columns,
        })
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.close();
    }
}
