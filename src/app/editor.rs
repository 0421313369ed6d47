//! Editor screen - one open project.
//!
//! Frame order matters:
//! 1. pull media time from the surface into the session
//! 2. `session.tick()` (preview steps, autosave)
//! 3. render panels, collecting `EditorAction`s
//! 4. apply actions
//! 5. reconcile the surface with the session and upload the newest frame
//!
//! Gestures applied in step 4 reach the surface in step 5 of the same frame,
//! before step 1 of the next one could overwrite them with stale media time.

use eframe::egui;
use log::{debug, info, warn};
use std::time::Duration;

use super::AppServices;
use crate::core::{EditorSession, Keyframe, PlaybackMode};
use crate::export::{ExportError, ExportJob};
use crate::media::{DecodedFrame, DecodedSurface, PlaybackSurface};
use crate::widgets::export_panel::{ExportPanelState, render_export_panel};
use crate::widgets::file_dialogs::save_export_dialog;
use crate::widgets::progress_bar::ProgressBar;
use crate::widgets::timeline::{TrackView, render_track};
use crate::widgets::transport::{render_key_toolbar, render_transport};
use crate::widgets::{ActionQueue, EditorAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorOutcome {
    Stay,
    Back,
}

pub struct EditorView {
    session: EditorSession,
    surface: Option<DecodedSurface>,
    texture: Option<egui::TextureHandle>,
    export: ExportJob,
    progress_bar: ProgressBar,
    export_status: Option<String>,
    notice: Option<String>,
    name_buf: String,
    retime_secs: f64,
    retime_for: Option<Keyframe>,
    pending: ActionQueue<EditorAction>,
}

impl EditorView {
    pub fn new(mut session: EditorSession, services: &AppServices) -> Self {
        let surface = open_surface(&mut session, services);
        let name_buf = session.project().name.clone();
        Self {
            session,
            surface,
            texture: None,
            export: ExportJob::new(services.encoder.clone()),
            progress_bar: ProgressBar::new(0.0, 14.0),
            export_status: None,
            notice: None,
            name_buf,
            retime_secs: 0.0,
            retime_for: None,
            pending: ActionQueue::new(),
        }
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    /// Save pending edits and stop timers. Safe to call more than once.
    pub fn leave(&mut self) {
        self.export.cancel();
        if !self.session.is_closed() {
            self.session.flush();
            self.session.close();
        }
    }

    /// Run one UI frame.
    pub fn update(&mut self, ctx: &egui::Context, interval_step: &mut f64) -> EditorOutcome {
        self.sync_media();
        if let Some(secs) = self.session.tick().stepped {
            debug!("Preview step -> {:.3}s", secs);
        }
        self.poll_export();

        let back = self.render(ctx, interval_step);
        self.handle_keyboard(ctx);

        let actions: Vec<EditorAction> = self.pending.drain().collect();
        for action in actions {
            self.apply(action);
        }

        self.push_to_surface(ctx);
        self.sync_retime();

        let busy = self.session.mode() != PlaybackMode::Paused
            || self.export.is_running()
            || self.session.is_dirty();
        ctx.request_repaint_after(Duration::from_millis(if busy { 15 } else { 100 }));

        if back {
            self.leave();
            EditorOutcome::Back
        } else {
            EditorOutcome::Stay
        }
    }

    fn sync_media(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.update();
        let state = surface.state();
        if surface.has_ended() {
            self.session.on_media_time(state.time);
            self.session.on_media_ended();
        } else if !state.paused {
            self.session.on_media_time(state.time);
        }
    }

    fn push_to_surface(&mut self, ctx: &egui::Context) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let cmd = self.session.reconcile(surface.state());
        if !cmd.is_empty() {
            surface.apply(cmd);
        }
        if let Some(frame) = surface.take_frame() {
            upload_frame(ctx, &mut self.texture, frame);
        }
    }

    /// Keep the retime field in step with the single selected key.
    fn sync_retime(&mut self) {
        let single = self.session.selection().single();
        if single != self.retime_for {
            self.retime_for = single;
            if let Some(key) = single {
                self.retime_secs = key.secs();
            }
        }
    }

    fn apply(&mut self, action: EditorAction) {
        if apply_to_session(&mut self.session, &action) {
            return;
        }
        match action {
            EditorAction::StartExport => self.start_export(),
            EditorAction::CancelExport => self.export.cancel(),
            EditorAction::Rename(name) => match self.session.rename(&name) {
                Ok(()) => {
                    self.name_buf = self.session.project().name.clone();
                    self.notice = None;
                }
                Err(e) => {
                    warn!("Rename failed: {}", e);
                    self.notice = Some(format!("Rename failed: {}", e));
                    self.name_buf = self.session.project().name.clone();
                }
            },
            _ => {}
        }
    }

    fn start_export(&mut self) {
        match self
            .session
            .export_request()
            .and_then(|request| self.export.start(request))
        {
            Ok(()) => self.export_status = None,
            Err(e) => {
                warn!("Export refused: {}", e);
                self.export_status = Some(e.to_string());
            }
        }
    }

    /// Collect a finished export and ask where to put it.
    fn poll_export(&mut self) {
        let Some(result) = self.export.poll() else {
            return;
        };
        let status = match result {
            Ok(image) => match save_export_dialog(&image, &self.session.project().name) {
                Some(path) => match image.write_to(&path) {
                    Ok(()) => {
                        info!("Export saved to {}", path.display());
                        format!("Saved {}", path.display())
                    }
                    Err(e) => e.to_string(),
                },
                None => "Export discarded".to_string(),
            },
            Err(ExportError::Cancelled) => "Export cancelled".to_string(),
            Err(e) => e.to_string(),
        };
        self.export_status = Some(status);
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let actions = ctx.input(|i| {
            let mut actions = Vec::new();
            if i.key_pressed(egui::Key::Space) {
                actions.push(EditorAction::TogglePlay);
            }
            if i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace) {
                actions.push(EditorAction::DeleteSelected);
            }
            if i.key_pressed(egui::Key::P) {
                actions.push(EditorAction::TogglePreview);
            }
            if i.key_pressed(egui::Key::Escape) {
                actions.push(EditorAction::ClearSelection);
            }
            actions
        });
        for action in actions {
            self.pending.send(action);
        }
    }

    /// Lay out all panels. Returns true when the user asked to go back.
    fn render(&mut self, ctx: &egui::Context, interval_step: &mut f64) -> bool {
        let mut back = false;

        egui::TopBottomPanel::top("editor_top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⬅ Projects").clicked() {
                    back = true;
                }
                ui.separator();
                let name = ui.add(egui::TextEdit::singleline(&mut self.name_buf).desired_width(260.0));
                if name.lost_focus() && self.name_buf.trim() != self.session.project().name {
                    self.pending.send(EditorAction::Rename(self.name_buf.clone()));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(err) = self.session.last_save_error() {
                        ui.colored_label(egui::Color32::from_rgb(220, 90, 90), format!("Save failed: {}", err));
                    } else if self.session.is_dirty() {
                        ui.weak("● unsaved");
                    } else {
                        ui.weak("saved");
                    }
                    if let Some(notice) = &self.notice {
                        ui.label(notice.as_str());
                    }
                });
            });
        });

        let project = self.session.project();
        let source_size = (project.source.width, project.source.height);
        let duration = self.session.keys().duration();
        let current = self.session.current_time();

        egui::TopBottomPanel::bottom("editor_timeline").show(ctx, |ui| {
            ui.add_space(4.0);
            render_transport(
                ui,
                self.session.mode(),
                current,
                duration,
                !self.session.keys().is_empty(),
                &mut self.pending,
            );
            let view = TrackView {
                keys: self.session.keys(),
                selection: self.session.selection(),
                drag: self.session.timeline().drag(),
                playhead: current,
                track_width: self.session.timeline().track_width(),
            };
            render_track(ui, &view, &mut self.pending);
            render_key_toolbar(
                ui,
                self.session.selection(),
                self.session.keys().len(),
                duration,
                &mut self.retime_secs,
                interval_step,
                &mut self.pending,
            );
            ui.add_space(4.0);
        });

        egui::SidePanel::right("editor_export")
            .default_width(260.0)
            .show(ctx, |ui| {
                let state = ExportPanelState {
                    settings: *self.session.export_settings(),
                    source_size,
                    key_count: self.session.keys().len(),
                    running: self.export.is_running(),
                    progress: self.export.progress(),
                    status: self.export_status.as_deref(),
                };
                render_export_panel(ui, &state, &mut self.progress_bar, &mut self.pending);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let size = fit_size(source_size, ui.available_size());
            if let Some(surface) = self.surface.as_mut() {
                let ppp = ctx.pixels_per_point();
                let (w, h) = decode_size(source_size, size, ppp);
                surface.set_frame_size(w, h);
            }
            ui.centered_and_justified(|ui| match &self.texture {
                Some(texture) => {
                    ui.add(egui::Image::new(egui::load::SizedTexture::new(texture.id(), size)));
                }
                None if self.surface.is_none() => {
                    ui.label("Video playback unavailable");
                }
                None => {
                    ui.spinner();
                }
            });
        });

        back
    }
}

impl Drop for EditorView {
    fn drop(&mut self) {
        self.leave();
    }
}

/// Apply a widget action to the session. False for actions the view
/// handles itself (export, rename).
pub fn apply_to_session(session: &mut EditorSession, action: &EditorAction) -> bool {
    match action {
        EditorAction::TrackWidth(width) => session.set_track_width(*width),
        EditorAction::ClickTrack { x, modifiers } => {
            session.click_track(*x, *modifiers);
        }
        EditorAction::DoubleClickTrack { x } => {
            session.double_click_track(*x);
        }
        EditorAction::ClickMarker { key, modifiers } => session.click_marker(*key, *modifiers),
        EditorAction::DragStart(key) => session.drag_start(*key),
        EditorAction::DragMove(x) => session.drag_move(*x),
        EditorAction::DragEnd => {
            session.drag_end();
        }
        EditorAction::PointerLeft => {
            session.pointer_left();
        }
        EditorAction::TogglePlay => session.toggle_play(),
        EditorAction::TogglePreview => {
            session.toggle_preview();
        }
        EditorAction::AddAtPlayhead => {
            session.add_at_playhead();
        }
        EditorAction::DeleteSelected => {
            session.delete_selected();
        }
        EditorAction::Retime(secs) => {
            session.retime_selected(*secs);
        }
        EditorAction::ClearSelection => session.clear_selection(),
        EditorAction::GenerateInterval(step) => {
            session.generate_interval(*step);
        }
        EditorAction::ClearKeys => session.clear_keys(),
        EditorAction::SetExportSettings(settings) => session.set_export_settings(*settings),
        EditorAction::Rename(_) | EditorAction::StartExport | EditorAction::CancelExport => {
            return false;
        }
    }
    true
}

/// Largest size with the source aspect that fits `avail`.
pub fn fit_size(source: (u32, u32), avail: egui::Vec2) -> egui::Vec2 {
    let (w, h) = (source.0.max(1) as f32, source.1.max(1) as f32);
    let scale = (avail.x / w).min(avail.y / h).max(0.0);
    egui::vec2(w * scale, h * scale)
}

/// Pixel size to decode at: the display size, never above the source.
pub fn decode_size(source: (u32, u32), display: egui::Vec2, pixels_per_point: f32) -> (u32, u32) {
    let w = ((display.x * pixels_per_point).round() as u32).clamp(1, source.0.max(1));
    let h = ((display.y * pixels_per_point).round() as u32).clamp(1, source.1.max(1));
    (w, h)
}

fn upload_frame(ctx: &egui::Context, texture: &mut Option<egui::TextureHandle>, frame: DecodedFrame) {
    let size = [frame.image.width() as usize, frame.image.height() as usize];
    let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.image.as_raw());
    match texture {
        Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
        None => {
            *texture = Some(ctx.load_texture("keysheet-video", image, egui::TextureOptions::LINEAR));
        }
    }
}

#[cfg(feature = "ffmpeg")]
fn open_surface(session: &mut EditorSession, services: &AppServices) -> Option<DecodedSurface> {
    use crate::media::{self, MediaInfo};

    let path = session.source_path()?;
    let info = match media::probe(&path) {
        Ok(info) => {
            session.set_media_duration(info.duration);
            info
        }
        Err(e) => {
            warn!("Probe failed for {}: {}", path.display(), e);
            let project = session.project();
            MediaInfo {
                duration: project.duration,
                width: project.source.width,
                height: project.source.height,
                fps: 0.0,
            }
        }
    };
    let factory = Box::new(media::decode::decoder_factory(path));
    Some(DecodedSurface::spawn(
        info,
        factory,
        services.clock.clone(),
        (info.width, info.height),
    ))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_surface(_session: &mut EditorSession, _services: &AppServices) -> Option<DecodedSurface> {
    warn!("Built without ffmpeg: no video playback");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::core::{ManualClock, Modifiers};
    use crate::entities::{ExportFormat, ExportSettings};
    use crate::media::MediaInfo;
    use crate::storage::MemoryProjectStore;
    use std::path::Path;
    use std::sync::Arc;

    fn session(clock: &ManualClock) -> EditorSession {
        let info = MediaInfo {
            duration: 10.0,
            width: 640,
            height: 360,
            fps: 25.0,
        };
        EditorSession::create(
            Arc::new(MemoryProjectStore::new()),
            Path::new("/videos/holiday.mp4"),
            info,
            clock.shared(),
            &EditorConfig::default(),
        )
        .unwrap()
    }

    fn apply_all(session: &mut EditorSession, actions: &[EditorAction]) {
        for action in actions {
            assert!(apply_to_session(session, action));
        }
    }

    #[test]
    fn test_track_gestures_reach_session() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        apply_all(
            &mut session,
            &[
                EditorAction::TrackWidth(1000.0),
                EditorAction::DoubleClickTrack { x: 500.0 },
                EditorAction::DoubleClickTrack { x: 200.0 },
                EditorAction::ClickTrack {
                    x: 700.0,
                    modifiers: Modifiers::NONE,
                },
            ],
        );
        assert_eq!(session.keys().to_secs(), vec![2.0, 5.0]);
        assert_eq!(session.current_time(), 7.0);
    }

    #[test]
    fn test_marker_drag_actions() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        apply_all(
            &mut session,
            &[
                EditorAction::TrackWidth(1000.0),
                EditorAction::DoubleClickTrack { x: 500.0 },
            ],
        );
        let key = Keyframe::from_secs(5.0);
        apply_all(
            &mut session,
            &[
                EditorAction::ClickMarker {
                    key,
                    modifiers: Modifiers::NONE,
                },
                EditorAction::DragStart(key),
                EditorAction::DragMove(712.3),
                EditorAction::DragEnd,
            ],
        );
        assert_eq!(session.keys().to_secs(), vec![7.123]);
        assert_eq!(session.selection().single(), Some(Keyframe::from_secs(7.123)));
    }

    #[test]
    fn test_bulk_actions() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        apply_all(&mut session, &[EditorAction::GenerateInterval(2.0)]);
        assert_eq!(session.keys().to_secs(), vec![0.0, 2.0, 4.0, 6.0, 8.0]);

        apply_all(
            &mut session,
            &[
                EditorAction::ClickMarker {
                    key: Keyframe::from_secs(4.0),
                    modifiers: Modifiers::NONE,
                },
                EditorAction::DeleteSelected,
            ],
        );
        assert_eq!(session.keys().to_secs(), vec![0.0, 2.0, 6.0, 8.0]);

        apply_all(&mut session, &[EditorAction::ClearKeys]);
        assert!(session.keys().is_empty());
    }

    #[test]
    fn test_settings_action_sanitizes() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        let settings = ExportSettings {
            fps: 500.0,
            width: Some(320),
            height: None,
            format: ExportFormat::SpriteSheet,
        };
        apply_all(&mut session, &[EditorAction::SetExportSettings(settings)]);
        assert_eq!(session.export_settings().fps, 60.0);
        assert_eq!(session.export_settings().format, ExportFormat::SpriteSheet);
        assert!(session.is_dirty());
    }

    #[test]
    fn test_view_actions_not_handled_by_session() {
        let clock = ManualClock::new();
        let mut session = session(&clock);
        assert!(!apply_to_session(&mut session, &EditorAction::StartExport));
        assert!(!apply_to_session(&mut session, &EditorAction::CancelExport));
        assert!(!apply_to_session(&mut session, &EditorAction::Rename("x".into())));
    }

    #[test]
    fn test_fit_size_keeps_aspect() {
        let size = fit_size((1920, 1080), egui::vec2(960.0, 1000.0));
        assert_eq!(size, egui::vec2(960.0, 540.0));
        let size = fit_size((1000, 1000), egui::vec2(300.0, 200.0));
        assert_eq!(size, egui::vec2(200.0, 200.0));
    }

    #[test]
    fn test_decode_size_capped_at_source() {
        assert_eq!(decode_size((640, 360), egui::vec2(960.0, 540.0), 2.0), (640, 360));
        assert_eq!(decode_size((1920, 1080), egui::vec2(480.0, 270.0), 1.0), (480, 270));
        assert_eq!(decode_size((640, 360), egui::vec2(0.0, 0.0), 1.0), (1, 1));
    }
}
