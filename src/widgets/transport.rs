//! Transport bar and keyframe toolbar.

use eframe::egui::{self, Ui};

use super::actions::{ActionQueue, EditorAction};
use crate::core::{PlaybackMode, Selection};

/// `mm:ss.mmm`
pub fn format_time(secs: f64) -> String {
    let ms = (secs.max(0.0) * 1000.0).round() as u64;
    format!("{:02}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}

pub fn render_transport(
    ui: &mut Ui,
    mode: PlaybackMode,
    current: f64,
    duration: f64,
    has_keys: bool,
    queue: &mut ActionQueue<EditorAction>,
) {
    ui.horizontal(|ui| {
        let play_label = if mode == PlaybackMode::Playing { "⏸ Pause" } else { "▶ Play" };
        if ui
            .add(egui::Button::new(play_label).min_size(egui::vec2(80.0, 0.0)))
            .on_hover_text("Space")
            .clicked()
        {
            queue.send(EditorAction::TogglePlay);
        }

        let previewing = mode == PlaybackMode::PreviewStepping;
        let preview = ui
            .add_enabled(has_keys || previewing, egui::Button::new("Preview").selected(previewing))
            .on_hover_text("Step through keyframes at the export fps (P)")
            .on_disabled_hover_text("Add keyframes to preview");
        if preview.clicked() {
            queue.send(EditorAction::TogglePreview);
        }

        if ui.button("+ Key").on_hover_text("Add a keyframe at the playhead").clicked() {
            queue.send(EditorAction::AddAtPlayhead);
        }

        ui.separator();
        ui.monospace(format!("{} / {}", format_time(current), format_time(duration)));
    });
}

/// Selection actions, numeric retime and the interval generator.
pub fn render_key_toolbar(
    ui: &mut Ui,
    selection: &Selection,
    key_count: usize,
    duration: f64,
    retime_secs: &mut f64,
    interval_step: &mut f64,
    queue: &mut ActionQueue<EditorAction>,
) {
    ui.horizontal(|ui| {
        ui.label(format!("{} keyframes, {} selected", key_count, selection.len()));
        ui.separator();

        ui.add_enabled_ui(selection.single().is_some(), |ui| {
            ui.label("Time:");
            ui.add(
                egui::DragValue::new(retime_secs)
                    .range(0.0..=duration.max(0.0))
                    .speed(0.01)
                    .max_decimals(3)
                    .suffix(" s"),
            );
            if ui.button("Set").clicked() {
                queue.send(EditorAction::Retime(*retime_secs));
            }
        });

        let delete = ui
            .add_enabled(!selection.is_empty(), egui::Button::new("Delete"))
            .on_hover_text("Del");
        if delete.clicked() {
            queue.send(EditorAction::DeleteSelected);
        }
        if ui
            .add_enabled(!selection.is_empty(), egui::Button::new("Deselect"))
            .clicked()
        {
            queue.send(EditorAction::ClearSelection);
        }

        ui.separator();
        ui.label("Every");
        ui.add(
            egui::DragValue::new(interval_step)
                .range(0.01..=duration.max(0.01))
                .speed(0.05)
                .max_decimals(3)
                .suffix(" s"),
        );
        if ui
            .button("Generate")
            .on_hover_text("Replace all keyframes with an evenly spaced set")
            .clicked()
        {
            queue.send(EditorAction::GenerateInterval(*interval_step));
        }
        if ui
            .add_enabled(key_count > 0, egui::Button::new("Clear All"))
            .clicked()
        {
            queue.send(EditorAction::ClearKeys);
        }
    });
}
