//! Export settings and progress panel.

use eframe::egui::{self, Ui};

use super::actions::{ActionQueue, EditorAction};
use super::progress_bar::ProgressBar;
use crate::entities::export_settings::{FPS_MAX, FPS_MIN};
use crate::entities::{ExportFormat, ExportSettings};
use crate::export::ExportProgress;

const MAX_SIDE: u32 = 8192;

pub struct ExportPanelState<'a> {
    pub settings: ExportSettings,
    pub source_size: (u32, u32),
    pub key_count: usize,
    pub running: bool,
    pub progress: Option<&'a ExportProgress>,
    /// Last terminal message (saved path, failure)
    pub status: Option<&'a str>,
}

pub fn render_export_panel(
    ui: &mut Ui,
    state: &ExportPanelState<'_>,
    progress_bar: &mut ProgressBar,
    queue: &mut ActionQueue<EditorAction>,
) {
    let mut settings = state.settings;

    ui.heading("Export");
    ui.add_enabled_ui(!state.running, |ui| {
        egui::Grid::new("export_settings")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("Format:");
                egui::ComboBox::from_id_salt("export_format")
                    .selected_text(settings.format.to_string())
                    .show_ui(ui, |ui| {
                        for format in ExportFormat::ALL {
                            ui.selectable_value(&mut settings.format, format, format.to_string());
                        }
                    });
                ui.end_row();

                ui.label("Frame rate:");
                ui.add(
                    egui::DragValue::new(&mut settings.fps)
                        .range(FPS_MIN..=FPS_MAX)
                        .speed(0.1)
                        .max_decimals(2)
                        .suffix(" fps"),
                );
                ui.end_row();

                ui.label("Width:");
                optional_side(ui, &mut settings.width, state.source_size.0);
                ui.end_row();

                ui.label("Height:");
                optional_side(ui, &mut settings.height, state.source_size.1);
                ui.end_row();
            });

        let (w, h) = settings.resolve_dimensions(state.source_size.0, state.source_size.1);
        ui.weak(format!("Output frame: {}x{}", w, h));
    });

    if settings != state.settings {
        queue.send(EditorAction::SetExportSettings(settings));
    }

    ui.add_space(6.0);
    ui.horizontal(|ui| {
        let can_export = !state.running && state.key_count > 0;
        let export = ui
            .add_enabled(can_export, egui::Button::new(format!("Export {} frames", state.key_count)))
            .on_disabled_hover_text(if state.running {
                "An export is already running"
            } else {
                "Add keyframes first"
            });
        if export.clicked() {
            queue.send(EditorAction::StartExport);
        }
        if state.running && ui.button("Cancel").clicked() {
            queue.send(EditorAction::CancelExport);
        }
    });

    if let Some(progress) = state.progress {
        ui.label(progress.stage.to_string());
        progress_bar.set_export(progress);
        progress_bar.render(ui);
    }
    if let Some(status) = state.status {
        ui.label(status);
    }
}

/// Checkbox + value. Unchecked means "follow the source".
fn optional_side(ui: &mut Ui, side: &mut Option<u32>, source: u32) {
    ui.horizontal(|ui| {
        let mut custom = side.is_some();
        if ui.checkbox(&mut custom, "").changed() {
            *side = custom.then_some(source.max(1));
        }
        match side {
            Some(value) => {
                ui.add(egui::DragValue::new(value).range(1..=MAX_SIDE).suffix(" px"));
            }
            None => {
                ui.weak("auto");
            }
        }
    });
}
