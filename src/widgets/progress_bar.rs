use eframe::egui;

use crate::export::{ExportProgress, ExportStage};

/// Export progress strip with a `current/total` overlay
pub struct ProgressBar {
    current: usize,
    total: usize,
    width: f32,
    height: f32,
    fill_color: egui::Color32,
}

impl ProgressBar {
    /// Light gray fill
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_color(width, height, egui::Color32::from_rgb(178, 178, 178))
    }

    pub fn with_color(width: f32, height: f32, fill_color: egui::Color32) -> Self {
        Self {
            current: 0,
            total: 0,
            width,
            height,
            fill_color,
        }
    }

    pub fn set_progress(&mut self, current: usize, total: usize) {
        self.current = current.min(total);
        self.total = total;
    }

    /// Take counts and color from an export update.
    pub fn set_export(&mut self, progress: &ExportProgress) {
        self.set_progress(progress.current, progress.total);
        self.fill_color = match progress.stage {
            ExportStage::Error(_) => egui::Color32::from_rgb(200, 80, 80),
            ExportStage::Complete => egui::Color32::from_rgb(90, 170, 90),
            _ => egui::Color32::from_rgb(178, 178, 178),
        };
    }

    pub fn fraction(&self) -> f32 {
        if self.total > 0 {
            (self.current as f32 / self.total as f32).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn render(&self, ui: &mut egui::Ui) {
        let width = if self.width > 0.0 {
            self.width
        } else {
            ui.available_width()
        };
        let (rect, _response) =
            ui.allocate_exact_size(egui::vec2(width, self.height), egui::Sense::hover());

        ui.painter().rect_filled(rect, 2.0, egui::Color32::from_gray(40));

        let progress = self.fraction();
        if progress > 0.0 {
            let fill_rect =
                egui::Rect::from_min_size(rect.min, egui::vec2(rect.width() * progress, rect.height()));
            ui.painter().rect_filled(fill_rect, 2.0, self.fill_color);
        }

        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            format!("{}/{}", self.current, self.total),
            egui::FontId::monospace(9.0),
            egui::Color32::from_gray(220),
        );
    }
}
