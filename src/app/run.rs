//! Main application loop - eframe::App implementation.
//!
//! Each frame renders the active screen and applies whatever navigation it
//! asked for. UI state (last project, interval step) is persisted through
//! eframe storage; project data never is.

use eframe::egui;
use log::trace;

use crate::app::{EditorOutcome, KeysheetApp, Screen, UiState};

impl eframe::App for KeysheetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let last_project = self.ui_state.last_project.clone();
        match &mut self.screen {
            Screen::Dashboard(dashboard) => {
                if let Some(action) = dashboard.render(ctx, last_project.as_deref()) {
                    self.handle_dashboard_action(action);
                }
            }
            Screen::Editor(editor) => {
                if editor.update(ctx, &mut self.ui_state.interval_step) == EditorOutcome::Back {
                    self.show_dashboard();
                }
            }
        }

        self.render_error(ctx);
    }

    /// Save UI state to persistent storage.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Ok(json) = serde_json::to_string(&self.ui_state) {
            storage.set_string(eframe::APP_KEY, json);
            trace!("UI state saved: {:?}", self.ui_state);
        }
    }
}

impl KeysheetApp {
    /// Restore UI state written by `save()`.
    pub fn load_ui_state(storage: Option<&dyn eframe::Storage>) -> UiState {
        storage
            .and_then(|s| s.get_string(eframe::APP_KEY))
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    fn render_error(&mut self, ctx: &egui::Context) {
        let Some(msg) = self.error_msg.clone() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(msg);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.error_msg = None;
        }
    }
}
