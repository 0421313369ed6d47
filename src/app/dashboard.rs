//! Project dashboard: recent projects, new project, delete with confirmation.

use eframe::egui;
use log::{error, info};
use std::path::PathBuf;

use crate::entities::Project;
use crate::entities::project::now_ms;
use crate::storage::ProjectStore;
use crate::widgets::file_dialogs::create_video_dialog;
use crate::widgets::transport::format_time;

#[derive(Clone, Debug, PartialEq)]
pub enum DashboardAction {
    Open(String),
    New(PathBuf),
    Delete(String),
}

#[derive(Default)]
pub struct Dashboard {
    projects: Vec<Project>,
    pending_delete: Option<String>,
    load_error: Option<String>,
}

impl Dashboard {
    /// Snapshot the store. Failures are shown in place of the list.
    pub fn load(store: &dyn ProjectStore) -> Self {
        match store.list() {
            Ok(projects) => {
                info!("Dashboard: {} projects", projects.len());
                Self {
                    projects,
                    ..Default::default()
                }
            }
            Err(e) => {
                error!("Failed to list projects: {}", e);
                Self {
                    load_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Ask for confirmation before deleting `id`.
    pub fn request_delete(&mut self, id: &str) {
        if self.projects.iter().any(|p| p.id == id) {
            self.pending_delete = Some(id.to_string());
        }
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    /// Confirmation answered. Yes gives the action to run.
    pub fn resolve_delete(&mut self, confirmed: bool) -> Option<DashboardAction> {
        let id = self.pending_delete.take()?;
        confirmed.then_some(DashboardAction::Delete(id))
    }

    pub fn render(&mut self, ctx: &egui::Context, last_project: Option<&str>) -> Option<DashboardAction> {
        let mut action = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Projects");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("New Project...").clicked()
                        && let Some(path) = create_video_dialog("Choose a video").pick_file()
                    {
                        action = Some(DashboardAction::New(path));
                    }
                    if let Some(id) = last_project
                        && let Some(project) = self.projects.iter().find(|p| p.id == id)
                        && ui.button(format!("Resume '{}'", project.name)).clicked()
                    {
                        action = Some(DashboardAction::Open(id.to_string()));
                    }
                });
            });
            ui.separator();

            if let Some(err) = &self.load_error {
                ui.colored_label(egui::Color32::from_rgb(220, 90, 90), err);
                return;
            }
            if self.projects.is_empty() {
                ui.label("No projects yet. Pick a video to start.");
                return;
            }

            let now = now_ms();
            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("projects_grid")
                    .num_columns(5)
                    .striped(true)
                    .spacing([16.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong("Name");
                        ui.strong("Length");
                        ui.strong("Keyframes");
                        ui.strong("Updated");
                        ui.label("");
                        ui.end_row();

                        for project in &self.projects {
                            if ui.link(project.name.as_str()).clicked() {
                                action = Some(DashboardAction::Open(project.id.clone()));
                            }
                            ui.label(format_time(project.duration));
                            ui.label(project.keyframes.len().to_string());
                            ui.label(format_age(now, project.updated_at));
                            if ui.small_button("Delete").clicked() {
                                self.pending_delete = Some(project.id.clone());
                            }
                            ui.end_row();
                        }
                    });
            });
        });

        if let Some(id) = self.pending_delete.clone() {
            let name = self
                .projects
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
                .unwrap_or(id);
            let mut answer = None;
            egui::Window::new("Delete project?")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(format!("'{}' and its video copy will be removed.", name));
                    ui.horizontal(|ui| {
                        if ui.button("Delete").clicked() {
                            answer = Some(true);
                        }
                        if ui.button("Cancel").clicked() {
                            answer = Some(false);
                        }
                    });
                });
            if let Some(confirmed) = answer
                && let Some(resolved) = self.resolve_delete(confirmed)
            {
                action = Some(resolved);
            }
        }

        action
    }
}

/// Coarse "how long ago" for the updated column.
pub fn format_age(now: u64, then: u64) -> String {
    let secs = now.saturating_sub(then) / 1000;
    match secs {
        0..60 => "just now".to_string(),
        60..3600 => format!("{} min ago", secs / 60),
        3600..86_400 => format!("{} h ago", secs / 3600),
        _ => format!("{} days ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExportSettings, SourceRef};
    use crate::storage::MemoryProjectStore;
    use std::path::Path;

    fn add(store: &MemoryProjectStore, name: &str) -> String {
        let mut project = Project::new(name, SourceRef::default(), 5.0, ExportSettings::default());
        store.save(&mut project, Path::new("/videos/a.mp4")).unwrap()
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(10_000, 5_000), "just now");
        assert_eq!(format_age(200_000, 0), "3 min ago");
        assert_eq!(format_age(7_200_000, 0), "2 h ago");
        assert_eq!(format_age(3 * 86_400_000, 0), "3 days ago");
        assert_eq!(format_age(0, 5_000), "just now");
    }

    #[test]
    fn test_load_lists_most_recent_first() {
        let store = MemoryProjectStore::new();
        let first = add(&store, "first");
        let second = add(&store, "second");
        let mut project = store.get(&first).unwrap().unwrap();
        store.update(&mut project).unwrap();

        let dashboard = Dashboard::load(&store);
        let ids: Vec<&str> = dashboard.projects().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let store = MemoryProjectStore::new();
        let id = add(&store, "clip");
        let mut dashboard = Dashboard::load(&store);

        dashboard.request_delete("unknown");
        assert!(dashboard.pending_delete().is_none());

        dashboard.request_delete(&id);
        assert_eq!(dashboard.resolve_delete(false), None);
        assert!(dashboard.pending_delete().is_none());

        dashboard.request_delete(&id);
        assert_eq!(dashboard.resolve_delete(true), Some(DashboardAction::Delete(id)));
    }
}
