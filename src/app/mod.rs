//! Application module - KeysheetApp and its two screens.
//!
//! - `dashboard` - project list, new project, delete
//! - `editor` - one open project: video, timeline, export
//! - `run` - eframe::App implementation and UI state persistence

mod dashboard;
mod editor;
mod run;

pub use dashboard::{Dashboard, DashboardAction, format_age};
pub use editor::{EditorOutcome, EditorView, apply_to_session, decode_size, fit_size};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EditorConfig;
use crate::core::{EditorSession, SharedClock};
use crate::export::SpriteEncoder;
use crate::media;
use crate::storage::SharedStore;

/// Long-lived collaborators shared by every screen.
#[derive(Clone)]
pub struct AppServices {
    pub store: SharedStore,
    pub config: EditorConfig,
    pub clock: SharedClock,
    pub encoder: Arc<dyn SpriteEncoder>,
}

/// UI state persisted by eframe between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    /// Offered as "Resume" on the dashboard
    pub last_project: Option<String>,
    /// Interval generator step in seconds
    pub interval_step: f64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            last_project: None,
            interval_step: 1.0,
        }
    }
}

/// What to show first.
#[derive(Clone, Debug, PartialEq)]
pub enum Startup {
    Dashboard,
    Open(String),
    New(PathBuf),
}

pub(crate) enum Screen {
    Dashboard(Dashboard),
    Editor(Box<EditorView>),
}

/// Main application state.
pub struct KeysheetApp {
    services: AppServices,
    ui_state: UiState,
    screen: Screen,
    error_msg: Option<String>,
}

impl KeysheetApp {
    pub fn new(services: AppServices, ui_state: UiState, startup: Startup) -> Self {
        let dashboard = Dashboard::load(services.store.as_ref());
        let mut app = Self {
            services,
            ui_state,
            screen: Screen::Dashboard(dashboard),
            error_msg: None,
        };
        match startup {
            Startup::Dashboard => {}
            Startup::Open(id) => app.open_project(&id),
            Startup::New(path) => app.new_project(&path),
        }
        app
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui_state
    }

    pub fn error_msg(&self) -> Option<&str> {
        self.error_msg.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.screen, Screen::Editor(_))
    }

    /// Open session, if the editor is showing.
    pub fn session(&self) -> Option<&EditorSession> {
        match &self.screen {
            Screen::Editor(editor) => Some(editor.session()),
            Screen::Dashboard(_) => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut EditorSession> {
        match &mut self.screen {
            Screen::Editor(editor) => Some(editor.session_mut()),
            Screen::Dashboard(_) => None,
        }
    }

    pub fn open_project(&mut self, id: &str) {
        let s = &self.services;
        match EditorSession::open(s.store.clone(), id, s.clock.clone(), &s.config) {
            Some(session) => self.enter_editor(session),
            None => {
                self.error_msg = Some(format!("Project {} could not be opened", id));
                if self.ui_state.last_project.as_deref() == Some(id) {
                    self.ui_state.last_project = None;
                }
                self.show_dashboard();
            }
        }
    }

    /// Probe `path`, store a copy and open the new project.
    pub fn new_project(&mut self, path: &Path) {
        let info = match media::probe(path) {
            Ok(info) => info,
            Err(e) => {
                warn!("Cannot use {}: {}", path.display(), e);
                self.error_msg = Some(format!("Cannot use {}: {}", path.display(), e));
                return;
            }
        };
        let s = &self.services;
        match EditorSession::create(s.store.clone(), path, info, s.clock.clone(), &s.config) {
            Ok(session) => self.enter_editor(session),
            Err(e) => {
                error!("Failed to create project: {}", e);
                self.error_msg = Some(format!("Failed to create project: {}", e));
            }
        }
    }

    pub fn delete_project(&mut self, id: &str) {
        // Close the editor first so a pending save can't resurrect it
        if let Screen::Editor(editor) = &mut self.screen {
            editor.leave();
        }
        match self.services.store.delete(id) {
            Ok(true) => info!("Deleted project {}", id),
            Ok(false) => warn!("Project {} was already gone", id),
            Err(e) => {
                error!("Failed to delete project {}: {}", id, e);
                self.error_msg = Some(format!("Delete failed: {}", e));
            }
        }
        if self.ui_state.last_project.as_deref() == Some(id) {
            self.ui_state.last_project = None;
        }
        self.show_dashboard();
    }

    /// Leave the editor (saving pending edits) and reload the list.
    pub fn show_dashboard(&mut self) {
        if let Screen::Editor(editor) = &mut self.screen {
            editor.leave();
        }
        self.screen = Screen::Dashboard(Dashboard::load(self.services.store.as_ref()));
    }

    fn enter_editor(&mut self, session: EditorSession) {
        if let Screen::Editor(editor) = &mut self.screen {
            editor.leave();
        }
        self.ui_state.last_project = Some(session.id().to_string());
        self.screen = Screen::Editor(Box::new(EditorView::new(session, &self.services)));
    }

    fn handle_dashboard_action(&mut self, action: DashboardAction) {
        match action {
            DashboardAction::Open(id) => self.open_project(&id),
            DashboardAction::New(path) => self.new_project(&path),
            DashboardAction::Delete(id) => self.delete_project(&id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::entities::{ExportSettings, Project, SourceRef};
    use crate::export::SheetEncoder;
    use crate::media::UnavailableGrabber;
    use crate::storage::{MemoryProjectStore, ProjectStore};

    fn services(store: Arc<MemoryProjectStore>) -> AppServices {
        AppServices {
            store,
            config: EditorConfig::default(),
            clock: ManualClock::new().shared(),
            encoder: Arc::new(SheetEncoder::new(Arc::new(UnavailableGrabber))),
        }
    }

    fn stored(store: &MemoryProjectStore, name: &str) -> String {
        let mut project = Project::new(name, SourceRef::default(), 4.0, ExportSettings::default());
        project.keyframes = vec![1.0, 2.0];
        store.save(&mut project, Path::new("/videos/missing.mp4")).unwrap()
    }

    #[test]
    fn test_startup_open_enters_editor() {
        let store = Arc::new(MemoryProjectStore::new());
        let id = stored(&store, "clip");
        let app = KeysheetApp::new(services(store), UiState::default(), Startup::Open(id.clone()));

        assert!(app.is_editing());
        assert_eq!(app.ui_state().last_project.as_deref(), Some(id.as_str()));
        assert_eq!(app.session().map(|s| s.keys().to_secs()), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_unknown_project_falls_back_to_dashboard() {
        let store = Arc::new(MemoryProjectStore::new());
        let ui_state = UiState {
            last_project: Some("gone".into()),
            interval_step: 2.0,
        };
        let app = KeysheetApp::new(services(store), ui_state, Startup::Open("gone".into()));

        assert!(!app.is_editing());
        assert!(app.error_msg().is_some());
        assert_eq!(app.ui_state().last_project, None);
        assert_eq!(app.ui_state().interval_step, 2.0);
    }

    #[test]
    fn test_delete_clears_last_project() {
        let store = Arc::new(MemoryProjectStore::new());
        let id = stored(&store, "clip");
        let mut app = KeysheetApp::new(services(store.clone()), UiState::default(), Startup::Open(id.clone()));

        app.delete_project(&id);
        assert!(!app.is_editing());
        assert!(store.is_empty());
        assert_eq!(app.ui_state().last_project, None);
    }

    #[test]
    fn test_leaving_editor_flushes_edits() {
        let store = Arc::new(MemoryProjectStore::new());
        let id = stored(&store, "clip");
        let mut app = KeysheetApp::new(services(store.clone()), UiState::default(), Startup::Open(id.clone()));

        let session = app.session_mut().unwrap();
        session.generate_interval(1.0);
        assert!(session.is_dirty());
        app.show_dashboard();

        let saved = store.get(&id).unwrap().unwrap();
        assert_eq!(saved.keyframes, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ui_state_defaults_for_missing_fields() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, UiState::default());
        let state: UiState = serde_json::from_str(r#"{"last_project":"abc"}"#).unwrap();
        assert_eq!(state.last_project.as_deref(), Some("abc"));
        assert_eq!(state.interval_step, 1.0);
    }
}
