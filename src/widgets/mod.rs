//! UI widgets - stateless renderers that emit `EditorAction`s

pub mod actions;
pub mod export_panel;
pub mod file_dialogs;
pub mod progress_bar;
pub mod timeline;
pub mod transport;

pub use actions::{ActionQueue, EditorAction};
