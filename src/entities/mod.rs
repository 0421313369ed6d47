//! Entities - persisted data types shared by the editor, store and exporter.

pub mod export_settings;
pub mod project;

pub use export_settings::{ExportFormat, ExportSettings};
pub use project::{Project, SourceRef};
