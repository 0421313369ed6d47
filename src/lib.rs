//! keysheet - pick keyframes on a video timeline, preview them, and export
//! them as an animated GIF or a PNG sprite sheet.
//!
//! Re-exports all modules for use by the binary and integration tests.

// Editor core (keyframes, timeline, clock, autosave, session)
pub mod core;

// Data, persistence, media, export
pub mod entities;
pub mod export;
pub mod media;
pub mod storage;

// App modules
pub mod app;
pub mod cli;
pub mod config;
pub mod paths;
pub mod shell;
pub mod widgets;

pub use config::EditorConfig;
pub use core::{EditorSession, KeyframeSet, ManualClock, PlaybackClock, PlaybackMode};
pub use entities::{ExportFormat, ExportSettings, Project};
pub use export::{ExportJob, SheetEncoder, SpriteEncoder};
pub use storage::{FsProjectStore, MemoryProjectStore, ProjectStore};
