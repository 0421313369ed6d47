//! Project persistence.
//!
//! `ProjectStore` is the seam between the editor and wherever projects live.
//! The desktop app uses `FsProjectStore` (one directory per project); tests
//! use `MemoryProjectStore`.
//!
//! Methods take `&self` so a store can be shared as `Arc<dyn ProjectStore>`
//! between the dashboard and an open editor session.

pub mod fs_store;
pub mod memory_store;

pub use fs_store::FsProjectStore;
pub use memory_store::MemoryProjectStore;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::entities::Project;

pub type SharedStore = Arc<dyn ProjectStore>;

pub trait ProjectStore: Send + Sync {
    /// Store a new project together with its source video. Fills in
    /// `project.source.stored_name` and returns the project id.
    fn save(&self, project: &mut Project, source: &Path) -> Result<String, StorageError>;

    /// Write back an existing project. Refreshes `updated_at`.
    fn update(&self, project: &mut Project) -> Result<(), StorageError>;

    /// All projects, most recently updated first.
    fn list(&self) -> Result<Vec<Project>, StorageError>;

    fn get(&self, id: &str) -> Result<Option<Project>, StorageError>;

    /// Remove a project and its payload. Returns false if it did not exist.
    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    fn rename(&self, id: &str, name: &str) -> Result<Project, StorageError>;

    /// Location of the stored source video.
    fn source_path(&self, id: &str) -> Result<Option<PathBuf>, StorageError>;
}

/// Most recently updated first; ties by name so the order is stable.
pub(crate) fn sort_recent_first(projects: &mut [Project]) {
    projects.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Storage errors
#[derive(Debug)]
pub enum StorageError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, message: String },
    NotFound(String),
    InvalidId(String),
    MissingSource(PathBuf),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            StorageError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            StorageError::NotFound(id) => write!(f, "Project not found: {}", id),
            StorageError::InvalidId(id) => write!(f, "Invalid project id: {:?}", id),
            StorageError::MissingSource(path) => {
                write!(f, "Source video not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
