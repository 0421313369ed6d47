//! In-memory project store. Source videos are referenced, not copied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{ProjectStore, StorageError, sort_recent_first};
use crate::entities::Project;

#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    entries: Mutex<HashMap<String, (Project, PathBuf)>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (Project, PathBuf)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn save(&self, project: &mut Project, source: &Path) -> Result<String, StorageError> {
        if project.source.stored_name.is_empty() {
            project.source.stored_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        self.entries()
            .insert(project.id.clone(), (project.clone(), source.to_path_buf()));
        Ok(project.id.clone())
    }

    fn update(&self, project: &mut Project) -> Result<(), StorageError> {
        let mut entries = self.entries();
        let entry = entries
            .get_mut(&project.id)
            .ok_or_else(|| StorageError::NotFound(project.id.clone()))?;
        project.touch();
        entry.0 = project.clone();
        Ok(())
    }

    fn list(&self) -> Result<Vec<Project>, StorageError> {
        let mut projects: Vec<Project> = self.entries().values().map(|(p, _)| p.clone()).collect();
        sort_recent_first(&mut projects);
        Ok(projects)
    }

    fn get(&self, id: &str) -> Result<Option<Project>, StorageError> {
        Ok(self.entries().get(id).map(|(p, _)| p.clone()))
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.entries().remove(id).is_some())
    }

    fn rename(&self, id: &str, name: &str) -> Result<Project, StorageError> {
        let mut entries = self.entries();
        let (project, _) = entries
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        project.name = name.to_string();
        project.touch();
        Ok(project.clone())
    }

    fn source_path(&self, id: &str) -> Result<Option<PathBuf>, StorageError> {
        Ok(self.entries().get(id).map(|(_, path)| path.clone()))
    }
}
