//! Filesystem project store.
//!
//! Layout under the root:
//! ```text
//! <root>/<id>/project.json
//! <root>/<id>/source.<ext>
//! ```
//! `project.json` is written to a temp file and renamed so a crash mid-write
//! never leaves a truncated project behind.

use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{ProjectStore, StorageError, sort_recent_first};
use crate::entities::Project;

const PROJECT_FILE: &str = "project.json";
const SOURCE_STEM: &str = "source";

#[derive(Debug, Clone)]
pub struct FsProjectStore {
    root: PathBuf,
}

impl FsProjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        info!("Project store: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids are UUIDs, which also keeps them from escaping the root.
    fn project_dir(&self, id: &str) -> Result<PathBuf, StorageError> {
        Uuid::parse_str(id).map_err(|_| StorageError::InvalidId(id.to_string()))?;
        Ok(self.root.join(id))
    }

    fn read_project(path: &Path) -> Result<Project, StorageError> {
        let json = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        Project::from_json(&json).map_err(|e| StorageError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn write_project(dir: &Path, project: &Project) -> Result<(), StorageError> {
        let json = project.to_json().map_err(|e| StorageError::Parse {
            path: dir.join(PROJECT_FILE),
            message: e.to_string(),
        })?;
        let tmp = dir.join(format!("{}.tmp", PROJECT_FILE));
        let target = dir.join(PROJECT_FILE);
        fs::write(&tmp, json).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &target).map_err(|e| StorageError::io(&target, e))?;
        Ok(())
    }
}

/// `source.<ext>` keeping the picked file's extension.
fn stored_name_for(source: &Path) -> String {
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", SOURCE_STEM, ext.to_ascii_lowercase()),
        _ => SOURCE_STEM.to_string(),
    }
}

impl ProjectStore for FsProjectStore {
    fn save(&self, project: &mut Project, source: &Path) -> Result<String, StorageError> {
        if !source.is_file() {
            return Err(StorageError::MissingSource(source.to_path_buf()));
        }
        let dir = self.project_dir(&project.id)?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let stored_name = stored_name_for(source);
        let target = dir.join(&stored_name);
        if let Err(e) = fs::copy(source, &target) {
            let _ = fs::remove_dir_all(&dir);
            return Err(StorageError::io(&target, e));
        }
        project.source.stored_name = stored_name;

        if let Err(e) = Self::write_project(&dir, project) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        info!("Project '{}' saved ({})", project.name, project.id);
        Ok(project.id.clone())
    }

    fn update(&self, project: &mut Project) -> Result<(), StorageError> {
        let dir = self.project_dir(&project.id)?;
        if !dir.join(PROJECT_FILE).is_file() {
            return Err(StorageError::NotFound(project.id.clone()));
        }
        project.touch();
        Self::write_project(&dir, project)?;
        debug!("Project {} updated ({} keyframes)", project.id, project.keyframes.len());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Project>, StorageError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::io(&self.root, e))?;
        let mut projects = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path().join(PROJECT_FILE);
            if !path.is_file() {
                continue;
            }
            match Self::read_project(&path) {
                Ok(project) => projects.push(project),
                Err(e) => warn!("Skipping unreadable project: {}", e),
            }
        }
        sort_recent_first(&mut projects);
        Ok(projects)
    }

    fn get(&self, id: &str) -> Result<Option<Project>, StorageError> {
        let path = self.project_dir(id)?.join(PROJECT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::read_project(&path).map(Some)
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let dir = self.project_dir(id)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        info!("Project {} deleted", id);
        Ok(true)
    }

    fn rename(&self, id: &str, name: &str) -> Result<Project, StorageError> {
        let mut project = self
            .get(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        project.name = name.to_string();
        self.update(&mut project)?;
        Ok(project)
    }

    fn source_path(&self, id: &str) -> Result<Option<PathBuf>, StorageError> {
        let Some(project) = self.get(id)? else {
            return Ok(None);
        };
        let path = self.project_dir(id)?.join(&project.source.stored_name);
        Ok(path.is_file().then_some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExportSettings, SourceRef};

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let path = std::env::temp_dir().join(format!("keysheet_{}_{}", tag, Uuid::new_v4()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn fake_video(dir: &TempDir) -> PathBuf {
        let path = dir.0.join("Clip.MP4");
        fs::write(&path, b"not really a video").unwrap();
        path
    }

    fn project(name: &str) -> Project {
        let source = SourceRef {
            original_name: "Clip.MP4".into(),
            stored_name: String::new(),
            width: 320,
            height: 240,
        };
        Project::new(name, source, 8.0, ExportSettings::default())
    }

    #[test]
    fn test_save_copies_payload_and_get() {
        let tmp = TempDir::new("fs_save");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        let video = fake_video(&tmp);

        let mut p = project("first");
        let id = store.save(&mut p, &video).unwrap();
        assert_eq!(p.source.stored_name, "source.mp4");

        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded, p);
        let payload = store.source_path(&id).unwrap().unwrap();
        assert_eq!(fs::read(payload).unwrap(), b"not really a video");
    }

    #[test]
    fn test_save_missing_source_fails() {
        let tmp = TempDir::new("fs_missing");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        let mut p = project("x");
        let err = store.save(&mut p, &tmp.0.join("nope.mp4")).unwrap_err();
        assert!(matches!(err, StorageError::MissingSource(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_and_list_order() {
        let tmp = TempDir::new("fs_list");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        let video = fake_video(&tmp);

        let mut a = project("a");
        let mut b = project("b");
        store.save(&mut a, &video).unwrap();
        store.save(&mut b, &video).unwrap();

        a.keyframes = vec![1.0, 2.0];
        store.update(&mut a).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.get(&a.id).unwrap().unwrap().keyframes, vec![1.0, 2.0]);
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let tmp = TempDir::new("fs_unknown");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        let mut p = project("ghost");
        assert!(matches!(store.update(&mut p), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_rename_and_delete() {
        let tmp = TempDir::new("fs_rename");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        let video = fake_video(&tmp);
        let mut p = project("old");
        let id = store.save(&mut p, &video).unwrap();

        let renamed = store.rename(&id, "new").unwrap();
        assert_eq!(renamed.name, "new");
        assert!(renamed.updated_at > p.updated_at);

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let tmp = TempDir::new("fs_ids");
        let store = FsProjectStore::open(tmp.0.join("projects")).unwrap();
        assert!(matches!(store.get("../etc"), Err(StorageError::InvalidId(_))));
    }

    #[test]
    fn test_list_skips_corrupt_projects() {
        let tmp = TempDir::new("fs_corrupt");
        let root = tmp.0.join("projects");
        let store = FsProjectStore::open(&root).unwrap();
        let bad = root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join(PROJECT_FILE), "{ broken").unwrap();

        assert!(store.list().unwrap().is_empty());
    }
}
