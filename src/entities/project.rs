//! Project - one video, its keyframes and export settings.
//!
//! The store owns projects; the editor works on a copy and pushes it back
//! through `ProjectStore::update()`. Keyframes are persisted as seconds so
//! the JSON stays readable.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::export_settings::ExportSettings;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The stored video payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// File name the user picked
    pub original_name: String,
    /// File name inside the project directory
    pub stored_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
    /// Media duration in seconds
    pub duration: f64,
    /// Ascending seconds, ms precision
    #[serde(default)]
    pub keyframes: Vec<f64>,
    #[serde(default)]
    pub export_settings: ExportSettings,
    pub source: SourceRef,
}

impl Project {
    pub fn new(name: impl Into<String>, source: SourceRef, duration: f64, export_settings: ExportSettings) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            duration,
            keyframes: Vec::new(),
            export_settings,
            source,
        }
    }

    /// Bump `updated_at`. Never goes backwards, and two touches within the
    /// same millisecond still order correctly.
    pub fn touch(&mut self) {
        self.updated_at = now_ms().max(self.updated_at + 1);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut project: Project = serde_json::from_str(json)?;
        project.export_settings = project.export_settings.sanitized();
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::export_settings::ExportFormat;

    fn sample() -> Project {
        let source = SourceRef {
            original_name: "clip.mp4".into(),
            stored_name: "source.mp4".into(),
            width: 640,
            height: 360,
        };
        Project::new("clip.mp4", source, 12.5, ExportSettings::default())
    }

    #[test]
    fn test_new_project_has_id_and_times() {
        let project = sample();
        assert!(Uuid::parse_str(&project.id).is_ok());
        assert_eq!(project.created_at, project.updated_at);
        assert!(project.keyframes.is_empty());
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut project = sample();
        let before = project.updated_at;
        project.touch();
        project.touch();
        assert!(project.updated_at >= before + 2);
    }

    #[test]
    fn test_json_roundtrip_sanitizes_settings() {
        let mut project = sample();
        project.keyframes = vec![0.5, 1.25];
        project.export_settings.format = ExportFormat::SpriteSheet;
        project.export_settings.fps = 90.0;

        let loaded = Project::from_json(&project.to_json().unwrap()).unwrap();
        assert_eq!(loaded.keyframes, vec![0.5, 1.25]);
        assert_eq!(loaded.export_settings.format, ExportFormat::SpriteSheet);
        assert_eq!(loaded.export_settings.fps, 60.0);
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{
            "id": "abc", "name": "x", "created_at": 1, "updated_at": 2,
            "duration": 3.0,
            "source": { "original_name": "a.mp4", "stored_name": "a.mp4", "width": 2, "height": 2 }
        }"#;
        let project = Project::from_json(json).unwrap();
        assert!(project.keyframes.is_empty());
        assert_eq!(project.export_settings, ExportSettings::default());
    }
}
