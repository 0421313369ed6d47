//! Editor configuration (`keysheet.json` in the config directory).
//!
//! Tolerances used by the timeline and preview stepper are heuristics, so
//! they live here instead of being baked into the core. Missing file or
//! missing fields fall back to defaults; out-of-range values are clamped
//! back into something usable on load.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::keyframes::MAX_GENERATED_KEYFRAMES;
use crate::entities::export_settings::{DEFAULT_FPS, clamp_fps};

pub const CONFIG_FILE_NAME: &str = "keysheet.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Double-click removes a keyframe closer than this fraction of the duration
    pub key_match_fraction: f64,
    /// Preview treats the playhead as "on" a keyframe within this many seconds
    pub preview_match_tolerance: f64,
    /// Quiet period before changes are written to the project store
    pub autosave_debounce_ms: u64,
    /// Paused/preview seeks are issued when the surface drifts further than this
    pub seek_epsilon: f64,
    /// While playing, only resync the surface past this drift (seconds)
    pub playing_resync_threshold: f64,
    /// Export fps for new projects
    pub default_fps: f64,
    /// Cap for interval generation
    pub max_generated_keyframes: usize,
    /// Sprite sheet column count, 0 = square-ish grid
    pub sheet_columns: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            key_match_fraction: 0.02,
            preview_match_tolerance: 0.05,
            autosave_debounce_ms: 500,
            seek_epsilon: 0.01,
            playing_resync_threshold: 0.5,
            default_fps: DEFAULT_FPS,
            max_generated_keyframes: MAX_GENERATED_KEYFRAMES,
            sheet_columns: 0,
        }
    }
}

impl EditorConfig {
    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: EditorConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Like `load`, but a broken file is logged and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Clamp every field into a usable range.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.key_match_fraction.is_finite() && self.key_match_fraction >= 0.0) {
            self.key_match_fraction = defaults.key_match_fraction;
        }
        self.key_match_fraction = self.key_match_fraction.min(0.5);
        if !(self.preview_match_tolerance.is_finite() && self.preview_match_tolerance >= 0.0) {
            self.preview_match_tolerance = defaults.preview_match_tolerance;
        }
        if !(self.seek_epsilon.is_finite() && self.seek_epsilon > 0.0) {
            self.seek_epsilon = defaults.seek_epsilon;
        }
        if !(self.playing_resync_threshold.is_finite() && self.playing_resync_threshold > 0.0) {
            self.playing_resync_threshold = defaults.playing_resync_threshold;
        }
        self.default_fps = clamp_fps(self.default_fps);
        if self.max_generated_keyframes == 0 {
            self.max_generated_keyframes = defaults.max_generated_keyframes;
        }
        self
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_editor_heuristics() {
        let config = EditorConfig::default();
        assert_eq!(config.key_match_fraction, 0.02);
        assert_eq!(config.preview_match_tolerance, 0.05);
        assert_eq!(config.autosave_delay(), Duration::from_millis(500));
        assert_eq!(config.default_fps, 10.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EditorConfig =
            serde_json::from_str(r#"{ "key_match_fraction": 0.05 }"#).unwrap();
        assert_eq!(config.key_match_fraction, 0.05);
        assert_eq!(config.autosave_debounce_ms, 500);
    }

    #[test]
    fn test_sanitize_clamps_bad_values() {
        let config = EditorConfig {
            key_match_fraction: -1.0,
            preview_match_tolerance: f64::NAN,
            default_fps: 500.0,
            max_generated_keyframes: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.key_match_fraction, 0.02);
        assert_eq!(config.preview_match_tolerance, 0.05);
        assert_eq!(config.default_fps, 60.0);
        assert_eq!(config.max_generated_keyframes, MAX_GENERATED_KEYFRAMES);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("keysheet_missing_{}.json", uuid::Uuid::new_v4()));
        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("keysheet_cfg_{}.json", uuid::Uuid::new_v4()));
        let config = EditorConfig {
            sheet_columns: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);
        let _ = fs::remove_file(&path);
    }
}
