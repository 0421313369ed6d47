//! Export settings - frame rate, output size and format.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const FPS_MIN: f64 = 1.0;
pub const FPS_MAX: f64 = 60.0;
pub const DEFAULT_FPS: f64 = 10.0;

/// Clamp fps into `[FPS_MIN, FPS_MAX]`. NaN falls back to the default.
pub fn clamp_fps(fps: f64) -> f64 {
    if fps.is_nan() {
        DEFAULT_FPS
    } else {
        fps.clamp(FPS_MIN, FPS_MAX)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One looping GIF, one frame per keyframe
    #[default]
    AnimatedGif,
    /// PNG grid, keyframes left-to-right then top-to-bottom
    SpriteSheet,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::AnimatedGif, ExportFormat::SpriteSheet];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::AnimatedGif => "gif",
            ExportFormat::SpriteSheet => "png",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::AnimatedGif => write!(f, "Animated GIF"),
            ExportFormat::SpriteSheet => write!(f, "Sprite sheet (PNG)"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub fps: f64,
    /// Output width; `None` keeps the source width (or follows the aspect)
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: ExportFormat,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            width: None,
            height: None,
            format: ExportFormat::default(),
        }
    }
}

impl ExportSettings {
    pub fn with_fps(fps: f64) -> Self {
        Self {
            fps: clamp_fps(fps),
            ..Default::default()
        }
    }

    /// fps in range, zero sizes treated as unset.
    pub fn sanitized(self) -> Self {
        Self {
            fps: clamp_fps(self.fps),
            width: self.width.filter(|w| *w > 0),
            height: self.height.filter(|h| *h > 0),
            format: self.format,
        }
    }

    /// Per-frame delay of the animated output.
    pub fn frame_delay_ms(&self) -> u32 {
        (1000.0 / clamp_fps(self.fps)).round() as u32
    }

    /// Output size for a source of `src_w x src_h`.
    ///
    /// Unset sides use the source size; if only one side is set the other
    /// follows the source aspect ratio.
    pub fn resolve_dimensions(&self, src_w: u32, src_h: u32) -> (u32, u32) {
        let settings = self.sanitized();
        let (w, h) = match (settings.width, settings.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, scale_side(w, src_h, src_w)),
            (None, Some(h)) => (scale_side(h, src_w, src_h), h),
            (None, None) => (src_w, src_h),
        };
        (w.max(1), h.max(1))
    }
}

/// `other * num / den`, rounded. A degenerate source gives a square.
fn scale_side(other: u32, num: u32, den: u32) -> u32 {
    if den == 0 || num == 0 {
        return other;
    }
    ((other as f64) * (num as f64) / (den as f64)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_fps() {
        assert_eq!(clamp_fps(0.0), 1.0);
        assert_eq!(clamp_fps(120.0), 60.0);
        assert_eq!(clamp_fps(24.0), 24.0);
        assert_eq!(clamp_fps(f64::NAN), DEFAULT_FPS);
    }

    #[test]
    fn test_resolve_unset_uses_source() {
        let settings = ExportSettings::default();
        assert_eq!(settings.resolve_dimensions(1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_resolve_derives_missing_side() {
        let settings = ExportSettings {
            width: Some(480),
            ..Default::default()
        };
        assert_eq!(settings.resolve_dimensions(1920, 1080), (480, 270));

        let settings = ExportSettings {
            height: Some(540),
            ..Default::default()
        };
        assert_eq!(settings.resolve_dimensions(1920, 1080), (960, 540));
    }

    #[test]
    fn test_resolve_both_set_ignores_aspect() {
        let settings = ExportSettings {
            width: Some(100),
            height: Some(100),
            ..Default::default()
        };
        assert_eq!(settings.resolve_dimensions(1920, 1080), (100, 100));
    }

    #[test]
    fn test_zero_size_is_unset() {
        let settings = ExportSettings {
            width: Some(0),
            height: Some(200),
            fps: 500.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.width, None);
        assert_eq!(settings.fps, 60.0);
    }

    #[test]
    fn test_frame_delay() {
        assert_eq!(ExportSettings::default().frame_delay_ms(), 100);
        assert_eq!(ExportSettings::with_fps(30.0).frame_delay_ms(), 33);
    }

    #[test]
    fn test_serde_format_names() {
        let json = serde_json::to_string(&ExportFormat::SpriteSheet).unwrap();
        assert_eq!(json, "\"sprite_sheet\"");
        let settings: ExportSettings = serde_json::from_str(r#"{"fps": 12}"#).unwrap();
        assert_eq!(settings.fps, 12.0);
        assert_eq!(settings.format, ExportFormat::AnimatedGif);
    }
}
