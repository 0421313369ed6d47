//! Export - turn keyframes into one animated GIF or a PNG sprite sheet.
//!
//! The editor never talks to a decoder directly. It builds an `ExportRequest`
//! and hands it to `ExportJob`, which runs a `SpriteEncoder` on a worker
//! thread and reports progress over a channel.
//!
//! `SheetEncoder` is the concrete encoder: frames come from a `FrameGrabber`
//! (ffmpeg in the app, a fake in tests) and are composed by `sheet`.

pub mod job;
pub mod sheet;

pub use job::ExportJob;
pub use sheet::SheetEncoder;

use crossbeam_channel::Sender;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use crate::entities::{ExportFormat, ExportSettings};

/// Most pixels one export may hold in memory (1 GiB of RGBA).
pub const MAX_OUTPUT_PIXELS: u64 = 256 * 1024 * 1024;

/// Everything the encoder needs; a snapshot so the editor can keep going.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
    pub name: String,
    pub source: PathBuf,
    pub source_width: u32,
    pub source_height: u32,
    /// Seconds, ascending
    pub timestamps: Vec<f64>,
    pub settings: ExportSettings,
    /// Sprite sheet columns, 0 = square-ish grid
    pub sheet_columns: u32,
}

impl ExportRequest {
    pub fn output_size(&self) -> (u32, u32) {
        self.settings
            .resolve_dimensions(self.source_width, self.source_height)
    }

    /// Pixels the encoder must hold: every frame for a GIF, the whole grid
    /// (empty cells included) for a sprite sheet.
    pub fn output_pixels(&self) -> u64 {
        let (width, height) = self.output_size();
        let frame = u64::from(width) * u64::from(height);
        match self.settings.format {
            ExportFormat::AnimatedGif => frame * self.timestamps.len() as u64,
            ExportFormat::SpriteSheet => {
                let (cols, rows) = sheet::grid_shape(self.timestamps.len(), self.sheet_columns);
                frame * u64::from(cols) * u64::from(rows)
            }
        }
    }

    /// Refuse requests whose output would not fit `MAX_OUTPUT_PIXELS`.
    pub fn check_size(&self) -> Result<(), ExportError> {
        let pixels = self.output_pixels();
        if pixels > MAX_OUTPUT_PIXELS {
            let (width, height) = self.output_size();
            return Err(ExportError::TooLarge(format!(
                "{} frames at {}x{} need {} megapixels, limit is {}",
                self.timestamps.len(),
                width,
                height,
                pixels / 1_000_000,
                MAX_OUTPUT_PIXELS / 1_000_000
            )));
        }
        Ok(())
    }
}

/// Encoded artifact, ready to be written wherever the user picks.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    /// Size of one frame
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_count: usize,
}

impl EncodedImage {
    /// `<stem>.gif` / `<stem>.png`
    pub fn suggested_file_name(&self, stem: &str) -> String {
        let stem = Path::new(stem)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("export");
        format!("{}.{}", stem, self.format.extension())
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        fs::write(path, &self.bytes)
            .map_err(|e| ExportError::Io(format!("{}: {}", path.display(), e)))
    }
}

/// Progress updates during export
#[derive(Clone, Debug, PartialEq)]
pub struct ExportProgress {
    pub current: usize,
    pub total: usize,
    pub stage: ExportStage,
}

impl ExportProgress {
    pub fn new(current: usize, total: usize, stage: ExportStage) -> Self {
        Self {
            current,
            total,
            stage,
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Export stages
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,  // Encoder init
    Extracting, // Decoding frames
    Encoding,   // Building the artifact
    Complete,
    Error(String),
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStage::Preparing => write!(f, "Preparing encoder..."),
            ExportStage::Extracting => write!(f, "Extracting frames..."),
            ExportStage::Encoding => write!(f, "Encoding..."),
            ExportStage::Complete => write!(f, "Complete"),
            ExportStage::Error(msg) => write!(f, "{}", msg),
        }
    }
}

/// Frame-to-artifact encoder. `ensure_ready` must be idempotent and cheap
/// after the first call.
pub trait SpriteEncoder: Send + Sync {
    fn ensure_ready(&self) -> Result<(), ExportError>;

    /// Encode frames at `request.timestamps`, in that order.
    fn export(
        &self,
        request: &ExportRequest,
        progress: &Sender<ExportProgress>,
        cancel: &AtomicBool,
    ) -> Result<EncodedImage, ExportError>;
}

/// Export errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    NoKeyframes,
    Busy,
    Cancelled,
    Unavailable(String),
    TooLarge(String),
    Decode(String),
    Encode(String),
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NoKeyframes => write!(f, "Nothing to export: no keyframes"),
            ExportError::Busy => write!(f, "An export is already running"),
            ExportError::Cancelled => write!(f, "Export cancelled by user"),
            ExportError::Unavailable(msg) => write!(f, "Encoder unavailable: {}", msg),
            ExportError::TooLarge(msg) => write!(f, "Export too large: {}", msg),
            ExportError::Decode(msg) => write!(f, "Frame extraction failed: {}", msg),
            ExportError::Encode(msg) => write!(f, "Encoding failed: {}", msg),
            ExportError::Io(msg) => write!(f, "Write failed: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_file_name() {
        let image = EncodedImage {
            bytes: vec![],
            format: ExportFormat::SpriteSheet,
            frame_width: 1,
            frame_height: 1,
            frame_count: 1,
        };
        assert_eq!(image.suggested_file_name("holiday.mp4"), "holiday.png");
        assert_eq!(image.suggested_file_name(""), "export.png");
    }

    fn sized(frames: usize, width: u32, format: ExportFormat) -> ExportRequest {
        ExportRequest {
            name: "clip".into(),
            source: PathBuf::from("clip.mp4"),
            source_width: 8192,
            source_height: 8192,
            timestamps: (0..frames).map(|i| i as f64 * 0.1).collect(),
            settings: ExportSettings {
                width: Some(width),
                format,
                ..Default::default()
            },
            sheet_columns: 0,
        }
    }

    #[test]
    fn test_output_pixels_counts_whole_grid() {
        // 5 frames -> 3x2 grid, one empty cell still allocated
        assert_eq!(sized(5, 10, ExportFormat::SpriteSheet).output_pixels(), 600);
        assert_eq!(sized(5, 10, ExportFormat::AnimatedGif).output_pixels(), 500);
    }

    #[test]
    fn test_check_size_refuses_huge_exports() {
        assert_eq!(sized(100, 512, ExportFormat::SpriteSheet).check_size(), Ok(()));

        let huge = sized(10_000, 8192, ExportFormat::SpriteSheet);
        assert!(matches!(huge.check_size(), Err(ExportError::TooLarge(_))));
        let huge = sized(10_000, 8192, ExportFormat::AnimatedGif);
        assert!(matches!(huge.check_size(), Err(ExportError::TooLarge(_))));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(ExportProgress::new(1, 4, ExportStage::Extracting).fraction(), 0.25);
        assert_eq!(ExportProgress::new(0, 0, ExportStage::Preparing).fraction(), 0.0);
    }
}
