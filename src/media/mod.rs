//! Media access - probing, frame decoding and the playback surface.
//!
//! Decoding is ffmpeg-backed (`decode`, behind the `ffmpeg` feature). The rest
//! of the crate only sees the traits below, so the editor core, export
//! pipeline and surface logic can be tested with synthetic frames.

#[cfg(feature = "ffmpeg")]
pub mod decode;
pub mod surface;

pub use surface::{DecodedFrame, DecodedSurface, PlaybackSurface};

use image::RgbaImage;
use std::fmt;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Stream facts the editor needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaInfo {
    /// Seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Average frame rate, 0 when unknown
    pub fps: f64,
}

impl MediaInfo {
    /// Frame duration, falling back to 30 fps.
    pub fn frame_duration(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            1.0 / self.fps
        } else {
            1.0 / 30.0
        }
    }
}

/// Sequential frame access on one open video. Not shared between threads;
/// each worker opens its own.
pub trait FrameSource {
    fn info(&self) -> MediaInfo;

    /// Frame shown at `secs`, scaled to `width x height`.
    fn frame_at(&mut self, secs: f64, width: u32, height: u32) -> Result<RgbaImage, MediaError>;
}

/// Batch frame extraction for export.
pub trait FrameGrabber: Send + Sync {
    /// Idempotent library init.
    fn ensure_ready(&self) -> Result<(), MediaError> {
        Ok(())
    }

    /// Frames at ascending `timestamps`, in the same order. `on_frame` is
    /// called once per extracted frame.
    fn grab(
        &self,
        path: &Path,
        timestamps: &[f64],
        size: (u32, u32),
        cancel: &AtomicBool,
        on_frame: &(dyn Fn() + Sync),
    ) -> Result<Vec<RgbaImage>, MediaError>;
}

/// Probe duration and dimensions.
#[cfg(feature = "ffmpeg")]
pub fn probe(path: &Path) -> Result<MediaInfo, MediaError> {
    decode::probe(path)
}

#[cfg(not(feature = "ffmpeg"))]
pub fn probe(path: &Path) -> Result<MediaInfo, MediaError> {
    Err(MediaError::Unsupported(format!(
        "{}: built without ffmpeg support",
        path.display()
    )))
}

/// Stand-in grabber for builds without a decoder. Every call fails with
/// `Unsupported`, so exports report a clean error instead of panicking.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGrabber;

impl FrameGrabber for UnavailableGrabber {
    fn ensure_ready(&self) -> Result<(), MediaError> {
        Err(MediaError::Unsupported("built without ffmpeg support".into()))
    }

    fn grab(
        &self,
        _path: &Path,
        _timestamps: &[f64],
        _size: (u32, u32),
        _cancel: &AtomicBool,
        _on_frame: &(dyn Fn() + Sync),
    ) -> Result<Vec<RgbaImage>, MediaError> {
        self.ensure_ready().map(|_| Vec::new())
    }
}

/// Media errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    Open(String),
    NoVideoStream,
    Decode(String),
    Cancelled,
    Unsupported(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Open(msg) => write!(f, "Failed to open video: {}", msg),
            MediaError::NoVideoStream => write!(f, "No video stream found"),
            MediaError::Decode(msg) => write!(f, "Decode error: {}", msg),
            MediaError::Cancelled => write!(f, "Cancelled"),
            MediaError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}
