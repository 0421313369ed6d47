//! Frame composition: animated GIF and PNG sprite sheet.
//!
//! `SheetEncoder` pulls frames from a `FrameGrabber` and builds the artifact.
//! Extraction is split into contiguous chunks handed to rayon; each chunk
//! walks forward through the clip with its own decoder, and chunks are
//! concatenated in order so output order always matches timestamp order.

use crossbeam_channel::Sender;
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use log::{debug, info};
use rayon::prelude::*;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{EncodedImage, ExportError, ExportProgress, ExportRequest, ExportStage, SpriteEncoder};
use crate::entities::ExportFormat;
use crate::media::{FrameGrabber, MediaError};

/// Fewest frames worth giving their own decoder.
const MIN_CHUNK: usize = 8;

pub struct SheetEncoder {
    grabber: Arc<dyn FrameGrabber>,
}

impl SheetEncoder {
    pub fn new(grabber: Arc<dyn FrameGrabber>) -> Self {
        Self { grabber }
    }

    fn extract(
        &self,
        request: &ExportRequest,
        size: (u32, u32),
        progress: &Sender<ExportProgress>,
        cancel: &AtomicBool,
    ) -> Result<Vec<RgbaImage>, ExportError> {
        let total = request.timestamps.len();
        let done = AtomicUsize::new(0);
        let on_frame = || {
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = progress.send(ExportProgress::new(current, total, ExportStage::Extracting));
        };

        let workers = rayon::current_num_threads().max(1);
        let chunk = total.div_ceil(workers).max(MIN_CHUNK);
        debug!("Extracting {} frames in chunks of {}", total, chunk);

        let chunks: Vec<Vec<RgbaImage>> = request
            .timestamps
            .par_chunks(chunk)
            .map(|secs| {
                self.grabber
                    .grab(&request.source, secs, size, cancel, &on_frame)
            })
            .collect::<Result<_, MediaError>>()
            .map_err(|e| match e {
                MediaError::Cancelled => ExportError::Cancelled,
                other => ExportError::Decode(other.to_string()),
            })?;

        let frames: Vec<RgbaImage> = chunks.into_iter().flatten().collect();
        if frames.len() != total {
            return Err(ExportError::Decode(format!(
                "expected {} frames, got {}",
                total,
                frames.len()
            )));
        }
        // Grabbers may ignore the size hint
        Ok(frames
            .into_iter()
            .map(|f| fit_frame(f, size.0, size.1))
            .collect())
    }
}

impl SpriteEncoder for SheetEncoder {
    fn ensure_ready(&self) -> Result<(), ExportError> {
        self.grabber
            .ensure_ready()
            .map_err(|e| ExportError::Unavailable(e.to_string()))
    }

    fn export(
        &self,
        request: &ExportRequest,
        progress: &Sender<ExportProgress>,
        cancel: &AtomicBool,
    ) -> Result<EncodedImage, ExportError> {
        if request.timestamps.is_empty() {
            return Err(ExportError::NoKeyframes);
        }
        request.check_size()?;
        let total = request.timestamps.len();
        let (width, height) = request.output_size();
        info!(
            "Exporting {} frames at {}x{} as {:?}",
            total, width, height, request.settings.format
        );

        let frames = self.extract(request, (width, height), progress, cancel)?;
        if cancel.load(Ordering::Relaxed) {
            return Err(ExportError::Cancelled);
        }

        let _ = progress.send(ExportProgress::new(total, total, ExportStage::Encoding));
        let bytes = match request.settings.format {
            ExportFormat::AnimatedGif => encode_gif(&frames, request.settings.frame_delay_ms())?,
            ExportFormat::SpriteSheet => {
                let sheet = compose_sheet(&frames, request.sheet_columns);
                encode_png(&sheet)?
            }
        };

        info!("Export finished: {} bytes", bytes.len());
        Ok(EncodedImage {
            bytes,
            format: request.settings.format,
            frame_width: width,
            frame_height: height,
            frame_count: total,
        })
    }
}

/// Resize to exactly `width x height` if needed.
pub fn fit_frame(frame: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if frame.dimensions() == (width, height) {
        frame
    } else {
        imageops::resize(&frame, width, height, FilterType::Triangle)
    }
}

/// Grid shape for `count` frames. `columns == 0` picks a square-ish grid.
pub fn grid_shape(count: usize, columns: u32) -> (u32, u32) {
    if count == 0 {
        return (0, 0);
    }
    let cols = if columns == 0 {
        (count as f64).sqrt().ceil() as u32
    } else {
        columns.min(count as u32)
    };
    let rows = (count as u32).div_ceil(cols);
    (cols, rows)
}

/// Lay frames out left-to-right, top-to-bottom. Frames share the first
/// frame's size; empty cells stay transparent.
pub fn compose_sheet(frames: &[RgbaImage], columns: u32) -> RgbaImage {
    let Some(first) = frames.first() else {
        return RgbaImage::new(0, 0);
    };
    let (fw, fh) = first.dimensions();
    let (cols, rows) = grid_shape(frames.len(), columns);
    let mut sheet = RgbaImage::new(fw * cols, fh * rows);
    for (i, frame) in frames.iter().enumerate() {
        let col = i as u32 % cols;
        let row = i as u32 / cols;
        imageops::replace(&mut sheet, frame, (col * fw) as i64, (row * fh) as i64);
    }
    sheet
}

/// Looping GIF, one frame per image.
pub fn encode_gif(frames: &[RgbaImage], delay_ms: u32) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        let delay = Delay::from_numer_denom_ms(delay_ms, 1);
        encoder
            .encode_frames(
                frames
                    .iter()
                    .map(|f| Frame::from_parts(f.clone(), 0, 0, delay)),
            )
            .map_err(|e| ExportError::Encode(e.to_string()))?;
    }
    Ok(bytes)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}
