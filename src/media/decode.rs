//! FFmpeg-backed decoding.
//!
//! `VideoDecoder` keeps the demuxer and decoder open between requests, so
//! walking forward through a clip (playback, ascending export timestamps)
//! decodes sequentially and only seeks on a jump backwards or far ahead.

use image::RgbaImage;
use log::{debug, warn};
use playa_ffmpeg as ffmpeg;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Once, OnceLock};

use super::{FrameGrabber, FrameSource, MediaError, MediaInfo};

static FFMPEG_LOG_INIT: Once = Once::new();
static FFMPEG_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Decode forward instead of seeking when the target is this close ahead.
const FORWARD_DECODE_LIMIT: f64 = 2.0;

fn init_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| {
        unsafe {
            // AV_LOG_QUIET: keep decoder chatter off stderr
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
        }
    });
}

/// One-time library init. Safe to call from any thread, any number of times.
pub fn init() -> Result<(), MediaError> {
    init_ffmpeg_logging();
    FFMPEG_INIT
        .get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(MediaError::Unsupported)
}

pub fn probe(path: &Path) -> Result<MediaInfo, MediaError> {
    let decoder = VideoDecoder::open(path)?;
    let info = decoder.info();
    debug!(
        "Probed {}: {:.3}s {}x{} @ {:.2} fps",
        path.display(),
        info.duration,
        info.width,
        info.height,
        info.fps
    );
    Ok(info)
}

struct CachedFrame {
    pts: f64,
    width: u32,
    height: u32,
    image: RgbaImage,
}

pub struct VideoDecoder {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_idx: usize,
    /// Seconds per stream tick
    time_base: f64,
    info: MediaInfo,
    scaler: Option<(ffmpeg::software::scaling::Context, u32, u32)>,
    /// Pts of the last decoded frame; `None` forces a seek
    position: Option<f64>,
    last: Option<CachedFrame>,
}

impl VideoDecoder {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        init()?;

        let ictx = ffmpeg::format::input(path).map_err(|e| MediaError::Open(e.to_string()))?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(MediaError::NoVideoStream)?;
        let stream_idx = stream.index();

        let tb = stream.time_base();
        let time_base = if tb.denominator() != 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            0.0
        };

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        // Stream duration may be unset in some containers, use the format's
        let duration = if stream.duration() > 0 && time_base > 0.0 {
            stream.duration() as f64 * time_base
        } else if ictx.duration() > 0 {
            ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| MediaError::Open(format!("decoder context: {}", e)))?;

        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0;
        }

        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| MediaError::Open(format!("video decoder: {}", e)))?;

        let info = MediaInfo {
            duration,
            width: decoder.width(),
            height: decoder.height(),
            fps,
        };

        Ok(Self {
            ictx,
            decoder,
            stream_idx,
            time_base,
            info,
            scaler: None,
            position: None,
            last: None,
        })
    }

    fn seek(&mut self, secs: f64) {
        let ts = if self.time_base > 0.0 {
            (secs / self.time_base) as i64
        } else {
            0
        };
        let ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                self.ictx.as_mut_ptr(),
                self.stream_idx as i32,
                ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if ret < 0 {
            warn!("Video seek to {:.3}s failed (ret={}), decoding from current position", secs, ret);
        }
        self.decoder.flush();
        self.position = None;
    }

    fn frame_secs(&self, frame: &ffmpeg::util::frame::video::Video) -> Option<f64> {
        frame
            .timestamp()
            .or_else(|| frame.pts())
            .map(|ts| ts as f64 * self.time_base)
    }

    fn convert(
        &mut self,
        frame: &ffmpeg::util::frame::video::Video,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, MediaError> {
        let rebuild = !matches!(&self.scaler, Some((_, w, h)) if *w == width && *h == height);
        if rebuild {
            let scaler = ffmpeg::software::scaling::Context::get(
                self.decoder.format(),
                self.decoder.width(),
                self.decoder.height(),
                ffmpeg::format::Pixel::RGBA,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| MediaError::Decode(format!("scaler: {}", e)))?;
            self.scaler = Some((scaler, width, height));
        }
        let Some((scaler, _, _)) = self.scaler.as_mut() else {
            return Err(MediaError::Decode("scaler missing".into()));
        };

        let mut rgba = ffmpeg::util::frame::video::Video::empty();
        scaler
            .run(frame, &mut rgba)
            .map_err(|e| MediaError::Decode(format!("scale: {}", e)))?;

        // Rows are padded to the stride
        let data = rgba.data(0);
        let stride = rgba.stride(0) as usize;
        let row_bytes = width as usize * 4;
        let mut pixels = vec![0u8; row_bytes * height as usize];
        for y in 0..height as usize {
            let src = y * stride;
            let dst = y * row_bytes;
            pixels[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
        }
        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| MediaError::Decode("frame buffer size mismatch".into()))
    }

    fn finish(
        &mut self,
        pts: f64,
        frame: &ffmpeg::util::frame::video::Video,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, MediaError> {
        let image = self.convert(frame, width, height)?;
        self.last = Some(CachedFrame {
            pts,
            width,
            height,
            image: image.clone(),
        });
        Ok(image)
    }
}

impl FrameSource for VideoDecoder {
    fn info(&self) -> MediaInfo {
        self.info
    }

    fn frame_at(&mut self, secs: f64, width: u32, height: u32) -> Result<RgbaImage, MediaError> {
        let width = width.max(1);
        let height = height.max(1);
        let target = secs.clamp(0.0, self.info.duration.max(0.0));
        let frame_dur = self.info.frame_duration();

        if let Some(last) = &self.last
            && last.width == width
            && last.height == height
            && last.pts <= target
            && target < last.pts + frame_dur
        {
            return Ok(last.image.clone());
        }

        let needs_seek = match self.position {
            Some(pos) => target < pos || target - pos > FORWARD_DECODE_LIMIT,
            None => true,
        };
        if needs_seek {
            self.seek(target);
        }

        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        let mut prev = ffmpeg::util::frame::video::Video::empty();
        let mut prev_pts: Option<f64> = None;
        let mut eof = false;

        loop {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = self.frame_secs(&decoded).unwrap_or(target);
                self.position = Some(pts);
                // First frame still on screen at the target time
                if pts + frame_dur > target + 1e-4 {
                    return self.finish(pts, &decoded, width, height);
                }
                std::mem::swap(&mut decoded, &mut prev);
                prev_pts = Some(pts);
            }
            if eof {
                break;
            }
            let next = self.ictx.packets().next();
            match next {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_idx {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|e| MediaError::Decode(format!("send packet: {}", e)))?;
                    }
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| MediaError::Decode(format!("send eof: {}", e)))?;
                    eof = true;
                }
            }
        }

        // Drained decoder needs a seek before it can be used again
        self.position = None;
        match prev_pts {
            // Target past the last frame: hold the last one
            Some(pts) => self.finish(pts, &prev, width, height),
            None => Err(MediaError::Decode(format!("no frame at {:.3}s", secs))),
        }
    }
}

/// Export frame extraction. Each call opens its own decoder so rayon workers
/// never share ffmpeg state.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegGrabber;

impl FrameGrabber for FfmpegGrabber {
    fn ensure_ready(&self) -> Result<(), MediaError> {
        init()
    }

    fn grab(
        &self,
        path: &Path,
        timestamps: &[f64],
        size: (u32, u32),
        cancel: &AtomicBool,
        on_frame: &(dyn Fn() + Sync),
    ) -> Result<Vec<RgbaImage>, MediaError> {
        let mut decoder = VideoDecoder::open(path)?;
        let mut frames = Vec::with_capacity(timestamps.len());
        for &secs in timestamps {
            if cancel.load(Ordering::Relaxed) {
                return Err(MediaError::Cancelled);
            }
            frames.push(decoder.frame_at(secs, size.0, size.1)?);
            on_frame();
        }
        Ok(frames)
    }
}

/// Opens a `VideoDecoder` lazily on the surface worker thread.
pub fn decoder_factory(path: PathBuf) -> impl FnOnce() -> Result<Box<dyn FrameSource>, MediaError> + Send + 'static {
    move || VideoDecoder::open(&path).map(|d| Box::new(d) as Box<dyn FrameSource>)
}
