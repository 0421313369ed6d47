//! Playback surface - what the user actually sees.
//!
//! `DecodedSurface` runs a `FrameSource` on its own thread. The UI thread
//! advances media time from the shared clock while playing and asks for the
//! frame under the playhead; the worker always serves the newest request and
//! drops stale ones, so scrubbing never queues up work.
//!
//! The surface does not decide anything. `PlaybackClock::reconcile()` tells
//! it when to seek or toggle play.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use image::RgbaImage;
use log::{debug, trace, warn};
use std::thread;
use std::time::Duration;

use super::{FrameSource, MediaError, MediaInfo};
use crate::core::clock::{SurfaceCommand, SurfaceState};
use crate::core::scheduler::SharedClock;

pub trait PlaybackSurface {
    fn state(&self) -> SurfaceState;

    fn apply(&mut self, cmd: SurfaceCommand);

    /// Advance time and collect decoded frames. Call once per UI frame.
    fn update(&mut self);

    /// Newest frame since the last call.
    fn take_frame(&mut self) -> Option<DecodedFrame>;

    /// Playback ran into the end of the media.
    fn has_ended(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct DecodedFrame {
    /// Requested time
    pub secs: f64,
    pub image: RgbaImage,
}

pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>, MediaError> + Send>;

enum Request {
    Frame { secs: f64, width: u32, height: u32 },
    Shutdown,
}

enum Reply {
    Frame(DecodedFrame),
    Failed(String),
}

pub struct DecodedSurface {
    info: MediaInfo,
    clock: SharedClock,
    time: f64,
    paused: bool,
    ended: bool,
    /// (clock time, media time) when playback last started
    anchor: Option<(Duration, f64)>,
    frame_size: (u32, u32),
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    in_flight: bool,
    /// Frame index last requested
    requested: Option<u64>,
    latest: Option<DecodedFrame>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DecodedSurface {
    /// Start the decode worker. `factory` runs on the worker thread.
    pub fn spawn(
        info: MediaInfo,
        factory: SourceFactory,
        clock: SharedClock,
        frame_size: (u32, u32),
    ) -> Self {
        let (req_tx, req_rx) = unbounded::<Request>();
        let (reply_tx, reply_rx) = unbounded::<Reply>();

        let handle = thread::Builder::new()
            .name("keysheet-surface".into())
            .spawn(move || surface_worker(factory, req_rx, reply_tx));
        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("Failed to start surface worker: {}", e);
                None
            }
        };

        Self {
            info,
            clock,
            time: 0.0,
            paused: true,
            ended: false,
            anchor: None,
            frame_size: (frame_size.0.max(1), frame_size.1.max(1)),
            requests: req_tx,
            replies: reply_rx,
            in_flight: false,
            requested: None,
            latest: None,
            handle,
        }
    }

    pub fn info(&self) -> MediaInfo {
        self.info
    }

    /// Display size changed; the next frame is decoded at the new size.
    pub fn set_frame_size(&mut self, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size != self.frame_size {
            self.frame_size = size;
            self.requested = None;
        }
    }

    fn frame_index(&self, secs: f64) -> u64 {
        (secs / self.info.frame_duration()).floor().max(0.0) as u64
    }

    fn handle_reply(&mut self, reply: Reply) {
        self.in_flight = false;
        match reply {
            Reply::Frame(frame) => self.latest = Some(frame),
            Reply::Failed(msg) => warn!("Surface decode failed: {}", msg),
        }
    }

    fn request_current(&mut self) {
        let index = self.frame_index(self.time);
        if self.in_flight || self.requested == Some(index) {
            return;
        }
        let request = Request::Frame {
            secs: self.time,
            width: self.frame_size.0,
            height: self.frame_size.1,
        };
        if self.requests.send(request).is_ok() {
            self.in_flight = true;
            self.requested = Some(index);
            trace!("Surface requested frame {} ({:.3}s)", index, self.time);
        }
    }

    /// Block until the in-flight frame arrives.
    pub fn wait_frame(&mut self, timeout: Duration) -> Option<DecodedFrame> {
        if self.latest.is_none() && self.in_flight {
            match self.replies.recv_timeout(timeout) {
                Ok(reply) => self.handle_reply(reply),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.in_flight = false;
                    return None;
                }
            }
        }
        self.latest.take()
    }
}

impl PlaybackSurface for DecodedSurface {
    fn state(&self) -> SurfaceState {
        SurfaceState {
            time: self.time,
            paused: self.paused,
        }
    }

    fn apply(&mut self, cmd: SurfaceCommand) {
        let now = self.clock.now();
        if let Some(secs) = cmd.seek {
            self.time = secs.clamp(0.0, self.info.duration.max(0.0));
            self.ended = false;
            if !self.paused {
                self.anchor = Some((now, self.time));
            }
            trace!("Surface seek {:.3}s", self.time);
        }
        match cmd.play {
            Some(true) => {
                self.paused = false;
                self.ended = false;
                self.anchor = Some((now, self.time));
                debug!("Surface playing from {:.3}s", self.time);
            }
            Some(false) => {
                self.paused = true;
                self.anchor = None;
            }
            None => {}
        }
    }

    fn update(&mut self) {
        while let Ok(reply) = self.replies.try_recv() {
            self.handle_reply(reply);
        }

        if !self.paused
            && let Some((started_at, start_time)) = self.anchor
        {
            let elapsed = self.clock.now().saturating_sub(started_at).as_secs_f64();
            let t = start_time + elapsed;
            if t >= self.info.duration {
                self.time = self.info.duration.max(0.0);
                self.paused = true;
                self.ended = true;
                self.anchor = None;
                debug!("Surface reached end");
            } else {
                self.time = t;
            }
        }

        self.request_current();
    }

    fn take_frame(&mut self) -> Option<DecodedFrame> {
        self.latest.take()
    }

    fn has_ended(&self) -> bool {
        self.ended
    }
}

impl Drop for DecodedSurface {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Surface worker panicked");
        }
    }
}

fn surface_worker(factory: SourceFactory, requests: Receiver<Request>, replies: Sender<Reply>) {
    let mut source = match factory() {
        Ok(source) => source,
        Err(e) => {
            let _ = replies.send(Reply::Failed(e.to_string()));
            return;
        }
    };
    trace!("Surface worker started");

    while let Ok(first) = requests.recv() {
        // Newest request wins
        let mut request = first;
        let mut shutdown = matches!(request, Request::Shutdown);
        while let Ok(next) = requests.try_recv() {
            shutdown |= matches!(next, Request::Shutdown);
            request = next;
        }
        if shutdown {
            break;
        }
        if let Request::Frame { secs, width, height } = request {
            let reply = match source.frame_at(secs, width, height) {
                Ok(image) => Reply::Frame(DecodedFrame { secs, image }),
                Err(e) => Reply::Failed(e.to_string()),
            };
            if replies.send(reply).is_err() {
                break;
            }
        }
    }
    trace!("Surface worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::ManualClock;
    use image::Rgba;

    const WAIT: Duration = Duration::from_secs(5);

    /// Solid frames whose red channel encodes the frame index.
    struct FakeSource {
        info: MediaInfo,
    }

    impl FrameSource for FakeSource {
        fn info(&self) -> MediaInfo {
            self.info
        }

        fn frame_at(&mut self, secs: f64, width: u32, height: u32) -> Result<RgbaImage, MediaError> {
            let index = (secs * self.info.fps).floor() as u8;
            Ok(RgbaImage::from_pixel(width, height, Rgba([index, 0, 0, 255])))
        }
    }

    fn info() -> MediaInfo {
        MediaInfo {
            duration: 2.0,
            width: 8,
            height: 8,
            fps: 10.0,
        }
    }

    fn surface(clock: &ManualClock) -> DecodedSurface {
        let info = info();
        let factory: SourceFactory = Box::new(move || Ok(Box::new(FakeSource { info }) as Box<dyn FrameSource>));
        DecodedSurface::spawn(info, factory, clock.shared(), (4, 4))
    }

    #[test]
    fn test_seek_decodes_requested_frame() {
        let clock = ManualClock::new();
        let mut surface = surface(&clock);

        surface.apply(SurfaceCommand {
            seek: Some(0.55),
            play: None,
        });
        surface.update();
        let frame = surface.wait_frame(WAIT).unwrap();
        assert_eq!(frame.secs, 0.55);
        assert_eq!(frame.image.dimensions(), (4, 4));
        assert_eq!(frame.image.get_pixel(0, 0)[0], 5);
    }

    #[test]
    fn test_play_advances_with_clock_and_ends() {
        let clock = ManualClock::new();
        let mut surface = surface(&clock);
        surface.apply(SurfaceCommand {
            seek: None,
            play: Some(true),
        });
        assert!(!surface.state().paused);

        clock.advance_ms(500);
        surface.update();
        assert!((surface.state().time - 0.5).abs() < 1e-9);

        clock.advance_ms(2000);
        surface.update();
        assert!(surface.has_ended());
        assert_eq!(surface.state(), SurfaceState { time: 2.0, paused: true });
    }

    #[test]
    fn test_pause_stops_time() {
        let clock = ManualClock::new();
        let mut surface = surface(&clock);
        surface.apply(SurfaceCommand {
            seek: Some(1.0),
            play: Some(true),
        });
        clock.advance_ms(200);
        surface.update();
        surface.apply(SurfaceCommand {
            seek: None,
            play: Some(false),
        });
        clock.advance_ms(500);
        surface.update();
        assert!((surface.state().time - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_failed_source_reports_and_keeps_running() {
        let clock = ManualClock::new();
        let factory: SourceFactory = Box::new(|| Err(MediaError::NoVideoStream));
        let mut surface = DecodedSurface::spawn(info(), factory, clock.shared(), (4, 4));
        surface.update();
        assert!(surface.wait_frame(WAIT).is_none());
        // Further updates don't panic even though the worker is gone
        surface.update();
        surface.apply(SurfaceCommand {
            seek: Some(1.0),
            play: None,
        });
        surface.update();
    }
}
