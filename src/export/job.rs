//! Single-flight export worker.
//!
//! One export at a time runs on its own thread. The UI polls `poll()` each
//! frame: progress is drained from the channel and, once the thread is done,
//! the result is handed back exactly once.

use crossbeam_channel::{Receiver, unbounded};
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::{EncodedImage, ExportError, ExportProgress, ExportRequest, ExportStage, SpriteEncoder};

type JobResult = Result<EncodedImage, ExportError>;

struct Running {
    handle: thread::JoinHandle<JobResult>,
    progress_rx: Receiver<ExportProgress>,
}

pub struct ExportJob {
    encoder: Arc<dyn SpriteEncoder>,
    running: Option<Running>,
    cancel_flag: Arc<AtomicBool>,
    progress: Option<ExportProgress>,
}

impl ExportJob {
    pub fn new(encoder: Arc<dyn SpriteEncoder>) -> Self {
        Self {
            encoder,
            running: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Last progress update of the current (or last) export.
    pub fn progress(&self) -> Option<&ExportProgress> {
        self.progress.as_ref()
    }

    /// Start exporting. Refused while another export runs, when there is
    /// nothing to export or when the output would be too large.
    pub fn start(&mut self, request: ExportRequest) -> Result<(), ExportError> {
        if self.running.is_some() {
            return Err(ExportError::Busy);
        }
        if request.timestamps.is_empty() {
            return Err(ExportError::NoKeyframes);
        }
        request.check_size()?;

        // Fresh flag per run so a late cancel can't hit the next export
        self.cancel_flag = Arc::new(AtomicBool::new(false));
        self.progress = Some(ExportProgress::new(0, request.timestamps.len(), ExportStage::Preparing));

        let (tx, rx) = unbounded();
        let encoder = Arc::clone(&self.encoder);
        let cancel = Arc::clone(&self.cancel_flag);

        info!(
            "Starting export of '{}' ({} frames)",
            request.name,
            request.timestamps.len()
        );
        let handle = thread::Builder::new()
            .name("keysheet-export".into())
            .spawn(move || {
                let total = request.timestamps.len();
                let _ = tx.send(ExportProgress::new(0, total, ExportStage::Preparing));
                let result = encoder
                    .ensure_ready()
                    .and_then(|_| encoder.export(&request, &tx, &cancel));
                let stage = match &result {
                    Ok(_) => ExportStage::Complete,
                    Err(e) => ExportStage::Error(e.to_string()),
                };
                let _ = tx.send(ExportProgress::new(total, total, stage));
                result
            })
            .map_err(|e| ExportError::Unavailable(format!("export thread: {}", e)))?;

        self.running = Some(Running {
            handle,
            progress_rx: rx,
        });
        Ok(())
    }

    /// Request cancellation. The worker stops at the next frame boundary.
    pub fn cancel(&self) {
        if self.running.is_some() {
            info!("Export cancel requested");
            self.cancel_flag.store(true, Ordering::Relaxed);
        }
    }

    /// Drain progress. Returns the result once, when the worker has finished.
    pub fn poll(&mut self) -> Option<JobResult> {
        let running = self.running.as_ref()?;
        while let Ok(progress) = running.progress_rx.try_recv() {
            self.progress = Some(progress);
        }
        if !running.handle.is_finished() {
            return None;
        }
        self.finish()
    }

    /// Block until the running export finishes.
    pub fn wait(&mut self) -> Option<JobResult> {
        self.running.as_ref()?;
        self.finish()
    }

    fn finish(&mut self) -> Option<JobResult> {
        let running = self.running.take()?;
        let result = match running.handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!("Export thread panicked");
                Err(ExportError::Encode("export thread panicked".into()))
            }
        };
        while let Ok(progress) = running.progress_rx.try_recv() {
            self.progress = Some(progress);
        }
        match &result {
            Ok(image) => info!("Export complete: {} frames, {} bytes", image.frame_count, image.bytes.len()),
            Err(ExportError::Cancelled) => info!("Export cancelled"),
            Err(e) => warn!("Export failed: {}", e),
        }
        Some(result)
    }
}

impl Drop for ExportJob {
    fn drop(&mut self) {
        // Detach: the worker notices the flag and exits on its own
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ExportFormat;
    use crate::export::sheet::SheetEncoder;
    use crate::export::sheet::tests::{FakeGrabber, request};
    use crossbeam_channel::Sender;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Blocks until released, counts `ensure_ready` calls.
    struct GateEncoder {
        ready_calls: AtomicUsize,
        gate: Receiver<()>,
    }

    impl SpriteEncoder for GateEncoder {
        fn ensure_ready(&self) -> Result<(), ExportError> {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn export(
            &self,
            request: &ExportRequest,
            _progress: &Sender<ExportProgress>,
            cancel: &AtomicBool,
        ) -> Result<EncodedImage, ExportError> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            if cancel.load(Ordering::Relaxed) {
                return Err(ExportError::Cancelled);
            }
            Ok(EncodedImage {
                bytes: vec![1, 2, 3],
                format: request.settings.format,
                frame_width: 1,
                frame_height: 1,
                frame_count: request.timestamps.len(),
            })
        }
    }

    fn gated() -> (ExportJob, Sender<()>, Arc<GateEncoder>) {
        let (tx, rx) = unbounded();
        let encoder = Arc::new(GateEncoder {
            ready_calls: AtomicUsize::new(0),
            gate: rx,
        });
        (ExportJob::new(encoder.clone()), tx, encoder)
    }

    #[test]
    fn test_second_export_is_busy() {
        let (mut job, gate, _) = gated();
        job.start(request(vec![0.0], ExportFormat::AnimatedGif)).unwrap();
        assert!(job.is_running());
        assert_eq!(
            job.start(request(vec![0.0], ExportFormat::AnimatedGif)),
            Err(ExportError::Busy)
        );
        gate.send(()).unwrap();
        let result = job.wait().unwrap().unwrap();
        assert_eq!(result.bytes, vec![1, 2, 3]);
        assert!(!job.is_running());
        assert_eq!(job.progress().map(|p| p.stage.clone()), Some(ExportStage::Complete));
    }

    #[test]
    fn test_empty_request_refused() {
        let (mut job, _gate, encoder) = gated();
        assert_eq!(
            job.start(request(vec![], ExportFormat::AnimatedGif)),
            Err(ExportError::NoKeyframes)
        );
        assert!(!job.is_running());
        assert_eq!(encoder.ready_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oversized_request_refused() {
        let (mut job, _gate, encoder) = gated();
        let mut req = request(vec![0.0; 64], ExportFormat::AnimatedGif);
        req.settings.width = Some(16_384);
        req.settings.height = Some(16_384);
        assert!(matches!(job.start(req), Err(ExportError::TooLarge(_))));
        assert!(!job.is_running());
        assert_eq!(encoder.ready_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_reports_cancelled() {
        let (mut job, gate, _) = gated();
        job.start(request(vec![0.0, 1.0], ExportFormat::AnimatedGif)).unwrap();
        job.cancel();
        gate.send(()).unwrap();
        assert_eq!(job.wait(), Some(Err(ExportError::Cancelled)));
        assert!(matches!(
            job.progress().map(|p| &p.stage),
            Some(ExportStage::Error(_))
        ));
    }

    #[test]
    fn test_ensure_ready_called_each_run() {
        let (mut job, gate, encoder) = gated();
        for _ in 0..2 {
            job.start(request(vec![0.0], ExportFormat::SpriteSheet)).unwrap();
            gate.send(()).unwrap();
            assert!(job.wait().unwrap().is_ok());
        }
        assert_eq!(encoder.ready_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_poll_delivers_result_once() {
        let mut job = ExportJob::new(Arc::new(SheetEncoder::new(Arc::new(FakeGrabber))));
        assert!(job.poll().is_none());
        job.start(request(vec![0.0, 0.5, 1.0], ExportFormat::AnimatedGif)).unwrap();

        let mut result = None;
        for _ in 0..500 {
            if let Some(r) = job.poll() {
                result = Some(r);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let image = result.unwrap().unwrap();
        assert_eq!(image.frame_count, 3);
        assert!(job.poll().is_none());
    }
}
