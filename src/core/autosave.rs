//! Debounced autosave observer.
//!
//! The session feeds `observe()` a fingerprint of everything that gets
//! persisted every frame. A changed fingerprint (re)starts a quiet-period
//! timer; `poll()` reports true once the period elapses with no further
//! change. Actual writing is the caller's job.

use std::time::Duration;

use super::scheduler::{ScheduledTask, SharedClock};
use crate::entities::export_settings::{ExportFormat, ExportSettings};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(500);

/// Persisted-state summary. Equal fingerprints mean nothing to save.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaveFingerprint {
    pub keys_revision: u64,
    pub fps: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: ExportFormat,
}

impl SaveFingerprint {
    pub fn new(keys_revision: u64, settings: &ExportSettings) -> Self {
        Self {
            keys_revision,
            fps: settings.fps,
            width: settings.width,
            height: settings.height,
            format: settings.format,
        }
    }
}

#[derive(Debug)]
pub struct Autosave {
    delay: Duration,
    last_seen: Option<SaveFingerprint>,
    timer: ScheduledTask<()>,
}

impl Autosave {
    pub fn new(clock: SharedClock, delay: Duration) -> Self {
        Self {
            delay,
            last_seen: None,
            timer: ScheduledTask::new("autosave", clock),
        }
    }

    /// Record the current fingerprint without scheduling a save (state just
    /// loaded from or written to the store).
    pub fn mark_clean(&mut self, fingerprint: SaveFingerprint) {
        self.last_seen = Some(fingerprint);
        self.timer.cancel();
    }

    /// Compare against the last seen state. Returns true when a save was
    /// (re)scheduled.
    pub fn observe(&mut self, fingerprint: SaveFingerprint) -> bool {
        if self.last_seen == Some(fingerprint) {
            return false;
        }
        self.last_seen = Some(fingerprint);
        self.timer.schedule((), self.delay);
        true
    }

    /// True once the quiet period has passed. Fires once per burst.
    pub fn poll(&mut self) -> bool {
        self.timer.poll().is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.timer.is_pending()
    }

    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }
}
