//! Scheduled tasks driven by an injectable clock.
//!
//! Nothing here owns a thread or a timer. The UI loop calls `poll()` every
//! frame (same as the player update loop) and a task fires on the first poll
//! at or after its deadline. Tests swap in `ManualClock` and advance it by
//! hand, so debounce and preview timing are checked without sleeping.
//!
//! # Usage
//! ```ignore
//! // On change:
//! save_task.schedule((), Duration::from_millis(500));
//!
//! // In update loop:
//! if save_task.poll().is_some() {
//!     store.update(&project)?;
//! }
//! ```

use log::trace;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source. `now()` is measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Virtual clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// One pending payload with a deadline. Re-scheduling replaces the payload and
/// restarts the countdown (debounce behavior).
pub struct ScheduledTask<T> {
    label: &'static str,
    clock: SharedClock,
    pending: Option<(T, Duration)>,
}

impl<T> ScheduledTask<T> {
    pub fn new(label: &'static str, clock: SharedClock) -> Self {
        Self {
            label,
            clock,
            pending: None,
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Schedule `payload` to fire after `delay`. Any pending payload is dropped.
    pub fn schedule(&mut self, payload: T, delay: Duration) {
        let deadline = self.clock.now() + delay;
        self.pending = Some((payload, deadline));
        trace!("{}: scheduled in {}ms", self.label, delay.as_millis());
    }

    /// Drop the pending payload. Returns true if something was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.pending.take().is_some();
        if was_pending {
            trace!("{}: cancelled", self.label);
        }
        was_pending
    }

    /// Take the payload if its deadline has passed.
    pub fn poll(&mut self) -> Option<T> {
        let (_, deadline) = self.pending.as_ref()?;
        if self.clock.now() < *deadline {
            return None;
        }
        let (payload, _) = self.pending.take()?;
        trace!("{}: fired", self.label);
        Some(payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Time left until the deadline (zero when overdue).
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline()?;
        Some(deadline.saturating_sub(self.clock.now()))
    }

    pub fn pending_payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|(payload, _)| payload)
    }
}

impl<T: fmt::Debug> fmt::Debug for ScheduledTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("label", &self.label)
            .field("pending", &self.pending)
            .finish()
    }
}
