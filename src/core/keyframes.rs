//! Keyframe set model - ordered, duplicate-free timestamps plus selection.
//!
//! Keyframes are stored as whole milliseconds so equality is exact and the
//! set can never hold two values that would print the same. Every mutation
//! re-establishes the invariant before returning:
//!
//! - strictly ascending
//! - no duplicates
//! - every value in `[0, duration]`
//!
//! `revision` is bumped on every effective mutation (no-ops leave it alone),
//! which is what the autosave observer and the preview stepper watch.

use log::{trace, warn};
use std::collections::BTreeSet;
use std::fmt;

/// Upper bound on keyframes produced by one interval generation.
pub const MAX_GENERATED_KEYFRAMES: usize = 10_000;

const MS_PER_SECOND: f64 = 1000.0;

/// Round seconds to millisecond precision (3 decimals).
pub fn round_ms(secs: f64) -> f64 {
    (secs * MS_PER_SECOND).round() / MS_PER_SECOND
}

/// A single marked timestamp, in whole milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyframe(u64);

impl Keyframe {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Round seconds to the nearest millisecond. Negative and non-finite
    /// input maps to zero.
    pub fn from_secs(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self(0);
        }
        Self((secs * MS_PER_SECOND).round() as u64)
    }

    pub fn millis(self) -> u64 {
        self.0
    }

    pub fn secs(self) -> f64 {
        self.0 as f64 / MS_PER_SECOND
    }
}

impl fmt::Display for Keyframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.secs())
    }
}

/// Clamp `secs` into `[0, duration]` and round to milliseconds.
///
/// Rounding never lands above the duration: a 4.3506s clip clamps a click at
/// the very end to 4.350, not 4.351.
pub fn quantize(secs: f64, duration: f64) -> Keyframe {
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    let secs = if secs.is_finite() { secs.clamp(0.0, duration) } else { 0.0 };
    // Small bias so 4.35 * 1000 = 4349.999.. still floors to 4350
    let max_ms = (duration * MS_PER_SECOND + 1e-6).floor() as u64;
    Keyframe((secs * MS_PER_SECOND).round() as u64).min(Keyframe(max_ms))
}

/// Ordered unique collection of keyframes bounded by the media duration.
#[derive(Clone, Debug, Default)]
pub struct KeyframeSet {
    keys: Vec<Keyframe>,
    duration: f64,
    revision: u64,
}

impl KeyframeSet {
    pub fn new(duration: f64) -> Self {
        Self {
            keys: Vec::new(),
            duration: sanitize_duration(duration),
            revision: 0,
        }
    }

    /// Build a set from persisted seconds, normalizing as `replace_all` does.
    pub fn from_secs(duration: f64, secs: &[f64]) -> Self {
        let mut set = Self::new(duration);
        set.keys = normalize(secs.iter().copied(), set.duration);
        set
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Change the bound; existing keyframes are clamped into the new range
    /// (values that collapse onto each other are merged).
    pub fn set_duration(&mut self, duration: f64) {
        let duration = sanitize_duration(duration);
        if duration == self.duration {
            return;
        }
        self.duration = duration;
        let keys = normalize(self.keys.iter().map(|k| k.secs()), duration);
        self.keys = keys;
        self.bump();
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn as_slice(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = Keyframe> + '_ {
        self.keys.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<Keyframe> {
        self.keys.get(index).copied()
    }

    pub fn contains(&self, key: Keyframe) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Snapshot in seconds, ascending.
    pub fn to_secs(&self) -> Vec<f64> {
        self.keys.iter().map(|k| k.secs()).collect()
    }

    /// Clamp, round and insert. Returns the stored keyframe whether it was
    /// new or already present.
    pub fn add(&mut self, secs: f64) -> Keyframe {
        let key = quantize(secs, self.duration);
        if let Err(pos) = self.keys.binary_search(&key) {
            self.keys.insert(pos, key);
            self.bump();
            trace!("Keyframe added at {}", key);
        }
        key
    }

    /// Remove an exact match. Returns false when absent.
    pub fn remove(&mut self, key: Keyframe) -> bool {
        match self.keys.binary_search(&key) {
            Ok(pos) => {
                self.keys.remove(pos);
                self.bump();
                trace!("Keyframe removed at {}", key);
                true
            }
            Err(_) => false,
        }
    }

    /// Replace the whole set at once from arbitrary (unsorted, duplicated,
    /// out of range) seconds.
    pub fn replace_all<I>(&mut self, secs: I)
    where
        I: IntoIterator<Item = f64>,
    {
        let keys = normalize(secs, self.duration);
        if keys != self.keys {
            self.keys = keys;
            self.bump();
        }
    }

    /// Replace with keyframes, dropping anything outside the bound.
    pub fn replace_keys<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = Keyframe>,
    {
        self.replace_all(keys.into_iter().map(Keyframe::secs));
    }

    /// Replace with `{0, step, 2*step, ..}` strictly below the duration.
    /// Silently ignored when `duration <= 0` or `step <= 0`.
    pub fn generate_interval(&mut self, step: f64) -> bool {
        self.generate_interval_limited(step, MAX_GENERATED_KEYFRAMES)
    }

    /// `generate_interval` with an explicit cap on produced keyframes.
    pub fn generate_interval_limited(&mut self, step: f64, limit: usize) -> bool {
        if self.duration <= 0.0 || !step.is_finite() || step <= 0.0 {
            trace!(
                "Interval generation ignored (duration={}, step={})",
                self.duration, step
            );
            return false;
        }

        let mut secs = Vec::new();
        let mut index: u64 = 0;
        loop {
            // Multiply instead of accumulating so 0.1 steps don't drift
            let t = index as f64 * step;
            if t >= self.duration {
                break;
            }
            if secs.len() >= limit {
                warn!(
                    "Interval generation truncated at {} keyframes (step={}s, duration={}s)",
                    limit, step, self.duration
                );
                break;
            }
            secs.push(t);
            index += 1;
        }

        self.replace_all(secs);
        true
    }

    pub fn clear(&mut self) {
        if !self.keys.is_empty() {
            self.keys.clear();
            self.bump();
        }
    }

    /// First keyframe in ascending order with `|k - secs| < tolerance`.
    ///
    /// Tie-break is "first ascending", not "nearest": with keys at 49.0 and
    /// 50.5 and a query at 50.4 (tolerance 2.0) this returns 49.0.
    pub fn find_near(&self, secs: f64, tolerance: f64) -> Option<Keyframe> {
        self.keys
            .iter()
            .copied()
            .find(|k| (k.secs() - secs).abs() < tolerance)
    }

    /// Index of the keyframe closest to `secs` within `tolerance` (inclusive).
    /// Equal distances resolve to the lower index.
    pub fn closest_within(&self, secs: f64, tolerance: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, key) in self.keys.iter().enumerate() {
            let dist = (key.secs() - secs).abs();
            if dist > tolerance {
                continue;
            }
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((idx, dist)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Index of the first keyframe strictly greater than `secs`.
    pub fn first_after(&self, secs: f64) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.secs() <= secs);
        (idx < self.keys.len()).then_some(idx)
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() { duration.max(0.0) } else { 0.0 }
}

fn normalize<I>(secs: I, duration: f64) -> Vec<Keyframe>
where
    I: IntoIterator<Item = f64>,
{
    let mut keys: Vec<Keyframe> = secs.into_iter().map(|t| quantize(t, duration)).collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Keyframes picked in the timeline. Not persisted.
///
/// Members must exist in the current `KeyframeSet`; callers prune after any
/// change that could invalidate an entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    keys: BTreeSet<Keyframe>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: Keyframe) -> bool {
        self.keys.contains(&key)
    }

    /// Ascending iteration.
    pub fn iter(&self) -> impl Iterator<Item = Keyframe> + '_ {
        self.keys.iter().copied()
    }

    /// The selected keyframe when exactly one is selected.
    pub fn single(&self) -> Option<Keyframe> {
        if self.keys.len() == 1 {
            self.keys.first().copied()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Replace the selection with a single keyframe.
    pub fn select_only(&mut self, key: Keyframe) {
        self.keys.clear();
        self.keys.insert(key);
    }

    pub fn insert(&mut self, key: Keyframe) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: Keyframe) -> bool {
        self.keys.remove(&key)
    }

    /// Flip membership. Returns true when the key is selected afterwards.
    pub fn toggle(&mut self, key: Keyframe) -> bool {
        if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        }
    }

    /// Swap `old` for `new` if `old` was selected.
    pub fn replace(&mut self, old: Keyframe, new: Keyframe) -> bool {
        if self.keys.remove(&old) {
            self.keys.insert(new);
            true
        } else {
            false
        }
    }

    /// Drop entries no longer present in `set`. Returns how many were dropped.
    pub fn prune(&mut self, set: &KeyframeSet) -> usize {
        let before = self.keys.len();
        self.keys.retain(|k| set.contains(*k));
        before - self.keys.len()
    }
}
