//! Timeline interaction controller - gestures on the keyframe track.
//!
//! Owns the selection and the in-flight drag. Does NOT own the keyframe set
//! or the clock: each gesture borrows what it needs (same split as the player
//! borrowing the project), so the session stays the single source of truth.
//!
//! Pointer positions are track-local `x` in `[0, track_width]`.

use log::{debug, trace};

use super::clock::PlaybackClock;
use super::keyframes::{Keyframe, KeyframeSet, Selection, quantize};

/// Held modifier keys. Any of them turns a marker click into a toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

/// Marker being dragged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragState {
    pub original: Keyframe,
    /// Candidate time in seconds (not rounded until the drop)
    pub current: f64,
}

/// Result of a double-click on the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEdit {
    Added(Keyframe),
    Removed(Keyframe),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct TimelineController {
    track_width: f64,
    selection: Selection,
    drag: Option<DragState>,
    /// Fraction of the duration a double-click must land within to hit a key
    key_match_fraction: f64,
}

impl Default for TimelineController {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl TimelineController {
    pub fn new(key_match_fraction: f64) -> Self {
        Self {
            track_width: 1.0,
            selection: Selection::new(),
            drag: None,
            key_match_fraction,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn drag(&self) -> Option<DragState> {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Layout pass reports the current track width.
    pub fn set_track_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.track_width = width;
        }
    }

    /// Track x -> seconds.
    pub fn time_at(&self, x: f64, duration: f64) -> f64 {
        let frac = if x.is_finite() { (x / self.track_width).clamp(0.0, 1.0) } else { 0.0 };
        frac * duration.max(0.0)
    }

    /// Seconds -> track x.
    pub fn x_for(&self, secs: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return 0.0;
        }
        (secs / duration).clamp(0.0, 1.0) * self.track_width
    }

    /// Plain click on the track: seek. Clears the selection unless a modifier
    /// is held. Ignored while a marker is being dragged.
    pub fn click_track(&mut self, x: f64, modifiers: Modifiers, clock: &mut PlaybackClock) -> bool {
        if self.drag.is_some() {
            return false;
        }
        if !modifiers.any() {
            self.selection.clear();
        }
        let t = self.time_at(x, clock.duration());
        clock.seek(t);
        true
    }

    /// Double-click: remove the first keyframe near the pointer, or add one.
    pub fn double_click_track(&mut self, x: f64, keys: &mut KeyframeSet) -> TrackEdit {
        if self.drag.is_some() {
            return TrackEdit::Ignored;
        }
        let t = self.time_at(x, keys.duration());
        let tolerance = self.key_match_fraction * keys.duration();
        match keys.find_near(t, tolerance) {
            Some(hit) => {
                keys.remove(hit);
                self.selection.remove(hit);
                debug!("Double-click removed keyframe {}", hit);
                TrackEdit::Removed(hit)
            }
            None => {
                let key = keys.add(t);
                debug!("Double-click added keyframe {}", key);
                TrackEdit::Added(key)
            }
        }
    }

    /// Click on a marker. The caller must not forward it to the track.
    pub fn click_marker(&mut self, key: Keyframe, modifiers: Modifiers) {
        if modifiers.any() {
            let selected = self.selection.toggle(key);
            trace!("Marker {} toggled (selected={})", key, selected);
        } else {
            self.selection.select_only(key);
            trace!("Marker {} selected", key);
        }
    }

    pub fn drag_start(&mut self, key: Keyframe) {
        if !self.selection.contains(key) {
            self.selection.select_only(key);
        }
        self.drag = Some(DragState {
            original: key,
            current: key.secs(),
        });
        trace!("Drag start at {}", key);
    }

    /// Pointer moved during a drag. The set is untouched until the drop.
    pub fn drag_move(&mut self, x: f64, duration: f64) {
        let t = self.time_at(x, duration);
        if let Some(drag) = self.drag.as_mut() {
            drag.current = t;
        }
    }

    /// Drop: move the dragged keyframe to the candidate time.
    pub fn drag_end(&mut self, keys: &mut KeyframeSet) -> Option<Keyframe> {
        let drag = self.drag.take()?;
        let target = quantize(drag.current, keys.duration());
        if target == drag.original {
            return Some(target);
        }
        keys.remove(drag.original);
        let new_key = keys.add(target.secs());
        self.selection.replace(drag.original, new_key);
        debug!("Keyframe moved {} -> {}", drag.original, new_key);
        Some(new_key)
    }

    /// Pointer left the track: an active drag is committed where it is.
    pub fn pointer_left(&mut self, keys: &mut KeyframeSet) -> Option<Keyframe> {
        if self.drag.is_some() {
            self.drag_end(keys)
        } else {
            None
        }
    }

    /// Remove every selected keyframe in one replace. Returns how many went.
    pub fn delete_selected(&mut self, keys: &mut KeyframeSet) -> usize {
        if self.selection.is_empty() {
            return 0;
        }
        let before = keys.len();
        let kept: Vec<Keyframe> = keys
            .iter()
            .filter(|k| !self.selection.contains(*k))
            .collect();
        keys.replace_keys(kept);
        self.selection.clear();
        let removed = before - keys.len();
        debug!("Deleted {} selected keyframes", removed);
        removed
    }

    /// Move the single selected keyframe to `secs`.
    pub fn retime_selected(&mut self, secs: f64, keys: &mut KeyframeSet) -> Option<Keyframe> {
        let old = self.selection.single()?;
        let new = quantize(secs, keys.duration());
        if new == old {
            return None;
        }
        keys.remove(old);
        let new = keys.add(new.secs());
        self.selection.select_only(new);
        debug!("Keyframe retimed {} -> {}", old, new);
        Some(new)
    }

    /// Replace the set with evenly spaced keyframes.
    pub fn generate_interval(&mut self, step: f64, limit: usize, keys: &mut KeyframeSet) -> bool {
        let changed = keys.generate_interval_limited(step, limit);
        if changed {
            self.selection.prune(keys);
        }
        changed
    }

    pub fn clear_keys(&mut self, keys: &mut KeyframeSet) {
        keys.clear();
        self.selection.clear();
        self.drag = None;
    }

    /// Drop stale selection entries after an outside change to the set.
    pub fn prune(&mut self, keys: &KeyframeSet) {
        let dropped = self.selection.prune(keys);
        if dropped > 0 {
            trace!("Pruned {} stale selections", dropped);
        }
        if let Some(drag) = self.drag
            && !keys.contains(drag.original)
        {
            self.drag = None;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::ManualClock;

    const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        meta: false,
    };

    fn controller(width: f64) -> TimelineController {
        let mut ctl = TimelineController::default();
        ctl.set_track_width(width);
        ctl
    }

    fn key(secs: f64) -> Keyframe {
        Keyframe::from_secs(secs)
    }

    #[test]
    fn test_time_at_clamps() {
        let ctl = controller(200.0);
        assert_eq!(ctl.time_at(100.0, 10.0), 5.0);
        assert_eq!(ctl.time_at(-5.0, 10.0), 0.0);
        assert_eq!(ctl.time_at(500.0, 10.0), 10.0);
        assert_eq!(ctl.x_for(2.5, 10.0), 50.0);
    }

    #[test]
    fn test_double_click_removes_near_and_adds_far() {
        let mut ctl = controller(1000.0);
        let mut keys = KeyframeSet::from_secs(100.0, &[50.0]);

        // x=510 -> 51s, within 2% of 100s
        assert_eq!(ctl.double_click_track(510.0, &mut keys), TrackEdit::Removed(key(50.0)));
        assert!(keys.is_empty());

        let mut keys = KeyframeSet::from_secs(100.0, &[50.0]);
        assert_eq!(ctl.double_click_track(600.0, &mut keys), TrackEdit::Added(key(60.0)));
        assert_eq!(keys.to_secs(), vec![50.0, 60.0]);
    }

    #[test]
    fn test_double_click_remove_drops_selection() {
        let mut ctl = controller(1000.0);
        let mut keys = KeyframeSet::from_secs(100.0, &[50.0, 80.0]);
        ctl.click_marker(key(50.0), Modifiers::NONE);
        ctl.double_click_track(500.0, &mut keys);
        assert!(ctl.selection().is_empty());
    }

    #[test]
    fn test_click_track_seeks_and_clears_selection() {
        let mut ctl = controller(100.0);
        let mut clock = PlaybackClock::new(10.0, ManualClock::new().shared());
        ctl.click_marker(key(1.0), Modifiers::NONE);

        assert!(ctl.click_track(30.0, SHIFT, &mut clock));
        assert_eq!(clock.current_time(), 3.0);
        assert_eq!(ctl.selection().len(), 1);

        assert!(ctl.click_track(40.0, Modifiers::NONE, &mut clock));
        assert_eq!(clock.current_time(), 4.0);
        assert!(ctl.selection().is_empty());
    }

    #[test]
    fn test_click_track_ignored_during_drag() {
        let mut ctl = controller(100.0);
        let mut clock = PlaybackClock::new(10.0, ManualClock::new().shared());
        ctl.drag_start(key(1.0));
        assert!(!ctl.click_track(50.0, Modifiers::NONE, &mut clock));
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn test_click_marker_select_and_toggle() {
        let mut ctl = controller(100.0);
        ctl.click_marker(key(1.0), Modifiers::NONE);
        ctl.click_marker(key(2.0), Modifiers::NONE);
        assert_eq!(ctl.selection().single(), Some(key(2.0)));

        ctl.click_marker(key(3.0), SHIFT);
        assert_eq!(ctl.selection().len(), 2);
        ctl.click_marker(key(2.0), Modifiers { meta: true, ..Default::default() });
        assert_eq!(ctl.selection().single(), Some(key(3.0)));
    }

    #[test]
    fn test_drag_retimes_and_selection_follows() {
        let mut ctl = controller(10_000.0);
        let mut keys = KeyframeSet::from_secs(10.0, &[2.0, 5.0]);
        ctl.click_marker(key(5.0), Modifiers::NONE);

        ctl.drag_start(key(5.0));
        ctl.drag_move(7123.0, keys.duration());
        // Nothing moves before the drop
        assert_eq!(keys.to_secs(), vec![2.0, 5.0]);

        let moved = ctl.drag_end(&mut keys);
        assert_eq!(moved, Some(key(7.123)));
        assert_eq!(keys.to_secs(), vec![2.0, 7.123]);
        assert_eq!(ctl.selection().single(), Some(key(7.123)));
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn test_drag_unselected_collapses_selection() {
        let mut ctl = controller(100.0);
        ctl.click_marker(key(1.0), Modifiers::NONE);
        ctl.click_marker(key(2.0), SHIFT);
        ctl.drag_start(key(3.0));
        assert_eq!(ctl.selection().single(), Some(key(3.0)));
    }

    #[test]
    fn test_pointer_left_commits_drag() {
        let mut ctl = controller(100.0);
        let mut keys = KeyframeSet::from_secs(10.0, &[1.0]);
        assert_eq!(ctl.pointer_left(&mut keys), None);

        ctl.drag_start(key(1.0));
        ctl.drag_move(45.0, keys.duration());
        assert_eq!(ctl.pointer_left(&mut keys), Some(key(4.5)));
        assert_eq!(keys.to_secs(), vec![4.5]);
    }

    #[test]
    fn test_delete_selected_batch() {
        let mut ctl = controller(100.0);
        let mut keys = KeyframeSet::from_secs(10.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let revision = keys.revision();
        ctl.click_marker(key(1.0), Modifiers::NONE);
        ctl.click_marker(key(3.0), SHIFT);
        ctl.click_marker(key(5.0), SHIFT);

        assert_eq!(ctl.delete_selected(&mut keys), 3);
        assert_eq!(keys.to_secs(), vec![2.0, 4.0]);
        assert!(ctl.selection().is_empty());
        // One atomic replace
        assert_eq!(keys.revision(), revision + 1);

        assert_eq!(ctl.delete_selected(&mut keys), 0);
    }

    #[test]
    fn test_retime_selected_single_only() {
        let mut ctl = controller(100.0);
        let mut keys = KeyframeSet::from_secs(10.0, &[1.0, 2.0]);

        assert_eq!(ctl.retime_selected(3.0, &mut keys), None);

        ctl.click_marker(key(1.0), Modifiers::NONE);
        assert_eq!(ctl.retime_selected(1.0004, &mut keys), None);
        assert_eq!(ctl.retime_selected(12.0, &mut keys), Some(key(10.0)));
        assert_eq!(keys.to_secs(), vec![2.0, 10.0]);
        assert_eq!(ctl.selection().single(), Some(key(10.0)));

        ctl.click_marker(key(2.0), SHIFT);
        assert_eq!(ctl.retime_selected(5.0, &mut keys), None);
    }

    #[test]
    fn test_generate_prunes_selection() {
        let mut ctl = controller(100.0);
        let mut keys = KeyframeSet::from_secs(10.0, &[1.0, 4.0]);
        ctl.click_marker(key(1.0), Modifiers::NONE);
        ctl.click_marker(key(4.0), SHIFT);

        assert!(ctl.generate_interval(2.0, 100, &mut keys));
        assert_eq!(keys.to_secs(), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(ctl.selection().single(), Some(key(4.0)));

        ctl.clear_keys(&mut keys);
        assert!(keys.is_empty());
        assert!(ctl.selection().is_empty());
    }
}
