//! Keyframe track widget.
//!
//! Draws the track, one marker per keyframe and the playhead, and turns
//! pointer input into `EditorAction`s. Coordinates handed to the session are
//! track-local `x` in pixels; the session converts them to seconds.

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, Ui};

use super::actions::{ActionQueue, EditorAction};
use crate::core::{DragState, KeyframeSet, Modifiers, Selection};

pub const TRACK_HEIGHT: f32 = 48.0;
const MARKER_HALF_WIDTH: f32 = 4.0;

const TRACK_BG: Color32 = Color32::from_gray(35);
const MARKER: Color32 = Color32::from_rgb(110, 170, 230);
const MARKER_SELECTED: Color32 = Color32::from_rgb(255, 170, 60);
const PLAYHEAD: Color32 = Color32::from_rgb(230, 70, 70);

/// What the track needs to draw itself.
pub struct TrackView<'a> {
    pub keys: &'a KeyframeSet,
    pub selection: &'a Selection,
    pub drag: Option<DragState>,
    pub playhead: f64,
    /// Width the session currently maps times onto
    pub track_width: f64,
}

/// Screen x for `secs` on a track starting at `left`.
pub fn time_to_screen_x(secs: f64, duration: f64, left: f32, width: f32) -> f32 {
    if duration <= 0.0 {
        return left;
    }
    left + ((secs / duration).clamp(0.0, 1.0) as f32) * width
}

pub fn to_modifiers(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: m.shift,
        ctrl: m.ctrl,
        meta: m.mac_cmd,
    }
}

pub fn render_track(ui: &mut Ui, view: &TrackView<'_>, queue: &mut ActionQueue<EditorAction>) {
    let width = ui.available_width().max(1.0);
    let (rect, track) = ui.allocate_exact_size(egui::vec2(width, TRACK_HEIGHT), Sense::click());

    if (f64::from(rect.width()) - view.track_width).abs() > 0.5 {
        queue.send(EditorAction::TrackWidth(f64::from(rect.width())));
    }

    let duration = view.keys.duration();
    let modifiers = to_modifiers(ui.input(|i| i.modifiers));
    let local_x = |pos: Pos2| f64::from((pos.x - rect.min.x).clamp(0.0, rect.width()));

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 2.0, TRACK_BG);
    draw_ticks(&painter, rect, duration);

    // Markers are interacted after the track so they win the hit test
    let mut marker_hit = false;
    for key in view.keys.iter() {
        let secs = match view.drag {
            Some(drag) if drag.original == key => drag.current,
            _ => key.secs(),
        };
        let x = time_to_screen_x(secs, duration, rect.min.x, rect.width());
        let marker_rect = Rect::from_min_max(
            egui::pos2(x - MARKER_HALF_WIDTH, rect.min.y + 4.0),
            egui::pos2(x + MARKER_HALF_WIDTH, rect.max.y - 4.0),
        );
        let color = if view.selection.contains(key) {
            MARKER_SELECTED
        } else {
            MARKER
        };
        painter.rect_filled(marker_rect, 1.0, color);

        let response = ui.interact(
            marker_rect,
            ui.id().with(("keyframe", key.millis())),
            Sense::click_and_drag(),
        );
        let response = response.on_hover_text(format!("{:.3}s", key.secs()));
        if response.hovered() {
            marker_hit = true;
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
        }
        // A marker eats single clicks only; a double-click still toggles the
        // key under the pointer like anywhere else on the track
        if response.double_clicked() {
            let at = response
                .interact_pointer_pos()
                .map(local_x)
                .unwrap_or_else(|| f64::from(x - rect.min.x));
            queue.send(EditorAction::DoubleClickTrack { x: at });
        } else if response.clicked() {
            queue.send(EditorAction::ClickMarker { key, modifiers });
        }
        if response.drag_started() {
            queue.send(EditorAction::DragStart(key));
        }
        if response.dragged()
            && let Some(pos) = response.interact_pointer_pos()
        {
            if rect.contains(pos) {
                queue.send(EditorAction::DragMove(local_x(pos)));
            } else if view.drag.is_some() {
                // Leaving the track finishes the drag where it is
                queue.send(EditorAction::PointerLeft);
            }
        }
        if response.drag_stopped() {
            queue.send(EditorAction::DragEnd);
        }
    }

    if !marker_hit && let Some(pos) = track.interact_pointer_pos() {
        if track.double_clicked() {
            queue.send(EditorAction::DoubleClickTrack { x: local_x(pos) });
        } else if track.clicked() {
            queue.send(EditorAction::ClickTrack {
                x: local_x(pos),
                modifiers,
            });
        }
    }

    let px = time_to_screen_x(view.playhead, duration, rect.min.x, rect.width());
    painter.line_segment(
        [egui::pos2(px, rect.min.y), egui::pos2(px, rect.max.y)],
        Stroke::new(2.0, PLAYHEAD),
    );
}

/// Whole-second ticks, thinned out so labels don't collide.
fn draw_ticks(painter: &egui::Painter, rect: Rect, duration: f64) {
    if duration <= 0.0 {
        return;
    }
    let step = tick_step(duration, rect.width());
    let mut t = 0.0;
    while t <= duration {
        let x = time_to_screen_x(t, duration, rect.min.x, rect.width());
        painter.line_segment(
            [egui::pos2(x, rect.max.y - 6.0), egui::pos2(x, rect.max.y)],
            Stroke::new(1.0, Color32::from_gray(90)),
        );
        painter.text(
            egui::pos2(x + 2.0, rect.min.y + 1.0),
            egui::Align2::LEFT_TOP,
            format!("{}s", t),
            egui::FontId::monospace(9.0),
            Color32::from_gray(120),
        );
        t += step;
    }
}

/// Seconds between labelled ticks: 1, 2, 5, 10, 30, 60...
fn tick_step(duration: f64, width: f32) -> f64 {
    const STEPS: [f64; 8] = [1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0];
    let min_px = 60.0;
    STEPS
        .into_iter()
        .find(|step| f64::from(width) * step / duration >= min_px)
        .unwrap_or(600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_screen_x() {
        assert_eq!(time_to_screen_x(5.0, 10.0, 100.0, 200.0), 200.0);
        assert_eq!(time_to_screen_x(20.0, 10.0, 100.0, 200.0), 300.0);
        assert_eq!(time_to_screen_x(1.0, 0.0, 100.0, 200.0), 100.0);
    }

    #[test]
    fn test_tick_step_thins_out() {
        assert_eq!(tick_step(10.0, 1000.0), 1.0);
        assert_eq!(tick_step(100.0, 1000.0), 10.0);
        assert_eq!(tick_step(100_000.0, 100.0), 600.0);
    }

    /// Run one frame of a central panel holding only the track.
    fn frame(
        ctx: &egui::Context,
        view: &TrackView<'_>,
        queue: &mut ActionQueue<EditorAction>,
        time: f64,
        events: Vec<egui::Event>,
    ) -> Rect {
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, egui::vec2(1000.0, 200.0))),
            time: Some(time),
            events,
            ..Default::default()
        };
        let mut track_rect = Rect::NOTHING;
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                track_rect = ui.available_rect_before_wrap();
                render_track(ui, view, queue);
            });
        });
        track_rect
    }

    fn button(pos: Pos2, pressed: bool) -> egui::Event {
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        }
    }

    /// Lay out once, then press/release at `at` the given number of times.
    fn click_at(keys: &KeyframeSet, at: impl Fn(Rect) -> Pos2, clicks: usize) -> (Vec<EditorAction>, Rect) {
        let ctx = egui::Context::default();
        let selection = Selection::new();
        let view = TrackView {
            keys,
            selection: &selection,
            drag: None,
            playhead: 0.0,
            track_width: 0.0,
        };
        let mut queue = ActionQueue::new();
        let rect = frame(&ctx, &view, &mut queue, 0.0, vec![]);
        let pos = at(rect);
        let mut time = 0.05;
        frame(&ctx, &view, &mut queue, time, vec![egui::Event::PointerMoved(pos)]);
        for _ in 0..clicks {
            for pressed in [true, false] {
                time += 0.05;
                frame(&ctx, &view, &mut queue, time, vec![button(pos, pressed)]);
            }
        }
        let actions = queue
            .drain()
            .filter(|a| !matches!(a, EditorAction::TrackWidth(_)))
            .collect();
        (actions, rect)
    }

    fn marker_pos(rect: Rect) -> Pos2 {
        // Key at 5.0s of 10.0s sits mid-track
        egui::pos2(rect.center().x, rect.min.y + TRACK_HEIGHT / 2.0)
    }

    #[test]
    fn test_double_click_on_marker_removes_key() {
        let mut keys = KeyframeSet::from_secs(10.0, &[5.0]);
        let (actions, rect) = click_at(&keys, marker_pos, 2);

        let xs: Vec<f64> = actions
            .iter()
            .filter_map(|a| match a {
                EditorAction::DoubleClickTrack { x } => Some(*x),
                _ => None,
            })
            .collect();
        assert!(!xs.is_empty(), "no double-click in {:?}", actions);
        assert!(!actions.iter().any(|a| matches!(a, EditorAction::ClickTrack { .. })));

        // Handed to the controller, the gesture removes the key it landed on
        let mut controller = crate::core::TimelineController::new(0.02);
        controller.set_track_width(f64::from(rect.width()));
        assert!(matches!(
            controller.double_click_track(xs[0], &mut keys),
            crate::core::TrackEdit::Removed(_)
        ));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_single_click_on_marker_selects_only() {
        let keys = KeyframeSet::from_secs(10.0, &[5.0]);
        let (actions, _) = click_at(&keys, marker_pos, 1);
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, EditorAction::ClickMarker { .. }))
        );
        assert!(!actions.iter().any(|a| matches!(
            a,
            EditorAction::ClickTrack { .. } | EditorAction::DoubleClickTrack { .. }
        )));
    }

    #[test]
    fn test_click_on_empty_track_seeks() {
        let keys = KeyframeSet::from_secs(10.0, &[5.0]);
        let (actions, _) = click_at(&keys, |r| egui::pos2(r.min.x + 100.0, r.min.y + 20.0), 1);
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, EditorAction::ClickTrack { x, .. } if (*x - 100.0).abs() < 0.5))
        );
        assert!(!actions.iter().any(|a| matches!(a, EditorAction::ClickMarker { .. })));
    }

    #[test]
    fn test_modifiers_mapping() {
        let m = to_modifiers(egui::Modifiers {
            shift: true,
            ..Default::default()
        });
        assert!(m.any());
        assert!(!to_modifiers(egui::Modifiers::NONE).any());
    }
}
