//! Shared action queue for widgets.
//!
//! Widgets never mutate the session. They push `EditorAction`s and the
//! editor applies them after the panels are laid out.

use crate::core::{Keyframe, Modifiers};
use crate::entities::ExportSettings;

/// Everything a widget can ask the editor to do.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorAction {
    // Track
    TrackWidth(f64),
    ClickTrack { x: f64, modifiers: Modifiers },
    DoubleClickTrack { x: f64 },
    ClickMarker { key: Keyframe, modifiers: Modifiers },
    DragStart(Keyframe),
    DragMove(f64),
    DragEnd,
    PointerLeft,
    // Transport
    TogglePlay,
    TogglePreview,
    AddAtPlayhead,
    // Selection / bulk edits
    DeleteSelected,
    Retime(f64),
    ClearSelection,
    GenerateInterval(f64),
    ClearKeys,
    // Project
    Rename(String),
    SetExportSettings(ExportSettings),
    StartExport,
    CancelExport,
}

/// Widget output, drained once per frame.
#[derive(Debug)]
pub struct ActionQueue<A> {
    pub actions: Vec<A>,
}

impl<A> Default for ActionQueue<A> {
    fn default() -> Self {
        Self { actions: Vec::new() }
    }
}

impl<A> ActionQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, action: A) {
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, A> {
        self.actions.drain(..)
    }
}
