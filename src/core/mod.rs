//! Editor core - keyframes, timeline gestures, playback clock, autosave.
//!
//! Nothing here touches the UI or a decoder. Time comes from an injectable
//! `Clock`, so every module is tested against a virtual clock.

pub mod autosave;
pub mod clock;
pub mod keyframes;
pub mod scheduler;
pub mod session;
pub mod timeline;

pub use autosave::{Autosave, SaveFingerprint};
pub use clock::{PlaybackClock, PlaybackMode, SurfaceCommand, SurfaceState};
pub use keyframes::{Keyframe, KeyframeSet, Selection};
pub use scheduler::{Clock, ManualClock, ScheduledTask, SharedClock, SystemClock};
pub use session::{EditorSession, TickOutcome};
pub use timeline::{DragState, Modifiers, TimelineController, TrackEdit};
