// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Pointer gesture classification for the curve editor.
//!
//! One pointer stream per surface. A press is classified on release as a
//! tap or long press, unless it moved far enough to become a drag (only
//! presses that landed on something draggable can drag).
//!
//! ```text
//!  Idle --down(draggable)--> ArmedDrag --move > slop--> Dragging --up/leave--> Idle
//!  Idle --down-------------> ArmedTap  --move > slop--> Disarmed --up-------> Idle
//!  Armed* --up within slop--> Idle (Tap | LongPress)
//!  Armed* --poll after hold--> Held --up--> Idle
//! ```

use std::time::{Duration, Instant};

/// Pointer travel (surface units) still treated as a stationary press.
pub const TAP_SLOP: f64 = 3.0;

/// Hold time after which a press counts as a long press.
pub const LONG_PRESS: Duration = Duration::from_millis(1000);

/// A classified gesture, positions in surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Tap { x: f64, y: f64 },
    LongPress { x: f64, y: f64 },
    /// First movement past the slop of a draggable press.
    DragStart { x: f64, y: f64 },
    DragMove { x: f64, y: f64 },
    DragEnd,
    /// Pointer left the surface mid-drag; the last move stands.
    DragCancel,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    x: f64,
    y: f64,
    at: Instant,
}

impl Press {
    fn within_slop(&self, x: f64, y: f64) -> bool {
        (x - self.x).hypot(y - self.y) <= TAP_SLOP
    }

    fn classify(&self, now: Instant) -> Gesture {
        if now.saturating_duration_since(self.at) <= LONG_PRESS {
            Gesture::Tap { x: self.x, y: self.y }
        } else {
            Gesture::LongPress { x: self.x, y: self.y }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum State {
    #[default]
    Idle,
    ArmedTap(Press),
    ArmedDrag(Press),
    Dragging,
    /// Long press already reported; waiting for release.
    Held,
    /// Moved off a non-draggable press; nothing to report.
    Disarmed,
}

/// Raw pointer events in, [`Gesture`]s out.
#[derive(Debug, Default)]
pub struct GestureClassifier {
    state: State,
}

impl GestureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a press. `draggable` says whether something grabbable lies
    /// under the pointer.
    pub fn pointer_down(&mut self, x: f64, y: f64, at: Instant, draggable: bool) {
        if !matches!(self.state, State::Idle) {
            log::debug!("Pointer down without release, restarting gesture");
        }
        let press = Press { x, y, at };
        self.state = if draggable {
            State::ArmedDrag(press)
        } else {
            State::ArmedTap(press)
        };
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Gesture> {
        match self.state {
            State::ArmedDrag(press) if !press.within_slop(x, y) => {
                self.state = State::Dragging;
                Some(Gesture::DragStart { x, y })
            }
            State::ArmedTap(press) if !press.within_slop(x, y) => {
                self.state = State::Disarmed;
                None
            }
            State::Dragging => Some(Gesture::DragMove { x, y }),
            _ => None,
        }
    }

    pub fn pointer_up(&mut self, x: f64, y: f64, at: Instant) -> Option<Gesture> {
        match std::mem::take(&mut self.state) {
            State::ArmedTap(press) | State::ArmedDrag(press) if press.within_slop(x, y) => {
                Some(press.classify(at))
            }
            State::Dragging => Some(Gesture::DragEnd),
            _ => None,
        }
    }

    /// The pointer left the surface.
    pub fn pointer_leave(&mut self) -> Option<Gesture> {
        match std::mem::take(&mut self.state) {
            State::Dragging => Some(Gesture::DragCancel),
            _ => None,
        }
    }

    /// Report a long press while the pointer is still held down. Call
    /// periodically from the UI loop.
    pub fn poll(&mut self, now: Instant) -> Option<Gesture> {
        match self.state {
            State::ArmedTap(press) | State::ArmedDrag(press)
                if now.saturating_duration_since(press.at) > LONG_PRESS =>
            {
                self.state = State::Held;
                Some(Gesture::LongPress {
                    x: press.x,
                    y: press.y,
                })
            }
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, State::Dragging)
    }
}
