use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SeekPhase {
    #[default]
    Idle,
    Dragging,
}

/// Horizontal extent of the seek control, in the same units as pointer x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekBar {
    pub left: f64,
    pub width: f64,
}

impl SeekBar {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Pointer position as a fraction of the bar, clamped to `[0, 1]`.
    pub fn fraction(&self, pointer_x: f64) -> f64 {
        if !(self.width > 0.0) || !pointer_x.is_finite() {
            return 0.0;
        }
        ((pointer_x - self.left) / self.width).clamp(0.0, 1.0)
    }
}

/// Pointer scrubbing. While dragging, the pointer owns the displayed time and
/// native progress updates are masked; in `Idle` they pass through.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeekMachine {
    phase: SeekPhase,
}

impl SeekMachine {
    pub fn phase(&self) -> SeekPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == SeekPhase::Dragging
    }

    pub fn accepts_native_updates(&self) -> bool {
        !self.is_dragging()
    }

    /// Starts a drag and returns the time to jump to.
    pub fn pointer_down(&mut self, pointer_x: f64, bar: &SeekBar, duration: f64) -> Option<f64> {
        self.phase = SeekPhase::Dragging;
        target_time(pointer_x, bar, duration)
    }

    /// Tracked globally, so the drag follows the pointer outside the bar.
    pub fn pointer_move(&mut self, pointer_x: f64, bar: &SeekBar, duration: f64) -> Option<f64> {
        if !self.is_dragging() {
            return None;
        }
        target_time(pointer_x, bar, duration)
    }

    /// Ends a drag. Returns whether one was active; the time is left alone.
    pub fn pointer_up(&mut self) -> bool {
        std::mem::take(&mut self.phase) == SeekPhase::Dragging
    }

    /// Leaving the bar ends the drag only when no button is held.
    pub fn pointer_leave(&mut self, button_held: bool) -> bool {
        if button_held {
            return false;
        }
        self.pointer_up()
    }
}

fn target_time(pointer_x: f64, bar: &SeekBar, duration: f64) -> Option<f64> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    Some(bar.fraction(pointer_x) * duration)
}
