use serde::{Deserialize, Serialize};

use super::seek::SeekMachine;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    /// No video selected.
    #[default]
    Empty,
    Paused,
    Playing,
    /// Reached the end. Terminal until another video is loaded.
    Ended,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Identity of the loaded video; windows and responses carry it.
    pub session_id: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    pub frames_captured: u64,
    pub seek: SeekMachine,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_dragging(&self) -> bool {
        self.seek.is_dragging()
    }

    /// Fresh state for a newly selected video, paused at zero.
    pub fn begin_session(&mut self, session_id: String) {
        *self = Self {
            status: PlaybackStatus::Paused,
            session_id: Some(session_id),
            ..Self::default()
        };
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        self.current_time = self.clamp_time(self.current_time);
    }

    /// Applies a native progress update unless a drag owns the time.
    pub fn apply_native_time(&mut self, seconds: f64) -> bool {
        if !self.seek.accepts_native_updates() {
            return false;
        }
        self.current_time = self.clamp_time(seconds);
        true
    }

    pub fn apply_seek(&mut self, seconds: f64) {
        self.current_time = self.clamp_time(seconds);
    }

    pub fn record_frame(&mut self) -> u64 {
        self.frames_captured += 1;
        self.frames_captured
    }

    pub fn finish(&mut self) {
        self.status = PlaybackStatus::Ended;
        self.current_time = self.duration;
    }

    fn clamp_time(&self, seconds: f64) -> f64 {
        if !seconds.is_finite() {
            return 0.0;
        }
        seconds.clamp(0.0, self.duration.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::seek::SeekBar;

    #[test]
    fn begin_session_resets_everything() {
        let mut state = PlaybackState::new();
        state.begin_session("a".into());
        state.set_duration(90.0);
        state.apply_native_time(30.0);
        state.record_frame();
        state.status = PlaybackStatus::Playing;

        state.begin_session("b".into());
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert_eq!(state.session_id.as_deref(), Some("b"));
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 0.0);
        assert_eq!(state.frames_captured, 0);
    }

    #[test]
    fn native_time_is_masked_while_dragging() {
        let mut state = PlaybackState::new();
        state.begin_session("a".into());
        state.set_duration(100.0);

        let bar = SeekBar::new(0.0, 100.0);
        let target = state.seek.pointer_down(25.0, &bar, state.duration).unwrap();
        state.apply_seek(target);

        assert!(!state.apply_native_time(80.0));
        assert_eq!(state.current_time, 25.0);

        state.seek.pointer_up();
        assert!(state.apply_native_time(80.0));
        assert_eq!(state.current_time, 80.0);
    }

    #[test]
    fn time_is_clamped_to_duration() {
        let mut state = PlaybackState::new();
        state.set_duration(10.0);
        state.apply_native_time(12.0);
        assert_eq!(state.current_time, 10.0);
        state.apply_native_time(f64::NAN);
        assert_eq!(state.current_time, 0.0);
    }
}
