use crate::models::{Frame, Window};
use crate::settings::SamplingSettings;

/// Ordered frames waiting to be dispatched for one playback session.
///
/// After every `push` the buffer holds at most `max_buffer` frames.
#[derive(Debug)]
pub struct WindowBuffer {
    session_id: String,
    frames: Vec<Frame>,
}

impl WindowBuffer {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            frames: Vec::new(),
        }
    }

    /// Appends `frame`. Once `frames_per_dispatch` is reached the whole
    /// buffer is handed back as a window and the buffer starts over; if the
    /// threshold was not reached but `max_buffer` is exceeded, the oldest
    /// frames are dropped.
    pub fn push(&mut self, frame: Frame, settings: &SamplingSettings) -> Option<Window> {
        self.frames.push(frame);

        if self.frames.len() >= settings.frames_per_dispatch {
            return Some(Window {
                session_id: self.session_id.clone(),
                frames: std::mem::take(&mut self.frames),
            });
        }

        if self.frames.len() > settings.max_buffer {
            let excess = self.frames.len() - settings.max_buffer;
            self.frames.drain(..excess);
        }

        None
    }

    /// Starts over for a new session, discarding anything buffered.
    pub fn reset(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
        self.frames.clear();
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the buffer holds at least `min_buffer` frames. Informational
    /// only; dispatch is driven by `frames_per_dispatch`.
    pub fn meets_minimum(&self, settings: &SamplingSettings) -> bool {
        self.frames.len() >= settings.min_buffer
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.sequence).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn frame(seq: u64) -> Frame {
        Frame::new(vec![seq as u8], seq, 0.0)
    }

    fn settings(frames_per_dispatch: usize, min_buffer: usize, max_buffer: usize) -> SamplingSettings {
        SamplingSettings {
            frames_per_dispatch,
            min_buffer,
            max_buffer,
        }
    }

    #[test]
    fn dispatches_whole_buffer_at_threshold() {
        let cfg = settings(20, 15, 30);
        let mut buffer = WindowBuffer::new("session");
        let mut windows = Vec::new();

        for seq in 1..=20 {
            if let Some(window) = buffer.push(frame(seq), &cfg) {
                windows.push(window);
            }
        }

        assert_eq!(windows.len(), 1);
        let window = &windows[0];
        assert_eq!(window.len(), 20);
        assert_eq!(window.session_id, "session");
        assert_eq!(window.span(), Some((1, 20)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn trims_to_most_recent_frames_when_over_max() {
        let cfg = settings(100, 2, 5);
        let mut buffer = WindowBuffer::new("session");

        for seq in 1..=8 {
            assert!(buffer.push(frame(seq), &cfg).is_none());
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.sequences(), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn below_max_keeps_everything() {
        let cfg = settings(26, 15, 30);
        let mut buffer = WindowBuffer::new("session");

        for seq in 1..=25 {
            assert!(buffer.push(frame(seq), &cfg).is_none());
        }

        assert_eq!(buffer.len(), 25);
        assert!(buffer.meets_minimum(&cfg));
    }

    #[test]
    fn lowered_threshold_takes_effect_on_next_push() {
        let mut buffer = WindowBuffer::new("session");
        for seq in 1..=10 {
            assert!(buffer.push(frame(seq), &settings(20, 5, 30)).is_none());
        }

        // Threshold drops below the current length: the next push releases
        // everything buffered, not just a threshold-sized prefix.
        let window = buffer.push(frame(11), &settings(4, 2, 30)).unwrap();
        assert_eq!(window.len(), 11);
        assert!(buffer.is_empty());
    }

    #[test]
    fn never_exceeds_max_for_random_push_sequences() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let min_buffer = rng.gen_range(1..10);
            let max_buffer = rng.gen_range(min_buffer..40);
            let cfg = settings(rng.gen_range(1..60), min_buffer, max_buffer);
            let mut buffer = WindowBuffer::new("session");
            let mut last_dispatched = 0;

            for seq in 1..=rng.gen_range(1..150u64) {
                if let Some(window) = buffer.push(frame(seq), &cfg) {
                    let (first, last) = window.span().unwrap();
                    assert!(first > last_dispatched);
                    assert_eq!(last, seq);
                    last_dispatched = last;
                }
                assert!(buffer.len() <= cfg.max_buffer);
                let seqs = buffer.sequences();
                assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));
            }
        }
    }

    #[test]
    fn reset_switches_session_and_empties() {
        let cfg = settings(20, 15, 30);
        let mut buffer = WindowBuffer::new("old");
        buffer.push(frame(1), &cfg);
        buffer.reset("new");

        assert!(buffer.is_empty());
        assert_eq!(buffer.session_id(), "new");
    }
}
