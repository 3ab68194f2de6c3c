use anyhow::Result;
use image::DynamicImage;

/// How much of the media is available, mirroring the HTML media ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// A picture exists for the current position.
    pub fn can_capture(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// The playable video the engine samples from.
///
/// Times are in seconds. Implementations clamp `set_current_time` to
/// `[0, duration]`.
pub trait MediaElement: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    fn duration(&self) -> f64;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    fn play(&self);

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool {
        let duration = self.duration();
        duration > 0.0 && self.current_time() >= duration
    }

    /// The picture at the current position, or `None` if there is not enough
    /// data to show one yet.
    fn render_frame(&self) -> Result<Option<DynamicImage>>;
}
