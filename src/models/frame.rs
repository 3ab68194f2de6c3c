use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A JPEG-encoded still taken from the playing video.
#[derive(Clone)]
pub struct Frame {
    bytes: Arc<Vec<u8>>,
    /// Capture order within the session, starting at 1.
    pub sequence: u64,
    /// Playback position the frame was rendered at, in seconds.
    pub media_time: f64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, sequence: u64, media_time: f64) -> Self {
        Self {
            bytes: Arc::new(bytes),
            sequence,
            media_time,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:image/jpeg;base64,...`, the form the predict endpoint accepts.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(self.bytes.as_slice()))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("media_time", &self.media_time)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Consecutive frames submitted together for one prediction.
#[derive(Debug, Clone)]
pub struct Window {
    /// Playback session the frames were captured under.
    pub session_id: String,
    pub frames: Vec<Frame>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn to_data_urls(&self) -> Vec<String> {
        self.frames.iter().map(Frame::to_data_url).collect()
    }

    /// Sequence numbers of the first and last frame.
    pub fn span(&self) -> Option<(u64, u64)> {
        Some((self.frames.first()?.sequence, self.frames.last()?.sequence))
    }
}
