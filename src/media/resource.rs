use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use super::element::MediaElement;

/// Handle that exposes a selected video to the player.
///
/// Released exactly once: by `release()` or on drop, whichever comes first.
pub struct VideoResource {
    source: PathBuf,
    media: Arc<dyn MediaElement>,
    released: AtomicBool,
    release_count: Arc<AtomicUsize>,
}

impl VideoResource {
    pub fn new(source: impl Into<PathBuf>, media: Arc<dyn MediaElement>) -> Self {
        Self::with_counter(source, media, Arc::new(AtomicUsize::new(0)))
    }

    /// Shares `release_count` so callers can observe releases.
    pub fn with_counter(
        source: impl Into<PathBuf>,
        media: Arc<dyn MediaElement>,
        release_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            source: source.into(),
            media,
            released: AtomicBool::new(false),
            release_count,
        }
    }

    pub fn media(&self) -> Arc<dyn MediaElement> {
        Arc::clone(&self.media)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.media.pause();
        self.release_count.fetch_add(1, Ordering::AcqRel);
        log::debug!("Released video resource {}", self.source.display());
    }
}

impl Drop for VideoResource {
    fn drop(&mut self) {
        self.release();
    }
}
