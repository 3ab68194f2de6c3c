use anyhow::{Context, Result};
use image::DynamicImage;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tokio::time::Instant;

use super::element::{MediaElement, ReadyState};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

enum FrameStore {
    Files(Vec<PathBuf>),
    Memory(Vec<DynamicImage>),
}

impl FrameStore {
    fn len(&self) -> usize {
        match self {
            FrameStore::Files(paths) => paths.len(),
            FrameStore::Memory(images) => images.len(),
        }
    }
}

/// Playback clock. `position_baseline` holds the position accumulated before
/// the current running stretch, `running_anchor` marks when it began.
#[derive(Debug, Default)]
struct Clock {
    position_baseline: f64,
    running_anchor: Option<Instant>,
}

/// A "video" made of still images shown at a fixed frame rate.
pub struct FrameSequenceMedia {
    frames: FrameStore,
    fps: f64,
    clock: Mutex<Clock>,
}

impl FrameSequenceMedia {
    /// Loads every image file in `dir`, ordered by file name.
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read video directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        log::info!(
            "Opened frame sequence {} ({} frames @ {} fps)",
            dir.display(),
            paths.len(),
            fps
        );

        Ok(Self::with_store(FrameStore::Files(paths), fps))
    }

    pub fn from_images(images: Vec<DynamicImage>, fps: f64) -> Self {
        Self::with_store(FrameStore::Memory(images), fps)
    }

    fn with_store(frames: FrameStore, fps: f64) -> Self {
        Self {
            frames,
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 30.0 },
            clock: Mutex::new(Clock::default()),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn position(&self, clock: &Clock) -> f64 {
        let running = clock
            .running_anchor
            .map(|anchor| anchor.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (clock.position_baseline + running).min(self.duration())
    }

    fn frame_index(&self, seconds: f64) -> usize {
        let last = self.frames.len().saturating_sub(1);
        ((seconds * self.fps).floor() as usize).min(last)
    }
}

impl MediaElement for FrameSequenceMedia {
    fn ready_state(&self) -> ReadyState {
        if self.frames.len() == 0 {
            ReadyState::HaveNothing
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn current_time(&self) -> f64 {
        let clock = self.clock();
        self.position(&clock)
    }

    fn set_current_time(&self, seconds: f64) {
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };
        let mut clock = self.clock();
        clock.position_baseline = target;
        if clock.running_anchor.is_some() {
            clock.running_anchor = Some(Instant::now());
        }
    }

    fn play(&self) {
        let mut clock = self.clock();
        if clock.running_anchor.is_some() {
            return;
        }
        if self.position(&clock) >= self.duration() {
            clock.position_baseline = 0.0;
        }
        clock.running_anchor = Some(Instant::now());
    }

    fn pause(&self) {
        let mut clock = self.clock();
        clock.position_baseline = self.position(&clock);
        clock.running_anchor = None;
    }

    fn is_paused(&self) -> bool {
        self.clock().running_anchor.is_none()
    }

    fn render_frame(&self) -> Result<Option<DynamicImage>> {
        if !self.ready_state().can_capture() {
            return Ok(None);
        }

        let index = self.frame_index(self.current_time());
        match &self.frames {
            FrameStore::Files(paths) => {
                let path = &paths[index];
                let image = image::open(path)
                    .with_context(|| format!("failed to decode frame {}", path.display()))?;
                Ok(Some(image))
            }
            FrameStore::Memory(images) => Ok(images.get(index).cloned()),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}
