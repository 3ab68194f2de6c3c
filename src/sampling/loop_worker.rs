use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::EngineError,
    events::{emit, EngineEvent, EventSender},
    inference::InferenceDispatcher,
    media::MediaElement,
    models::Frame,
    playback::PlaybackState,
    settings::SettingsStore,
    window::WindowBuffer,
};

use super::encoder::encode_frame;

// Set to false to silence per-tick logging from this module.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything the sampling task touches.
#[derive(Clone)]
pub struct SamplingContext {
    pub session_id: String,
    pub media: Arc<dyn MediaElement>,
    pub buffer: Arc<Mutex<WindowBuffer>>,
    pub state: Arc<Mutex<PlaybackState>>,
    pub settings: Arc<SettingsStore>,
    pub dispatcher: InferenceDispatcher,
    pub events: EventSender,
    pub interval: Duration,
    pub heartbeat_every_ticks: u32,
}

struct Capture {
    jpeg: Vec<u8>,
    media_time: f64,
}

pub async fn sampling_loop(ctx: SamplingContext, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let heartbeat_every = ctx.heartbeat_every_ticks.max(1);
    let mut ticks: u32 = 0;
    let mut skipped: u64 = 0;

    log_info!("Frame sampler started for session {}", ctx.session_id);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_debug!("sampling loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match tokio::time::timeout(CAPTURE_TIMEOUT, sample_once(&ctx)).await {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => skipped += 1,
                    Ok(Err(err)) => log_error!("frame capture failed for session {}: {err:?}", ctx.session_id),
                    Err(_) => log_warn!("frame capture timeout (> {:?}) session {}", CAPTURE_TIMEOUT, ctx.session_id),
                }

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    let buffered = ctx.buffer.lock().await.len();
                    log_debug!(
                        "sampler heartbeat: {} ticks, {} buffered, {} skipped (session {})",
                        ticks, buffered, skipped, ctx.session_id
                    );
                }
            }
        }
    }
}

/// One tick. `Ok(false)` means the video had no picture to give.
async fn sample_once(ctx: &SamplingContext) -> Result<bool> {
    let started = Instant::now();
    let media = Arc::clone(&ctx.media);
    let Some(capture) = tokio::task::spawn_blocking(move || capture_frame(media.as_ref()))
        .await
        .context("capture worker join failed")??
    else {
        return Ok(false);
    };

    let settings = ctx.settings.sampling();

    // The buffer is pushed under the state guard so a pause or a new video
    // cannot land between the status check and the append.
    let (sequence, frame_bytes, window, buffered) = {
        let mut state = ctx.state.lock().await;
        if !state.is_playing() || state.session_id.as_deref() != Some(ctx.session_id.as_str()) {
            return Ok(false);
        }
        let sequence = state.record_frame();
        let frame = Frame::new(capture.jpeg, sequence, capture.media_time);
        let frame_bytes = frame.len();

        let mut buffer = ctx.buffer.lock().await;
        let window = buffer.push(frame, &settings);
        (sequence, frame_bytes, window, buffer.len())
    };

    emit(&ctx.events, EngineEvent::FrameCaptured { sequence, buffered });
    log_debug!(
        "frame {} captured at {:.2}s ({} bytes, {} buffered) in {}ms",
        sequence,
        capture.media_time,
        frame_bytes,
        buffered,
        started.elapsed().as_millis()
    );

    if let Some(window) = window {
        ctx.dispatcher.dispatch(window);
    }

    Ok(true)
}

fn capture_frame(media: &dyn MediaElement) -> Result<Option<Capture>> {
    if !media.ready_state().can_capture() {
        return Ok(None);
    }
    let media_time = media.current_time();
    let Some(image) = media
        .render_frame()
        .map_err(|err| EngineError::Capture(format!("{err:#}")))?
    else {
        return Ok(None);
    };
    let jpeg = encode_frame(&image).map_err(|err| EngineError::Capture(format!("{err:#}")))?;
    Ok(Some(Capture { jpeg, media_time }))
}
