use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time};
use uuid::Uuid;

use crate::{
    error::EngineError,
    events::{emit, EngineEvent, EventSender},
    inference::{InferenceDispatcher, ResultHandle, ResultSnapshot},
    media::{MediaElement, ReadyState, VideoResource},
    sampling::{SamplerController, SamplingContext, SAMPLE_INTERVAL},
    settings::SettingsStore,
    utils::{env_flag, format_time},
    window::WindowBuffer,
};

use super::{PlaybackState, PlaybackStatus, SeekBar};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// How often playback progress is read back from the media while playing.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub buffered: usize,
    pub result: ResultSnapshot,
    pub current_time_label: String,
    pub duration_label: String,
}

/// Play/pause/seek for the loaded video, keeping the frame sampler running
/// exactly while the video plays.
#[derive(Clone)]
pub struct PlaybackController {
    state: Arc<Mutex<PlaybackState>>,
    video: Arc<Mutex<Option<VideoResource>>>,
    buffer: Arc<Mutex<WindowBuffer>>,
    sampler: Arc<Mutex<SamplerController>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    sample_interval: Duration,
    heartbeat_every_ticks: u32,
    settings: Arc<SettingsStore>,
    dispatcher: InferenceDispatcher,
    results: ResultHandle,
    events: EventSender,
}

impl PlaybackController {
    pub fn new(
        settings: Arc<SettingsStore>,
        dispatcher: InferenceDispatcher,
        results: ResultHandle,
        events: EventSender,
    ) -> Self {
        let debug_mode = env_flag("SURGIPHASE_DEBUG");

        Self {
            state: Arc::new(Mutex::new(PlaybackState::new())),
            video: Arc::new(Mutex::new(None)),
            buffer: Arc::new(Mutex::new(WindowBuffer::new(String::new()))),
            sampler: Arc::new(Mutex::new(SamplerController::new())),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: PROGRESS_INTERVAL,
            sample_interval: SAMPLE_INTERVAL,
            heartbeat_every_ticks: if debug_mode { 1 } else { 50 },
            settings,
            dispatcher,
            results,
            events,
        }
    }

    pub async fn get_state(&self) -> PlaybackState {
        self.state.lock().await.clone()
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.get_state().await;
        let buffered = self.buffer.lock().await.len();
        PlaybackSnapshot {
            current_time_label: format_time(Some(state.current_time)),
            duration_label: format_time(Some(state.duration)),
            state,
            buffered,
            result: self.results.snapshot(),
        }
    }

    pub async fn is_sampling(&self) -> bool {
        self.sampler.lock().await.is_running()
    }

    /// Makes `video` the current video. Anything in progress for the previous
    /// one stops, its resource is released, and every counter starts over.
    pub async fn load_video(&self, video: VideoResource) -> Result<PlaybackState> {
        self.stop_sampler().await?;
        self.cancel_ticker().await;

        let media = video.media();
        media.pause();
        let source = video.source().display().to_string();

        if let Some(previous) = self.video.lock().await.replace(video) {
            previous.release();
        }

        let session_id = Uuid::new_v4().to_string();
        self.buffer.lock().await.reset(session_id.clone());
        self.results.begin_session(session_id.clone());
        self.state.lock().await.begin_session(session_id.clone());

        if media.ready_state() >= ReadyState::HaveMetadata {
            self.on_loaded_metadata(media.duration()).await;
        }

        log_info!("Loaded video {} as session {}", source, session_id);
        self.emit_state_changed().await;

        Ok(self.get_state().await)
    }

    pub async fn on_loaded_metadata(&self, duration: f64) {
        let mut state = self.state.lock().await;
        if state.status != PlaybackStatus::Empty {
            state.set_duration(duration);
        }
    }

    pub async fn play(&self) -> Result<PlaybackState> {
        let media = self.current_media().await.ok_or(EngineError::NoVideoLoaded)?;

        let session_id = {
            let mut state = self.state.lock().await;
            match state.status {
                PlaybackStatus::Empty => return Err(EngineError::NoVideoLoaded.into()),
                PlaybackStatus::Ended => return Err(EngineError::PlaybackEnded.into()),
                PlaybackStatus::Playing => return Ok(state.clone()),
                PlaybackStatus::Paused => {}
            }
            let session_id = state
                .session_id
                .clone()
                .ok_or_else(|| anyhow!("missing session id"))?;
            media.play();
            state.status = PlaybackStatus::Playing;
            session_id
        };

        let ctx = self.sampling_context(session_id.clone(), Arc::clone(&media));
        self.sampler.lock().await.start(ctx);
        self.spawn_ticker(session_id, media).await;

        self.emit_state_changed().await;
        Ok(self.get_state().await)
    }

    pub async fn pause(&self) -> Result<PlaybackState> {
        let media = self.current_media().await;

        {
            let mut state = self.state.lock().await;
            if state.status != PlaybackStatus::Playing {
                return Ok(state.clone());
            }
            state.status = PlaybackStatus::Paused;
            if let Some(media) = &media {
                media.pause();
                state.apply_native_time(media.current_time());
            }
        }

        self.stop_sampler().await?;
        self.cancel_ticker().await;

        self.emit_state_changed().await;
        Ok(self.get_state().await)
    }

    pub async fn toggle_play_pause(&self) -> Result<PlaybackState> {
        if self.state.lock().await.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Native progress update. Ignored while a seek drag is active.
    pub async fn on_time_update(&self, seconds: f64) -> bool {
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Empty {
            return false;
        }
        state.apply_native_time(seconds)
    }

    /// Native end of media.
    pub async fn on_ended(&self) -> Result<()> {
        if self.complete_playback().await? {
            self.cancel_ticker().await;
        }
        Ok(())
    }

    pub async fn seek_pointer_down(&self, pointer_x: f64, bar: SeekBar) -> Option<f64> {
        let media = self.current_media().await;
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Empty {
            return None;
        }
        let duration = state.duration;
        let target = state.seek.pointer_down(pointer_x, &bar, duration)?;
        if let Some(media) = media {
            media.set_current_time(target);
        }
        state.apply_seek(target);
        Some(target)
    }

    pub async fn seek_pointer_move(&self, pointer_x: f64, bar: SeekBar) -> Option<f64> {
        let media = self.current_media().await;
        let mut state = self.state.lock().await;
        let duration = state.duration;
        let target = state.seek.pointer_move(pointer_x, &bar, duration)?;
        if let Some(media) = media {
            media.set_current_time(target);
        }
        state.apply_seek(target);
        Some(target)
    }

    pub async fn seek_pointer_up(&self) -> bool {
        self.state.lock().await.seek.pointer_up()
    }

    pub async fn seek_pointer_leave(&self, button_held: bool) -> bool {
        self.state.lock().await.seek.pointer_leave(button_held)
    }

    /// Teardown: no sampler, no ticker, nothing buffered, video released.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.status == PlaybackStatus::Playing {
                state.status = PlaybackStatus::Paused;
            }
        }
        self.stop_sampler().await?;
        self.cancel_ticker().await;
        self.buffer.lock().await.clear();
        if let Some(video) = self.video.lock().await.take() {
            video.release();
        }
        log_info!("Playback controller shut down");
        Ok(())
    }

    /// Playing → Ended. Returns `false` if playback was not running.
    async fn complete_playback(&self) -> Result<bool> {
        {
            let mut state = self.state.lock().await;
            if state.status != PlaybackStatus::Playing {
                return Ok(false);
            }
            state.finish();
        }

        self.stop_sampler().await?;
        log_info!("Playback reached the end");
        self.emit_state_changed().await;
        Ok(true)
    }

    async fn current_media(&self) -> Option<Arc<dyn MediaElement>> {
        self.video.lock().await.as_ref().map(VideoResource::media)
    }

    fn sampling_context(&self, session_id: String, media: Arc<dyn MediaElement>) -> SamplingContext {
        SamplingContext {
            session_id,
            media,
            buffer: Arc::clone(&self.buffer),
            state: Arc::clone(&self.state),
            settings: Arc::clone(&self.settings),
            dispatcher: self.dispatcher.clone(),
            events: self.events.clone(),
            interval: self.sample_interval,
            heartbeat_every_ticks: self.heartbeat_every_ticks,
        }
    }

    async fn stop_sampler(&self) -> Result<()> {
        self.sampler.lock().await.stop().await?;
        Ok(())
    }

    /// Reads progress back from the media while playing, standing in for the
    /// native `timeupdate` and `ended` events.
    async fn spawn_ticker(&self, session_id: String, media: Arc<dyn MediaElement>) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            loop {
                interval.tick().await;

                {
                    let mut state = controller.state.lock().await;
                    if state.status != PlaybackStatus::Playing
                        || state.session_id.as_deref() != Some(session_id.as_str())
                    {
                        break;
                    }
                    state.apply_native_time(media.current_time());
                }

                if media.is_ended() {
                    if let Err(e) = controller.complete_playback().await {
                        log_error!("Failed to stop sampling at end of video: {}", e);
                    }
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn emit_state_changed(&self) {
        let state = self.get_state().await;
        emit(&self.events, EngineEvent::PlaybackChanged(state));
    }
}
