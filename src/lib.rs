pub mod backend;
pub mod error;
pub mod events;
pub mod inference;
pub mod media;
pub mod models;
pub mod playback;
pub mod sampling;
pub mod settings;
pub mod utils;
pub mod window;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::{sync::broadcast, task::JoinHandle};

use backend::{BackendConnection, ConnectionState};
use events::{event_channel, EngineEvent, EventSender};
use inference::{spawn_result_actor, HttpInferenceClient, InferenceDispatcher, InferenceService, ResultHandle};
use media::{FrameSequenceMedia, MediaElement, VideoResource};
use playback::{PlaybackController, PlaybackState, PlaybackStatus};
use settings::{SamplingSettings, SettingsStore};
use utils::format_time;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Plays a video, samples frames while it plays, and streams windows of them to a surgical phase classifier."
)]
pub struct Cli {
    /// Directory of still frames making up the video, played in file-name order
    #[arg(long, short)]
    pub video: PathBuf,

    /// Nominal frame rate of the frame directory
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Base URL of the inference service
    #[arg(long, short, env = "SURGIPHASE_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Frames per prediction request
    #[arg(long)]
    pub frames_per_dispatch: Option<usize>,

    #[arg(long)]
    pub min_buffer: Option<usize>,

    /// Upper bound on buffered frames between dispatches
    #[arg(long)]
    pub max_buffer: Option<usize>,

    /// JSON settings file; read at startup and written on change
    #[arg(long, env = "SURGIPHASE_SETTINGS")]
    pub settings: Option<PathBuf>,
}

/// Everything one running player needs, wired together.
pub struct Engine {
    pub settings: Arc<SettingsStore>,
    pub backend: BackendConnection,
    pub results: ResultHandle,
    pub playback: PlaybackController,
    pub events: EventSender,
    result_actor: JoinHandle<()>,
}

impl Engine {
    pub fn new(settings: Arc<SettingsStore>, service: Arc<dyn InferenceService>) -> Self {
        let backend = BackendConnection::new(service, settings.backend_url());
        let events = event_channel();
        let (results, result_actor) = spawn_result_actor();
        let dispatcher = InferenceDispatcher::new(backend.clone(), results.clone(), events.clone());
        let playback = PlaybackController::new(
            Arc::clone(&settings),
            dispatcher,
            results.clone(),
            events.clone(),
        );

        Self {
            settings,
            backend,
            results,
            playback,
            events,
            result_actor,
        }
    }

    /// Points the engine at another backend. Connection and model state start over.
    pub fn set_backend_url(&self, url: Option<String>) -> Result<ConnectionState> {
        let url = url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        self.settings.update_backend_url(url.clone())?;
        self.backend.set_base_url(url);
        Ok(self.backend.state())
    }

    /// Health check followed by model load.
    pub async fn connect(&self) -> Result<u32> {
        self.backend.test_connection().await?;
        let classes = self.backend.load_model().await?;
        Ok(classes)
    }

    pub fn update_sampling(&self, sampling: SamplingSettings) -> Result<SamplingSettings> {
        self.settings.update_sampling(sampling)?;
        Ok(self.settings.sampling())
    }

    pub async fn open_video(&self, dir: PathBuf, fps: f64) -> Result<PlaybackState> {
        let media = tokio::task::spawn_blocking({
            let dir = dir.clone();
            move || FrameSequenceMedia::open(&dir, fps)
        })
        .await
        .context("video open task failed")??;
        let media: Arc<dyn MediaElement> = Arc::new(media);
        self.playback.load_video(VideoResource::new(dir, media)).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.playback.shutdown().await?;
        self.result_actor.abort();
        Ok(())
    }
}

fn load_settings(cli: &Cli) -> Result<SettingsStore> {
    let store = match &cli.settings {
        Some(path) => SettingsStore::new(path.clone())?,
        None => SettingsStore::in_memory(),
    };

    if cli.backend_url.is_some() {
        store.update_backend_url(cli.backend_url.clone())?;
    }

    let current = store.sampling();
    let requested = SamplingSettings {
        frames_per_dispatch: cli.frames_per_dispatch.unwrap_or(current.frames_per_dispatch),
        min_buffer: cli.min_buffer.unwrap_or(current.min_buffer),
        max_buffer: cli.max_buffer.unwrap_or(current.max_buffer),
    };
    if requested != current {
        store.update_sampling(requested)?;
    }

    Ok(store)
}

async fn play_to_end(engine: &Engine, cli: &Cli) -> Result<()> {
    match engine.connect().await {
        Ok(classes) => info!("Model ready with {} classes", classes),
        Err(err) => warn!("{}; playing without predictions", err),
    }

    let state = engine.open_video(cli.video.clone(), cli.fps).await?;
    info!(
        "Video ready: {} ({} long)",
        cli.video.display(),
        format_time(Some(state.duration))
    );

    let mut events = engine.subscribe();
    let mut results = engine.results.subscribe();
    engine.playback.play().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping playback");
                engine.playback.pause().await?;
                break;
            }
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let result = results.borrow_and_update().clone();
                let snapshot = engine.playback.snapshot().await;
                info!(
                    "[{} / {}] phase: {} ({}){}",
                    snapshot.current_time_label,
                    snapshot.duration_label,
                    result.phase,
                    result
                        .confidence
                        .map(|c| format!("{:.1}%", c * 100.0))
                        .unwrap_or_else(|| "-".into()),
                    if result.is_processing { " processing" } else { "" }
                );
            }
            event = events.recv() => match event {
                Ok(EngineEvent::PlaybackChanged(state)) if state.status == PlaybackStatus::Ended => {
                    info!(
                        "Playback ended at {} after {} frames",
                        format_time(Some(state.current_time)),
                        state.frames_captured
                    );
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} engine events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    let last = engine.results.flush().await;
    info!("Last phase: {}", last.phase);
    Ok(())
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    info!("surgiphase starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let settings = Arc::new(load_settings(&cli)?);
        let client = HttpInferenceClient::new(CONNECT_TIMEOUT)?;
        let engine = Engine::new(settings, Arc::new(client));

        let outcome = play_to_end(&engine, &cli).await;
        engine.shutdown().await?;
        outcome
    })
}
