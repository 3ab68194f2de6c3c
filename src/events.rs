//! Engine notifications for whatever presents the engine (CLI, UI shell).

use serde::Serialize;
use tokio::sync::broadcast;

use crate::playback::PlaybackState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineEvent {
    PlaybackChanged(PlaybackState),
    #[serde(rename_all = "camelCase")]
    FrameCaptured { sequence: u64, buffered: usize },
    #[serde(rename_all = "camelCase")]
    WindowDispatched {
        session_id: String,
        request_id: u64,
        frames: usize,
    },
}

pub type EventSender = broadcast::Sender<EngineEvent>;

pub fn event_channel() -> EventSender {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Sends without caring whether anyone is listening.
pub fn emit(events: &EventSender, event: EngineEvent) {
    let _ = events.send(event);
}
