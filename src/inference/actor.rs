use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{EngineError, ServiceError};
use crate::models::PredictResponse;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const NOT_PREDICTED: &str = "Not predicted yet";

/// Messages accepted by the result actor. The actor is the only writer of
/// the displayed phase and confidence.
#[derive(Debug)]
pub enum ResultCommand {
    /// A new video was loaded; clears the displayed result and makes
    /// `session_id` the only session whose responses are applied.
    BeginSession { session_id: String },
    RequestStarted { session_id: String, request_id: u64 },
    RequestFinished {
        session_id: String,
        request_id: u64,
        outcome: Result<PredictResponse, ServiceError>,
    },
    /// Replies once every earlier command has been applied.
    Flush(oneshot::Sender<ResultSnapshot>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub session_id: Option<String>,
    pub phase: String,
    pub confidence: Option<f64>,
    /// Requests of any session still awaiting a response.
    pub in_flight: usize,
    pub is_processing: bool,
    /// Request whose response produced the current phase.
    pub applied_request: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ResultSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            phase: NOT_PREDICTED.to_string(),
            confidence: None,
            in_flight: 0,
            is_processing: false,
            applied_request: None,
            updated_at: None,
        }
    }
}

impl ResultSnapshot {
    /// Applies one command. Responses overwrite the result in the order they
    /// arrive, not the order they were dispatched.
    fn apply(&mut self, command: ResultCommand) {
        match command {
            ResultCommand::BeginSession { session_id } => {
                log_debug!("Result state now tracking session {}", session_id);
                *self = Self {
                    session_id: Some(session_id),
                    in_flight: self.in_flight,
                    is_processing: self.is_processing,
                    ..Self::default()
                };
            }
            ResultCommand::RequestStarted { request_id, .. } => {
                self.in_flight += 1;
                log_debug!("Prediction {} started ({} in flight)", request_id, self.in_flight);
            }
            ResultCommand::RequestFinished {
                session_id,
                request_id,
                outcome,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.apply_outcome(&session_id, request_id, outcome);
            }
            ResultCommand::Flush(_) => {}
        }
        self.is_processing = self.in_flight > 0;
    }

    fn apply_outcome(
        &mut self,
        session_id: &str,
        request_id: u64,
        outcome: Result<PredictResponse, ServiceError>,
    ) {
        if self.session_id.as_deref() != Some(session_id) {
            log_info!(
                "Dropping prediction {} from stale session {}",
                request_id,
                session_id
            );
            return;
        }

        match outcome {
            Ok(response) => {
                let Some(phase) = response.phase() else {
                    log_warn!("Prediction {} returned no phase; keeping previous result", request_id);
                    return;
                };
                self.phase = phase.to_string();
                self.confidence = response.confidence;
                self.applied_request = Some(request_id);
                self.updated_at = Some(Utc::now());
                log_info!(
                    "Phase updated to '{}' (confidence {:?}) by prediction {}",
                    self.phase,
                    self.confidence,
                    request_id
                );
            }
            Err(err) => {
                let err = EngineError::Prediction(err.to_string());
                log_warn!("Prediction {} failed: {}", request_id, err);
            }
        }
    }
}

/// Cheap, cloneable access to the result actor.
#[derive(Clone)]
pub struct ResultHandle {
    tx: mpsc::UnboundedSender<ResultCommand>,
    snapshot_rx: watch::Receiver<ResultSnapshot>,
}

impl ResultHandle {
    pub fn send(&self, command: ResultCommand) {
        if self.tx.send(command).is_err() {
            log_warn!("Result actor has stopped; dropping command");
        }
    }

    pub fn begin_session(&self, session_id: impl Into<String>) {
        self.send(ResultCommand::BeginSession {
            session_id: session_id.into(),
        });
    }

    /// Latest published snapshot. Commands still queued are not reflected.
    pub fn snapshot(&self) -> ResultSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits until every command sent so far has been applied.
    pub async fn flush(&self) -> ResultSnapshot {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ResultCommand::Flush(reply_tx));
        match reply_rx.await {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }
}

/// Spawns the actor. It runs until every `ResultHandle` is dropped.
pub fn spawn_result_actor() -> (ResultHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ResultCommand>();
    let (snapshot_tx, snapshot_rx) = watch::channel(ResultSnapshot::default());

    let handle = tokio::spawn(async move {
        let mut state = ResultSnapshot::default();
        while let Some(command) = rx.recv().await {
            if let ResultCommand::Flush(reply) = command {
                let _ = reply.send(state.clone());
                continue;
            }
            state.apply(command);
            snapshot_tx.send_replace(state.clone());
        }
        log_debug!("Result actor shutting down");
    });

    (ResultHandle { tx, snapshot_rx }, handle)
}
