use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use crate::backend::BackendConnection;
use crate::error::ServiceError;
use crate::events::{emit, EngineEvent, EventSender};
use crate::models::Window;

use super::actor::{ResultCommand, ResultHandle};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const PREDICT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends windows to the inference service without waiting for the answer.
///
/// Requests are not serialized: a slow response does not hold back the next
/// window, and results are applied in whatever order they come back.
#[derive(Clone)]
pub struct InferenceDispatcher {
    backend: BackendConnection,
    results: ResultHandle,
    events: EventSender,
    next_request_id: Arc<AtomicU64>,
    timeout: Duration,
}

impl InferenceDispatcher {
    pub fn new(backend: BackendConnection, results: ResultHandle, events: EventSender) -> Self {
        Self {
            backend,
            results,
            events,
            next_request_id: Arc::new(AtomicU64::new(1)),
            timeout: PREDICT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Starts a prediction for `window` and returns its request id, or `None`
    /// when no model is loaded on a configured backend.
    pub fn dispatch(&self, window: Window) -> Option<u64> {
        let Some(target) = self.backend.predict_target() else {
            log_debug!(
                "Skipping dispatch of {} frames: no model loaded",
                window.len()
            );
            return None;
        };

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let session_id = window.session_id.clone();
        let frame_count = window.len();

        self.results.send(ResultCommand::RequestStarted {
            session_id: session_id.clone(),
            request_id,
        });
        emit(
            &self.events,
            EngineEvent::WindowDispatched {
                session_id: session_id.clone(),
                request_id,
                frames: frame_count,
            },
        );
        log_info!(
            "Dispatching prediction {} ({} frames, span {:?})",
            request_id,
            frame_count,
            window.span()
        );

        let results = self.results.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let frames = window.to_data_urls();
            drop(window);

            let outcome = match tokio::time::timeout(
                timeout,
                target.service.predict(&target.base_url, frames),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ServiceError::Timeout(timeout.as_secs())),
            };

            results.send(ResultCommand::RequestFinished {
                session_id,
                request_id,
                outcome,
            });
        });

        Some(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::inference::{spawn_result_actor, InferenceService, NOT_PREDICTED};
    use crate::models::{Frame, HealthResponse, LoadModelResponse, PredictResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Reply = Result<PredictResponse, ServiceError>;

    /// Each predict call parks until the test releases it through the
    /// matching sender.
    #[derive(Default)]
    struct GatedService {
        gates: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        calls: Mutex<Vec<usize>>,
    }

    impl GatedService {
        fn gate(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl InferenceService for GatedService {
        async fn health(&self, _: &str) -> Result<HealthResponse, ServiceError> {
            Ok(HealthResponse {
                status: "healthy".into(),
                model_loaded: Some(true),
                device: None,
            })
        }

        async fn load_model(&self, _: &str) -> Result<LoadModelResponse, ServiceError> {
            Ok(LoadModelResponse {
                status: "success".into(),
                num_classes: Some(7),
                message: None,
            })
        }

        async fn predict(&self, _: &str, frames: Vec<String>) -> Result<PredictResponse, ServiceError> {
            self.calls.lock().unwrap().push(frames.len());
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(gate) => gate.await.unwrap_or_else(|_| Err(ServiceError::Malformed("gate dropped".into()))),
                None => std::future::pending().await,
            }
        }
    }

    fn phase(name: &str, confidence: f64) -> Reply {
        Ok(PredictResponse {
            predicted_phase: Some(name.into()),
            confidence: Some(confidence),
            ..PredictResponse::default()
        })
    }

    fn window(session: &str, frames: usize) -> Window {
        Window {
            session_id: session.into(),
            frames: (1..=frames as u64).map(|seq| Frame::new(vec![0xFF, 0xD8], seq, 0.0)).collect(),
        }
    }

    async fn ready_backend(service: Arc<GatedService>) -> BackendConnection {
        let backend = BackendConnection::new(service, Some("http://stub".into()));
        backend.test_connection().await.unwrap();
        backend.load_model().await.unwrap();
        backend
    }

    async fn wait_until(results: &ResultHandle, check: impl Fn(&crate::inference::ResultSnapshot) -> bool) {
        let mut rx = results.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| check(s)))
            .await
            .expect("result state never reached expected value")
            .unwrap();
    }

    #[tokio::test]
    async fn dispatch_is_noop_without_loaded_model() {
        let service = Arc::new(GatedService::default());
        let backend = BackendConnection::new(service.clone(), Some("http://stub".into()));
        let (results, _actor) = spawn_result_actor();
        let dispatcher = InferenceDispatcher::new(backend, results.clone(), event_channel());

        assert!(dispatcher.dispatch(window("s", 3)).is_none());
        let snapshot = results.flush().await;
        assert!(!snapshot.is_processing);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_resolved_wins_over_last_dispatched() {
        let service = Arc::new(GatedService::default());
        let backend = ready_backend(service.clone()).await;
        let (results, _actor) = spawn_result_actor();
        results.begin_session("s");
        let dispatcher = InferenceDispatcher::new(backend, results.clone(), event_channel());

        let gate_a = service.gate();
        let gate_b = service.gate();
        let a = dispatcher.dispatch(window("s", 20)).unwrap();
        // Let A's task claim the first gate before B is spawned.
        wait_for_calls(&service, 1).await;
        let b = dispatcher.dispatch(window("s", 20)).unwrap();
        wait_for_calls(&service, 2).await;
        assert!(results.flush().await.is_processing);

        gate_b.send(phase("B", 0.7)).unwrap();
        wait_until(&results, |s| s.applied_request == Some(b)).await;
        assert_eq!(results.snapshot().phase, "B");
        assert!(results.snapshot().is_processing);

        gate_a.send(phase("A", 0.4)).unwrap();
        wait_until(&results, |s| s.applied_request == Some(a)).await;
        let snapshot = results.snapshot();
        assert_eq!(snapshot.phase, "A");
        assert_eq!(snapshot.confidence, Some(0.4));
        assert!(!snapshot.is_processing);
    }

    #[tokio::test]
    async fn failure_is_absorbed_and_clears_processing() {
        let service = Arc::new(GatedService::default());
        let backend = ready_backend(service.clone()).await;
        let (results, _actor) = spawn_result_actor();
        results.begin_session("s");
        let dispatcher = InferenceDispatcher::new(backend, results.clone(), event_channel());

        let ok = service.gate();
        dispatcher.dispatch(window("s", 2)).unwrap();
        ok.send(phase("Preparation", 0.9)).unwrap();
        wait_until(&results, |s| s.phase == "Preparation" && !s.is_processing).await;

        let failing = service.gate();
        dispatcher.dispatch(window("s", 2)).unwrap();
        failing.send(Err(ServiceError::status(500, "Prediction failed: CUDA OOM"))).unwrap();
        wait_until(&results, |s| !s.is_processing).await;

        let snapshot = results.flush().await;
        assert_eq!(snapshot.phase, "Preparation");
        assert_eq!(snapshot.confidence, Some(0.9));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_prediction_times_out() {
        let service = Arc::new(GatedService::default());
        let backend = ready_backend(service.clone()).await;
        let (results, _actor) = spawn_result_actor();
        results.begin_session("s");
        let dispatcher = InferenceDispatcher::new(backend, results.clone(), event_channel())
            .with_timeout(Duration::from_secs(2));

        // No gate queued: predict never resolves on its own.
        dispatcher.dispatch(window("s", 2)).unwrap();
        assert!(results.flush().await.is_processing);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let snapshot = results.flush().await;
        assert!(!snapshot.is_processing);
        assert_eq!(snapshot.phase, NOT_PREDICTED);
    }

    #[tokio::test]
    async fn stale_session_result_is_not_applied() {
        let service = Arc::new(GatedService::default());
        let backend = ready_backend(service.clone()).await;
        let (results, _actor) = spawn_result_actor();
        results.begin_session("first-video");
        let dispatcher = InferenceDispatcher::new(backend, results.clone(), event_channel());

        let gate = service.gate();
        dispatcher.dispatch(window("first-video", 5)).unwrap();
        results.begin_session("second-video");
        gate.send(phase("Stale", 0.99)).unwrap();
        wait_until(&results, |s| !s.is_processing).await;

        let snapshot = results.flush().await;
        assert_eq!(snapshot.phase, NOT_PREDICTED);
        assert_eq!(snapshot.session_id.as_deref(), Some("second-video"));
    }

    async fn wait_for_calls(service: &GatedService, count: usize) {
        for _ in 0..500 {
            if service.calls.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("predict was not called {count} times");
    }
}
