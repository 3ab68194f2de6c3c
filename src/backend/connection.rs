use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{EngineError, Result};
use crate::inference::InferenceService;

/// What the operator sees about the backend.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub base_url: Option<String>,
    pub is_connected: bool,
    pub is_model_loaded: bool,
    pub status: String,
    pub error: String,
}

/// Everything a prediction request needs.
#[derive(Clone)]
pub struct PredictTarget {
    pub service: Arc<dyn InferenceService>,
    pub base_url: String,
}

/// Health check and model bootstrap against the inference service.
#[derive(Clone)]
pub struct BackendConnection {
    service: Arc<dyn InferenceService>,
    state: Arc<RwLock<ConnectionState>>,
}

impl BackendConnection {
    pub fn new(service: Arc<dyn InferenceService>, base_url: Option<String>) -> Self {
        let connection = Self {
            service,
            state: Arc::new(RwLock::new(ConnectionState::default())),
        };
        connection.set_base_url(base_url);
        connection
    }

    /// Points at a different backend. Connection and model state start over.
    pub fn set_base_url(&self, base_url: Option<String>) {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        *self.write() = ConnectionState {
            base_url,
            ..ConnectionState::default()
        };
    }

    pub fn state(&self) -> ConnectionState {
        self.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.read().is_connected
    }

    pub fn is_model_loaded(&self) -> bool {
        self.read().is_model_loaded
    }

    /// Present only once a model is loaded on a configured backend.
    pub fn predict_target(&self) -> Option<PredictTarget> {
        let state = self.read();
        if !state.is_model_loaded {
            return None;
        }
        let base_url = state.base_url.clone()?;
        Some(PredictTarget {
            service: Arc::clone(&self.service),
            base_url,
        })
    }

    pub async fn test_connection(&self) -> Result<()> {
        let Some(base_url) = self.begin("Testing connection...") else {
            let err = EngineError::MissingBackendUrl;
            self.write().error = err.to_string();
            return Err(err);
        };

        match self.service.health(&base_url).await {
            Ok(health) if health.is_healthy() => {
                let mut state = self.write();
                state.is_connected = true;
                state.status = "Connected to backend".into();
                state.error.clear();
                log::info!("Connected to backend at {}", base_url);
                Ok(())
            }
            Ok(health) => {
                let mut state = self.write();
                state.is_connected = false;
                state.error = "Backend returned unexpected status".into();
                log::warn!("Backend at {} reported status '{}'", base_url, health.status);
                Err(EngineError::Connectivity(state.error.clone()))
            }
            Err(err) => {
                let err = EngineError::Connectivity(err.to_string());
                let mut state = self.write();
                state.is_connected = false;
                state.status.clear();
                state.error = err.to_string();
                log::warn!("{}", err);
                Err(err)
            }
        }
    }

    pub async fn load_model(&self) -> Result<u32> {
        if !self.is_connected() {
            let err = EngineError::NotConnected;
            self.write().error = err.to_string();
            return Err(err);
        }
        let Some(base_url) = self.begin("Loading model...") else {
            return Err(EngineError::MissingBackendUrl);
        };

        let outcome = match self.service.load_model(&base_url).await {
            Ok(response) if response.status == "success" => Ok(response.num_classes.unwrap_or(0)),
            Ok(_) => Err(EngineError::ModelLoad("Failed to load model".into())),
            Err(err) => Err(EngineError::ModelLoad(err.to_string())),
        };

        let mut state = self.write();
        match outcome {
            Ok(num_classes) => {
                state.is_model_loaded = true;
                state.status = format!("Model loaded: {num_classes} classes detected");
                state.error.clear();
                log::info!("{}", state.status);
                Ok(num_classes)
            }
            Err(err) => {
                state.status.clear();
                state.error = err.to_string();
                log::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Clears the error, sets `status`, and returns the URL to talk to.
    fn begin(&self, status: &str) -> Option<String> {
        let mut state = self.write();
        let base_url = state.base_url.clone()?;
        state.error.clear();
        state.status = status.to_string();
        Some(base_url)
    }

    fn read(&self) -> RwLockReadGuard<'_, ConnectionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConnectionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
