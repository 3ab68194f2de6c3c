//! Wire shapes of the inference service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: Option<bool>,
    #[serde(default)]
    pub device: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadModelResponse {
    pub status: String,
    #[serde(default)]
    pub num_classes: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub frames: &'a [String],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predicted_phase: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub predicted_class: Option<i64>,
    #[serde(default)]
    pub num_frames: Option<usize>,
}

impl PredictResponse {
    /// The phase label, if the service produced a non-empty one.
    pub fn phase(&self) -> Option<&str> {
        self.predicted_phase.as_deref().filter(|p| !p.is_empty())
    }
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}
