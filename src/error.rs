//! Error taxonomy for the sampling engine and its backend collaborators.

use thiserror::Error;

/// Failures surfaced to the operator, plus the prediction failure that the
/// dispatch path logs and absorbs.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Please enter a backend URL")]
    MissingBackendUrl,

    #[error("Failed to connect to backend: {0}")]
    Connectivity(String),

    #[error("Please connect to backend first")]
    NotConnected,

    #[error("Error loading model: {0}")]
    ModelLoad(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("no video loaded")]
    NoVideoLoaded,

    #[error("video has ended; load a new video to play it again")]
    PlaybackEnded,

    #[error("invalid sampling settings: {0}")]
    InvalidSettings(String),

    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// Failures of a single request against the inference service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response. `detail` comes from the `{detail}` body when present.
    #[error("{detail}")]
    Status { code: u16, detail: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl ServiceError {
    pub fn status(code: u16, detail: impl Into<String>) -> Self {
        ServiceError::Status {
            code,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
