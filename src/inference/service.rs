use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::{
    api::ErrorBody, HealthResponse, LoadModelResponse, PredictRequest, PredictResponse,
};

/// The remote classifier.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn health(&self, base_url: &str) -> Result<HealthResponse, ServiceError>;

    async fn load_model(&self, base_url: &str) -> Result<LoadModelResponse, ServiceError>;

    /// `frames` are `data:` URLs of JPEG stills, oldest first.
    async fn predict(
        &self,
        base_url: &str,
        frames: Vec<String>,
    ) -> Result<PredictResponse, ServiceError>;
}

/// `InferenceService` over HTTP with JSON bodies.
#[derive(Clone)]
pub struct HttpInferenceClient {
    client: Client,
}

impl HttpInferenceClient {
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build HTTP client: {err}"))?;
        Ok(Self { client })
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[async_trait]
impl InferenceService for HttpInferenceClient {
    async fn health(&self, base_url: &str) -> Result<HealthResponse, ServiceError> {
        let response = self.client.get(endpoint(base_url, "health")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::status(
                status.as_u16(),
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ),
            ));
        }

        read_json(response).await
    }

    async fn load_model(&self, base_url: &str) -> Result<LoadModelResponse, ServiceError> {
        let response = self
            .client
            .post(endpoint(base_url, "load-model"))
            .send()
            .await?;
        read_json(response).await
    }

    async fn predict(
        &self,
        base_url: &str,
        frames: Vec<String>,
    ) -> Result<PredictResponse, ServiceError> {
        let response = self
            .client
            .post(endpoint(base_url, "predict"))
            .json(&PredictRequest { frames: &frames })
            .send()
            .await?;
        read_json(response).await
    }
}

/// Decodes a 2xx body as `T`; turns anything else into `ServiceError::Status`
/// using the `detail` field, the reason phrase, or `HTTP <code>`, in that order.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let code = status.as_u16();
        let detail = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.detail.filter(|d| !d.is_empty()),
            Err(_) => status
                .canonical_reason()
                .filter(|reason| !reason.is_empty())
                .map(str::to_string),
        };
        return Err(ServiceError::status(
            code,
            detail.unwrap_or_else(|| format!("HTTP {code}")),
        ));
    }

    serde_json::from_str(&body).map_err(|err| ServiceError::Malformed(err.to_string()))
}
