use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc};

/// Path of the generation endpoint, relative to the backend base URL.
pub const GENERATE_PATH: &str = "/generate-qr/";
/// Path of the backend health probe.
pub const HEALTH_PATH: &str = "/health";

/// Body of a generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateQrRequest {
    pub url: String,
}

/// Successful generation response.
///
/// The backend is expected to send `qr_code_url`, but a body without it is
/// still a success and leaves the image reference empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateQrResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
}

impl GenerateQrResponse {
    /// Picks `qr_code_url` out of an arbitrary JSON body.
    pub fn from_json(body: &serde_json::Value) -> Self {
        Self {
            qr_code_url: body
                .get("qr_code_url")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

/// Trait for the QR-generation backend the form talks to.
///
/// The returned futures are `Send` so a controller can be driven from axum
/// handlers on a multi-threaded runtime.
pub trait QrApi: Send + Sync + 'static {
    /// Requests a QR code for `url`. Called exactly once per submission.
    fn generate(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<GenerateQrResponse, ApiError>> + Send;

    /// Probes the backend health endpoint.
    fn health(&self) -> impl Future<Output = Result<HealthResponse, ApiError>> + Send;
}

impl<A: QrApi> QrApi for Arc<A> {
    fn generate(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<GenerateQrResponse, ApiError>> + Send {
        (**self).generate(url)
    }

    fn health(&self) -> impl Future<Output = Result<HealthResponse, ApiError>> + Send {
        (**self).health()
    }
}

/// [`QrApi`] over HTTP, rooted at a configured base URL.
#[derive(Clone, Debug)]
pub struct HttpQrApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQrApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl QrApi for HttpQrApi {
    async fn generate(&self, url: &str) -> Result<GenerateQrResponse, ApiError> {
        let target = self.endpoint(GENERATE_PATH);
        log::debug!("POST {target}");

        // `json` sets `Content-Type: application/json`
        let response = self
            .client
            .post(&target)
            .json(&GenerateQrRequest {
                url: url.to_string(),
            })
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        if !body.is_object() {
            return Err(ApiError::Decode(format!("expected a JSON object, got `{body}`")));
        }

        Ok(GenerateQrResponse::from_json(&body))
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        let response = self
            .client
            .get(self.endpoint(HEALTH_PATH))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        response
            .json::<HealthResponse>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}
