mod wire;

use async_trait::async_trait;
use exam_core::model::{Exam, ExamCode, SubmissionResult};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::boundary::{ExamSource, GatewayError, GradingGateway, SubmissionRequest};
use crate::config::GatewayConfig;

use wire::{ErrorBody, ExamBody, HealthBody};

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Unreachable(err.to_string())
}

/// Exam service client over HTTP/JSON.
///
/// Server errors (5xx) and transport failures are reported as `Unreachable`
/// so the caller knows a retry may help; other non-success statuses are
/// domain rejections.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn failure(response: Response) -> GatewayError {
        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error);
        classify_failure(status, message)
    }
}

/// Maps a non-success status to a gateway error. Server errors may clear up on
/// retry; anything else is the service refusing the request.
fn classify_failure(status: StatusCode, message: Option<String>) -> GatewayError {
    let message = message.unwrap_or_else(|| status.to_string());
    if status.is_server_error() {
        GatewayError::Unreachable(message)
    } else {
        GatewayError::Rejected(message)
    }
}

#[async_trait]
impl ExamSource for HttpGateway {
    async fn load_exam(&self, code: &ExamCode) -> Result<Exam, GatewayError> {
        let url = self.config.endpoint(["get-exam", code.as_str()]);
        tracing::debug!(%url, "loading exam");

        let response = self.client.get(url).send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ExamNotFound(code.clone()));
        }
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: ExamBody = Self::read_json(response).await?;
        wire::map_exam(code, body)
    }
}

#[async_trait]
impl GradingGateway for HttpGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult, GatewayError> {
        let url = self.config.endpoint(["submit-exam"]);
        tracing::debug!(
            %url,
            exam_code = %request.exam_code,
            answered = request.answers.len(),
            "submitting answers"
        );

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: serde_json::Value = Self::read_json(response).await?;
        wire::map_submission(body)
    }

    async fn health(&self) -> Result<(), GatewayError> {
        let url = self.config.endpoint(["health"]);
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() && !status.is_server_error() {
            return Err(Self::failure(response).await);
        }

        // The service reports its own diagnosis in the body, even on 500.
        match Self::read_json::<HealthBody>(response).await {
            Ok(body) => wire::map_health(body),
            Err(_) if status.is_server_error() => {
                Err(GatewayError::Unreachable(status.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}
