use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::error::TransferError;
use crate::models::{AppConfig, RequestId, TransformRequest};

/// Remote transformation service as seen by the pipeline
#[async_trait]
pub trait TransformService: Send + Sync {
    /// One round trip: raw response bytes on a 2xx status.
    ///
    /// No retries; failures surface immediately.
    async fn send(&self, request: &TransformRequest) -> Result<Vec<u8>, TransferError>;
}

/// Transfer result tagged with the request it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub request_id: RequestId,
    pub result: Result<Vec<u8>, TransferError>,
}

/// Send a request and tag the outcome with its id, so the controller can drop
/// answers to superseded requests.
pub async fn dispatch(service: &dyn TransformService, request: &TransformRequest) -> TransferOutcome {
    tracing::info!(
        request_id = %request.id,
        params = %request.parameters,
        "Sending transform request"
    );
    let result = service.send(request).await;
    match &result {
        Ok(body) => tracing::debug!(request_id = %request.id, bytes = body.len(), "Transfer complete"),
        Err(e) => tracing::warn!(request_id = %request.id, error = %e, "Transfer failed"),
    }
    TransferOutcome {
        request_id: request.id,
        result,
    }
}

/// reqwest-backed client for the transformation service
pub struct HttpTransferClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransferClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("stitchkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransferError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TransferError> {
        Self::new(config.request_timeout(), config.connect_timeout())
    }

    async fn build_form(request: &TransformRequest) -> Result<Form, TransferError> {
        let bytes = request
            .image
            .locator()
            .read_bytes()
            .await
            .map_err(|e| TransferError::Source(format!("{}: {e}", request.image.locator())))?;

        let part = Part::bytes(bytes)
            .file_name(request.image.suggested_name().to_string())
            .mime_str(request.image.mime_type())
            .map_err(|e| TransferError::Source(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new().part(request.file_field.clone(), part);
        for (name, value) in &request.form_fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> TransferError {
        if e.is_timeout() {
            TransferError::Timeout(self.timeout)
        } else if e.is_connect() {
            TransferError::Network(format!("Connection failed: {e}"))
        } else {
            TransferError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl TransformService for HttpTransferClient {
    async fn send(&self, request: &TransformRequest) -> Result<Vec<u8>, TransferError> {
        let form = Self::build_form(request).await?;

        let response = self
            .client
            .post(request.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            // Failure bodies are never treated as image data
            return Err(TransferError::Server {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        Ok(body.to_vec())
    }
}
