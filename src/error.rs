use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::services::pipeline::PipelineState;

/// Parameter validation failure, rejected at the parameter store boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Image selection outcome other than a picked image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Selection cancelled")]
    Cancelled,

    #[error("Selection failed: {0}")]
    Failed(String),
}

/// Request descriptor could not be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server returned HTTP {status}")]
    Server { status: u16 },

    #[error("Failed to read source image: {0}")]
    Source(String),
}

impl TransferError {
    /// True for connectivity-class failures (everything but a server status)
    pub fn is_network(&self) -> bool {
        !matches!(self, TransferError::Server { .. })
    }

    /// HTTP status for server failures
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Server { status } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Empty response body")]
    Empty,

    #[error("Unrecognized payload format")]
    Unrecognized,

    #[error("Payload is {0}, not an image")]
    NotAnImage(String),

    #[error("Malformed image: {0}")]
    Malformed(String),
}

/// Failure reported by a share/save facility
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("Share declined: {0}")]
    Declined(String),

    #[error("Share facility unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("Export write error: {0}")]
    Write(#[source] Arc<std::io::Error>),

    #[error("Export share error: {0}")]
    Share(#[from] ShareError),
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Write(Arc::new(e))
    }
}

/// Error carried by the pipeline controller's `Failed` state
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("No image selected")]
    NoImage,

    #[error("Pipeline is {0}, not ready")]
    NotReady(PipelineState),

    #[error("Result no longer matches the current parameters")]
    StaleResult,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
