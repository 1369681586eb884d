use base64::Engine;
use serde::Serialize;
use std::path::PathBuf;

use super::RequestId;

/// Decoded response for one request, ready to render and export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Request this result answers
    pub for_request_id: RequestId,
    /// Raw bytes exactly as returned by the service
    pub payload: Vec<u8>,
    /// MIME type sniffed from the payload
    pub mime_type: String,
    /// `data:` URI for direct display
    pub renderable_encoding: String,
    /// Filename used when exporting (e.g. `image.png`)
    pub exportable_name: String,
    /// Pixel dimensions when the format header exposes them
    pub dimensions: Option<(u32, u32)>,
}

impl TransformResult {
    /// Decode the renderable `data:` URI back into bytes
    pub fn renderable_bytes(&self) -> Option<Vec<u8>> {
        let (_, data) = self.renderable_encoding.split_once(";base64,")?;
        base64::engine::general_purpose::STANDARD.decode(data).ok()
    }

    /// Bytes to write when exporting
    pub fn exportable_bytes(&self) -> &[u8] {
        &self.payload
    }
}

/// Durable artifact produced by an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportHandle {
    pub path: PathBuf,
    pub mime_type: String,
    pub bytes_written: usize,
    /// Hex SHA-256 of the exported content
    pub digest: String,
    pub exported_at: chrono::DateTime<chrono::Utc>,
}
