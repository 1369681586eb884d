//! Turns the service's raw response bytes into a [`TransformResult`].
//!
//! The payload type is sniffed from its magic bytes. The service's
//! `Content-Type` is ignored: some deployments label PNG output as
//! `application/pdf`.

use base64::Engine;

use crate::error::DecodeError;
use crate::models::{RequestId, TransformResult};

/// Stem of the exported filename (`image.png`, `image.jpg`, ...)
const EXPORT_STEM: &str = "image";

/// PNGs up to this many pixels are fully decoded to catch truncated data
const MAX_VALIDATED_PIXELS: u64 = 40_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a response payload. Read-only; the payload is kept byte for byte.
    pub fn decode(
        &self,
        request_id: RequestId,
        payload: Vec<u8>,
    ) -> Result<TransformResult, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        let kind = infer::get(&payload).ok_or(DecodeError::Unrecognized)?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(DecodeError::NotAnImage(kind.mime_type().to_string()));
        }

        let dimensions = match kind.mime_type() {
            "image/png" => Some(validate_png(&payload)?),
            "image/jpeg" => {
                validate_jpeg(&payload)?;
                None
            }
            _ => None,
        };

        let mime_type = kind.mime_type().to_string();
        let renderable_encoding = format!(
            "data:{mime_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&payload)
        );

        tracing::debug!(
            request_id = %request_id,
            mime = %mime_type,
            bytes = payload.len(),
            ?dimensions,
            "Decoded transform response"
        );

        Ok(TransformResult {
            for_request_id: request_id,
            exportable_name: format!("{EXPORT_STEM}.{}", kind.extension()),
            mime_type,
            renderable_encoding,
            dimensions,
            payload,
        })
    }
}

fn validate_png(payload: &[u8]) -> Result<(u32, u32), DecodeError> {
    let decoder = png::Decoder::new(payload);
    let mut reader = decoder
        .read_info()
        .map_err(|e| DecodeError::Malformed(format!("PNG header: {e}")))?;

    let (width, height) = {
        let info = reader.info();
        (info.width, info.height)
    };

    if (width as u64) * (height as u64) <= MAX_VALIDATED_PIXELS {
        let mut buf = vec![0; reader.output_buffer_size()];
        reader
            .next_frame(&mut buf)
            .map_err(|e| DecodeError::Malformed(format!("PNG data: {e}")))?;
    }

    Ok((width, height))
}

fn validate_jpeg(payload: &[u8]) -> Result<(), DecodeError> {
    // SOI is guaranteed by the sniffer; a missing EOI means a truncated body
    let has_eoi = payload.windows(2).skip(2).any(|w| w == [0xFF, 0xD9]);
    if has_eoi {
        Ok(())
    } else {
        Err(DecodeError::Malformed("JPEG is missing its end marker".to_string()))
    }
}
