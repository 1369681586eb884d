//! Assertion helpers for tests.

use pretty_assertions::assert_eq;
use stitchkit::error::PipelineError;
use stitchkit::services::{PipelineController, PipelineState};

/// Assert the controller is in the expected state, showing its error if not
pub fn assert_state(pipeline: &PipelineController, expected: PipelineState) {
    assert_eq!(
        pipeline.state(),
        expected,
        "Unexpected pipeline state (error: {:?})",
        pipeline.error().map(ToString::to_string)
    );
}

/// Assert the controller failed, returning its error
pub fn assert_failed(pipeline: &PipelineController) -> PipelineError {
    assert_state(pipeline, PipelineState::Failed);
    assert!(
        pipeline.result().is_none() || matches!(pipeline.error(), Some(PipelineError::Export(_))),
        "Failed pipeline should not expose a result"
    );
    pipeline.error().cloned().expect("Failed state carries an error")
}

/// Assert bytes are a PNG
pub fn assert_png_bytes(bytes: &[u8]) {
    assert!(
        bytes.starts_with(&[0x89, b'P', b'N', b'G']),
        "Expected PNG bytes, got {} bytes starting with {:?}",
        bytes.len(),
        &bytes[..8.min(bytes.len())]
    );
}
