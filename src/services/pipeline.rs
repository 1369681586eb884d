//! Pipeline controller: the state machine that sequences selection, request
//! building, transfer, decoding and export for one interactive session.
//!
//! ```text
//!  Idle ──pick──▶ AwaitingSelection ──cancel/fail──▶ Idle
//!                        │ image
//!                        ▼
//!                   Requesting ──NetworkError/ServerError──▶ Failed
//!                        │ response (current id)               │ retry
//!                        ▼                                      ▼
//!                    Decoding ──DecodeError──▶ Failed    AwaitingSelection
//!                        │                                  / Requesting
//!                        ▼
//!                      Ready ◀──ok── Exporting ──error──▶ Failed (result kept)
//! ```
//!
//! Every suspension point (picker, transfer, export) has a begin/finish pair
//! so a host event loop can interleave user actions with in-flight work.
//! Outcomes are tagged with their [`RequestId`]; anything that does not match
//! the current request is dropped without a transition.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{
    ConfigError, ExportError, ParameterError, PipelineError, SelectionError,
};
use crate::models::{
    AppConfig, ExportHandle, RequestId, SourceImage, TransformParameters, TransformRequest,
    TransformResult,
};
use crate::services::{
    dispatch, ExportManager, ImagePicker, ParameterStore, RequestBuilder, ResponseDecoder,
    ShareSink, TransferOutcome, TransformService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    AwaitingSelection,
    Requesting,
    Decoding,
    Ready,
    Exporting,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::AwaitingSelection => "awaiting selection",
            PipelineState::Requesting => "requesting",
            PipelineState::Decoding => "decoding",
            PipelineState::Ready => "ready",
            PipelineState::Exporting => "exporting",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to an outcome handed to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Belonged to the current request and drove a transition
    Applied,
    /// Belonged to a superseded request (or arrived twice) and was dropped
    Discarded,
}

pub struct PipelineController {
    params: ParameterStore,
    builder: RequestBuilder,
    decoder: ResponseDecoder,
    service: Arc<dyn TransformService>,
    exporter: ExportManager,
    state: PipelineState,
    image: Option<SourceImage>,
    current: Option<TransformRequest>,
    result: Option<TransformResult>,
    error: Option<PipelineError>,
}

impl PipelineController {
    pub fn new(
        initial: TransformParameters,
        builder: RequestBuilder,
        service: Arc<dyn TransformService>,
        exporter: ExportManager,
    ) -> Self {
        Self {
            params: ParameterStore::new(initial),
            builder,
            decoder: ResponseDecoder::new(),
            service,
            exporter,
            state: PipelineState::Idle,
            image: None,
            current: None,
            result: None,
            error: None,
        }
    }

    /// Wire a controller from configuration
    pub fn from_config(
        config: &AppConfig,
        service: Arc<dyn TransformService>,
        share: Arc<dyn ShareSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let builder = RequestBuilder::new(config.endpoint_url()?, config.image_field.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let exporter = ExportManager::new(&config.export_dir, share);
        Ok(Self::new(
            config.default_parameters()?,
            builder,
            service,
            exporter,
        ))
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn parameters(&self) -> TransformParameters {
        self.params.snapshot()
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn current_request(&self) -> Option<&TransformRequest> {
        self.current.as_ref()
    }

    pub fn current_request_id(&self) -> Option<RequestId> {
        self.current.as_ref().map(|r| r.id)
    }

    /// Last decoded result, if it still belongs to the current request
    pub fn result(&self) -> Option<&TransformResult> {
        self.result
            .as_ref()
            .filter(|r| Some(r.for_request_id) == self.current_request_id())
    }

    /// Error behind the `Failed` state (or the last failed selection)
    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn service(&self) -> Arc<dyn TransformService> {
        Arc::clone(&self.service)
    }

    pub fn exporter(&self) -> &ExportManager {
        &self.exporter
    }

    // --- selection -------------------------------------------------------

    /// Enter `AwaitingSelection`. Interest in any in-flight work is dropped.
    pub fn begin_selection(&mut self) {
        if let Some(request) = &self.current {
            tracing::debug!(request_id = %request.id, "Selection supersedes current request");
        }
        self.current = None;
        self.result = None;
        self.error = None;
        self.transition(PipelineState::AwaitingSelection);
    }

    /// Apply the picker's answer. A picked image immediately issues a request
    /// with the current parameters.
    pub fn finish_selection(
        &mut self,
        outcome: Result<SourceImage, SelectionError>,
    ) -> Result<TransformRequest, PipelineError> {
        if self.state != PipelineState::AwaitingSelection {
            return Err(PipelineError::NotReady(self.state));
        }

        match outcome {
            Ok(image) => {
                tracing::info!(
                    image = %image.locator(),
                    mime = %image.mime_type(),
                    "Image selected"
                );
                self.image = Some(image);
                self.issue_request()
            }
            Err(e) => {
                if e != SelectionError::Cancelled {
                    tracing::warn!(error = %e, "Image selection failed");
                    self.error = Some(e.clone().into());
                }
                self.transition(PipelineState::Idle);
                Err(e.into())
            }
        }
    }

    /// Run the picker and apply its answer
    pub async fn select_image(
        &mut self,
        picker: &dyn ImagePicker,
    ) -> Result<TransformRequest, PipelineError> {
        self.begin_selection();
        let outcome = picker.select().await;
        self.finish_selection(outcome)
    }

    // --- parameters ------------------------------------------------------

    /// Update the colour count. Out-of-range values are rejected and the
    /// prior value kept. While `Ready`, `Requesting` or `Exporting`, a change
    /// supersedes the current request and the new request is returned.
    pub fn set_color_count(
        &mut self,
        colors: i64,
    ) -> Result<Option<TransformRequest>, ParameterError> {
        let changed = self.params.set_color_count(colors)?;
        Ok(self.on_parameters_changed(changed))
    }

    /// Update the print size; same rules as [`set_color_count`](Self::set_color_count).
    pub fn set_print_size(&mut self, size: i64) -> Result<Option<TransformRequest>, ParameterError> {
        let changed = self.params.set_print_size(size)?;
        Ok(self.on_parameters_changed(changed))
    }

    fn on_parameters_changed(&mut self, changed: bool) -> Option<TransformRequest> {
        if !changed {
            return None;
        }
        match self.state {
            PipelineState::Ready | PipelineState::Requesting | PipelineState::Exporting => {
                // a build failure already moved us to Failed
                self.issue_request().ok()
            }
            _ => None,
        }
    }

    // --- transfer --------------------------------------------------------

    /// Issue a fresh request for the current image and parameters (retry).
    pub fn resubmit(&mut self) -> Result<TransformRequest, PipelineError> {
        if self.state == PipelineState::AwaitingSelection {
            return Err(PipelineError::NotReady(self.state));
        }
        self.issue_request()
    }

    fn issue_request(&mut self) -> Result<TransformRequest, PipelineError> {
        let image = self.image.as_ref().ok_or(PipelineError::NoImage)?;

        match self.builder.build(image, self.params.snapshot()) {
            Ok(request) => {
                if let Some(previous) = &self.current {
                    tracing::debug!(
                        previous = %previous.id,
                        request_id = %request.id,
                        "Request superseded"
                    );
                }
                self.current = Some(request.clone());
                self.result = None;
                self.error = None;
                self.transition(PipelineState::Requesting);
                Ok(request)
            }
            Err(e) => {
                self.current = None;
                self.result = None;
                self.fail(e.clone().into());
                Err(e.into())
            }
        }
    }

    /// Apply a tagged transfer outcome.
    ///
    /// Only the current request in `Requesting` may move the machine; all
    /// other outcomes are dropped.
    pub fn apply_transfer(&mut self, outcome: TransferOutcome) -> Disposition {
        if !self.is_current(outcome.request_id) || self.state != PipelineState::Requesting {
            tracing::debug!(
                request_id = %outcome.request_id,
                current = ?self.current_request_id(),
                state = %self.state,
                "Dropping stale transfer outcome"
            );
            return Disposition::Discarded;
        }

        match outcome.result {
            Ok(payload) => {
                self.transition(PipelineState::Decoding);
                match self.decoder.decode(outcome.request_id, payload) {
                    Ok(result) => {
                        tracing::info!(
                            request_id = %outcome.request_id,
                            mime = %result.mime_type,
                            bytes = result.payload.len(),
                            "Pattern ready"
                        );
                        self.result = Some(result);
                        self.error = None;
                        self.transition(PipelineState::Ready);
                    }
                    Err(e) => {
                        self.result = None;
                        self.fail(e.into());
                    }
                }
            }
            Err(e) => {
                self.result = None;
                self.fail(e.into());
            }
        }

        Disposition::Applied
    }

    /// Send a request through the service and apply its outcome
    pub async fn run(&mut self, request: &TransformRequest) -> Disposition {
        let service = Arc::clone(&self.service);
        let outcome = dispatch(service.as_ref(), request).await;
        self.apply_transfer(outcome)
    }

    // --- export ----------------------------------------------------------

    /// Enter `Exporting` and hand out the result to export.
    ///
    /// Allowed from `Ready`, or from `Failed` after an export error (the
    /// result is kept for that retry). The result must reflect the parameters
    /// currently visible to the user.
    pub fn begin_export(&mut self) -> Result<TransformResult, PipelineError> {
        let retrying_export = self.state == PipelineState::Failed
            && matches!(self.error, Some(PipelineError::Export(_)));
        if self.state != PipelineState::Ready && !retrying_export {
            return Err(PipelineError::NotReady(self.state));
        }

        let result = self
            .result()
            .cloned()
            .ok_or(PipelineError::NotReady(self.state))?;
        let current_params = self.current.as_ref().map(|r| r.parameters);
        if current_params != Some(self.params.snapshot()) {
            return Err(PipelineError::StaleResult);
        }

        self.transition(PipelineState::Exporting);
        Ok(result)
    }

    /// Apply an export confirmation for the given request
    pub fn finish_export(
        &mut self,
        request_id: RequestId,
        outcome: Result<ExportHandle, ExportError>,
    ) -> Disposition {
        if !self.is_current(request_id) || self.state != PipelineState::Exporting {
            tracing::debug!(
                request_id = %request_id,
                current = ?self.current_request_id(),
                "Dropping stale export confirmation"
            );
            return Disposition::Discarded;
        }

        match outcome {
            Ok(handle) => {
                tracing::info!(request_id = %request_id, path = %handle.path.display(), "Export complete");
                self.error = None;
                self.transition(PipelineState::Ready);
            }
            Err(e) => self.fail(e.into()),
        }
        Disposition::Applied
    }

    /// Export the ready result through the export manager
    pub async fn export(&mut self) -> Result<ExportHandle, PipelineError> {
        let result = self.begin_export()?;
        let outcome = self.exporter.export(&result).await;
        self.finish_export(result.for_request_id, outcome.clone());
        outcome.map_err(PipelineError::from)
    }

    // --- lifecycle -------------------------------------------------------

    /// Host teardown: drop everything and return to `Idle`
    pub fn reset(&mut self) {
        self.image = None;
        self.current = None;
        self.result = None;
        self.error = None;
        self.transition(PipelineState::Idle);
    }

    fn is_current(&self, id: RequestId) -> bool {
        self.current_request_id() == Some(id)
    }

    fn fail(&mut self, error: PipelineError) {
        tracing::warn!(
            request_id = ?self.current_request_id(),
            error = %error,
            "Pipeline failed"
        );
        self.error = Some(error);
        self.transition(PipelineState::Failed);
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Pipeline transition");
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, ShareError, TransferError};
    use crate::services::{LogShare, StaticPicker};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn png_1x1() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, 1, 1);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[255, 0, 0, 255]).unwrap();
        }
        buf
    }

    /// Service that replays queued answers
    #[derive(Default)]
    struct ScriptedService {
        answers: Mutex<Vec<Result<Vec<u8>, TransferError>>>,
        seen: Mutex<Vec<RequestId>>,
    }

    impl ScriptedService {
        fn answering(answers: Vec<Result<Vec<u8>, TransferError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl TransformService for ScriptedService {
        async fn send(&self, request: &TransformRequest) -> Result<Vec<u8>, TransferError> {
            self.seen.lock().unwrap().push(request.id);
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(TransferError::Network("no scripted answer".into())))
        }
    }

    struct DecliningShare;

    #[async_trait]
    impl ShareSink for DecliningShare {
        async fn share(&self, _path: &Path, _mime: &str) -> Result<(), ShareError> {
            Err(ShareError::Declined("dismissed".into()))
        }
    }

    fn controller_with(
        service: Arc<dyn TransformService>,
        share: Arc<dyn ShareSink>,
        dir: &TempDir,
    ) -> PipelineController {
        PipelineController::new(
            TransformParameters::default(),
            RequestBuilder::for_endpoint("http://127.0.0.1:9/ml").unwrap(),
            service,
            ExportManager::new(dir.path(), share),
        )
    }

    fn controller(dir: &TempDir) -> PipelineController {
        controller_with(ScriptedService::answering(vec![]), Arc::new(LogShare), dir)
    }

    fn ok(id: RequestId, payload: &[u8]) -> TransferOutcome {
        TransferOutcome {
            request_id: id,
            result: Ok(payload.to_vec()),
        }
    }

    fn picker() -> StaticPicker {
        StaticPicker::image(SourceImage::from_bytes(vec![0xFFu8, 0xD8, 0xFF, 0xD9]))
    }

    #[tokio::test]
    async fn test_selection_issues_request_with_current_parameters() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let request = pipeline.select_image(&picker()).await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert_eq!(pipeline.current_request_id(), Some(request.id));
        assert_eq!(request.query_value("colors").as_deref(), Some("2"));
        assert_eq!(request.query_value("size").as_deref(), Some("40"));
    }

    #[tokio::test]
    async fn test_selection_cancelled_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);

        let err = pipeline
            .select_image(&StaticPicker::cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Selection(SelectionError::Cancelled)));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.error().is_none());
        assert!(pipeline.current_request_id().is_none());
    }

    #[tokio::test]
    async fn test_selection_failed_returns_to_idle_with_error() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);

        let err = pipeline
            .select_image(&StaticPicker::failing("permission denied"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Selection(SelectionError::Failed(_))));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.error().is_some());
    }

    #[test]
    fn test_finish_selection_outside_awaiting_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);

        let err = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotReady(PipelineState::Idle)));
    }

    #[test]
    fn test_transfer_success_reaches_ready() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        assert_eq!(pipeline.apply_transfer(ok(request.id, &png_1x1())), Disposition::Applied);

        assert_eq!(pipeline.state(), PipelineState::Ready);
        let result = pipeline.result().unwrap();
        assert_eq!(result.for_request_id, request.id);
        assert_eq!(result.renderable_bytes().unwrap(), png_1x1());
        assert_eq!(result.dimensions, Some((1, 1)));
    }

    #[test]
    fn test_parameter_change_supersedes_and_drops_late_response() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let first = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        let second = pipeline.set_color_count(10).unwrap().expect("new request");
        assert!(second.id > first.id);
        assert_eq!(pipeline.state(), PipelineState::Requesting);

        // late answer for the first request changes nothing
        assert_eq!(pipeline.apply_transfer(ok(first.id, &png_1x1())), Disposition::Discarded);
        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert!(pipeline.result().is_none());

        let failure = TransferOutcome {
            request_id: first.id,
            result: Err(TransferError::Server { status: 500 }),
        };
        assert_eq!(pipeline.apply_transfer(failure), Disposition::Discarded);
        assert_eq!(pipeline.state(), PipelineState::Requesting);

        assert_eq!(pipeline.apply_transfer(ok(second.id, &png_1x1())), Disposition::Applied);
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(pipeline.result().unwrap().for_request_id, second.id);
    }

    #[test]
    fn test_parameter_change_in_ready_reissues() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let first = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();
        pipeline.apply_transfer(ok(first.id, &png_1x1()));
        assert_eq!(pipeline.state(), PipelineState::Ready);

        let next = pipeline.set_print_size(80).unwrap().expect("new request");

        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert_eq!(next.query_value("size").as_deref(), Some("80"));
        // the old result is stale now
        assert!(pipeline.result().is_none());
    }

    #[test]
    fn test_invalid_parameter_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        assert!(pipeline.set_color_count(16).is_err());
        assert!(pipeline.set_print_size(0).is_err());

        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert_eq!(pipeline.current_request_id(), Some(request.id));
        assert_eq!(pipeline.parameters(), TransformParameters::default());
    }

    #[test]
    fn test_parameter_change_while_idle_only_updates_store() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);

        assert!(pipeline.set_color_count(5).unwrap().is_none());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.parameters().colors(), 5);
    }

    #[test]
    fn test_server_error_fails_without_result() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        pipeline.apply_transfer(TransferOutcome {
            request_id: request.id,
            result: Err(TransferError::Server { status: 500 }),
        });

        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.result().is_none());
        assert!(matches!(
            pipeline.error(),
            Some(PipelineError::Transfer(TransferError::Server { status: 500 }))
        ));
    }

    #[test]
    fn test_empty_payload_fails_with_decode_error() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        pipeline.apply_transfer(ok(request.id, b""));

        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.result().is_none());
        assert!(matches!(
            pipeline.error(),
            Some(PipelineError::Decode(DecodeError::Empty))
        ));
    }

    #[test]
    fn test_duplicate_delivery_is_discarded() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        assert_eq!(pipeline.apply_transfer(ok(request.id, &png_1x1())), Disposition::Applied);
        assert_eq!(pipeline.apply_transfer(ok(request.id, b"")), Disposition::Discarded);
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[test]
    fn test_new_selection_supersedes_in_flight_request() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let first = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();

        pipeline.begin_selection();
        assert_eq!(pipeline.apply_transfer(ok(first.id, &png_1x1())), Disposition::Discarded);
        assert_eq!(pipeline.state(), PipelineState::AwaitingSelection);

        let second = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![2u8])))
            .unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_resubmit_after_failure() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        assert!(matches!(pipeline.resubmit(), Err(PipelineError::NoImage)));

        pipeline.begin_selection();
        let first = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();
        pipeline.apply_transfer(TransferOutcome {
            request_id: first.id,
            result: Err(TransferError::Network("reset".into())),
        });
        assert_eq!(pipeline.state(), PipelineState::Failed);

        let retry = pipeline.resubmit().unwrap();
        assert!(retry.id > first.id);
        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert!(pipeline.error().is_none());
    }

    #[tokio::test]
    async fn test_run_uses_service() {
        let dir = TempDir::new().unwrap();
        let service = ScriptedService::answering(vec![Ok(png_1x1())]);
        let mut pipeline = controller_with(service.clone(), Arc::new(LogShare), &dir);

        let request = pipeline.select_image(&picker()).await.unwrap();
        assert_eq!(pipeline.run(&request).await, Disposition::Applied);

        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(*service.seen.lock().unwrap(), vec![request.id]);
    }

    #[tokio::test]
    async fn test_export_requires_ready() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);

        let err = pipeline.export().await.unwrap_err();
        assert!(matches!(err, PipelineError::NotReady(PipelineState::Idle)));
    }

    #[tokio::test]
    async fn test_export_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let service = ScriptedService::answering(vec![Ok(png_1x1())]);
        let mut pipeline = controller_with(service, Arc::new(LogShare), &dir);
        let request = pipeline.select_image(&picker()).await.unwrap();
        pipeline.run(&request).await;

        let first = pipeline.export().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
        let second = pipeline.export().await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read(&second.path).unwrap(), png_1x1());
    }

    #[tokio::test]
    async fn test_export_failure_keeps_result_for_retry() {
        let dir = TempDir::new().unwrap();
        let service = ScriptedService::answering(vec![Ok(png_1x1())]);
        let mut pipeline = controller_with(service, Arc::new(DecliningShare), &dir);
        let request = pipeline.select_image(&picker()).await.unwrap();
        pipeline.run(&request).await;

        let err = pipeline.export().await.unwrap_err();
        assert!(matches!(err, PipelineError::Export(ExportError::Share(_))));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.result().is_some());

        // retry is allowed without re-fetching
        let result = pipeline.begin_export().unwrap();
        assert_eq!(result.for_request_id, request.id);
        assert_eq!(pipeline.state(), PipelineState::Exporting);
    }

    #[tokio::test]
    async fn test_export_after_parameter_change_in_failed_is_stale() {
        let dir = TempDir::new().unwrap();
        let service = ScriptedService::answering(vec![Ok(png_1x1())]);
        let mut pipeline = controller_with(service, Arc::new(DecliningShare), &dir);
        let request = pipeline.select_image(&picker()).await.unwrap();
        pipeline.run(&request).await;
        pipeline.export().await.unwrap_err();

        // Failed does not re-issue, so the kept result no longer matches
        assert!(pipeline.set_color_count(9).unwrap().is_none());
        assert!(matches!(pipeline.begin_export(), Err(PipelineError::StaleResult)));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_stale_export_confirmation_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let first = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();
        pipeline.apply_transfer(ok(first.id, &png_1x1()));
        pipeline.begin_export().unwrap();

        // user changes colours while the share sheet is up
        let second = pipeline.set_color_count(4).unwrap().expect("new request");
        let confirmation = Err(ExportError::Share(ShareError::Declined("late".into())));

        assert_eq!(pipeline.finish_export(first.id, confirmation), Disposition::Discarded);
        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert_eq!(pipeline.current_request_id(), Some(second.id));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = controller(&dir);
        pipeline.begin_selection();
        let request = pipeline
            .finish_selection(Ok(SourceImage::from_bytes(vec![1u8])))
            .unwrap();
        pipeline.apply_transfer(ok(request.id, &png_1x1()));

        pipeline.reset();

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.image().is_none());
        assert!(pipeline.result().is_none());
        assert!(pipeline.current_request_id().is_none());
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = AppConfig {
            default_colors: 1,
            ..Default::default()
        };
        let result = PipelineController::from_config(
            &config,
            ScriptedService::answering(vec![]),
            Arc::new(LogShare),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::AwaitingSelection.to_string(), "awaiting selection");
        assert_eq!(PipelineState::Ready.to_string(), "ready");
    }
}
