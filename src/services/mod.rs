pub mod export_manager;
pub mod image_source;
pub mod parameter_store;
pub mod pipeline;
pub mod request_builder;
pub mod response_decoder;
pub mod transfer_client;

pub use export_manager::{CommandShare, ExportManager, LogShare, ShareSink};
pub use image_source::{FilePicker, ImagePicker, StaticPicker};
pub use parameter_store::ParameterStore;
pub use pipeline::{Disposition, PipelineController, PipelineState};
pub use request_builder::RequestBuilder;
pub use response_decoder::ResponseDecoder;
pub use transfer_client::{dispatch, HttpTransferClient, TransferOutcome, TransformService};
