pub mod config;
pub mod parameters;
pub mod request;
pub mod result;
pub mod source_image;

pub use config::AppConfig;
pub use parameters::{TransformParameters, DEFAULT_COLORS, DEFAULT_SIZE, MAX_COLORS, MIN_COLORS};
pub use request::{RequestId, TransformRequest};
pub use result::{ExportHandle, TransformResult};
pub use source_image::{ImageLocator, SourceImage};
