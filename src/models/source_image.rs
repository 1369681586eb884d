use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// MIME type assumed when a picked image cannot be sniffed
pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";
/// Filename assumed when the picker offers none
pub const FALLBACK_NAME: &str = "photo.jpg";

/// Where the bytes of a picked image live
#[derive(Clone)]
pub enum ImageLocator {
    /// A locally accessible file
    File(PathBuf),
    /// Bytes already held in memory (e.g. handed over by a platform picker)
    Memory(Arc<[u8]>),
}

impl ImageLocator {
    /// Read the full image contents.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match self {
            ImageLocator::File(path) => tokio::fs::read(path).await,
            ImageLocator::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageLocator::File(path) => Some(path),
            ImageLocator::Memory(_) => None,
        }
    }
}

impl fmt::Debug for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLocator::File(path) => f.debug_tuple("File").field(path).finish(),
            ImageLocator::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Display for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLocator::File(path) => write!(f, "{}", path.display()),
            ImageLocator::Memory(bytes) => write!(f, "<memory: {} bytes>", bytes.len()),
        }
    }
}

/// A locally selected image. Superseded by a later pick, never mutated.
#[derive(Debug, Clone)]
pub struct SourceImage {
    locator: ImageLocator,
    mime_type: String,
    suggested_name: String,
}

impl SourceImage {
    pub fn new(
        locator: ImageLocator,
        mime_type: impl Into<String>,
        suggested_name: impl Into<String>,
    ) -> Self {
        Self {
            locator,
            mime_type: mime_type.into(),
            suggested_name: suggested_name.into(),
        }
    }

    /// In-memory image with the fallback MIME type and name
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(
            ImageLocator::Memory(bytes.into()),
            FALLBACK_MIME_TYPE,
            FALLBACK_NAME,
        )
    }

    pub fn locator(&self) -> &ImageLocator {
        &self.locator
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    /// Check that the handle is usable as a multipart file field
    pub fn validate(&self) -> Result<(), String> {
        if !self.mime_type.starts_with("image/") {
            return Err(format!("unsupported MIME type '{}'", self.mime_type));
        }
        if self.suggested_name.trim().is_empty() {
            return Err("empty file name".to_string());
        }
        if let ImageLocator::Memory(bytes) = &self.locator {
            if bytes.is_empty() {
                return Err("empty image data".to_string());
            }
        }
        Ok(())
    }
}
