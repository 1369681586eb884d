use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::error::SelectionError;
use crate::models::source_image::{FALLBACK_MIME_TYPE, FALLBACK_NAME};
use crate::models::{ImageLocator, SourceImage};

/// Bytes read from the head of a file for type sniffing
const SNIFF_LEN: usize = 8192;

/// Capability that lets the user pick an image
#[async_trait]
pub trait ImagePicker: Send + Sync {
    /// Suspend until the user picks an image or backs out
    async fn select(&self) -> Result<SourceImage, SelectionError>;
}

/// Picker for an image path chosen up front (command line, drag and drop)
pub struct FilePicker {
    path: PathBuf,
}

impl FilePicker {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_head(&self) -> std::io::Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
        Ok(head)
    }
}

#[async_trait]
impl ImagePicker for FilePicker {
    async fn select(&self) -> Result<SourceImage, SelectionError> {
        let head = self.read_head().await.map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to open picked image");
            SelectionError::Failed(format!("{}: {e}", self.path.display()))
        })?;

        if head.is_empty() {
            return Err(SelectionError::Failed(format!(
                "{}: file is empty",
                self.path.display()
            )));
        }

        let mime_type = match infer::get(&head) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                kind.mime_type().to_string()
            }
            Some(kind) => {
                return Err(SelectionError::Failed(format!(
                    "{}: not an image ({})",
                    self.path.display(),
                    kind.mime_type()
                )))
            }
            None => {
                tracing::debug!(path = %self.path.display(), "Unknown image type, assuming JPEG");
                FALLBACK_MIME_TYPE.to_string()
            }
        };

        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_NAME)
            .to_string();

        tracing::debug!(path = %self.path.display(), mime = %mime_type, "Sniffed picked image");

        Ok(SourceImage::new(
            ImageLocator::File(self.path.clone()),
            mime_type,
            name,
        ))
    }
}

/// Picker with a predetermined outcome, for hosts that already hold the
/// picked image (or the user's refusal)
pub struct StaticPicker {
    outcome: Result<SourceImage, SelectionError>,
}

impl StaticPicker {
    pub fn image(image: SourceImage) -> Self {
        Self { outcome: Ok(image) }
    }

    pub fn cancelled() -> Self {
        Self {
            outcome: Err(SelectionError::Cancelled),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(SelectionError::Failed(reason.into())),
        }
    }
}

#[async_trait]
impl ImagePicker for StaticPicker {
    async fn select(&self) -> Result<SourceImage, SelectionError> {
        self.outcome.clone()
    }
}
