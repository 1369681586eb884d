use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ExportError, ShareError};
use crate::models::{ExportHandle, TransformResult};

/// Hex characters of the content digest used in exported filenames
const DIGEST_NAME_LEN: usize = 16;

/// Platform share/save facility
#[async_trait]
pub trait ShareSink: Send + Sync {
    /// Hand a durable file to the platform. Reports whether the facility
    /// accepted it, not what the user did with it afterwards.
    async fn share(&self, path: &Path, mime_type: &str) -> Result<(), ShareError>;
}

/// Share sink that only records the exported location
#[derive(Debug, Default)]
pub struct LogShare;

#[async_trait]
impl ShareSink for LogShare {
    async fn share(&self, path: &Path, mime_type: &str) -> Result<(), ShareError> {
        tracing::info!(path = %path.display(), mime = %mime_type, "Pattern exported");
        Ok(())
    }
}

/// Share sink that runs an external program with the exported path appended
/// to its arguments (e.g. `xdg-open`, `open`, a print spooler).
#[derive(Debug, Clone)]
pub struct CommandShare {
    program: String,
    args: Vec<String>,
}

impl CommandShare {
    /// Build from an argv list; `None` if the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ShareSink for CommandShare {
    async fn share(&self, path: &Path, mime_type: &str) -> Result<(), ShareError> {
        tracing::debug!(program = %self.program, path = %path.display(), "Running share command");

        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .env("STITCHKIT_MIME_TYPE", mime_type)
            .status()
            .await
            .map_err(|e| ShareError::Unavailable(format!("{}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ShareError::Declined(format!("{} exited with {status}", self.program)))
        }
    }
}

/// Persists decoded results and hands them to the share facility.
///
/// Files are named after their content, so exporting the same result again
/// rewrites the same file with the same bytes.
pub struct ExportManager {
    dir: PathBuf,
    share: Arc<dyn ShareSink>,
}

impl ExportManager {
    pub fn new(dir: impl AsRef<Path>, share: Arc<dyn ShareSink>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            share,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the given result will be exported to
    pub fn target_path(&self, result: &TransformResult) -> PathBuf {
        let digest = content_digest(&result.payload);
        let name = Path::new(&result.exportable_name);
        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let file_name = match name.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}-{}.{ext}", &digest[..DIGEST_NAME_LEN]),
            None => format!("{stem}-{}", &digest[..DIGEST_NAME_LEN]),
        };
        self.dir.join(file_name)
    }

    pub async fn export(&self, result: &TransformResult) -> Result<ExportHandle, ExportError> {
        let path = self.write(result).await.map_err(|e| {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to write export");
            ExportError::from(e)
        })?;

        self.share.share(&path, &result.mime_type).await.map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Share facility rejected export");
            ExportError::Share(e)
        })?;

        Ok(ExportHandle {
            path,
            mime_type: result.mime_type.clone(),
            bytes_written: result.payload.len(),
            digest: content_digest(&result.payload),
            exported_at: chrono::Utc::now(),
        })
    }

    /// Write via a temp file and rename so a crash never leaves a partial
    /// file under the final name
    async fn write(&self, result: &TransformResult) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.target_path(result);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("export");
        let tmp_path = self.dir.join(format!(".{file_name}.tmp"));

        tokio::fs::write(&tmp_path, result.exportable_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        tracing::debug!(path = %path.display(), bytes = result.payload.len(), "Export written");
        Ok(path)
    }
}

fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
