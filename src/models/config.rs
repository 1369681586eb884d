use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::parameters::{TransformParameters, DEFAULT_COLORS, DEFAULT_SIZE};
use crate::error::ConfigError;

/// Application configuration loaded from config.yaml
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Transformation service URL (query pairs are appended per request)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound for a whole request/response exchange, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Colour count a new session starts with
    #[serde(default = "default_colors")]
    pub default_colors: i64,

    /// Print size a new session starts with
    #[serde(default = "default_size")]
    pub default_size: i64,

    /// Multipart field carrying the image file
    #[serde(default = "default_image_field")]
    pub image_field: String,

    /// Directory exported patterns are written to
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Program (and leading args) invoked with the exported file path
    #[serde(default)]
    pub share_command: Option<Vec<String>>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_colors() -> i64 {
    DEFAULT_COLORS as i64
}

fn default_size() -> i64 {
    DEFAULT_SIZE as i64
}

fn default_image_field() -> String {
    "image".to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl AppConfig {
    /// Load configuration from an optional YAML file.
    ///
    /// A missing or unparseable file falls back to defaults with a warning.
    /// `ENDPOINT_URL` overrides the configured endpoint.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(path) => match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        endpoint = %config.endpoint,
                        "Loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(%e, path = %path.display(), "Failed to load config, using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Ok(endpoint) = std::env::var("ENDPOINT_URL") {
            tracing::debug!(%endpoint, "Endpoint overridden by ENDPOINT_URL");
            config.endpoint = endpoint;
        }

        config
    }

    /// Read and parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        self.default_parameters()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be positive".to_string(),
            ));
        }
        if self.image_field.trim().is_empty() {
            return Err(ConfigError::Invalid("image_field must not be empty".to_string()));
        }
        if let Some(cmd) = &self.share_command {
            if cmd.is_empty() {
                return Err(ConfigError::Invalid("share_command must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint '{}': {e}", self.endpoint)))
    }

    /// Initial parameter snapshot for a session
    pub fn default_parameters(&self) -> Result<TransformParameters, ConfigError> {
        TransformParameters::new(self.default_colors, self.default_size)
            .map_err(|e| ConfigError::Invalid(format!("default parameters: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            default_colors: default_colors(),
            default_size: default_size(),
            image_field: default_image_field(),
            export_dir: default_export_dir(),
            share_command: None,
        }
    }
}
