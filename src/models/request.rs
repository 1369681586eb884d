use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{SourceImage, TransformParameters};

/// Monotonically increasing request token. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable descriptor for one round trip to the transformation service.
///
/// `url` already carries the `colors` and `size` query pairs; the body is a
/// multipart form with the image under `file_field` plus `form_fields`.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub id: RequestId,
    pub url: Url,
    pub image: SourceImage,
    pub parameters: TransformParameters,
    pub file_field: String,
    pub form_fields: Vec<(String, String)>,
}

impl TransformRequest {
    /// Value of a query pair on the request URL
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}
